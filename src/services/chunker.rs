//! Page text chunking with overlap.

use crate::models::{DocumentChunk, IndexingConfig, PageText};

/// Splits page text into overlapping chunks of at most `chunk_size` characters.
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    pub fn new(config: &IndexingConfig) -> Self {
        let chunk_size = (config.chunk_size as usize).max(1);
        // Overlap must leave room for progress.
        let overlap = (config.chunk_overlap as usize).min(chunk_size - 1);
        Self {
            chunk_size,
            overlap,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(&IndexingConfig::default())
    }

    /// Chunk one page. Chunk indices restart at zero for every page.
    pub fn chunk(&self, page: &PageText) -> Vec<DocumentChunk> {
        if page.text.trim().is_empty() {
            return Vec::new();
        }

        self.split_with_overlap(&page.text)
            .into_iter()
            .enumerate()
            .map(|(idx, content)| DocumentChunk::from_page(page, content, idx as u32))
            .collect()
    }

    /// Chunk every page, in order.
    pub fn chunk_all(&self, pages: &[PageText]) -> Vec<DocumentChunk> {
        pages.iter().flat_map(|page| self.chunk(page)).collect()
    }

    fn split_with_overlap(&self, content: &str) -> Vec<String> {
        let chars: Vec<char> = content.chars().collect();
        let total_chars = chars.len();

        if total_chars <= self.chunk_size {
            return vec![content.trim().to_string()];
        }

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < total_chars {
            let end = (start + self.chunk_size).min(total_chars);
            let adjusted_end = self.find_break_point(&chars, start, end, total_chars);

            let chunk: String = chars[start..adjusted_end].iter().collect();
            let chunk = chunk.trim();
            if !chunk.is_empty() {
                chunks.push(chunk.to_string());
            }

            if adjusted_end >= total_chars {
                break;
            }

            let next = adjusted_end.saturating_sub(self.overlap);
            start = if next > start { next } else { adjusted_end };
        }

        chunks
    }

    /// Find a natural break point near the target end position.
    fn find_break_point(
        &self,
        chars: &[char],
        start: usize,
        target_end: usize,
        total: usize,
    ) -> usize {
        if target_end >= total {
            return total;
        }

        // Look for a break within the last 20% of the chunk, never at `start`.
        let search_start = target_end
            .saturating_sub(self.chunk_size / 5)
            .max(start + 1);
        if search_start >= target_end {
            return target_end;
        }
        let search_range = &chars[search_start..target_end];

        // Priority: double newline > single newline > sentence end > space
        let mut paragraph = None;
        let mut last_newline = None;
        let mut last_sentence = None;
        let mut last_space = None;

        for (i, c) in search_range.iter().enumerate() {
            let pos = search_start + i;
            match c {
                '\n' => {
                    if i > 0 && search_range[i - 1] == '\n' {
                        paragraph = Some(pos + 1);
                    }
                    last_newline = Some(pos + 1);
                }
                '.' | '!' | '?' => {
                    if chars.get(pos + 1).is_some_and(|c| c.is_whitespace()) {
                        last_sentence = Some(pos + 1);
                    }
                }
                ' ' | '\t' => {
                    last_space = Some(pos + 1);
                }
                _ => {}
            }
        }

        paragraph
            .or(last_newline)
            .or(last_sentence)
            .or(last_space)
            .unwrap_or(target_end)
    }
}
