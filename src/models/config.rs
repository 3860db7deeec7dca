use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::search::OutputFormat;
use crate::error::ConfigError;

pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_EMBEDDING_MODEL: &str = "models/text-embedding-004";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;
pub const DEFAULT_BATCH_SIZE: u32 = 100;
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_CHAT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TOP_K: u32 = 5;
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "documents";
pub const DEFAULT_SCAN_LIMIT: u32 = 10_000;
pub const PROJECT_CONFIG_DIR: &str = ".docchat";

/// Environment variables that override file configuration, with the key they set.
pub const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("GOOGLE_API_KEY", "api.key"),
    ("DOCCHAT_API_BASE_URL", "api.base_url"),
    ("DOCCHAT_EMBEDDING_MODEL", "embedding.model"),
    ("DOCCHAT_CHAT_MODEL", "chat.model"),
    ("DOCCHAT_DOCS_DIR", "indexing.docs_dir"),
    ("DOCCHAT_VECTOR_DRIVER", "vector_store.driver"),
    ("DOCCHAT_QDRANT_URL", "vector_store.url"),
    ("QDRANT_API_KEY", "vector_store.api_key"),
    ("DOCCHAT_LOG", "logging.level"),
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    Global,
    Project,
    Env,
}

/// Configuration after merging all layers, with provenance per key.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: Config,
    pub sources: BTreeMap<String, ConfigSource>,
    pub project_path: Option<PathBuf>,
    pub global_path: Option<PathBuf>,
}

impl ResolvedConfig {
    pub fn source_of(&self, key: &str) -> ConfigSource {
        self.sources
            .get(key)
            .copied()
            .unwrap_or(ConfigSource::Default)
    }
}

impl Config {
    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("docchat").join("config.toml"))
    }

    pub fn project_config_dir() -> Option<PathBuf> {
        std::env::current_dir()
            .ok()
            .map(|cwd| cwd.join(PROJECT_CONFIG_DIR))
    }

    /// Search the working directory and its ancestors for a project config.
    pub fn find_project_config() -> Option<PathBuf> {
        let cwd = std::env::current_dir().ok()?;
        cwd.ancestors()
            .map(|dir| dir.join(PROJECT_CONFIG_DIR).join("config.toml"))
            .find(|path| path.is_file())
    }

    /// Load global config, project config and environment overrides, in that order.
    pub fn load() -> Result<ResolvedConfig, ConfigError> {
        let global = Self::global_path().filter(|p| p.is_file());
        let project = Self::find_project_config();
        Self::load_from(global.as_deref(), project.as_deref(), |name| {
            std::env::var(name).ok()
        })
    }

    pub fn load_from(
        global: Option<&Path>,
        project: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<ResolvedConfig, ConfigError> {
        let mut merged = toml::Table::new();
        let mut sources = BTreeMap::new();

        for (path, source) in [(global, ConfigSource::Global), (project, ConfigSource::Project)] {
            let Some(path) = path else {
                continue;
            };
            let content = std::fs::read_to_string(path)?;
            let table: toml::Table = toml::from_str(&content)?;
            record_sources(&table, "", source, &mut sources);
            merge_tables(&mut merged, table);
        }

        let mut config: Config = toml::Value::Table(merged).try_into()?;

        for (var, key) in ENV_OVERRIDES {
            let Some(value) = env(var).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            config.set_value(key, value.trim())?;
            sources.insert((*key).to_string(), ConfigSource::Env);
        }

        config.validate()?;

        Ok(ResolvedConfig {
            config,
            sources,
            project_path: project.map(Path::to_path_buf),
            global_path: global.map(Path::to_path_buf),
        })
    }

    fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "api.key" => self.api.key = Some(value.to_string()),
            "api.base_url" => self.api.base_url = value.to_string(),
            "embedding.model" => self.embedding.model = value.to_string(),
            "chat.model" => self.chat.model = value.to_string(),
            "indexing.docs_dir" => self.indexing.docs_dir = PathBuf::from(value),
            "vector_store.driver" => {
                self.vector_store.driver = value.parse().map_err(ConfigError::ValidationError)?
            }
            "vector_store.url" => self.vector_store.url = value.to_string(),
            "vector_store.api_key" => self.vector_store.api_key = Some(value.to_string()),
            "logging.level" => self.logging.level = value.to_string(),
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown configuration key: {other}"
                )));
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.batch_size must be at least 1".to_string(),
            ));
        }
        if self.indexing.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "indexing.chunk_size must be at least 1".to_string(),
            ));
        }
        if self.indexing.chunk_overlap >= self.indexing.chunk_size {
            return Err(ConfigError::ValidationError(
                "indexing.chunk_overlap must be smaller than indexing.chunk_size".to_string(),
            ));
        }
        if self.chat.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "chat.top_k must be at least 1".to_string(),
            ));
        }
        if self.chat.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "chat.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The provider credential; missing credentials are fatal before any processing.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api
            .key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::MissingCredential("GOOGLE_API_KEY".to_string()))
    }

    pub fn init_global() -> Result<PathBuf, ConfigError> {
        let path = Self::global_path().ok_or_else(|| {
            ConfigError::PathError("could not determine config directory".to_string())
        })?;
        Self::default().save(&path)?;
        Ok(path)
    }

    pub fn init_project() -> Result<PathBuf, ConfigError> {
        let dir = Self::project_config_dir().ok_or_else(|| {
            ConfigError::PathError("could not determine project directory".to_string())
        })?;
        let path = dir.join("config.toml");
        Self::default().save(&path)?;
        Ok(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut to_write = self.clone();
        to_write.api.key = None;
        let content = toml::to_string_pretty(&to_write)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn record_sources(
    table: &toml::Table,
    prefix: &str,
    source: ConfigSource,
    sources: &mut BTreeMap<String, ConfigSource>,
) {
    for (key, value) in table {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::Table(inner) => record_sources(inner, &full_key, source, sources),
            _ => {
                sources.insert(full_key, source);
            }
        }
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(inner)) => {
                merge_tables(existing, inner);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default = "default_api_base_url")]
    pub base_url: String,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: None,
            base_url: default_api_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_embedding_dimension")]
    pub dimension: u32,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_dimension() -> u32 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_batch_size() -> u32 {
    DEFAULT_BATCH_SIZE
}

fn default_embedding_timeout() -> u64 {
    120
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

/// Vector store backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorDriver {
    /// JSON file on local disk
    #[default]
    Local,
    /// Qdrant server
    Qdrant,
}

impl fmt::Display for VectorDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VectorDriver::Local => write!(f, "local"),
            VectorDriver::Qdrant => write!(f, "qdrant"),
        }
    }
}

impl FromStr for VectorDriver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(VectorDriver::Local),
            "qdrant" => Ok(VectorDriver::Qdrant),
            _ => Err(format!("unknown vector store driver: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub driver: VectorDriver,

    /// Directory of the local store.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Upper bound on records read when checking which documents are indexed.
    #[serde(default = "default_scan_limit")]
    pub scan_limit: u32,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(PROJECT_CONFIG_DIR).join("vector_db")
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_scan_limit() -> u32 {
    DEFAULT_SCAN_LIMIT
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            driver: VectorDriver::default(),
            path: default_store_path(),
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key: None,
            scan_limit: default_scan_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    #[serde(default = "default_docs_dir")]
    pub docs_dir: PathBuf,

    /// Maximum chunk length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,

    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

fn default_docs_dir() -> PathBuf {
    PathBuf::from("docs")
}

// Roughly the 2048-token input limit of the embedding model.
fn default_chunk_size() -> u32 {
    8000
}

fn default_chunk_overlap() -> u32 {
    800
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            docs_dir: default_docs_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            exclude_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_chat_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_top_k")]
    pub top_k: u32,
}

fn default_chat_model() -> String {
    DEFAULT_CHAT_MODEL.to_string()
}

fn default_temperature() -> f64 {
    0.2
}

fn default_chat_timeout() -> u64 {
    DEFAULT_CHAT_TIMEOUT_SECS
}

fn default_top_k() -> u32 {
    DEFAULT_TOP_K
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            temperature: default_temperature(),
            timeout_secs: default_chat_timeout(),
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub default_format: OutputFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.embedding.model, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(config.embedding.batch_size, 100);
        assert_eq!(config.chat.timeout_secs, 30);
        assert_eq!(config.chat.top_k, 5);
        assert_eq!(config.vector_store.driver, VectorDriver::Local);
        assert!(config.api.key.is_none());
    }

    #[test]
    fn test_global_path() {
        let path = Config::global_path();
        assert!(path.is_some());
    }

    #[test]
    fn test_project_overrides_global() {
        let dir = tempfile::tempdir().unwrap();
        let global = dir.path().join("global.toml");
        let project = dir.path().join("project.toml");
        std::fs::write(
            &global,
            "[embedding]\nbatch_size = 50\n\n[chat]\ntop_k = 8\n",
        )
        .unwrap();
        std::fs::write(&project, "[chat]\ntop_k = 3\n").unwrap();

        let resolved = Config::load_from(Some(&global), Some(&project), no_env).unwrap();

        assert_eq!(resolved.config.embedding.batch_size, 50);
        assert_eq!(resolved.config.chat.top_k, 3);
        assert_eq!(resolved.config.chat.timeout_secs, 30);
        assert_eq!(resolved.source_of("embedding.batch_size"), ConfigSource::Global);
        assert_eq!(resolved.source_of("chat.top_k"), ConfigSource::Project);
        assert_eq!(resolved.source_of("chat.model"), ConfigSource::Default);
    }

    #[test]
    fn test_env_overrides_files() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("GOOGLE_API_KEY", "secret"),
            ("DOCCHAT_VECTOR_DRIVER", "qdrant"),
            ("DOCCHAT_DOCS_DIR", "  "),
        ]);
        let resolved =
            Config::load_from(None, None, |k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(resolved.config.require_api_key().unwrap(), "secret");
        assert_eq!(resolved.config.vector_store.driver, VectorDriver::Qdrant);
        assert_eq!(resolved.config.indexing.docs_dir, PathBuf::from("docs"));
        assert_eq!(resolved.source_of("api.key"), ConfigSource::Env);
    }

    #[test]
    fn test_invalid_driver_from_env() {
        let result = Config::load_from(None, None, |k| {
            (k == "DOCCHAT_VECTOR_DRIVER").then(|| "chroma".to_string())
        });
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_missing_credential() {
        let config = Config::default();
        assert!(matches!(
            config.require_api_key(),
            Err(ConfigError::MissingCredential(_))
        ));

        let mut config = Config::default();
        config.api.key = Some("   ".to_string());
        assert!(config.require_api_key().is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.indexing.chunk_overlap = config.indexing.chunk_size;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.embedding.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_omits_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.api.key = Some("secret".to_string());
        config.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("secret"));
        let resolved = Config::load_from(None, Some(&path), no_env).unwrap();
        assert_eq!(resolved.config.chat.model, DEFAULT_CHAT_MODEL);
    }
}
