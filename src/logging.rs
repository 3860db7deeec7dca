//! Diagnostic logging to stderr.
//!
//! `RUST_LOG` takes precedence over the configured level:
//! ```bash
//! RUST_LOG=docchat=debug docchat index
//! ```

use std::sync::Once;

use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::models::LoggingConfig;

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Filter directive for the given configuration.
///
/// `verbose` raises the level to at least `debug`.
pub fn filter_directive(config: &LoggingConfig, verbose: bool) -> String {
    let level = config.level.trim();
    if verbose && matches!(level, "" | "off" | "error" | "warn" | "info") {
        "debug".to_string()
    } else if level.is_empty() {
        "warn".to_string()
    } else {
        level.to_string()
    }
}

/// Install the global subscriber. Only the first call takes effect.
pub fn init(config: &LoggingConfig, verbose: bool) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::try_new(filter_directive(config, verbose))
                .unwrap_or_else(|_| EnvFilter::new("warn"))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(verbose)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter);

        // Another subscriber may already be installed (e.g. by a test harness).
        let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
    });
}
