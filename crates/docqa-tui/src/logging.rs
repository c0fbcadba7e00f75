use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,hyper=warn,reqwest=warn";

/// Directory for the log file; the TUI draws on stderr so nothing is logged there.
pub fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("docqa").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// `RUST_LOG` wins, then the configured level, then the default.
fn filter_directives(rust_log: Option<&str>, configured: Option<&str>) -> String {
    rust_log
        .or(configured)
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_FILTER)
        .to_string()
}

pub fn initialize(configured_level: Option<&str>) -> Result<PathBuf> {
    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Cannot create log directory {}", log_dir.display()))?;

    let log_file_path = log_dir.join("docqa.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)
        .with_context(|| format!("Cannot open log file {}", log_file_path.display()))?;

    let rust_log = std::env::var("RUST_LOG").ok();
    let directives = filter_directives(rust_log.as_deref(), configured_level);

    tracing_subscriber::registry()
        .with(EnvFilter::new(directives))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Arc::new(log_file))
                .with_ansi(false)
                .with_target(true),
        )
        .try_init()
        .context("Tracing subscriber already installed")?;

    tracing::info!(path = %log_file_path.display(), "logging initialized");
    Ok(log_file_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_precedence() {
        assert_eq!(filter_directives(Some("debug"), Some("warn")), "debug");
        assert_eq!(filter_directives(None, Some("docqa_core=trace")), "docqa_core=trace");
        assert_eq!(filter_directives(None, None), DEFAULT_FILTER);
        assert_eq!(filter_directives(Some("  "), Some("error")), DEFAULT_FILTER);
    }
}
