use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to open log file {0}: {1}")]
    OpenError(String, std::io::Error),
    #[error("Failed to install logger: {0}")]
    InitError(String),
}

/// Filter directive for a configured level; RUST_LOG takes precedence
fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match level.trim().to_lowercase().as_str() {
            "" => "info".to_string(),
            "warning" => "warn".to_string(),
            "critical" => "error".to_string(),
            other => other.to_string(),
        };
        EnvFilter::try_new(format!("study_helper={level},study={level},warn"))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

/// Send log output to `path` (appending) so it never draws over the terminal UI
pub fn init(level: &str, path: &Path) -> Result<(), LoggingError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| LoggingError::OpenError(path.display().to_string(), e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| LoggingError::OpenError(path.display().to_string(), e))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| LoggingError::InitError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_level_falls_back_to_info() {
        // An invalid directive must not panic
        let filter = filter_for("not a level!!");
        assert!(!filter.to_string().is_empty());
    }

    #[test]
    fn creates_missing_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("study.log");
        // Another test may already own the global subscriber
        let _ = init("debug", &path);
        assert!(path.exists());
    }
}
