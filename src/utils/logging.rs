// src/utils/logging.rs
use std::fs;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::utils::config::LoggingConfig;
use crate::utils::error::{HarnessError, Result};

/// Installs the global subscriber: stderr always, plus a plain-text file when
/// configured. `RUST_LOG` wins over the configured level.
///
/// The file writer is synchronous. A background writer thread would not
/// survive into forked workers.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| HarnessError::Config(format!("Invalid log level '{}': {}", config.level, e)))?;

    let file_layer = match &config.file {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(file_appender(path)?),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .try_init()
        .map_err(|e| HarnessError::Config(format!("Logging already initialized: {}", e)))
}

fn file_appender(path: &Path) -> Result<RollingFileAppender> {
    let directory = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| HarnessError::Config(format!("Invalid log file {}", path.display())))?;
    fs::create_dir_all(directory)?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(directory)
        .map_err(|e| HarnessError::ResourceLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}
