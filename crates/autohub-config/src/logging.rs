// ── Tracing setup ──
//
// One subscriber for every frontend: env filter, plain or JSON lines,
// written to stderr or to a file through a non-blocking appender.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::ConfigError;

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g. "info",
    /// "autohub_core=debug").
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,

    /// Write to this file instead of stderr. Frontends that own the
    /// terminal must set it.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            file: None,
        }
    }
}

fn default_level() -> String {
    "info".into()
}

/// Map a `-v` count to a filter level.
pub fn verbosity_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber.
///
/// Returns the appender guard when logging to a file; hold it for the
/// lifetime of the application so buffered lines get flushed.
pub fn init_tracing(config: &LogConfig) -> Result<Option<WorkerGuard>, ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| ConfigError::Logging(format!("bad filter '{}': {e}", config.level)))?;

    let (writer, guard, ansi) = match config.file {
        Some(ref path) => {
            let (writer, guard) = file_writer(path)?;
            (writer, Some(guard), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), None, true),
    };

    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true);
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json {
        registry.with(layer.json()).try_init()
    } else {
        registry.with(layer).try_init()
    };
    installed.map_err(|e| ConfigError::Logging(e.to_string()))?;

    Ok(guard)
}

fn file_writer(path: &Path) -> Result<(BoxMakeWriter, WorkerGuard), ConfigError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let name = path.file_name().ok_or_else(|| ConfigError::Validation {
        field: "logging.file".into(),
        reason: format!("'{}' has no file name", path.display()),
    })?;

    std::fs::create_dir_all(dir)?;
    let appender = tracing_appender::rolling::never(dir, name);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    Ok((BoxMakeWriter::new(non_blocking), guard))
}
