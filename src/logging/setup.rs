use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use super::formatter::BracketedFormatter;

/// How chatty the console should be and whether to keep a log file
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub verbose: bool,
    pub quiet: bool,
    /// Directory for the timestamped log file; `None` logs to stdout only
    pub log_dir: Option<PathBuf>,
}

impl LogOptions {
    fn default_directive(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

fn create_log_file(log_dir: &Path) -> Result<(fs::File, PathBuf)> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create logs directory {:?}", log_dir))?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let log_path = log_dir.join(format!("typhoon_subset_{}.log", timestamp));

    let file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&log_path)
        .with_context(|| format!("Failed to create log file {:?}", log_path))?;
    Ok((file, log_path))
}

/// Install the global subscriber: bracketed lines on stdout and, if asked
/// for, the same lines (without ANSI colors) in a log file.
///
/// `RUST_LOG` overrides the level chosen from `options`.
pub fn setup_logging(options: &LogOptions) -> Result<Option<PathBuf>> {
    let log_file = options.log_dir.as_deref().map(create_log_file).transpose()?;

    let (file_layer, log_path) = match log_file {
        Some((file, path)) => {
            let layer = fmt::layer()
                .event_format(BracketedFormatter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false);
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    let stdout_layer = fmt::layer()
        .event_format(BracketedFormatter)
        .with_writer(std::io::stdout);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.default_directive()));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if let Some(path) = &log_path {
        info!("Log file created at: {:?}", path);
    }
    Ok(log_path)
}
