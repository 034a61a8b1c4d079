//! Tracing setup.
//!
//! The TUI runs the terminal in raw mode, so it logs to a file in the config
//! directory. One-shot commands log to stderr.

use std::path::Path;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    File,
    Stderr,
}

/// Level after applying `-v` flags on top of the configured one
pub fn effective_level(configured: &str, verbose: u8) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over `level`.
pub fn init(level: &str, target: LogTarget, log_path: &Path) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = match (target, log_path.parent(), log_path.file_name()) {
        (LogTarget::File, Some(dir), Some(name)) if std::fs::create_dir_all(dir).is_ok() => {
            Some(tracing_appender::rolling::never(dir, name))
        }
        _ => None,
    };

    match file_appender {
        Some(appender) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(appender);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .try_init();
        }
        None if target == LogTarget::File => {
            // Nowhere safe to write while the terminal is raw.
            let _ = tracing_subscriber::registry()
                .with(EnvFilter::new("off"))
                .try_init();
        }
        None => {
            let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .try_init();
        }
    }
}
