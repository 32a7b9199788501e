//! tracing-subscriber bootstrap: console and optional file output.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use enoch_core::config::LogConfig;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
pub fn default_directive(config: &LogConfig) -> String {
    // HTTP internals are noisy at debug.
    format!("{},hyper=warn,hyper_util=warn,reqwest=warn", config.level.as_str())
}

/// Install the global subscriber. `RUST_LOG` overrides `log.level`.
pub fn init(config: &LogConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));
    let timer = ChronoLocal::new(config.time_format.clone());

    let console = config.console.then(|| {
        fmt::layer()
            .with_ansi(config.color)
            .with_timer(timer.clone())
            .with_target(false)
    });

    let file = match config.file.as_deref().map(str::trim) {
        Some(path) if !path.is_empty() => {
            let writer = open_log_file(Path::new(path))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_timer(timer)
                    .with_writer(Mutex::new(writer)),
            )
        }
        _ => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(())
}

fn open_log_file(path: &Path) -> anyhow::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory {}", parent.display()))?;
        }
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}
