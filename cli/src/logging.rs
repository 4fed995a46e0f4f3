//! Logging initialization: diagnostics go to a file or are dropped, never to the console.
//!
//! Reads `RUST_LOG` (filter) and `LOG_FILE` (path) from env (e.g. via .env or the XDG config).
//! User-facing output is the console's job; keeping tracing off the terminal keeps stdout clean
//! while a stream is being followed.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

const DEFAULT_FILTER: &str = "info,hyper_util=off,reqwest=warn,tungstenite=warn";

/// - **RUST_LOG**: filter, e.g. `debug` or `cli=debug`. Default: `info` with noisy crates capped.
/// - **LOG_FILE**: when set, logs are appended there (plain text, no ANSI); otherwise dropped.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER));

    match std::env::var("LOG_FILE") {
        Ok(path) if !path.trim().is_empty() => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .with_target(true)
                .with_filter(filter);
            tracing_subscriber::registry().with(file_layer).try_init()?;
            tracing::info!(path = %path, "beacon logging to file");
        }
        _ => {
            let sink_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::sink)
                .with_filter(filter);
            tracing_subscriber::registry().with(sink_layer).try_init()?;
        }
    }
    Ok(())
}
