use std::fs::OpenOptions;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Install the global subscriber: stderr output filtered by `RUST_LOG`
/// (default `info`), plus a DEBUG-level file layer when `TAPLIST_LOG_FILE`
/// is set.
pub fn init_tracing() {
    let file_logging = std::env::var("TAPLIST_LOG_FILE").ok();

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    let registry = tracing_subscriber::registry().with(stderr_layer);

    let file = file_logging.as_deref().and_then(|log_path| {
        match OpenOptions::new().create(true).append(true).open(log_path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", log_path, e);
                None
            }
        }
    });

    if let Some(file) = file {
        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG);

        // Ignore the error when a subscriber is already installed
        let _ = registry.with(file_layer).try_init();
    } else {
        let _ = registry.try_init();
    }
}
