pub mod config;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

pub use pipeline::batch_analysis::{
    AnalysisBackend, AnalysisReport, BatchAnalyzer, EntryFilter, LogEntry, ProcessingConfig,
};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `config::default_log_filter()` is used.
/// Safe to call more than once: later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();

    tracing::debug!("{} v{} tracing initialised", config::APP_NAME, config::APP_VERSION);
}
