use std::path::PathBuf;

use crate::pipeline::batch_analysis::{AnalysisError, ProcessingConfig};

/// Application-level constants
pub const APP_NAME: &str = "logtriage";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable naming a JSON processing config file.
pub const CONFIG_PATH_ENV: &str = "LOGTRIAGE_CONFIG";

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "logtriage=info,warn"
}

/// Config file path from the environment, if set and non-empty.
pub fn config_path_from_env() -> Option<PathBuf> {
    std::env::var_os(CONFIG_PATH_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Load the processing config named by `LOGTRIAGE_CONFIG`, or the defaults.
pub fn load_processing_config() -> Result<ProcessingConfig, AnalysisError> {
    match config_path_from_env() {
        Some(path) => ProcessingConfig::from_json_file(&path),
        None => Ok(ProcessingConfig::default()),
    }
}
