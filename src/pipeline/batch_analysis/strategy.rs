//! Strategy Selector: picks how aggressively a run is processed.

use super::config::ProcessingConfig;
use super::types::ProcessingStrategy;

/// Select the processing strategy from pre-sampling volume.
/// Thresholds are inclusive; ties go to the more aggressive strategy.
pub fn select_strategy(total_logs: usize, config: &ProcessingConfig) -> ProcessingStrategy {
    if total_logs >= config.large_dataset_threshold {
        ProcessingStrategy::Stratified
    } else if total_logs >= config.parallel_batch_threshold {
        ProcessingStrategy::Parallel
    } else {
        ProcessingStrategy::Standard
    }
}
