//! Batch Planner: batch size and concurrency as a pure function of volume.

use super::config::ProcessingConfig;
use super::types::BatchPlan;

/// Volume at or below which the minimum batch size is used.
const SMALL_VOLUME: usize = 20;
const MEDIUM_VOLUME: usize = 100;
const LARGE_VOLUME: usize = 500;
const VERY_LARGE_VOLUME: usize = 1000;

/// Batch size for a given volume, clamped into the configured bounds.
pub fn batch_size_for(total_logs: usize, config: &ProcessingConfig) -> usize {
    let size = match total_logs {
        0..=SMALL_VOLUME => config.min_batch_size,
        n if n <= MEDIUM_VOLUME => config.base_batch_size,
        n if n <= LARGE_VOLUME => config
            .base_batch_size
            .saturating_add(config.base_batch_size / 2),
        n if n <= VERY_LARGE_VOLUME => config.base_batch_size.saturating_mul(2),
        _ => config.max_batch_size,
    };
    size.clamp(config.min_batch_size, config.max_batch_size.max(config.min_batch_size))
}

/// Compute the plan for `total_logs` records.
///
/// `concurrency` is `ceil(total / batch_size)` bounded by `max_concurrency`,
/// and 0 only for an empty run.
pub fn plan_batches(total_logs: usize, config: &ProcessingConfig) -> BatchPlan {
    let batch_size = batch_size_for(total_logs, config);
    let concurrency = total_logs
        .div_ceil(batch_size.max(1))
        .min(config.max_concurrency);

    tracing::debug!(total_logs, batch_size, concurrency, "Batch plan computed");

    BatchPlan {
        total_logs,
        batch_size,
        concurrency,
    }
}
