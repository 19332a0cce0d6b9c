//! Sampler: deterministic reduction of an oversized classified dataset.
//!
//! Allocation across tiers, in three passes over the priority order:
//! 1. one guaranteed slot per non-empty tier while capacity remains
//! 2. top-up to the proportional share floor(n_i × capacity / N)
//! 3. rounding leftovers, highest-priority tier first
//!
//! Within a tier the first N entries by encounter order are kept.

use super::classifier::ClassifiedLogs;
use super::config::ProcessingConfig;
use super::types::ProcessingStrategy;

/// Whether the sampler runs for this strategy and post-cap volume.
pub fn should_sample(
    strategy: ProcessingStrategy,
    post_cap_total: usize,
    config: &ProcessingConfig,
) -> bool {
    strategy == ProcessingStrategy::Stratified
        && config.sampling_enabled
        && post_cap_total > config.large_dataset_threshold
}

/// Per-tier slot counts for `sizes` (priority order) under `capacity`.
/// The result never sums above `capacity` and never exceeds a tier's size.
pub fn allocate(sizes: &[usize], capacity: usize) -> Vec<usize> {
    let total: usize = sizes.iter().sum();
    if total <= capacity {
        return sizes.to_vec();
    }

    let mut alloc = vec![0usize; sizes.len()];
    let mut remaining = capacity;

    for (slot, &size) in alloc.iter_mut().zip(sizes) {
        if size > 0 && remaining > 0 {
            *slot = 1;
            remaining -= 1;
        }
    }

    for (slot, &size) in alloc.iter_mut().zip(sizes) {
        // u128 keeps size × capacity from overflowing on huge inputs.
        let share = ((size as u128 * capacity as u128) / total as u128) as usize;
        let extra = share.min(size).saturating_sub(*slot).min(remaining);
        *slot += extra;
        remaining -= extra;
    }

    for (slot, &size) in alloc.iter_mut().zip(sizes) {
        if remaining == 0 {
            break;
        }
        let extra = (size - *slot).min(remaining);
        *slot += extra;
        remaining -= extra;
    }

    alloc
}

/// Truncate each tier to its allocation. Returns the number of entries dropped.
pub fn sample(classified: &mut ClassifiedLogs, max_sample_size: usize) -> usize {
    let sizes: Vec<usize> = classified.tiers.iter().map(|t| t.entries.len()).collect();
    let alloc = allocate(&sizes, max_sample_size);

    let mut dropped = 0;
    for (bucket, keep) in classified.tiers.iter_mut().zip(alloc) {
        let excess = bucket.entries.len() - keep;
        if excess > 0 {
            bucket.entries.truncate(keep);
            bucket.sampled_out += excess;
            dropped += excess;
            tracing::debug!(tier = %bucket.name, kept = keep, dropped = excess, "Tier sampled");
        }
    }

    if dropped > 0 {
        tracing::info!(
            kept = classified.total_in_scope(),
            dropped,
            max_sample_size,
            "Dataset sampled"
        );
    }
    dropped
}
