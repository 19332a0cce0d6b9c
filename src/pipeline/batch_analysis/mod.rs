//! Adaptive Batch Analysis Pipeline
//!
//! Takes an arbitrarily large, unordered collection of log lines or chat
//! messages, classifies it into priority tiers, decides how aggressively to
//! process it, partitions it into bounded batches, dispatches those batches
//! to an analysis backend under a concurrency limit, and folds the results
//! into one report.
//!
//! ## Architecture
//!
//! ```text
//! Normalizer → Filter → Classifier → Strategy → Sampler → Planner
//!                                                            ↓
//!                          Report ← Aggregator ← Executor (semaphore + retries)
//! ```
//!
//! ## Design Principles
//! - Configuration is passed into every invocation; no process-wide state
//! - Deterministic up to the backend: same input, same batches, same report
//! - Fail-soft: a failed batch degrades the report, never aborts the run
//! - Only configuration errors are returned as `Err`

pub mod error;
pub mod types;
pub mod traits;
pub mod config;
pub mod normalize;
pub mod filter;
pub mod classifier;
pub mod sampler;
pub mod planner;
pub mod strategy;
pub mod dispatch;
pub mod executor;
pub mod aggregator;
pub mod runner;
pub mod ollama;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{AnalysisError, BackendError, ConfigError, NormalizeError};
pub use types::*;
pub use traits::*;
pub use config::{default_tiers, ProcessingConfig, ProcessingConfigOverride, TierConfig};
pub use normalize::{normalize_record, normalize_records, NormalizedRecords, RejectedRecord};
pub use filter::{apply_filter, WhitelistFilter};
pub use classifier::{ClassifiedLogs, TierBucket, TierClassifier};
pub use sampler::sample;
pub use planner::plan_batches;
pub use strategy::select_strategy;
pub use dispatch::{dispatch_batch, DispatchPolicy};
pub use executor::{execute_batches, partition_batches, ExecutionOutcome};
pub use aggregator::aggregate;
pub use runner::{AnalysisPlan, BatchAnalyzer};
pub use ollama::OllamaBackend;
