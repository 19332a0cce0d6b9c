//! Processing configuration: sizing, concurrency, sampling, dispatch policy
//! and the tier table.
//!
//! Loaded once per invocation and read-only for the duration of a run.
//! Partial JSON documents fall back to defaults field by field.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{AnalysisError, ConfigError};
use super::types::LogLevel;

// ═══════════════════════════════════════════
// Tier
// ═══════════════════════════════════════════

/// A named priority class with its own matching rules and batch size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    pub name: String,
    /// Lower is more important. Unique across tiers.
    pub priority: u32,
    pub batch_size: usize,
    /// Substrings matched case-insensitively against the message.
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub log_levels: Vec<LogLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_logs: Option<usize>,
}

impl TierConfig {
    pub fn new(name: &str, priority: u32, batch_size: usize) -> Self {
        Self {
            name: name.to_string(),
            priority,
            batch_size,
            keywords: Vec::new(),
            log_levels: Vec::new(),
            max_logs: None,
        }
    }

    pub fn with_levels(mut self, levels: &[LogLevel]) -> Self {
        self.log_levels = levels.to_vec();
        self
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_max_logs(mut self, max_logs: usize) -> Self {
        self.max_logs = Some(max_logs);
        self
    }
}

/// Default tier table: errors first, then warnings, info, and a debug/trace
/// catch-all capped at 1000 entries.
pub fn default_tiers() -> Vec<TierConfig> {
    vec![
        TierConfig::new("critical", 0, 10)
            .with_levels(&[LogLevel::Error, LogLevel::Fatal])
            .with_keywords(&[
                "panic",
                "exception",
                "fatal",
                "traceback",
                "out of memory",
                "segfault",
            ]),
        TierConfig::new("warning", 1, 20)
            .with_levels(&[LogLevel::Warn])
            .with_keywords(&["timeout", "retry", "deprecated", "refused", "slow"]),
        TierConfig::new("info", 2, 40).with_levels(&[LogLevel::Info]),
        TierConfig::new("noise", 3, 80)
            .with_levels(&[LogLevel::Debug, LogLevel::Trace])
            .with_max_logs(1000),
    ]
}

// ═══════════════════════════════════════════
// Processing configuration
// ═══════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub base_batch_size: usize,
    pub min_batch_size: usize,
    pub max_batch_size: usize,
    /// Upper bound on batches in flight at once.
    pub max_concurrency: usize,
    /// Volume at which the parallel strategy kicks in.
    pub parallel_batch_threshold: usize,
    /// Volume at which the stratified strategy kicks in.
    pub large_dataset_threshold: usize,
    pub sampling_enabled: bool,
    pub max_sample_size: usize,
    /// Per-attempt timeout for a backend call.
    pub dispatch_timeout_secs: u64,
    /// Additional attempts after the first one fails with a retryable error.
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each subsequent one.
    pub retry_backoff_ms: u64,
    pub tiers: Vec<TierConfig>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            base_batch_size: 20,
            min_batch_size: 5,
            max_batch_size: 80,
            max_concurrency: 8,
            parallel_batch_threshold: 50,
            large_dataset_threshold: 1000,
            sampling_enabled: true,
            max_sample_size: 500,
            dispatch_timeout_secs: 60,
            max_retries: 2,
            retry_backoff_ms: 250,
            tiers: default_tiers(),
        }
    }
}

impl ProcessingConfig {
    /// Parse a (possibly partial) JSON document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, AnalysisError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a (possibly partial) JSON config file and validate it.
    pub fn from_json_file(path: &Path) -> Result<Self, AnalysisError> {
        let raw = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "Loading processing config");
        Self::from_json_str(&raw)
    }

    /// Apply caller-supplied overrides on top of this config.
    /// The result is not validated; call `validate()` before use.
    pub fn with_overrides(mut self, o: &ProcessingConfigOverride) -> Self {
        if let Some(v) = o.base_batch_size {
            self.base_batch_size = v;
        }
        if let Some(v) = o.min_batch_size {
            self.min_batch_size = v;
        }
        if let Some(v) = o.max_batch_size {
            self.max_batch_size = v;
        }
        if let Some(v) = o.max_concurrency {
            self.max_concurrency = v;
        }
        if let Some(v) = o.parallel_batch_threshold {
            self.parallel_batch_threshold = v;
        }
        if let Some(v) = o.large_dataset_threshold {
            self.large_dataset_threshold = v;
        }
        if let Some(v) = o.sampling_enabled {
            self.sampling_enabled = v;
        }
        if let Some(v) = o.max_sample_size {
            self.max_sample_size = v;
        }
        if let Some(v) = o.dispatch_timeout_secs {
            self.dispatch_timeout_secs = v;
        }
        if let Some(v) = o.max_retries {
            self.max_retries = v;
        }
        if let Some(v) = o.retry_backoff_ms {
            self.retry_backoff_ms = v;
        }
        if let Some(tiers) = &o.tiers {
            self.tiers = tiers.clone();
        }
        self
    }

    /// Check every structural invariant. Called before any processing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_batch_size == 0 {
            return Err(ConfigError::ZeroValue("min_batch_size"));
        }
        if self.min_batch_size > self.base_batch_size || self.base_batch_size > self.max_batch_size {
            return Err(ConfigError::BatchSizeBounds {
                min: self.min_batch_size,
                base: self.base_batch_size,
                max: self.max_batch_size,
            });
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::ZeroValue("max_concurrency"));
        }
        if self.sampling_enabled && self.max_sample_size == 0 {
            return Err(ConfigError::ZeroValue("max_sample_size"));
        }
        if self.dispatch_timeout_secs == 0 {
            return Err(ConfigError::ZeroValue("dispatch_timeout_secs"));
        }
        if self.tiers.is_empty() {
            return Err(ConfigError::MissingCatchAllTier);
        }

        let mut names: HashSet<&str> = HashSet::new();
        let mut priorities: HashMap<u32, &str> = HashMap::new();
        for tier in &self.tiers {
            if !names.insert(tier.name.as_str()) {
                return Err(ConfigError::DuplicateTierName(tier.name.clone()));
            }
            if let Some(first) = priorities.insert(tier.priority, tier.name.as_str()) {
                return Err(ConfigError::DuplicateTierPriority {
                    priority: tier.priority,
                    first: first.to_string(),
                    second: tier.name.clone(),
                });
            }
            if tier.batch_size == 0 {
                return Err(ConfigError::ZeroTierBatchSize(tier.name.clone()));
            }
            if tier.keywords.iter().any(|k| k.trim().is_empty()) {
                return Err(ConfigError::EmptyKeyword(tier.name.clone()));
            }
        }
        Ok(())
    }

    /// Tiers in ascending priority order (most important first).
    pub fn tiers_by_priority(&self) -> Vec<&TierConfig> {
        let mut tiers: Vec<&TierConfig> = self.tiers.iter().collect();
        tiers.sort_by_key(|t| t.priority);
        tiers
    }

    /// The lowest-priority tier, which receives unmatched entries.
    pub fn catch_all_tier(&self) -> Option<&TierConfig> {
        self.tiers.iter().max_by_key(|t| t.priority)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Partial override supplied by the calling layer. `None` keeps the base value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfigOverride {
    pub base_batch_size: Option<usize>,
    pub min_batch_size: Option<usize>,
    pub max_batch_size: Option<usize>,
    pub max_concurrency: Option<usize>,
    pub parallel_batch_threshold: Option<usize>,
    pub large_dataset_threshold: Option<usize>,
    pub sampling_enabled: Option<bool>,
    pub max_sample_size: Option<usize>,
    pub dispatch_timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
    pub tiers: Option<Vec<TierConfig>>,
}
