//! Tier Classifier: assigns every entry to exactly one priority tier.
//!
//! Tiers are checked in ascending priority order. An entry lands in the
//! first tier whose levels contain its level, or whose keywords appear in
//! its message (case-insensitive). Unmatched entries go to the catch-all,
//! the lowest-priority tier. Per-tier `max_logs` keeps the first N entries
//! by encounter order; the rest are counted but not analyzed.

use super::config::{ProcessingConfig, TierConfig};
use super::error::ConfigError;
use super::types::{LogEntry, LogLevel, TierSummary};

/// Entries assigned to one tier, in encounter order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierBucket {
    pub name: String,
    pub priority: u32,
    pub batch_size: usize,
    /// Entries assigned before the cap was applied.
    pub classified: usize,
    /// Entries dropped by `max_logs`.
    pub capped: usize,
    /// Entries dropped later by the sampler.
    pub sampled_out: usize,
    pub entries: Vec<LogEntry>,
}

impl TierBucket {
    fn empty(tier: &TierConfig) -> Self {
        Self {
            name: tier.name.clone(),
            priority: tier.priority,
            batch_size: tier.batch_size,
            classified: 0,
            capped: 0,
            sampled_out: 0,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Counts known before dispatch; batch outcome fields stay zero.
    pub fn summary(&self) -> TierSummary {
        TierSummary {
            name: self.name.clone(),
            priority: self.priority,
            classified: self.classified,
            capped: self.capped,
            sampled_out: self.sampled_out,
            analyzed: self.entries.len(),
            ..Default::default()
        }
    }
}

/// Classifier output: one bucket per configured tier, most important first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedLogs {
    pub tiers: Vec<TierBucket>,
}

impl ClassifiedLogs {
    /// Sum of pre-cap counts; equals the classifier's input length.
    pub fn total_classified(&self) -> usize {
        self.tiers.iter().map(|t| t.classified).sum()
    }

    /// Entries still in scope after caps (and sampling, if it ran).
    pub fn total_in_scope(&self) -> usize {
        self.tiers.iter().map(|t| t.entries.len()).sum()
    }

    pub fn get(&self, name: &str) -> Option<&TierBucket> {
        self.tiers.iter().find(|t| t.name == name)
    }

    pub fn summaries(&self) -> Vec<TierSummary> {
        self.tiers.iter().map(TierBucket::summary).collect()
    }
}

/// Precomputed matching rules for one tier.
struct TierMatcher {
    levels: Vec<LogLevel>,
    keywords: Vec<String>,
    max_logs: Option<usize>,
}

impl TierMatcher {
    fn new(tier: &TierConfig) -> Self {
        Self {
            levels: tier.log_levels.clone(),
            keywords: tier.keywords.iter().map(|k| k.to_lowercase()).collect(),
            max_logs: tier.max_logs,
        }
    }

    fn matches(&self, level: LogLevel, lowered_message: &str) -> bool {
        self.levels.contains(&level)
            || self.keywords.iter().any(|k| lowered_message.contains(k.as_str()))
    }
}

pub struct TierClassifier {
    tiers: Vec<TierConfig>,
    matchers: Vec<TierMatcher>,
}

impl TierClassifier {
    /// Build from a config. Fails only when no catch-all tier exists.
    pub fn new(config: &ProcessingConfig) -> Result<Self, ConfigError> {
        let tiers: Vec<TierConfig> = config.tiers_by_priority().into_iter().cloned().collect();
        if tiers.is_empty() {
            return Err(ConfigError::MissingCatchAllTier);
        }
        let matchers = tiers.iter().map(TierMatcher::new).collect();
        Ok(Self { tiers, matchers })
    }

    /// Index into the priority-ordered tier list for a single entry.
    fn tier_index(&self, entry: &LogEntry) -> usize {
        let lowered = entry.message.to_lowercase();
        self.matchers
            .iter()
            .position(|m| m.matches(entry.level, &lowered))
            .unwrap_or(self.tiers.len() - 1)
    }

    /// Name of the tier an entry would be assigned to.
    pub fn tier_for(&self, entry: &LogEntry) -> &str {
        &self.tiers[self.tier_index(entry)].name
    }

    pub fn classify(&self, entries: Vec<LogEntry>) -> ClassifiedLogs {
        let mut buckets: Vec<TierBucket> = self.tiers.iter().map(TierBucket::empty).collect();

        for entry in entries {
            let idx = self.tier_index(&entry);
            let bucket = &mut buckets[idx];
            bucket.classified += 1;
            match self.matchers[idx].max_logs {
                Some(cap) if bucket.entries.len() >= cap => bucket.capped += 1,
                _ => bucket.entries.push(entry),
            }
        }

        for bucket in &buckets {
            tracing::debug!(
                tier = %bucket.name,
                classified = bucket.classified,
                capped = bucket.capped,
                "Tier classified"
            );
        }

        ClassifiedLogs { tiers: buckets }
    }
}
