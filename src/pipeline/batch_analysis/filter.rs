//! Whitelist pre-stage: drops known-benign entries before classification.

use serde::{Deserialize, Serialize};

use super::traits::EntryFilter;
use super::types::LogEntry;

/// Excludes entries whose message contains a whitelisted pattern
/// (case-insensitive) or whose source is whitelisted (exact match).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhitelistFilter {
    patterns: Vec<String>,
    sources: Vec<String>,
}

impl WhitelistFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.patterns.extend(
            patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty()),
        );
        self
    }

    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.sources
            .extend(sources.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty() && self.sources.is_empty()
    }
}

impl EntryFilter for WhitelistFilter {
    fn is_excluded(&self, entry: &LogEntry) -> bool {
        if self.sources.iter().any(|s| *s == entry.source) {
            return true;
        }
        if self.patterns.is_empty() {
            return false;
        }
        let message = entry.message.to_lowercase();
        self.patterns.iter().any(|p| message.contains(p.as_str()))
    }
}

/// Split entries into those kept and the number excluded, preserving order.
pub fn apply_filter(entries: Vec<LogEntry>, filter: &dyn EntryFilter) -> (Vec<LogEntry>, usize) {
    let before = entries.len();
    let kept: Vec<LogEntry> = entries
        .into_iter()
        .filter(|e| !filter.is_excluded(e))
        .collect();
    let excluded = before - kept.len();
    if excluded > 0 {
        tracing::debug!(excluded, kept = kept.len(), "Whitelist removed entries");
    }
    (kept, excluded)
}
