//! Core types for the batch analysis pipeline.
//!
//! These types model the full lifecycle:
//! LogEntry → Tier → Batch → BatchResult → AnalysisReport.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ═══════════════════════════════════════════
// Severity
// ═══════════════════════════════════════════

/// Enumerated record severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }

    /// Case-insensitive parse, accepting the common aliases emitted by
    /// syslog, log4j and friends.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" | "verbose" => Some(Self::Debug),
            "info" | "information" | "notice" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" | "err" => Some(Self::Error),
            "fatal" | "critical" | "crit" | "panic" | "emerg" | "emergency" | "alert" => {
                Some(Self::Fatal)
            }
            _ => None,
        }
    }

    /// Map a syslog severity (RFC 5424: 0 = emergency … 7 = debug).
    pub fn from_syslog(severity: u64) -> Option<Self> {
        match severity {
            0..=2 => Some(Self::Fatal),
            3 => Some(Self::Error),
            4 => Some(Self::Warn),
            5 | 6 => Some(Self::Info),
            7 => Some(Self::Debug),
            _ => None,
        }
    }

    pub fn all() -> &'static [LogLevel] {
        &[
            Self::Trace,
            Self::Debug,
            Self::Info,
            Self::Warn,
            Self::Error,
            Self::Fatal,
        ]
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════
// Input record
// ═══════════════════════════════════════════

/// A single log line or chat message. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Free-form origin tag: service name, file, or chat speaker role.
    pub source: String,
}

impl LogEntry {
    pub fn new(
        level: LogLevel,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp,
            source: source.into(),
        }
    }
}

// ═══════════════════════════════════════════
// Strategy & plan
// ═══════════════════════════════════════════

/// Processing strategy, ordered from least to most aggressive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStrategy {
    Standard,
    Parallel,
    Stratified,
}

impl ProcessingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Parallel => "parallel",
            Self::Stratified => "stratified",
        }
    }
}

impl std::fmt::Display for ProcessingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Batch sizing decided before execution begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPlan {
    pub total_logs: usize,
    pub batch_size: usize,
    pub concurrency: usize,
}

// ═══════════════════════════════════════════
// Batch (unit of dispatch)
// ═══════════════════════════════════════════

/// Non-empty run of entries from a single tier, dispatched exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch {
    pub id: Uuid,
    pub tier: String,
    pub priority: u32,
    /// Position of this batch within its tier, starting at 0.
    pub sequence: usize,
    pub entries: Vec<LogEntry>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What an analysis backend receives for one attempt.
#[derive(Debug, Clone, Copy)]
pub struct BatchRequest<'a> {
    pub batch: &'a Batch,
    /// 1-based attempt number; retries resend the same batch.
    pub attempt: u32,
    pub timeout: Duration,
}

// ═══════════════════════════════════════════
// Batch result (output of the executor)
// ═══════════════════════════════════════════

/// Structured answer from the analysis backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    pub summary: String,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

/// Why a batch ended without a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Single attempt timed out and no retries were allowed.
    Timeout,
    /// Backend returned a non-retryable error.
    Backend,
    /// Every allowed attempt failed with a retryable error.
    RetriesExhausted,
    /// Run was cancelled before a retry could be sent.
    Cancelled,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Backend => "backend",
            Self::RetriesExhausted => "retries_exhausted",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub reason: FailureReason,
    /// Last error seen from the backend.
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    Succeeded { payload: AnalysisPayload },
    Failed { failure: BatchFailure },
    /// Never admitted because the run was cancelled.
    NotDispatched,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub batch_id: Uuid,
    pub tier: String,
    pub priority: u32,
    pub sequence: usize,
    pub entry_count: usize,
    pub attempts: u32,
    pub outcome: BatchOutcome,
}

impl BatchResult {
    pub fn succeeded(batch: &Batch, attempts: u32, payload: AnalysisPayload) -> Self {
        Self::from_batch(batch, attempts, BatchOutcome::Succeeded { payload })
    }

    pub fn failed(batch: &Batch, attempts: u32, reason: FailureReason, message: String) -> Self {
        Self::from_batch(
            batch,
            attempts,
            BatchOutcome::Failed {
                failure: BatchFailure { reason, message },
            },
        )
    }

    pub fn not_dispatched(batch: &Batch) -> Self {
        Self::from_batch(batch, 0, BatchOutcome::NotDispatched)
    }

    fn from_batch(batch: &Batch, attempts: u32, outcome: BatchOutcome) -> Self {
        Self {
            batch_id: batch.id,
            tier: batch.tier.clone(),
            priority: batch.priority,
            sequence: batch.sequence,
            entry_count: batch.len(),
            attempts,
            outcome,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Succeeded { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Failed { .. })
    }

    pub fn payload(&self) -> Option<&AnalysisPayload> {
        match &self.outcome {
            BatchOutcome::Succeeded { payload } => Some(payload),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════
// Report (output of the aggregator)
// ═══════════════════════════════════════════

/// Per-tier accounting, from classification down to dispatch outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSummary {
    pub name: String,
    pub priority: u32,
    /// Entries assigned to this tier before `max_logs` was applied.
    pub classified: usize,
    /// Entries dropped by the tier's `max_logs` cap.
    pub capped: usize,
    /// Entries dropped by the sampler.
    pub sampled_out: usize,
    /// Entries that ended up in a batch.
    pub analyzed: usize,
    pub batches: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub not_dispatched: usize,
}

/// Decisions fixed before dispatch; carried into the report unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    pub strategy: ProcessingStrategy,
    pub sampled: bool,
    pub plan: BatchPlan,
    pub total_records: usize,
    pub filtered_out: usize,
    /// Pre-dispatch tier counts, priority order.
    pub tiers: Vec<TierSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub strategy: ProcessingStrategy,
    /// True when a stratified run actually went through the sampler.
    pub sampled: bool,
    pub plan: BatchPlan,
    /// Records that reached classification.
    pub total_records: usize,
    /// Records removed by the entry filter before classification.
    pub filtered_out: usize,
    /// Records actually sent for analysis (post-cap, post-sampling).
    pub analyzed_records: usize,
    pub tiers: Vec<TierSummary>,
    /// Sorted by tier priority, then by sequence within the tier.
    pub batches: Vec<BatchResult>,
    pub cancelled: bool,
    pub degraded: bool,
}

impl AnalysisReport {
    /// Strategy name as shown to callers; stratified runs that sampled
    /// are reported as "sampled".
    pub fn strategy_label(&self) -> &'static str {
        if self.strategy == ProcessingStrategy::Stratified && self.sampled {
            "sampled"
        } else {
            self.strategy.as_str()
        }
    }

    pub fn tier(&self, name: &str) -> Option<&TierSummary> {
        self.tiers.iter().find(|t| t.name == name)
    }

    pub fn failed_batches(&self) -> impl Iterator<Item = &BatchResult> {
        self.batches.iter().filter(|b| b.is_failure())
    }
}

// ═══════════════════════════════════════════
// Streaming events
// ═══════════════════════════════════════════

/// Progress events emitted by `BatchAnalyzer::execute_streaming`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnalysisEvent {
    Started {
        strategy: ProcessingStrategy,
        sampled: bool,
        plan: BatchPlan,
        batch_count: usize,
    },
    BatchCompleted {
        result: BatchResult,
        completed: usize,
        total: usize,
    },
    Completed {
        degraded: bool,
        cancelled: bool,
    },
}
