//! Shared fixtures and scripted backends for the pipeline tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::dispatch::DispatchPolicy;
use super::error::BackendError;
use super::traits::AnalysisBackend;
use super::types::{AnalysisPayload, Batch, BatchRequest, LogEntry, LogLevel};

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 20, 10, 0, 0).unwrap()
}

pub fn entry(level: LogLevel, message: &str) -> LogEntry {
    LogEntry::new(level, message, base_time(), "api")
}

/// `n` distinct entries one second apart: "entry 0", "entry 1", …
pub fn entries(level: LogLevel, n: usize) -> Vec<LogEntry> {
    (0..n)
        .map(|i| {
            LogEntry::new(
                level,
                format!("entry {i}"),
                base_time() + chrono::Duration::seconds(i as i64),
                "api",
            )
        })
        .collect()
}

pub fn batch(tier: &str, priority: u32, sequence: usize, len: usize) -> Batch {
    Batch {
        id: Uuid::new_v5(
            &Uuid::NAMESPACE_OID,
            format!("{tier}/{sequence}").as_bytes(),
        ),
        tier: tier.to_string(),
        priority,
        sequence,
        entries: entries(LogLevel::Info, len),
    }
}

/// Generous timeout, no backoff delay.
pub fn fast_policy(max_retries: u32) -> DispatchPolicy {
    DispatchPolicy {
        timeout: Duration::from_secs(5),
        max_retries,
        backoff: Duration::ZERO,
    }
}

/// Payload echoing which batch produced it.
pub fn echo_payload(batch: &Batch) -> AnalysisPayload {
    AnalysisPayload {
        summary: format!("{}#{}: {} entries", batch.tier, batch.sequence, batch.len()),
        ..Default::default()
    }
}

// ═══════════════════════════════════════════
// Scripted backends
// ═══════════════════════════════════════════

/// Fails the first `failures` attempts of every batch with `error`.
pub struct FlakyBackend {
    failures: u32,
    error: BackendError,
    calls: AtomicUsize,
}

impl FlakyBackend {
    pub fn new(failures: u32, error: BackendError) -> Self {
        Self {
            failures,
            error,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisBackend for FlakyBackend {
    async fn analyze(&self, request: BatchRequest<'_>) -> Result<AnalysisPayload, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.attempt <= self.failures {
            Err(self.error.clone())
        } else {
            Ok(echo_payload(request.batch))
        }
    }
}

/// Sleeps past any short timeout for the first `slow_attempts` attempts.
pub struct SlowBackend {
    delay: Duration,
    slow_attempts: u32,
}

impl SlowBackend {
    pub fn new(delay: Duration, slow_attempts: u32) -> Self {
        Self {
            delay,
            slow_attempts,
        }
    }
}

#[async_trait]
impl AnalysisBackend for SlowBackend {
    async fn analyze(&self, request: BatchRequest<'_>) -> Result<AnalysisPayload, BackendError> {
        if request.attempt <= self.slow_attempts {
            tokio::time::sleep(self.delay).await;
        }
        Ok(echo_payload(request.batch))
    }
}

pub struct PanickingBackend;

#[async_trait]
impl AnalysisBackend for PanickingBackend {
    async fn analyze(&self, _request: BatchRequest<'_>) -> Result<AnalysisPayload, BackendError> {
        panic!("model crashed");
    }
}

/// Permanently fails one (tier, sequence) batch; every other batch succeeds.
pub struct FailOneBackend {
    tier: String,
    sequence: usize,
    error: BackendError,
    calls: AtomicUsize,
}

impl FailOneBackend {
    pub fn new(tier: &str, sequence: usize, error: BackendError) -> Self {
        Self {
            tier: tier.to_string(),
            sequence,
            error,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisBackend for FailOneBackend {
    async fn analyze(&self, request: BatchRequest<'_>) -> Result<AnalysisPayload, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.batch.tier == self.tier && request.batch.sequence == self.sequence {
            Err(self.error.clone())
        } else {
            Ok(echo_payload(request.batch))
        }
    }
}

/// Records call order and the peak number of concurrent calls.
#[derive(Default)]
pub struct RecordingBackend {
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    order: Mutex<Vec<(String, usize)>>,
    /// Cancelled on the first call, when set.
    cancel_on_first_call: Option<CancellationToken>,
}

impl RecordingBackend {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn cancelling(delay: Duration, token: CancellationToken) -> Self {
        Self {
            delay,
            cancel_on_first_call: Some(token),
            ..Default::default()
        }
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// (tier, sequence) of every call, in call order.
    pub fn call_order(&self) -> Vec<(String, usize)> {
        self.order.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisBackend for RecordingBackend {
    async fn analyze(&self, request: BatchRequest<'_>) -> Result<AnalysisPayload, BackendError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.order
            .lock()
            .unwrap()
            .push((request.batch.tier.clone(), request.batch.sequence));
        if let Some(token) = &self.cancel_on_first_call {
            token.cancel();
        }

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(echo_payload(request.batch))
    }
}

