//! Per-batch dispatch: one batch, bounded attempts, one `BatchResult`.
//!
//! Each batch walks an explicit state machine:
//!
//! ```text
//! Pending → Dispatched{1} ─┬→ Succeeded
//!                          ├→ Retrying{n} → Dispatched{n+1} → …
//!                          └→ Failed
//! ```
//!
//! Retrying is bounded by `max_retries`; the loop below never recurses.
//! Every failure ends in a `BatchResult`; nothing escapes as an error.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;

use super::config::ProcessingConfig;
use super::error::BackendError;
use super::traits::AnalysisBackend;
use super::types::{AnalysisPayload, Batch, BatchRequest, BatchResult, FailureReason};

/// Timeout and retry knobs for a single batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Bound on one backend call.
    pub timeout: Duration,
    /// Additional attempts after the first retryable failure.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub backoff: Duration,
}

impl DispatchPolicy {
    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self {
            timeout: config.dispatch_timeout(),
            max_retries: config.max_retries,
            backoff: config.retry_backoff(),
        }
    }

    /// Delay before retrying after `attempt` failed.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor)
    }

    /// Total attempts a batch may consume.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

#[derive(Debug)]
enum DispatchState {
    Pending,
    Dispatched {
        attempt: u32,
    },
    Retrying {
        attempt: u32,
        error: BackendError,
    },
    Succeeded {
        attempt: u32,
        payload: AnalysisPayload,
    },
    Failed {
        attempt: u32,
        reason: FailureReason,
        error: String,
    },
}

/// Drive one batch to a terminal state.
///
/// Cancellation is only observed between attempts: an in-flight call is
/// allowed to finish or time out, but no further retry is sent.
pub async fn dispatch_batch(
    backend: &dyn AnalysisBackend,
    batch: &Batch,
    policy: &DispatchPolicy,
    cancel: &CancellationToken,
) -> BatchResult {
    let mut state = DispatchState::Pending;

    loop {
        state = match state {
            DispatchState::Pending => DispatchState::Dispatched { attempt: 1 },

            DispatchState::Dispatched { attempt } => {
                let request = BatchRequest {
                    batch,
                    attempt,
                    timeout: policy.timeout,
                };
                match call_backend(backend, request).await {
                    Ok(payload) => DispatchState::Succeeded { attempt, payload },
                    Err(error) if !error.is_retryable() => DispatchState::Failed {
                        attempt,
                        reason: FailureReason::Backend,
                        error: error.to_string(),
                    },
                    Err(error) if attempt >= policy.max_attempts() => DispatchState::Failed {
                        attempt,
                        reason: exhausted_reason(attempt, &error),
                        error: error.to_string(),
                    },
                    Err(error) => DispatchState::Retrying { attempt, error },
                }
            }

            DispatchState::Retrying { attempt, error } => {
                let delay = policy.backoff_after(attempt);
                tracing::warn!(
                    batch_id = %batch.id,
                    tier = %batch.tier,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Batch dispatch failed, retrying"
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => DispatchState::Failed {
                        attempt,
                        reason: FailureReason::Cancelled,
                        error: error.to_string(),
                    },
                    _ = tokio::time::sleep(delay) => DispatchState::Dispatched { attempt: attempt + 1 },
                }
            }

            DispatchState::Succeeded { attempt, payload } => {
                tracing::debug!(
                    batch_id = %batch.id,
                    tier = %batch.tier,
                    sequence = batch.sequence,
                    attempts = attempt,
                    "Batch analyzed"
                );
                return BatchResult::succeeded(batch, attempt, payload);
            }

            DispatchState::Failed {
                attempt,
                reason,
                error,
            } => {
                tracing::warn!(
                    batch_id = %batch.id,
                    tier = %batch.tier,
                    sequence = batch.sequence,
                    attempts = attempt,
                    reason = %reason,
                    error = %error,
                    "Batch failed permanently"
                );
                return BatchResult::failed(batch, attempt, reason, error);
            }
        };
    }
}

/// A lone timed-out attempt is reported as a timeout; anything that went
/// through at least one retry is reported as exhausted.
fn exhausted_reason(attempt: u32, error: &BackendError) -> FailureReason {
    match (attempt, error) {
        (1, BackendError::Timeout(_)) => FailureReason::Timeout,
        (1, _) => FailureReason::Backend,
        _ => FailureReason::RetriesExhausted,
    }
}

/// One bounded backend call. Timeouts and panics become `BackendError`s.
async fn call_backend(
    backend: &dyn AnalysisBackend,
    request: BatchRequest<'_>,
) -> Result<AnalysisPayload, BackendError> {
    let call = AssertUnwindSafe(backend.analyze(request)).catch_unwind();
    match tokio::time::timeout(request.timeout, call).await {
        Err(_) => Err(BackendError::Timeout(request.timeout)),
        Ok(Err(panic)) => Err(BackendError::Rejected(format!(
            "backend panicked: {}",
            panic_message(panic.as_ref())
        ))),
        Ok(Ok(result)) => result,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::batch_analysis::test_support::{
        batch, fast_policy, FlakyBackend, PanickingBackend, SlowBackend,
    };
    use crate::pipeline::batch_analysis::types::BatchOutcome;

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = DispatchPolicy {
            timeout: Duration::from_secs(1),
            max_retries: 3,
            backoff: Duration::from_millis(100),
        };
        assert_eq!(policy.backoff_after(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_after(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_after(3), Duration::from_millis(400));
        assert_eq!(policy.max_attempts(), 4);
    }

    #[test]
    fn policy_from_config() {
        let policy = DispatchPolicy::from_config(&ProcessingConfig::default());
        assert_eq!(policy.timeout, Duration::from_secs(60));
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.backoff, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn succeeds_on_first_attempt() {
        let backend = FlakyBackend::new(0, BackendError::Http("unused".into()));
        let result = dispatch_batch(
            &backend,
            &batch("critical", 0, 0, 3),
            &fast_policy(2),
            &CancellationToken::new(),
        )
        .await;

        assert!(result.is_success());
        assert_eq!(result.attempts, 1);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn two_timeouts_then_success() {
        let backend = FlakyBackend::new(2, BackendError::Timeout(Duration::from_secs(60)));
        let result = dispatch_batch(
            &backend,
            &batch("critical", 0, 0, 3),
            &fast_policy(2),
            &CancellationToken::new(),
        )
        .await;

        assert!(result.is_success());
        assert_eq!(result.attempts, 3);
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn retries_exhausted() {
        let backend = FlakyBackend::new(u32::MAX, BackendError::Status {
            status: 503,
            body: "overloaded".into(),
        });
        let result = dispatch_batch(
            &backend,
            &batch("warning", 1, 0, 2),
            &fast_policy(2),
            &CancellationToken::new(),
        )
        .await;

        assert!(result.is_failure());
        assert_eq!(result.attempts, 3);
        assert_eq!(backend.calls(), 3);
        match &result.outcome {
            BatchOutcome::Failed { failure } => {
                assert_eq!(failure.reason, FailureReason::RetriesExhausted);
                assert!(failure.message.contains("overloaded"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_retryable_error_fails_after_one_attempt() {
        let backend = FlakyBackend::new(u32::MAX, BackendError::Rejected("too large".into()));
        let result = dispatch_batch(
            &backend,
            &batch("info", 2, 0, 2),
            &fast_policy(2),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result.attempts, 1);
        assert_eq!(backend.calls(), 1);
        assert!(matches!(
            &result.outcome,
            BatchOutcome::Failed { failure }
                if failure.reason == FailureReason::Backend
        ));
    }

    #[tokio::test]
    async fn slow_backend_hits_dispatch_timeout() {
        let backend = SlowBackend::new(Duration::from_millis(500), 1);
        let policy = DispatchPolicy {
            timeout: Duration::from_millis(50),
            max_retries: 0,
            backoff: Duration::ZERO,
        };
        let result = dispatch_batch(
            &backend,
            &batch("critical", 0, 0, 1),
            &policy,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result.attempts, 1);
        assert!(matches!(
            &result.outcome,
            BatchOutcome::Failed { failure }
                if failure.reason == FailureReason::Timeout
        ));
    }

    #[tokio::test]
    async fn slow_first_attempt_recovers_on_retry() {
        let backend = SlowBackend::new(Duration::from_millis(500), 1);
        let policy = DispatchPolicy {
            timeout: Duration::from_millis(50),
            max_retries: 1,
            backoff: Duration::ZERO,
        };
        let result = dispatch_batch(
            &backend,
            &batch("critical", 0, 0, 1),
            &policy,
            &CancellationToken::new(),
        )
        .await;

        assert!(result.is_success());
        assert_eq!(result.attempts, 2);
    }

    #[tokio::test]
    async fn cancellation_stops_further_retries() {
        let backend = FlakyBackend::new(u32::MAX, BackendError::Http("reset".into()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = dispatch_batch(&backend, &batch("critical", 0, 0, 1), &fast_policy(5), &cancel)
            .await;

        // The first attempt was already admitted; no retry follows it.
        assert_eq!(backend.calls(), 1);
        assert_eq!(result.attempts, 1);
        assert!(matches!(
            &result.outcome,
            BatchOutcome::Failed { failure }
                if failure.reason == FailureReason::Cancelled
        ));
    }

    #[tokio::test]
    async fn panicking_backend_is_contained() {
        let result = dispatch_batch(
            &PanickingBackend,
            &batch("critical", 0, 0, 1),
            &fast_policy(2),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(result.attempts, 1);
        match &result.outcome {
            BatchOutcome::Failed { failure } => {
                assert_eq!(failure.reason, FailureReason::Backend);
                assert!(failure.message.contains("backend panicked"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
