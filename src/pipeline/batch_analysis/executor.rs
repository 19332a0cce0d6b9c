//! Batch Executor: partitions the in-scope dataset and dispatches it.
//!
//! Partitioning walks tiers in priority order, so the admission queue is
//! already priority-sorted: batches never mix tiers, and within a tier they
//! keep encounter order. Dispatch goes through a fixed-capacity semaphore;
//! each admitted batch runs on its own task and holds one permit until its
//! state machine reaches a terminal state.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Semaphore;
use tokio::task::{Id as TaskId, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::classifier::ClassifiedLogs;
use super::dispatch::{dispatch_batch, DispatchPolicy};
use super::traits::AnalysisBackend;
use super::types::{
    AnalysisEvent, Batch, BatchPlan, BatchResult, FailureReason, LogEntry, ProcessingStrategy,
};

/// Deterministic batch id: identical inputs partition into identical ids.
fn batch_id(tier: &str, sequence: usize, entries: &[LogEntry]) -> Uuid {
    let first = entries
        .first()
        .map(|e| e.timestamp.to_rfc3339())
        .unwrap_or_default();
    let key = format!("{tier}/{sequence}/{}/{first}", entries.len());
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
}

/// Split classified entries into batches, tiers in priority order.
///
/// Stratified runs give each tier its own size, bounded by the plan.
pub fn partition_batches(
    classified: ClassifiedLogs,
    plan: &BatchPlan,
    strategy: ProcessingStrategy,
) -> Vec<Batch> {
    let mut batches = Vec::new();

    for bucket in classified.tiers {
        let size = match strategy {
            ProcessingStrategy::Stratified => bucket.batch_size.min(plan.batch_size),
            ProcessingStrategy::Standard | ProcessingStrategy::Parallel => plan.batch_size,
        }
        .max(1);

        let mut remaining = bucket.entries.into_iter().peekable();
        let mut sequence = 0;
        while remaining.peek().is_some() {
            let entries: Vec<LogEntry> = remaining.by_ref().take(size).collect();
            batches.push(Batch {
                id: batch_id(&bucket.name, sequence, &entries),
                tier: bucket.name.clone(),
                priority: bucket.priority,
                sequence,
                entries,
            });
            sequence += 1;
        }

        if sequence > 0 {
            tracing::debug!(tier = %bucket.name, batch_size = size, batches = sequence, "Tier partitioned");
        }
    }

    batches
}

/// Everything the executor produced, in completion order.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub results: Vec<BatchResult>,
    pub cancelled: bool,
}

/// Failed result for a batch whose dispatch task could not be joined.
/// The attempt count died with the task.
fn aborted_result(batch: &Batch, error: &JoinError) -> BatchResult {
    BatchResult::failed(
        batch,
        0,
        FailureReason::Backend,
        format!("dispatch task aborted: {error}"),
    )
}

/// Dispatch `batches` with at most `concurrency` in flight.
///
/// Batches are admitted in the order given. On cancellation no further batch
/// is admitted, in-flight batches finish (without further retries), and the
/// rest are recorded as not dispatched. When `events` is set, one
/// `BatchCompleted` is sent per result as it is recorded.
pub async fn execute_batches(
    backend: Arc<dyn AnalysisBackend>,
    batches: Vec<Batch>,
    concurrency: usize,
    policy: &DispatchPolicy,
    cancel: &CancellationToken,
    events: Option<&UnboundedSender<AnalysisEvent>>,
) -> ExecutionOutcome {
    let total = batches.len();
    let permits = concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(permits));
    let mut queue: VecDeque<Batch> = batches.into();
    let mut in_flight: JoinSet<BatchResult> = JoinSet::new();
    let mut admitted: HashMap<TaskId, Batch> = HashMap::new();
    let mut results: Vec<BatchResult> = Vec::with_capacity(total);
    let mut halted = false;

    tracing::info!(batches = total, concurrency = permits, "Dispatching batches");

    let record = |result: BatchResult, results: &mut Vec<BatchResult>| {
        if let Some(tx) = events {
            // Receiver may be gone; the report is still produced.
            let _ = tx.send(AnalysisEvent::BatchCompleted {
                result: result.clone(),
                completed: results.len() + 1,
                total,
            });
        }
        results.push(result);
    };

    loop {
        if queue.is_empty() && in_flight.is_empty() {
            break;
        }

        tokio::select! {
            biased;

            _ = cancel.cancelled(), if !halted && !queue.is_empty() => {
                halted = true;
                tracing::info!(
                    in_flight = in_flight.len(),
                    not_dispatched = queue.len(),
                    "Run cancelled, no further batches admitted"
                );
                for batch in queue.drain(..) {
                    record(BatchResult::not_dispatched(&batch), &mut results);
                }
            }

            Some(joined) = in_flight.join_next_with_id(), if !in_flight.is_empty() => {
                match joined {
                    Ok((id, result)) => {
                        admitted.remove(&id);
                        record(result, &mut results);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Dispatch task aborted");
                        if let Some(batch) = admitted.remove(&e.id()) {
                            record(aborted_result(&batch, &e), &mut results);
                        }
                    }
                }
            }

            permit = semaphore.clone().acquire_owned(), if !halted && !queue.is_empty() => {
                let Ok(permit) = permit else {
                    tracing::error!("Admission semaphore closed");
                    break;
                };
                let Some(batch) = queue.pop_front() else {
                    continue;
                };
                tracing::debug!(
                    batch_id = %batch.id,
                    tier = %batch.tier,
                    sequence = batch.sequence,
                    entries = batch.len(),
                    "Batch admitted"
                );
                let backend = Arc::clone(&backend);
                let policy = policy.clone();
                let cancel = cancel.clone();
                let tracked = batch.clone();
                let handle = in_flight.spawn(async move {
                    let _permit = permit;
                    dispatch_batch(backend.as_ref(), &batch, &policy, &cancel).await
                });
                admitted.insert(handle.id(), tracked);
            }

            else => break,
        }
    }

    let cancelled = halted || cancel.is_cancelled();
    tracing::info!(
        completed = results.len(),
        failed = results.iter().filter(|r| r.is_failure()).count(),
        cancelled,
        "Dispatch finished"
    );

    ExecutionOutcome { results, cancelled }
}
