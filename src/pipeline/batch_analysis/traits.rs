//! Trait definitions for the batch analysis pipeline.
//!
//! Two traits define the collaborator boundaries:
//! - AnalysisBackend: the external service that analyzes one batch
//! - EntryFilter: the whitelist pre-stage that removes entries from a run

use async_trait::async_trait;

use super::error::BackendError;
use super::types::{AnalysisPayload, BatchRequest, LogEntry};

/// External analysis service (LLM summarizer, inspector, ...).
///
/// Implementations must be safe to call again with the same batch: the
/// executor retries transient failures with an identical payload.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn analyze(&self, request: BatchRequest<'_>) -> Result<AnalysisPayload, BackendError>;
}

/// Pre-classification filter. Excluded entries never enter the run.
pub trait EntryFilter: Send + Sync {
    fn is_excluded(&self, entry: &LogEntry) -> bool;
}

impl<F> EntryFilter for F
where
    F: Fn(&LogEntry) -> bool + Send + Sync,
{
    fn is_excluded(&self, entry: &LogEntry) -> bool {
        self(entry)
    }
}
