//! BatchAnalyzer: orchestrates the full analysis pipeline.
//!
//! Connects the stages: Filter → Classifier → Strategy → Sampler → Planner →
//! Executor → Aggregator. `prepare` runs everything up to dispatch and
//! returns an inspectable plan; `execute` dispatches it.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use super::aggregator::aggregate;
use super::classifier::TierClassifier;
use super::config::ProcessingConfig;
use super::dispatch::DispatchPolicy;
use super::error::ConfigError;
use super::executor::{execute_batches, partition_batches};
use super::filter::apply_filter;
use super::planner::plan_batches;
use super::sampler::{sample, should_sample};
use super::strategy::select_strategy;
use super::traits::{AnalysisBackend, EntryFilter};
use super::types::*;

/// Everything decided before the first backend call.
#[derive(Debug, Clone)]
pub struct AnalysisPlan {
    pub context: RunContext,
    /// Priority order; this is the admission order.
    pub batches: Vec<Batch>,
}

impl AnalysisPlan {
    pub fn strategy(&self) -> ProcessingStrategy {
        self.context.strategy
    }

    pub fn batch_plan(&self) -> BatchPlan {
        self.context.plan
    }

    pub fn sampled(&self) -> bool {
        self.context.sampled
    }

    /// Entries that will be sent to the backend.
    pub fn entry_count(&self) -> usize {
        self.batches.iter().map(Batch::len).sum()
    }
}

/// Runs the analysis pipeline against one backend.
pub struct BatchAnalyzer {
    config: ProcessingConfig,
    classifier: TierClassifier,
    policy: DispatchPolicy,
    backend: Arc<dyn AnalysisBackend>,
    filter: Option<Box<dyn EntryFilter>>,
}

impl BatchAnalyzer {
    /// Validates the configuration; nothing is processed on error.
    pub fn new(
        config: ProcessingConfig,
        backend: Arc<dyn AnalysisBackend>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let classifier = TierClassifier::new(&config)?;
        let policy = DispatchPolicy::from_config(&config);
        Ok(Self {
            config,
            classifier,
            policy,
            backend,
            filter: None,
        })
    }

    /// Exclude entries before classification.
    pub fn with_filter(mut self, filter: Box<dyn EntryFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Classify, select, sample, plan and partition. No backend calls.
    pub fn prepare(&self, entries: Vec<LogEntry>) -> AnalysisPlan {
        // Step 1: Whitelist pre-stage
        let (entries, filtered_out) = match &self.filter {
            Some(filter) => apply_filter(entries, filter.as_ref()),
            None => (entries, 0),
        };
        let total_records = entries.len();

        // Step 2: Strategy from pre-sampling volume
        let strategy = select_strategy(total_records, &self.config);

        // Step 3: Classify (tier caps applied here)
        let mut classified = self.classifier.classify(entries);

        // Step 4: Sample oversized stratified runs
        let sampled = should_sample(strategy, classified.total_in_scope(), &self.config)
            && sample(&mut classified, self.config.max_sample_size) > 0;

        // Step 5: Plan and partition
        let plan = plan_batches(total_records, &self.config);
        let tiers = classified.summaries();
        let batches = partition_batches(classified, &plan, strategy);

        tracing::info!(
            total_records,
            filtered_out,
            strategy = strategy.as_str(),
            sampled,
            batch_size = plan.batch_size,
            concurrency = plan.concurrency,
            batches = batches.len(),
            "Analysis planned"
        );

        AnalysisPlan {
            context: RunContext {
                strategy,
                sampled,
                plan,
                total_records,
                filtered_out,
                tiers,
            },
            batches,
        }
    }

    /// Dispatch a prepared plan and aggregate the results.
    pub async fn execute(&self, plan: AnalysisPlan, cancel: &CancellationToken) -> AnalysisReport {
        self.dispatch(plan, cancel, None).await
    }

    /// Like `execute`, also sending `Started`, one `BatchCompleted` per batch
    /// in completion order, and `Completed`.
    pub async fn execute_streaming(
        &self,
        plan: AnalysisPlan,
        cancel: &CancellationToken,
        events: UnboundedSender<AnalysisEvent>,
    ) -> AnalysisReport {
        let _ = events.send(AnalysisEvent::Started {
            strategy: plan.context.strategy,
            sampled: plan.context.sampled,
            plan: plan.context.plan,
            batch_count: plan.batches.len(),
        });

        let report = self.dispatch(plan, cancel, Some(&events)).await;

        let _ = events.send(AnalysisEvent::Completed {
            degraded: report.degraded,
            cancelled: report.cancelled,
        });
        report
    }

    /// `prepare` followed by `execute`.
    pub async fn run(&self, entries: Vec<LogEntry>, cancel: &CancellationToken) -> AnalysisReport {
        let plan = self.prepare(entries);
        self.execute(plan, cancel).await
    }

    async fn dispatch(
        &self,
        plan: AnalysisPlan,
        cancel: &CancellationToken,
        events: Option<&UnboundedSender<AnalysisEvent>>,
    ) -> AnalysisReport {
        let AnalysisPlan { context, batches } = plan;
        let outcome = execute_batches(
            Arc::clone(&self.backend),
            batches,
            context.plan.concurrency,
            &self.policy,
            cancel,
            events,
        )
        .await;

        let report = aggregate(context, outcome.results, outcome.cancelled);
        tracing::info!(
            strategy = report.strategy_label(),
            batches = report.batches.len(),
            analyzed = report.analyzed_records,
            degraded = report.degraded,
            cancelled = report.cancelled,
            "Analysis complete"
        );
        report
    }
}
