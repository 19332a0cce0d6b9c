//! Result Aggregator: folds batch results into one report.
//!
//! Results arrive in completion order; the report lists them by tier
//! priority, then sequence. No batch is revisited here.

use std::collections::HashMap;

use super::types::{AnalysisReport, BatchOutcome, BatchResult, RunContext};

pub fn aggregate(context: RunContext, mut results: Vec<BatchResult>, cancelled: bool) -> AnalysisReport {
    results.sort_by(|a, b| {
        (a.priority, a.sequence, &a.tier).cmp(&(b.priority, b.sequence, &b.tier))
    });

    let mut tiers = context.tiers;
    let index: HashMap<String, usize> = tiers
        .iter()
        .enumerate()
        .map(|(i, t)| (t.name.clone(), i))
        .collect();

    let mut analyzed_records = 0;
    let mut unfinished = false;
    for result in &results {
        if !matches!(result.outcome, BatchOutcome::NotDispatched) {
            analyzed_records += result.entry_count;
        }
        let Some(&i) = index.get(&result.tier) else {
            tracing::warn!(tier = %result.tier, "Result for unknown tier");
            continue;
        };
        let tier = &mut tiers[i];
        tier.batches += 1;
        match result.outcome {
            BatchOutcome::Succeeded { .. } => tier.succeeded += 1,
            BatchOutcome::Failed { .. } => {
                tier.failed += 1;
                unfinished = true;
            }
            BatchOutcome::NotDispatched => {
                tier.not_dispatched += 1;
                unfinished = true;
            }
        }
    }

    let degraded = unfinished || cancelled;
    if degraded {
        tracing::warn!(
            failed = tiers.iter().map(|t| t.failed).sum::<usize>(),
            not_dispatched = tiers.iter().map(|t| t.not_dispatched).sum::<usize>(),
            cancelled,
            "Analysis report degraded"
        );
    }

    AnalysisReport {
        strategy: context.strategy,
        sampled: context.sampled,
        plan: context.plan,
        total_records: context.total_records,
        filtered_out: context.filtered_out,
        analyzed_records,
        tiers,
        batches: results,
        cancelled,
        degraded,
    }
}
