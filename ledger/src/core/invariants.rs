//! Semantic invariants of a run record not expressible via JSON Schema.

use crate::core::choice::is_valid_choice;
use crate::core::types::{Run, RunStatus};

/// Check run-record invariants:
/// - Decision ids strictly increasing, starting at 1
/// - Every `chosen` names one of its decision's options
/// - `ended_at` and `narrative` set iff the run is terminal
/// - Metrics counters agree with the decision list
pub fn validate_run_invariants(run: &Run) -> Vec<String> {
    let mut errors = Vec::new();

    let mut previous = 0u64;
    for decision in &run.decisions {
        if decision.decision_id <= previous {
            errors.push(format!(
                "decision {} follows {}: ids must be strictly increasing",
                decision.decision_id, previous
            ));
        }
        previous = decision.decision_id;

        if !is_valid_choice(&decision.options, &decision.chosen) {
            errors.push(format!(
                "decision {}: chosen '{}' is not among its options",
                decision.decision_id, decision.chosen
            ));
        }
    }

    let terminal = run.status != RunStatus::Active;
    if terminal != run.ended_at.is_some() {
        errors.push(format!(
            "status {} inconsistent with ended_at {:?}",
            run.status.as_str(),
            run.ended_at
        ));
    }
    // `output_data` may legitimately be JSON null, so only the narrative is checked.
    if terminal != run.narrative.is_some() {
        errors.push(format!(
            "status {}: narrative must be set only once the run ends",
            run.status.as_str()
        ));
    }
    if run.ended_at.is_some_and(|ended_at| ended_at < run.started_at) {
        errors.push("ended_at precedes started_at".to_string());
    }

    let total = run.decisions.len() as u64;
    let successful = run
        .decisions
        .iter()
        .filter(|decision| decision.outcome.is_ok())
        .count() as u64;
    let metrics = &run.metrics;
    if metrics.total_decisions != total
        || metrics.successful_decisions != successful
        || metrics.failed_decisions != total - successful
    {
        errors.push(format!(
            "metrics ({}/{}/{}) disagree with {} recorded decisions",
            metrics.total_decisions,
            metrics.successful_decisions,
            metrics.failed_decisions,
            total
        ));
    }

    errors
}
