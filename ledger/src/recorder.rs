//! Decide-and-execute protocol: validate, execute, record, then return.
//!
//! Once an executor has been invoked its decision is always recorded, success
//! or failure, and the durable append is the last step before control returns
//! to the caller. Malformed requests are rejected before the executor runs and
//! leave no trace.

use chrono::Utc;
use tracing::{debug, instrument, warn};

use crate::core::choice::{is_valid_choice, node_id_from_intent, option_ids};
use crate::core::types::{Decision, DecisionOption, DecisionType, Outcome, Run};
use crate::error::{LedgerError, StoreError};
use crate::executor::Executor;
use crate::io::store::RunStore;

/// Everything the caller states about a decision before it executes.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRequest {
    pub intent: String,
    pub options: Vec<DecisionOption>,
    pub chosen: String,
    pub reasoning: String,
    /// Logical step label; derived from `intent` when unset.
    pub node_id: Option<String>,
    pub decision_type: DecisionType,
}

impl DecisionRequest {
    pub fn new(
        intent: impl Into<String>,
        options: Vec<DecisionOption>,
        chosen: impl Into<String>,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            intent: intent.into(),
            options,
            chosen: chosen.into(),
            reasoning: reasoning.into(),
            node_id: None,
            decision_type: DecisionType::default(),
        }
    }

    pub fn node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn decision_type(mut self, decision_type: DecisionType) -> Self {
        self.decision_type = decision_type;
        self
    }

    /// Reject a `chosen` that names none of the offered options.
    pub fn check_choice(&self) -> Result<(), LedgerError> {
        if is_valid_choice(&self.options, &self.chosen) {
            return Ok(());
        }
        Err(LedgerError::InvalidChoice {
            chosen: self.chosen.clone(),
            available: option_ids(&self.options),
        })
    }

    fn into_decision(self, decision_id: u64, outcome: Outcome) -> Decision {
        let node_id = self
            .node_id
            .unwrap_or_else(|| node_id_from_intent(&self.intent));
        Decision {
            decision_id,
            node_id,
            decision_type: self.decision_type,
            intent: self.intent,
            options: self.options,
            chosen: self.chosen,
            reasoning: self.reasoning,
            outcome,
            recorded_at: Utc::now(),
        }
    }
}

/// Run `executor` for `request` and durably record the decision in `run`.
///
/// Returns the executor's value, or [`LedgerError::ExecutionFailure`] with the
/// executor's own error once the failure is recorded.
#[instrument(skip_all, fields(run_id = %run.run_id, chosen = %request.chosen))]
pub fn decide_and_execute<S, X>(
    store: &S,
    run: &mut Run,
    request: DecisionRequest,
    executor: X,
) -> Result<X::Output, LedgerError>
where
    S: RunStore + ?Sized,
    X: Executor,
{
    request.check_choice()?;

    match executor.execute() {
        Ok(value) => match serde_json::to_value(&value) {
            Ok(recorded) => {
                record(store, run, request, Outcome::Ok(recorded))?;
                Ok(value)
            }
            Err(err) => {
                // The side effect happened; record it as a failure before surfacing.
                let err = anyhow::Error::new(err).context("serialize executor result");
                let description = format!("result not serializable: {err:#}");
                warn!(error = %description, "executor result not serializable; recording failure");
                record(store, run, request, Outcome::Err(description))?;
                Err(LedgerError::Persistence(StoreError::Backend(err)))
            }
        },
        Err(err) => {
            let description = format!("{err:#}");
            warn!(error = %description, "executor failed; recording failure");
            record(store, run, request, Outcome::Err(description))?;
            Err(LedgerError::ExecutionFailure(err))
        }
    }
}

/// Append a decision and persist the whole run.
///
/// The append is staged on a copy and only committed to `run` once the save
/// succeeds, so memory never holds a decision the store does not.
pub fn record<S>(
    store: &S,
    run: &mut Run,
    request: DecisionRequest,
    outcome: Outcome,
) -> Result<u64, LedgerError>
where
    S: RunStore + ?Sized,
{
    if !run.is_active() {
        return Err(LedgerError::NoActiveRun);
    }
    let decision_id = run.next_decision_id();
    let decision = request.into_decision(decision_id, outcome);
    let node_id = decision.node_id.clone();

    let mut staged = run.clone();
    staged.push_decision(decision);
    store.save(&staged).map_err(LedgerError::Persistence)?;
    *run = staged;

    debug!(decision_id, node_id = %node_id, "decision recorded");
    Ok(decision_id)
}
