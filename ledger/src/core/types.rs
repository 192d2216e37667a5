//! Ledger record types shared by the runtime, the stores and the inspector.
//!
//! These types are the persisted contract: field names are serialized as-is,
//! so renaming a field is a format change for every existing storage root.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Active,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Active => "active",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }
}

/// Caller-defined tag describing what kind of choice a decision was.
///
/// The ledger stores the tag and never branches on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    #[default]
    ToolSelection,
    ParameterChoice,
    PathChoice,
    OutputFormat,
    RetryStrategy,
    Recovery,
    Delegation,
    Custom,
}

/// One candidate offered at a decision point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionOption {
    pub id: String,
    #[serde(default)]
    pub description: String,
    /// Stored exactly as supplied; values outside `[0, 1]` are kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl DecisionOption {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Recorded result of executing a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "OutcomeRecord", try_from = "OutcomeRecord")]
pub enum Outcome {
    /// Executor returned; holds its serialized return value.
    Ok(Value),
    /// Executor failed; holds the rendered error chain.
    Err(String),
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }
}

/// On-disk shape of [`Outcome`]: `{ "success", "result", "error" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OutcomeRecord {
    success: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl From<Outcome> for OutcomeRecord {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Ok(value) => Self {
                success: true,
                result: Some(value),
                error: None,
            },
            Outcome::Err(error) => Self {
                success: false,
                result: None,
                error: Some(error),
            },
        }
    }
}

impl TryFrom<OutcomeRecord> for Outcome {
    type Error = String;

    fn try_from(record: OutcomeRecord) -> Result<Self, Self::Error> {
        if record.success {
            if record.error.is_some() {
                return Err("successful outcome must not carry an error".to_string());
            }
            // `Some(Value::Null)` and a missing `result` both mean a unit return.
            return Ok(Outcome::Ok(record.result.unwrap_or(Value::Null)));
        }
        match record.error {
            Some(error) => Ok(Outcome::Err(error)),
            None => Err("failed outcome must carry an error".to_string()),
        }
    }
}

/// One recorded choice-and-execution event within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// 1-indexed, strictly increasing within the run.
    pub decision_id: u64,
    pub node_id: String,
    pub decision_type: DecisionType,
    pub intent: String,
    pub options: Vec<DecisionOption>,
    pub chosen: String,
    pub reasoning: String,
    pub outcome: Outcome,
    pub recorded_at: DateTime<Utc>,
}

/// Aggregate counters kept alongside the decision list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub total_decisions: u64,
    pub successful_decisions: u64,
    pub failed_decisions: u64,
    /// Wall-clock duration; unset until the run ends.
    pub duration_ms: Option<u64>,
}

/// One end-to-end goal-directed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    pub goal_id: String,
    pub goal_description: String,
    pub input_data: Value,
    pub status: RunStatus,
    pub decisions: Vec<Decision>,
    pub narrative: Option<String>,
    pub output_data: Option<Value>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metrics: RunMetrics,
}

impl Run {
    /// Fresh active run with no decisions.
    pub fn new(
        run_id: String,
        goal_id: String,
        goal_description: String,
        input_data: Value,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id,
            goal_id,
            goal_description,
            input_data,
            status: RunStatus::Active,
            decisions: Vec::new(),
            narrative: None,
            output_data: None,
            started_at,
            ended_at: None,
            metrics: RunMetrics::default(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == RunStatus::Active
    }

    /// Id the next appended decision must carry.
    pub fn next_decision_id(&self) -> u64 {
        self.decisions
            .last()
            .map(|decision| decision.decision_id + 1)
            .unwrap_or(1)
    }

    /// Append a decision and bump the counters. Callers assign the id via
    /// [`Run::next_decision_id`].
    pub fn push_decision(&mut self, decision: Decision) {
        self.metrics.total_decisions += 1;
        if decision.outcome.is_ok() {
            self.metrics.successful_decisions += 1;
        } else {
            self.metrics.failed_decisions += 1;
        }
        self.decisions.push(decision);
    }

    /// Apply the single terminal transition.
    pub fn finalize(
        &mut self,
        success: bool,
        narrative: String,
        output_data: Value,
        ended_at: DateTime<Utc>,
    ) {
        self.status = if success {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };
        self.narrative = Some(narrative);
        self.output_data = Some(output_data);
        // Wall clocks can step backwards between start and end.
        let ended_at = ended_at.max(self.started_at);
        self.ended_at = Some(ended_at);
        let elapsed = ended_at.signed_duration_since(self.started_at);
        self.metrics.duration_ms = Some(u64::try_from(elapsed.num_milliseconds()).unwrap_or(0));
    }
}
