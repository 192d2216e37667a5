//! Read-only queries for `ledger list` and `ledger show`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::core::types::{Run, RunMetrics, RunStatus};
use crate::error::{LedgerError, StoreError};
use crate::io::store::RunStore;

/// Compact view of a run for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub goal_description: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub metrics: RunMetrics,
}

impl From<&Run> for RunSummary {
    fn from(run: &Run) -> Self {
        Self {
            run_id: run.run_id.clone(),
            goal_description: run.goal_description.clone(),
            status: run.status,
            started_at: run.started_at,
            metrics: run.metrics.clone(),
        }
    }
}

/// Summaries of every readable run, newest first (ties broken by id).
///
/// Records that fail to load are skipped with a warning so one corrupt file
/// does not hide the rest of the ledger.
pub fn list_summaries<S: RunStore + ?Sized>(store: &S) -> Result<Vec<RunSummary>, LedgerError> {
    let mut summaries = Vec::new();
    for run_id in store.list_runs().map_err(LedgerError::Persistence)? {
        match store.load(&run_id) {
            Ok(run) => summaries.push(RunSummary::from(&run)),
            Err(err @ (StoreError::Backend(_) | StoreError::InvalidRunId { .. })) => {
                warn!(run_id = %run_id, error = %format!("{err:#}"), "skipping unreadable run");
            }
            Err(StoreError::NotFound { .. }) => {}
        }
    }
    summaries.sort_by(|a, b| {
        b.started_at
            .cmp(&a.started_at)
            .then_with(|| a.run_id.cmp(&b.run_id))
    });
    Ok(summaries)
}

/// Full record for one run.
pub fn show_run<S: RunStore + ?Sized>(store: &S, run_id: &str) -> Result<Run, LedgerError> {
    Ok(store.load(run_id)?)
}
