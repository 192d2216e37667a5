//! Run lifecycle: id allocation, the single active run, finalization.
//!
//! A "run" is one goal-directed session. The manager owns at most one active
//! run at a time; concurrent runs need separate managers (and separate
//! runtimes). Every lifecycle transition is persisted before it becomes
//! visible in memory.

use anyhow::anyhow;
use chrono::Utc;
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::core::ids::format_run_id;
use crate::core::types::Run;
use crate::error::{LedgerError, StoreError};
use crate::io::store::RunStore;

const RUN_ID_SUFFIX_LEN: usize = 6;
const MAX_ID_ATTEMPTS: u32 = 16;

/// Owns the store and the active-run pointer.
#[derive(Debug)]
pub struct RunManager<S> {
    store: S,
    active: Option<Run>,
}

impl<S: RunStore> RunManager<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            active: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn active_run(&self) -> Option<&Run> {
        self.active.as_ref()
    }

    /// Store plus the active run, borrowed together so a decision can be
    /// appended and persisted in one step.
    pub fn active_parts(&mut self) -> Result<(&S, &mut Run), LedgerError> {
        let run = self.active.as_mut().ok_or(LedgerError::NoActiveRun)?;
        Ok((&self.store, run))
    }

    /// Create, persist and activate a new run.
    #[instrument(skip_all, fields(goal_id = %goal_id))]
    pub fn start_run(
        &mut self,
        goal_id: &str,
        goal_description: &str,
        input_data: Value,
    ) -> Result<String, LedgerError> {
        if let Some(run) = &self.active {
            return Err(LedgerError::RunAlreadyActive {
                run_id: run.run_id.clone(),
            });
        }

        let run_id = allocate_run_id(&self.store)?;
        let run = Run::new(
            run_id.clone(),
            goal_id.to_string(),
            goal_description.to_string(),
            input_data,
            Utc::now(),
        );
        self.store.save(&run).map_err(LedgerError::Persistence)?;
        self.active = Some(run);

        info!(run_id = %run_id, "run started");
        Ok(run_id)
    }

    /// Finalize the active run and clear the pointer.
    ///
    /// The run stays active if the final save fails, so the caller may retry.
    #[instrument(skip_all, fields(success = success))]
    pub fn end_run(
        &mut self,
        success: bool,
        narrative: &str,
        output_data: Value,
    ) -> Result<(), LedgerError> {
        let active = self.active.as_ref().ok_or(LedgerError::NoActiveRun)?;

        let mut finished = active.clone();
        finished.finalize(success, narrative.to_string(), output_data, Utc::now());
        self.store
            .save(&finished)
            .map_err(LedgerError::Persistence)?;

        info!(
            run_id = %finished.run_id,
            status = finished.status.as_str(),
            decisions = finished.decisions.len(),
            "run ended"
        );
        self.active = None;
        Ok(())
    }
}

/// Pick a time-ordered id the store has not seen yet.
fn allocate_run_id<S: RunStore>(store: &S) -> Result<String, LedgerError> {
    for _ in 0..MAX_ID_ATTEMPTS {
        let candidate = format_run_id(Utc::now(), &short_suffix());
        if !store.exists(&candidate).map_err(LedgerError::Persistence)? {
            return Ok(candidate);
        }
        debug!(run_id = %candidate, "run id already taken");
    }
    Err(LedgerError::Persistence(StoreError::Backend(anyhow!(
        "unable to allocate a unique run id after {MAX_ID_ATTEMPTS} attempts"
    ))))
}

fn short_suffix() -> String {
    let mut rng = rand::thread_rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(RUN_ID_SUFFIX_LEN)
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::validate_run_id;
    use crate::core::types::RunStatus;
    use crate::io::store::MemoryStore;
    use crate::test_support::FailingStore;
    use serde_json::json;

    #[test]
    fn start_persists_active_run() {
        let mut manager = RunManager::new(MemoryStore::new());
        let run_id = manager
            .start_run("g1", "desc", json!({"target": "prod"}))
            .expect("start");

        validate_run_id(&run_id).expect("valid id");
        assert!(run_id.starts_with("run_"));
        let stored = manager.store().load(&run_id).expect("load");
        assert_eq!(stored.status, RunStatus::Active);
        assert_eq!(stored.input_data, json!({"target": "prod"}));
        assert!(stored.decisions.is_empty());
        assert_eq!(manager.active_run(), Some(&stored));
    }

    #[test]
    fn second_start_is_rejected() {
        let mut manager = RunManager::new(MemoryStore::new());
        let first = manager.start_run("g1", "desc", json!({})).expect("start");

        let err = manager
            .start_run("g2", "other", json!({}))
            .expect_err("already active");
        assert!(matches!(err, LedgerError::RunAlreadyActive { run_id } if run_id == first));
        assert_eq!(manager.store().list_runs().expect("list"), vec![first]);
    }

    #[test]
    fn end_without_run_is_rejected() {
        let mut manager = RunManager::new(MemoryStore::new());
        let err = manager.end_run(true, "done", json!({})).expect_err("no run");
        assert!(matches!(err, LedgerError::NoActiveRun));
    }

    #[test]
    fn end_finalizes_once() {
        let mut manager = RunManager::new(MemoryStore::new());
        let run_id = manager.start_run("g1", "desc", json!({})).expect("start");

        manager.end_run(false, "first", json!({"k": 1})).expect("end");
        let err = manager
            .end_run(true, "second", json!({"k": 2}))
            .expect_err("double end");
        assert!(matches!(err, LedgerError::NoActiveRun));

        let stored = manager.store().load(&run_id).expect("load");
        assert_eq!(stored.status, RunStatus::Failed);
        assert_eq!(stored.narrative.as_deref(), Some("first"));
        assert_eq!(stored.output_data, Some(json!({"k": 1})));
        assert!(stored.ended_at.is_some());
        assert!(stored.metrics.duration_ms.is_some());
        assert!(manager.active_run().is_none());
    }

    #[test]
    fn failed_initial_save_leaves_no_active_run() {
        let mut manager = RunManager::new(FailingStore::failing_after(0));
        let err = manager.start_run("g1", "desc", json!({})).expect_err("save fails");
        assert!(matches!(err, LedgerError::Persistence(_)));
        assert!(manager.active_run().is_none());
    }

    #[test]
    fn failed_final_save_keeps_run_active() {
        let mut manager = RunManager::new(FailingStore::failing_after(1));
        manager.start_run("g1", "desc", json!({})).expect("start");

        let err = manager.end_run(true, "done", json!({})).expect_err("save fails");
        assert!(matches!(err, LedgerError::Persistence(_)));
        let active = manager.active_run().expect("still active");
        assert_eq!(active.status, RunStatus::Active);
    }

    #[test]
    fn suffix_is_lowercase_alphanumeric() {
        let suffix = short_suffix();
        assert_eq!(suffix.len(), RUN_ID_SUFFIX_LEN);
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        );
    }
}
