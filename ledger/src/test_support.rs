//! Test-only helpers: deterministic records, a temp-dir ledger and a store
//! that fails on demand.

use std::cell::Cell;

use anyhow::{Result, anyhow};
use chrono::Utc;
use serde_json::json;
use tempfile::TempDir;

use crate::core::types::{Decision, DecisionOption, DecisionType, Outcome, Run};
use crate::error::StoreError;
use crate::io::store::{FileStore, MemoryStore, RunStore};
use crate::runtime::Runtime;

/// Options `a` and `b`, in that order.
pub fn two_options() -> Vec<DecisionOption> {
    vec![
        DecisionOption::new("a", "Option A").with_confidence(0.3),
        DecisionOption::new("b", "Option B").with_confidence(0.9),
    ]
}

/// Fresh active run with fixed goal fields.
pub fn active_run(run_id: &str) -> Run {
    Run::new(
        run_id.to_string(),
        "goal-1".to_string(),
        format!("{run_id} goal"),
        json!({}),
        Utc::now(),
    )
}

/// Decision choosing `chosen` out of [`two_options`].
pub fn decision(decision_id: u64, chosen: &str, success: bool) -> Decision {
    let outcome = if success {
        Outcome::Ok(json!({"decision": decision_id}))
    } else {
        Outcome::Err(format!("decision {decision_id} failed"))
    };
    Decision {
        decision_id,
        node_id: format!("node_{decision_id}"),
        decision_type: DecisionType::default(),
        intent: format!("intent {decision_id}"),
        options: two_options(),
        chosen: chosen.to_string(),
        reasoning: "test".to_string(),
        outcome,
        recorded_at: Utc::now(),
    }
}

/// File-backed runtime in a temp directory, removed on drop.
pub struct TestLedger {
    temp: TempDir,
}

impl TestLedger {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp: tempfile::tempdir()?,
        })
    }

    /// Storage root for the ledger.
    pub fn root(&self) -> &std::path::Path {
        self.temp.path()
    }

    pub fn store(&self) -> FileStore {
        FileStore::new(self.root()).with_fsync(false)
    }

    pub fn runtime(&self) -> Runtime<FileStore> {
        Runtime::new(self.store())
    }
}

/// Memory-backed store whose saves start failing after `remaining` successes.
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    remaining: Cell<usize>,
}

impl FailingStore {
    pub fn failing_after(successful_saves: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            remaining: Cell::new(successful_saves),
        }
    }
}

impl RunStore for FailingStore {
    fn load(&self, run_id: &str) -> Result<Run, StoreError> {
        self.inner.load(run_id)
    }

    fn save(&self, run: &Run) -> Result<(), StoreError> {
        let remaining = self.remaining.get();
        if remaining == 0 {
            return Err(StoreError::Backend(anyhow!("disk full")));
        }
        self.remaining.set(remaining - 1);
        self.inner.save(run)
    }

    fn list_runs(&self) -> Result<Vec<String>, StoreError> {
        self.inner.list_runs()
    }
}
