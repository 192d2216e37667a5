//! Caller-facing façade: `start_run`, `decide_and_execute`, `end_run`.
//!
//! One `Runtime` is one logical agent session. Mutating calls take `&mut self`,
//! so sharing an instance across threads needs an external lock.

use serde_json::Value;

use crate::core::types::Run;
use crate::error::LedgerError;
use crate::executor::Executor;
use crate::io::config::LedgerConfig;
use crate::io::store::{FileStore, RunStore};
use crate::recorder::{self, DecisionRequest};
use crate::run_manager::RunManager;

/// Ledger runtime over a [`RunStore`].
#[derive(Debug)]
pub struct Runtime<S = FileStore> {
    manager: RunManager<S>,
}

impl Runtime<FileStore> {
    /// Runtime writing to the file store described by `config`.
    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(config.file_store())
    }
}

impl<S: RunStore> Runtime<S> {
    pub fn new(store: S) -> Self {
        Self {
            manager: RunManager::new(store),
        }
    }

    pub fn store(&self) -> &S {
        self.manager.store()
    }

    pub fn active_run(&self) -> Option<&Run> {
        self.manager.active_run()
    }

    pub fn active_run_id(&self) -> Option<&str> {
        self.active_run().map(|run| run.run_id.as_str())
    }

    /// Start a run; fails with [`LedgerError::RunAlreadyActive`] while one is open.
    pub fn start_run(
        &mut self,
        goal_id: &str,
        goal_description: &str,
        input_data: Value,
    ) -> Result<String, LedgerError> {
        self.manager.start_run(goal_id, goal_description, input_data)
    }

    /// Execute the chosen option and record the decision.
    ///
    /// The decision is durable before this returns, whether the executor
    /// succeeded or failed.
    pub fn decide_and_execute<X: Executor>(
        &mut self,
        request: DecisionRequest,
        executor: X,
    ) -> Result<X::Output, LedgerError> {
        let (store, run) = self.manager.active_parts()?;
        recorder::decide_and_execute(store, run, request, executor)
    }

    /// Finalize the active run; a second call fails with [`LedgerError::NoActiveRun`].
    pub fn end_run(
        &mut self,
        success: bool,
        narrative: &str,
        output_data: Value,
    ) -> Result<(), LedgerError> {
        self.manager.end_run(success, narrative, output_data)
    }
}
