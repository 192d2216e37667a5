//! Error taxonomy for the ledger runtime and its storage adapters.

use thiserror::Error;

/// Failures reported by a [`RunStore`](crate::io::store::RunStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("run '{run_id}' not found")]
    NotFound { run_id: String },

    #[error("invalid run id '{run_id}': {reason}")]
    InvalidRunId { run_id: String, reason: String },

    /// I/O, serialization or validation failure, with its context chain.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Failures surfaced by the [`Runtime`](crate::runtime::Runtime) façade.
///
/// Contract violations (`RunAlreadyActive`, `NoActiveRun`, `InvalidChoice`)
/// are raised before any side effect. `ExecutionFailure` is raised only after
/// the failed decision has been durably recorded.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("run '{run_id}' is already active; end it before starting another")]
    RunAlreadyActive { run_id: String },

    #[error("no active run")]
    NoActiveRun,

    #[error("chosen option '{chosen}' is not one of [{}]", available.join(", "))]
    InvalidChoice {
        chosen: String,
        available: Vec<String>,
    },

    /// The executor's own error, returned unchanged after recording.
    #[error("executor failed: {0:#}")]
    ExecutionFailure(anyhow::Error),

    #[error("run '{run_id}' not found")]
    RunNotFound { run_id: String },

    #[error("persist ledger record: {0}")]
    Persistence(#[source] StoreError),
}

impl LedgerError {
    /// Borrow the executor's error when this is an [`LedgerError::ExecutionFailure`].
    pub fn execution_error(&self) -> Option<&anyhow::Error> {
        match self {
            LedgerError::ExecutionFailure(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { run_id } => LedgerError::RunNotFound { run_id },
            other => LedgerError::Persistence(other),
        }
    }
}
