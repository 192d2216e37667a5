//! Durable decision ledger for autonomous-agent runs.
//!
//! A run is a goal-directed session recorded as an ordered list of decisions:
//! the options an agent had, the one it chose, why, and what happened when it
//! executed. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (record types, choice checks,
//!   record invariants). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (run storage, configuration).
//!
//! [`runtime::Runtime`] composes the [`run_manager`] (run lifecycle) and the
//! [`recorder`] (decide-and-execute protocol) over a [`io::store::RunStore`].
//! [`query`] backs the read-only `ledger` binary.

pub mod core;
pub mod error;
pub mod executor;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod query;
pub mod recorder;
pub mod run_manager;
pub mod runtime;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use error::{LedgerError, StoreError};
pub use executor::Executor;
pub use recorder::DecisionRequest;
pub use runtime::Runtime;
