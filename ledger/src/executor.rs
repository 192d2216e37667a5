//! Executor abstraction for the unit of work a decision authorizes.
//!
//! The runtime is generic over [`Executor`] and never inspects it: it invokes
//! it once, synchronously, and records what came back. Closures returning
//! `anyhow::Result<T>` are executors, so most callers never name the trait.

use anyhow::Result;
use serde::Serialize;

/// A single no-argument unit of work.
pub trait Executor {
    /// Value handed back to the caller and recorded in the decision outcome.
    type Output: Serialize;

    fn execute(self) -> Result<Self::Output>;
}

impl<F, T> Executor for F
where
    F: FnOnce() -> Result<T>,
    T: Serialize,
{
    type Output = T;

    fn execute(self) -> Result<T> {
        self()
    }
}
