//! Deterministic, pure logic shared by the ledger runtime.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! records and return deterministic outputs suitable for tests.

pub mod choice;
pub mod ids;
pub mod invariants;
pub mod types;
