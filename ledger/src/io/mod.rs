//! I/O helpers for the ledger: durable storage and configuration.

pub mod config;
pub mod store;
