//! Invoice marketplace reconciliation engine.
//!
//! Joins tokenized invoice records read from the ledger with descriptive
//! rows from the off-chain metadata store, deduplicates them, and publishes
//! the result through a coordinator that tolerates overlapping refreshes.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod ledger;
pub mod marketplace;
pub mod metadata;
pub mod reconcile;
pub mod serde_util;
pub mod server;

#[cfg(test)]
mod testing;
