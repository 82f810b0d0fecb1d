//! Reconciliation of ledger records with off-chain metadata, and the
//! coordination of overlapping fetch cycles.

pub mod coordinator;
pub mod dedup;
pub mod merge;
pub mod models;
pub mod pipeline;
pub mod retry;
pub mod triggers;

pub use coordinator::FetchCoordinator;
pub use merge::{merge, MetadataView};
pub use models::{CycleOutcome, CycleState, ListingRecord, MarketplaceSnapshot, Trigger};
pub use pipeline::ReconcilePipeline;
pub use retry::{RetryPolicy, RetryStrategy};
pub use triggers::ChainWatcher;
