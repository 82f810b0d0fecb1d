use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::ledger::models::LedgerRecord;
use crate::metadata::MetadataRecord;

/// Merged marketplace view of one ledger record.
///
/// Descriptive fields stay `None` when no metadata row matched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRecord {
    #[serde(flatten)]
    pub ledger: LedgerRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ListingRecord {
    pub fn bare(ledger: LedgerRecord) -> Self {
        Self {
            ledger,
            invoice_number: None,
            customer_name: None,
            services: None,
            description: None,
        }
    }

    pub fn with_metadata(ledger: LedgerRecord, row: &MetadataRecord) -> Self {
        Self {
            ledger,
            invoice_number: row.invoice_number.clone(),
            customer_name: row.customer_name.clone(),
            services: row.services.clone(),
            description: row.description.clone(),
        }
    }

    pub fn id(&self) -> u64 {
        self.ledger.id
    }
}

/// What started a fetch cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Trigger {
    Startup,
    Manual,
    NewBlock { height: u64 },
    InvoiceCreated,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Startup => write!(f, "startup"),
            Trigger::Manual => write!(f, "manual"),
            Trigger::NewBlock { height } => write!(f, "block {}", height),
            Trigger::InvoiceCreated => write!(f, "invoice created"),
        }
    }
}

/// How a finished fetch cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Published,
    Superseded,
    Failed,
}

/// Terminal result of one cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum CycleOutcome {
    Published { seq: u64, listings: usize },
    Superseded { seq: u64, latest: u64 },
    Failed { seq: u64, message: String },
}

impl CycleOutcome {
    pub fn state(&self) -> CycleState {
        match self {
            CycleOutcome::Published { .. } => CycleState::Published,
            CycleOutcome::Superseded { .. } => CycleState::Superseded,
            CycleOutcome::Failed { .. } => CycleState::Failed,
        }
    }

    pub fn seq(&self) -> u64 {
        match self {
            CycleOutcome::Published { seq, .. }
            | CycleOutcome::Superseded { seq, .. }
            | CycleOutcome::Failed { seq, .. } => *seq,
        }
    }
}

/// What consumers see: the last published listing plus cycle status
#[derive(Debug, Clone)]
pub struct MarketplaceSnapshot {
    pub listings: Arc<Vec<ListingRecord>>,
    /// Message of the most recent failed cycle, cleared on the next publish
    pub error: Option<String>,
    pub is_loading: bool,
    /// Sequence number of the cycle that produced `listings` (0 = never)
    pub published_seq: u64,
    pub published_at: Option<DateTime<Utc>>,
}

impl Default for MarketplaceSnapshot {
    fn default() -> Self {
        Self {
            listings: Arc::new(Vec::new()),
            error: None,
            is_loading: false,
            published_seq: 0,
            published_at: None,
        }
    }
}
