use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::reconcile::{CycleOutcome, ListingRecord, Trigger};

// ========== RESPONSE MODELS ==========

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub ledger_configured: bool,
    /// Sequence number of the listing currently served (0 = none yet)
    pub published_seq: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Filtered view of the published listing
#[derive(Debug, Serialize)]
pub struct ListingsResponse {
    pub listings: Vec<ListingRecord>,
    /// Listings before filtering
    pub total: usize,
    pub is_loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub published_seq: u64,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub trigger: Trigger,
    pub outcome: CycleOutcome,
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub status: String,
    pub trigger: Trigger,
}
