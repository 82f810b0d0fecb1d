use serde::{Deserialize, Serialize};

use crate::ledger::models::normalize_address;
use crate::serde_util::{loose_u128, loose_u64};

/// Descriptive off-chain row for one invoice submission.
///
/// Written before the mint; `token_id` is attached in a later write once the
/// mint transaction is observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub services: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "loose_u64")]
    pub token_id: Option<u64>,
    #[serde(default)]
    pub business_address: Option<String>,
    #[serde(default, deserialize_with = "loose_u128")]
    pub invoice_value: Option<u128>,
    #[serde(default, deserialize_with = "loose_u128")]
    pub loan_amount: Option<u128>,
    #[serde(default)]
    pub due_date: Option<String>,
}

impl MetadataRecord {
    /// True when this row was written by `business` (address compare is case-insensitive)
    pub fn belongs_to(&self, business: &str) -> bool {
        self.business_address
            .as_deref()
            .map(|addr| normalize_address(addr) == normalize_address(business))
            .unwrap_or(false)
    }

    /// Exact (invoice value, loan amount) match, used to recover rows written
    /// before the mint confirmed
    pub fn matches_amounts(&self, invoice_value: u128, loan_amount: u128) -> bool {
        self.invoice_value == Some(invoice_value) && self.loan_amount == Some(loan_amount)
    }
}
