use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::serde_util::amount_string;

/// Output names of `idToInvoiceDetails(uint256)`, in ABI order
pub const INVOICE_DETAIL_FIELDS: [&str; 11] = [
    "loanAmount",
    "invoiceValue",
    "unitValue",
    "createdAt",
    "createdBy",
    "campaignDuration",
    "campaignEndTime",
    "maturityDate",
    "tokenSupply",
    "availableSupply",
    "isFulfilled",
];

/// One decoded ABI value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Uint(u128),
    Address(String),
    Bool(bool),
    /// A word that did not fit any expected type (e.g. a uint256 above u128)
    Raw(Vec<u8>),
}

impl AbiValue {
    pub fn as_uint(&self) -> Option<u128> {
        match self {
            AbiValue::Uint(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_uint().and_then(|n| u64::try_from(n).ok())
    }

    pub fn as_address(&self) -> Option<&str> {
        match self {
            AbiValue::Address(addr) => Some(addr.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AbiValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Raw `idToInvoiceDetails` result, in whichever shape the decoder produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInvoiceDetails {
    /// Tuple decoding: values by ABI position
    Positional(Vec<AbiValue>),
    /// Named decoding: values keyed by ABI output name
    Named(BTreeMap<String, AbiValue>),
}

/// Per-identifier result of a batched read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome<T> {
    Success(T),
    Failure(String),
}

impl<T> CallOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, CallOutcome::Success(_))
    }
}

/// Authoritative on-chain state of one tokenized invoice
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    pub id: u64,
    #[serde(with = "amount_string")]
    pub loan_amount: u128,
    #[serde(with = "amount_string")]
    pub invoice_value: u128,
    #[serde(with = "amount_string")]
    pub unit_value: u128,
    pub created_at: u64,
    pub created_by: String,
    pub campaign_duration: u64,
    pub campaign_end_time: u64,
    pub maturity_date: u64,
    #[serde(with = "amount_string")]
    pub token_supply: u128,
    #[serde(with = "amount_string")]
    pub available_supply: u128,
    pub is_fulfilled: bool,
    /// Current holder per `idToOwner`, falls back to `created_by`
    pub owner: String,
}

impl LedgerRecord {
    /// Party used for metadata matching and content signatures
    pub fn owning_party(&self) -> &str {
        &self.owner
    }
}

impl fmt::Display for LedgerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invoice #{} (loan {}, value {}, owner {})",
            self.id, self.loan_amount, self.invoice_value, self.owner
        )
    }
}

/// Lower-cased, 0x-prefixed form used for every address comparison
pub fn normalize_address(address: &str) -> String {
    let trimmed = address.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    format!("0x{}", body.to_ascii_lowercase())
}

pub fn is_zero_address(address: &str) -> bool {
    let normalized = normalize_address(address);
    normalized[2..].chars().all(|c| c == '0')
}
