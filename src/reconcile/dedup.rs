//! Three-pass deduplication of merge candidates.
//!
//! 1. content signature, first occurrence wins
//! 2. normalized invoice number, smallest ledger identifier wins
//! 3. ledger identifier, first occurrence wins
//!
//! Every pass keeps the relative order of the survivors.

use std::collections::{HashMap, HashSet};

use super::models::ListingRecord;

/// (invoice number or "", owning party, loan amount, invoice value, maturity date)
pub type ContentSignature = (String, String, u128, u128, u64);

pub fn content_signature(candidate: &ListingRecord) -> ContentSignature {
    (
        candidate.invoice_number.clone().unwrap_or_default(),
        candidate.ledger.owning_party().to_string(),
        candidate.ledger.loan_amount,
        candidate.ledger.invoice_value,
        candidate.ledger.maturity_date,
    )
}

/// Trimmed, case-folded invoice number; `None` when blank
pub fn normalize_invoice_number(number: &str) -> Option<String> {
    let trimmed = number.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

fn group_key(candidate: &ListingRecord) -> Option<String> {
    candidate.invoice_number.as_deref().and_then(normalize_invoice_number)
}

fn by_signature(candidates: Vec<ListingRecord>) -> Vec<ListingRecord> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(content_signature(c)))
        .collect()
}

fn by_invoice_number(candidates: Vec<ListingRecord>) -> Vec<ListingRecord> {
    let mut canonical: HashMap<String, u64> = HashMap::new();
    for candidate in &candidates {
        if let Some(key) = group_key(candidate) {
            canonical
                .entry(key)
                .and_modify(|id| *id = (*id).min(candidate.id()))
                .or_insert(candidate.id());
        }
    }

    let mut emitted = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| match group_key(c) {
            None => true,
            Some(key) => canonical.get(&key) == Some(&c.id()) && emitted.insert(key),
        })
        .collect()
}

fn by_identifier(candidates: Vec<ListingRecord>) -> Vec<ListingRecord> {
    let mut seen = HashSet::new();
    candidates.into_iter().filter(|c| seen.insert(c.id())).collect()
}

pub fn dedup(candidates: Vec<ListingRecord>) -> Vec<ListingRecord> {
    by_identifier(by_invoice_number(by_signature(candidates)))
}
