use std::collections::HashMap;
use tracing::debug;

use super::dedup::dedup;
use super::models::ListingRecord;
use crate::ledger::models::{normalize_address, LedgerRecord};
use crate::metadata::MetadataRecord;

/// Metadata available to a merge, which also selects the merge mode
#[derive(Debug, Clone)]
pub enum MetadataView {
    /// Metadata-first: the bulk listing answered with rows
    Listing(Vec<MetadataRecord>),
    /// Ledger-first: point lookups by identifier, plus per-business rows for
    /// identifiers whose lookup missed
    Lookups {
        by_token: HashMap<u64, MetadataRecord>,
        by_owner: HashMap<String, Vec<MetadataRecord>>,
    },
}

/// Join ledger records with metadata and deduplicate.
///
/// Output order follows the iteration order of the selected mode and is not
/// otherwise meaningful.
pub fn merge(ledger: &[LedgerRecord], metadata: &MetadataView) -> Vec<ListingRecord> {
    let candidates = match metadata {
        MetadataView::Listing(rows) => metadata_first(ledger, rows),
        MetadataView::Lookups { by_token, by_owner } => ledger_first(ledger, by_token, by_owner),
    };
    let before = candidates.len();
    let listings = dedup(candidates);
    debug!("Merged {} candidates into {} listings", before, listings.len());
    listings
}

/// Rows with a token identifier, joined to their ledger record. Rows whose
/// ledger record is missing are dropped.
fn metadata_first(ledger: &[LedgerRecord], rows: &[MetadataRecord]) -> Vec<ListingRecord> {
    let by_id: HashMap<u64, &LedgerRecord> = ledger.iter().map(|r| (r.id, r)).collect();

    rows.iter()
        .filter_map(|row| {
            let record = by_id.get(&row.token_id?)?;
            Some(ListingRecord::with_metadata((*record).clone(), row))
        })
        .collect()
}

/// Every ledger record, overlaid with its point-lookup row, else the first
/// untokenized row of the same business with identical amounts.
fn ledger_first(
    ledger: &[LedgerRecord],
    by_token: &HashMap<u64, MetadataRecord>,
    by_owner: &HashMap<String, Vec<MetadataRecord>>,
) -> Vec<ListingRecord> {
    ledger
        .iter()
        .map(|record| {
            if let Some(row) = by_token.get(&record.id) {
                return ListingRecord::with_metadata(record.clone(), row);
            }
            match value_match(record, by_owner) {
                Some(row) => ListingRecord::with_metadata(record.clone(), row),
                None => ListingRecord::bare(record.clone()),
            }
        })
        .collect()
}

// First match wins. Two untokenized submissions with identical amounts from
// one business are indistinguishable here.
fn value_match<'a>(
    record: &LedgerRecord,
    by_owner: &'a HashMap<String, Vec<MetadataRecord>>,
) -> Option<&'a MetadataRecord> {
    by_owner
        .get(&normalize_address(record.owning_party()))?
        .iter()
        .find(|row| row.token_id.is_none() && row.matches_amounts(record.invoice_value, record.loan_amount))
}
