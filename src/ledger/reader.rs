use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::models::{CallOutcome, LedgerRecord};
use super::normalizer::normalize;
use super::traits::LedgerSource;
use crate::error::LedgerError;

/// Batched, failure-isolating reads of invoice records.
///
/// Holds the last identifier count seen by the chain watcher. A cold cache
/// falls back to a direct `nonce()` read.
pub struct LedgerReader {
    source: Arc<dyn LedgerSource>,
    cached_count: RwLock<Option<u64>>,
}

impl LedgerReader {
    pub fn new(source: Arc<dyn LedgerSource>) -> Self {
        Self {
            source,
            cached_count: RwLock::new(None),
        }
    }

    pub fn source(&self) -> &Arc<dyn LedgerSource> {
        &self.source
    }

    /// Re-read the count from the ledger and update the cache
    pub async fn refresh_count(&self) -> Result<u64, LedgerError> {
        let count = self.source.invoice_count().await?;
        let mut cached = self.cached_count.write();
        // the identifier space only grows
        let next = cached.map_or(count, |prev| prev.max(count));
        *cached = Some(next);
        Ok(next)
    }

    pub fn cached_count(&self) -> Option<u64> {
        *self.cached_count.read()
    }

    /// Current identifier count: cached value, else a direct read
    pub async fn known_count(&self) -> Result<u64, LedgerError> {
        match self.cached_count() {
            Some(count) => Ok(count),
            None => {
                debug!("Identifier count cache is cold, reading nonce() directly");
                self.refresh_count().await
            }
        }
    }

    /// Read every identifier `0..count`
    pub async fn read_all(&self) -> Result<Vec<LedgerRecord>, LedgerError> {
        let count = self.known_count().await?;
        let ids: Vec<u64> = (0..count).collect();
        let records = self.read_ids(&ids).await?;
        Ok(records.into_values().collect())
    }

    /// Read the given identifiers. Identifiers at or beyond the known count
    /// are absent from the result; so is any identifier whose details or
    /// owner read failed, or whose tuple did not normalize.
    pub async fn read_records(&self, ids: &[u64]) -> Result<BTreeMap<u64, LedgerRecord>, LedgerError> {
        let count = self.known_count().await?;
        let mut wanted: Vec<u64> = ids.iter().copied().filter(|id| *id < count).collect();
        wanted.sort_unstable();
        wanted.dedup();

        if wanted.len() < ids.len() {
            debug!(
                "Skipping {} identifier(s) at or beyond count {}",
                ids.iter().filter(|id| **id >= count).count(),
                count
            );
        }
        self.read_ids(&wanted).await
    }

    async fn read_ids(&self, ids: &[u64]) -> Result<BTreeMap<u64, LedgerRecord>, LedgerError> {
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }

        let (details, owners) = futures::try_join!(
            self.source.invoice_details(ids),
            self.source.invoice_owners(ids),
        )?;

        let mut records = BTreeMap::new();
        let mut failed = 0usize;
        let mut malformed = 0usize;

        for (i, id) in ids.iter().enumerate() {
            let raw = match details.get(i) {
                Some(CallOutcome::Success(raw)) => raw,
                Some(CallOutcome::Failure(reason)) => {
                    debug!("Ledger read failed for invoice #{}: {}", id, reason);
                    failed += 1;
                    continue;
                }
                None => {
                    failed += 1;
                    continue;
                }
            };

            let owner = match owners.get(i) {
                Some(CallOutcome::Success(owner)) => owner.as_str(),
                Some(CallOutcome::Failure(reason)) => {
                    debug!("Owner read failed for invoice #{}: {}", id, reason);
                    failed += 1;
                    continue;
                }
                None => {
                    failed += 1;
                    continue;
                }
            };

            match normalize(*id, raw, Some(owner)) {
                Some(record) => {
                    records.insert(*id, record);
                }
                None => malformed += 1,
            }
        }

        if failed > 0 || malformed > 0 {
            warn!(
                "Ledger read: {} ok, {} failed, {} malformed out of {}",
                records.len(),
                failed,
                malformed,
                ids.len()
            );
        } else {
            info!("✓ Read {} invoice records from ledger", records.len());
        }

        Ok(records)
    }
}
