use futures::future::join_all;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::merge::{merge, MetadataView};
use super::models::ListingRecord;
use super::retry::RetryPolicy;
use crate::error::{AppResult, LedgerError};
use crate::ledger::models::{normalize_address, LedgerRecord};
use crate::ledger::LedgerReader;
use crate::metadata::{MetadataRecord, MetadataSource};

/// One reconciliation pass: metadata listing, ledger reads, merge.
///
/// Holds no mutable state; concurrent runs are independent.
pub struct ReconcilePipeline {
    ledger: Option<Arc<LedgerReader>>,
    metadata: Arc<dyn MetadataSource>,
    retry: RetryPolicy,
}

impl ReconcilePipeline {
    pub fn new(
        ledger: Option<Arc<LedgerReader>>,
        metadata: Arc<dyn MetadataSource>,
        retry: RetryPolicy,
    ) -> Self {
        Self { ledger, metadata, retry }
    }

    pub fn ledger(&self) -> Option<&Arc<LedgerReader>> {
        self.ledger.as_ref()
    }

    pub async fn run(&self) -> AppResult<Vec<ListingRecord>> {
        let ledger = self.ledger.as_ref().ok_or(LedgerError::NotConfigured)?;

        let listing = self
            .retry
            .run("metadata listing", || self.metadata.list_invoices())
            .await;

        match listing {
            Ok(rows) if !rows.is_empty() => self.metadata_first(ledger, rows).await,
            Ok(_) => {
                info!("Metadata listing is empty, enriching from the ledger");
                self.ledger_first(ledger).await
            }
            Err(e) => {
                warn!("⚠️  Metadata listing unavailable ({}), enriching from the ledger", e);
                self.ledger_first(ledger).await
            }
        }
    }

    async fn metadata_first(
        &self,
        ledger: &LedgerReader,
        rows: Vec<MetadataRecord>,
    ) -> AppResult<Vec<ListingRecord>> {
        let ids: Vec<u64> = rows
            .iter()
            .filter_map(|row| row.token_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        debug!("Metadata-first: {} rows, {} distinct token ids", rows.len(), ids.len());

        let records = self
            .retry
            .run("ledger batch read", || ledger.read_records(&ids))
            .await?;
        let records: Vec<LedgerRecord> = records.into_values().collect();

        Ok(merge(&records, &MetadataView::Listing(rows)))
    }

    async fn ledger_first(&self, ledger: &LedgerReader) -> AppResult<Vec<ListingRecord>> {
        let records = self
            .retry
            .run("ledger batch read", || ledger.read_all())
            .await?;

        let by_token = self.point_lookups(&records).await;

        let owners: BTreeSet<String> = records
            .iter()
            .filter(|r| !by_token.contains_key(&r.id))
            .map(|r| normalize_address(r.owning_party()))
            .collect();
        let by_owner = self.business_rows(owners).await;

        debug!(
            "Ledger-first: {} records, {} point hits, {} businesses scanned",
            records.len(),
            by_token.len(),
            by_owner.len()
        );
        Ok(merge(&records, &MetadataView::Lookups { by_token, by_owner }))
    }

    // A failed lookup counts as a miss.
    async fn point_lookups(&self, records: &[LedgerRecord]) -> HashMap<u64, MetadataRecord> {
        let lookups = records.iter().map(|record| async move {
            match self.metadata.get_by_token(record.id).await {
                Ok(row) => row.map(|row| (record.id, row)),
                Err(e) => {
                    debug!("Metadata lookup for invoice #{} failed: {}", record.id, e);
                    None
                }
            }
        });
        join_all(lookups).await.into_iter().flatten().collect()
    }

    async fn business_rows(&self, owners: BTreeSet<String>) -> HashMap<String, Vec<MetadataRecord>> {
        let lookups = owners.into_iter().map(|owner| async move {
            match self.metadata.list_by_business(&owner).await {
                Ok(rows) => Some((owner, rows)),
                Err(e) => {
                    debug!("Business listing for {} failed: {}", owner, e);
                    None
                }
            }
        });
        join_all(lookups).await.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::testing::{metadata, InMemoryLedger, InMemoryMetadata};
    use std::time::Duration;

    fn pipeline(ledger: Arc<InMemoryLedger>, metadata: Arc<InMemoryMetadata>) -> ReconcilePipeline {
        ReconcilePipeline::new(
            Some(Arc::new(LedgerReader::new(ledger))),
            metadata,
            RetryPolicy::exponential(3, Duration::from_millis(1)),
        )
    }

    #[tokio::test]
    async fn test_metadata_first_joins_by_token() {
        let ledger = Arc::new(InMemoryLedger::with_invoices(3));
        let store = Arc::new(InMemoryMetadata::new(vec![metadata(Some(2), "INV-2024-001", 50_002, 30_002)]));

        let listings = pipeline(ledger, store).run().await.unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].id(), 2);
        assert_eq!(listings[0].invoice_number.as_deref(), Some("INV-2024-001"));
    }

    #[tokio::test]
    async fn test_listing_outage_falls_back_to_ledger_first() {
        let ledger = Arc::new(InMemoryLedger::with_invoices(5));
        ledger.fail_details(3);
        let store = Arc::new(InMemoryMetadata::new(vec![
            metadata(Some(0), "INV-0", 50_000, 30_000),
            metadata(None, "INV-PENDING", 50_004, 30_004),
        ]));
        store.set_listing_down(true);

        let listings = pipeline(ledger, store.clone()).run().await.unwrap();

        assert_eq!(listings.len(), 4);
        // 503 is retryable: all attempts were used
        assert_eq!(store.list_calls(), 3);
        let by_id: HashMap<u64, &ListingRecord> = listings.iter().map(|l| (l.id(), l)).collect();
        assert_eq!(by_id[&0].invoice_number.as_deref(), Some("INV-0"));
        assert_eq!(by_id[&4].invoice_number.as_deref(), Some("INV-PENDING"));
        assert_eq!(by_id[&1].invoice_number, None);
    }

    #[tokio::test]
    async fn test_empty_listing_selects_ledger_first() {
        let ledger = Arc::new(InMemoryLedger::with_invoices(2));
        let store = Arc::new(InMemoryMetadata::new(Vec::new()));

        let listings = pipeline(ledger, store.clone()).run().await.unwrap();
        assert_eq!(listings.len(), 2);
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_point_lookup_is_a_miss() {
        let ledger = Arc::new(InMemoryLedger::with_invoices(2));
        let store = Arc::new(InMemoryMetadata::new(vec![metadata(Some(1), "INV-1", 50_001, 30_001)]));
        store.set_listing_down(true);
        store.fail_token_lookup(1);

        let listings = pipeline(ledger, store).run().await.unwrap();
        assert_eq!(listings.len(), 2);
        assert!(listings.iter().all(|l| l.invoice_number.is_none()));
    }

    #[tokio::test]
    async fn test_missing_ledger_is_a_cycle_error() {
        let store = Arc::new(InMemoryMetadata::new(Vec::new()));
        let pipeline = ReconcilePipeline::new(None, store.clone(), RetryPolicy::none());

        let err = pipeline.run().await.unwrap_err();
        assert!(matches!(err, AppError::Ledger(LedgerError::NotConfigured)));
        assert_eq!(store.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_ledger_fails_after_retries() {
        let ledger = Arc::new(InMemoryLedger::with_invoices(2));
        ledger.set_unreachable(true);
        let store = Arc::new(InMemoryMetadata::new(vec![metadata(Some(0), "INV-0", 50_000, 30_000)]));

        let err = pipeline(ledger, store).run().await.unwrap_err();
        assert!(matches!(err, AppError::Ledger(LedgerError::Rpc(_))));
    }
}
