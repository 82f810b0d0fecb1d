use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::models::{CycleOutcome, MarketplaceSnapshot, Trigger};
use super::pipeline::ReconcilePipeline;

#[derive(Debug, Default)]
struct CycleBook {
    /// Sequence number handed to the most recently started cycle
    latest_seq: u64,
    in_flight: usize,
}

/// Releases a cycle's in-flight slot if the cycle is dropped before it
/// reaches compare-and-publish
struct InFlightSlot<'a> {
    coordinator: &'a FetchCoordinator,
    seq: u64,
    armed: bool,
}

impl InFlightSlot<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut book = self.coordinator.book.lock();
        book.in_flight = book.in_flight.saturating_sub(1);
        let still_loading = book.in_flight > 0;
        self.coordinator
            .updates
            .send_modify(|snapshot| snapshot.is_loading = still_loading);
        warn!("⚠️  Fetch cycle #{} dropped before completion", self.seq);
    }
}

/// Owns the cycle counter and the published listing.
///
/// Every trigger starts an independent cycle tagged with the next sequence
/// number. Cycles are never cancelled; when one finishes, it publishes only
/// if no newer cycle has started in the meantime. A cycle whose future is
/// dropped (e.g. a disconnected HTTP caller) gives back its in-flight slot
/// without publishing. The counter and the
/// snapshot change together under one lock, so readers never see a listing
/// from an older cycle replace a newer one.
pub struct FetchCoordinator {
    pipeline: ReconcilePipeline,
    book: Mutex<CycleBook>,
    updates: watch::Sender<MarketplaceSnapshot>,
}

impl FetchCoordinator {
    pub fn new(pipeline: ReconcilePipeline) -> Self {
        let (updates, _) = watch::channel(MarketplaceSnapshot::default());
        Self {
            pipeline,
            book: Mutex::new(CycleBook::default()),
            updates,
        }
    }

    pub fn pipeline(&self) -> &ReconcilePipeline {
        &self.pipeline
    }

    /// Run one cycle to completion and report how it ended
    pub async fn refresh(&self, trigger: Trigger) -> CycleOutcome {
        let seq = {
            let mut book = self.book.lock();
            book.latest_seq += 1;
            book.in_flight += 1;
            book.latest_seq
        };
        let slot = InFlightSlot {
            coordinator: self,
            seq,
            armed: true,
        };
        self.updates.send_modify(|snapshot| snapshot.is_loading = true);
        info!(seq, trigger = %trigger, "🔄 Fetch cycle started");

        if trigger == Trigger::InvoiceCreated {
            self.recount_identifiers(seq).await;
        }

        let result = self.pipeline.run().await;

        let mut book = self.book.lock();
        slot.disarm();
        book.in_flight -= 1;
        let still_loading = book.in_flight > 0;

        if seq != book.latest_seq {
            let latest = book.latest_seq;
            self.updates.send_modify(|snapshot| snapshot.is_loading = still_loading);
            info!("⏭️  Fetch cycle #{} superseded by #{}, result discarded", seq, latest);
            return CycleOutcome::Superseded { seq, latest };
        }

        match result {
            Ok(listings) => {
                let count = listings.len();
                self.updates.send_modify(|snapshot| {
                    snapshot.listings = Arc::new(listings);
                    snapshot.error = None;
                    snapshot.is_loading = still_loading;
                    snapshot.published_seq = seq;
                    snapshot.published_at = Some(Utc::now());
                });
                info!(seq, listings = count, "✅ Fetch cycle published");
                CycleOutcome::Published { seq, listings: count }
            }
            Err(e) => {
                let message = e.to_string();
                // the last good listing stays visible
                self.updates.send_modify(|snapshot| {
                    snapshot.error = Some(message.clone());
                    snapshot.is_loading = still_loading;
                });
                error!("❌ Fetch cycle #{} failed: {}", seq, message);
                CycleOutcome::Failed { seq, message }
            }
        }
    }

    /// A freshly minted identifier sits beyond the cached count until it is re-read
    async fn recount_identifiers(&self, seq: u64) {
        if let Some(reader) = self.pipeline.ledger() {
            match reader.refresh_count().await {
                Ok(count) => info!(seq, count, "🔢 Identifier count refreshed"),
                Err(e) => warn!("⚠️  Cycle #{} could not refresh the identifier count: {}", seq, e),
            }
        }
    }

    /// Start a cycle in the background
    pub fn spawn_refresh(self: &Arc<Self>, trigger: Trigger) -> JoinHandle<CycleOutcome> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move { coordinator.refresh(trigger).await })
    }

    /// External "new invoice minted" signal
    pub fn notify_invoice_created(self: &Arc<Self>) -> JoinHandle<CycleOutcome> {
        self.spawn_refresh(Trigger::InvoiceCreated)
    }

    pub fn subscribe(&self) -> watch::Receiver<MarketplaceSnapshot> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> MarketplaceSnapshot {
        self.updates.borrow().clone()
    }
}
