use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::coordinator::FetchCoordinator;
use super::models::Trigger;
use crate::error::LedgerError;
use crate::ledger::LedgerReader;

/// Polls the chain head and turns height changes into fetch cycles.
///
/// Each new height also refreshes the reader's identifier count. A block
/// range containing `InvoiceMinted` logs fires [`Trigger::InvoiceCreated`],
/// any other advance fires [`Trigger::NewBlock`].
pub struct ChainWatcher {
    reader: Arc<LedgerReader>,
    coordinator: Arc<FetchCoordinator>,
    poll_interval: Duration,
    last_height: Mutex<Option<u64>>,
}

impl ChainWatcher {
    pub fn new(reader: Arc<LedgerReader>, coordinator: Arc<FetchCoordinator>, poll_interval: Duration) -> Self {
        Self {
            reader,
            coordinator,
            poll_interval,
            last_height: Mutex::new(None),
        }
    }

    /// Start polling in the background
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("⏰ Chain watcher polling every {}ms", self.poll_interval.as_millis());

            loop {
                ticker.tick().await;
                match self.poll_once().await {
                    Ok(Some(trigger)) => {
                        self.coordinator.spawn_refresh(trigger);
                    }
                    Ok(None) => {}
                    Err(e) => warn!("⚠️  Chain head poll failed: {}", e),
                }
            }
        })
    }

    /// One poll. The first observed height only sets the baseline.
    pub async fn poll_once(&self) -> Result<Option<Trigger>, LedgerError> {
        let height = self.reader.source().block_number().await?;
        let previous = *self.last_height.lock();

        let from_block = match previous {
            Some(prev) if height <= prev => return Ok(None),
            Some(prev) => prev + 1,
            None => {
                *self.last_height.lock() = Some(height);
                if let Err(e) = self.reader.refresh_count().await {
                    warn!("Could not warm identifier count: {}", e);
                }
                debug!("Chain watcher baseline at block {}", height);
                return Ok(None);
            }
        };

        *self.last_height.lock() = Some(height);
        match self.reader.refresh_count().await {
            Ok(count) => debug!("Block {}: {} invoice identifiers", height, count),
            Err(e) => warn!("Could not refresh identifier count at block {}: {}", height, e),
        }

        let minted = match self.reader.source().mint_events(from_block, height).await {
            Ok(minted) => minted,
            Err(e) => {
                warn!("Could not read mint logs for blocks {}..={}: {}", from_block, height, e);
                0
            }
        };

        if minted > 0 {
            info!("🆕 {} invoice(s) minted in blocks {}..={}", minted, from_block, height);
            Ok(Some(Trigger::InvoiceCreated))
        } else {
            Ok(Some(Trigger::NewBlock { height }))
        }
    }
}
