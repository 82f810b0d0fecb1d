use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

use crate::{
    api::handler::AppState,
    config::Config,
    error::AppResult,
    ledger::{JsonRpcLedger, LedgerReader},
    metadata::MetadataStoreClient,
    reconcile::{ChainWatcher, FetchCoordinator, ReconcilePipeline, RetryPolicy, Trigger},
};

/// Wire sources, pipeline and coordinator without starting anything
pub fn build_coordinator(config: &Config) -> AppResult<(Arc<FetchCoordinator>, Option<Arc<LedgerReader>>)> {
    let metadata = Arc::new(MetadataStoreClient::new(
        &config.metadata_api_url,
        Duration::from_millis(config.metadata_timeout_ms),
    )?);
    info!("✅ Metadata store client ready: {}", config.metadata_api_url);

    let reader = match &config.invoice_token_address {
        Some(contract) => {
            let ledger = JsonRpcLedger::new(
                config.ledger_rpc_url.clone(),
                contract.clone(),
                config.ledger_decode_mode,
                Duration::from_millis(config.ledger_timeout_ms),
            )?;
            info!(
                "✅ Ledger reader ready: {} (contract {}, {:?} decoding)",
                config.ledger_rpc_url, contract, config.ledger_decode_mode
            );
            Some(Arc::new(LedgerReader::new(Arc::new(ledger))))
        }
        None => {
            warn!("⚠️  INVOICE_TOKEN_ADDRESS not set - fetch cycles will fail until it is configured");
            None
        }
    };

    let retry = RetryPolicy::exponential(
        config.fetch_retry_attempts,
        Duration::from_millis(config.fetch_retry_backoff_ms),
    );
    let pipeline = ReconcilePipeline::new(reader.clone(), metadata, retry);

    Ok((Arc::new(FetchCoordinator::new(pipeline)), reader))
}

pub async fn initialize_app_state(config: &Config) -> AppResult<AppState> {
    info!("Initializing application components ...");

    let (coordinator, reader) = build_coordinator(config)?;

    if let Some(reader) = reader {
        let watcher = Arc::new(ChainWatcher::new(
            reader,
            coordinator.clone(),
            Duration::from_millis(config.block_poll_interval_ms),
        ));
        watcher.start();
        info!("✅ Chain watcher started");
    }

    coordinator.spawn_refresh(Trigger::Startup);

    info!("✅ Application state initialized");
    Ok(AppState { coordinator })
}
