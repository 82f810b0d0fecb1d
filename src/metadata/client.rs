use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument};

use super::models::MetadataRecord;
use crate::error::MetadataError;

/// Read access to the off-chain invoice metadata store.
///
/// Each call fails independently and is never retried here.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Every metadata row (`GET /invoices`)
    async fn list_invoices(&self) -> Result<Vec<MetadataRecord>, MetadataError>;

    /// Row attached to a ledger identifier (`GET /invoices/token/{id}`)
    async fn get_by_token(&self, token_id: u64) -> Result<Option<MetadataRecord>, MetadataError>;

    /// Rows written by one business (`GET /invoices/business/{address}`)
    async fn list_by_business(&self, address: &str) -> Result<Vec<MetadataRecord>, MetadataError>;
}

/// HTTP client for the metadata store
pub struct MetadataStoreClient {
    client: Client,
    base_url: String,
}

impl MetadataStoreClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, MetadataError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// GET a JSON body; `Ok(None)` on 404
    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<Option<T>, MetadataError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!("Metadata store: {} not found", path);
                Ok(None)
            }
            status if status.is_success() => Ok(Some(response.json::<T>().await?)),
            status => Err(MetadataError::Status {
                status: status.as_u16(),
                endpoint: path.to_string(),
            }),
        }
    }
}

#[async_trait]
impl MetadataSource for MetadataStoreClient {
    #[instrument(skip(self))]
    async fn list_invoices(&self) -> Result<Vec<MetadataRecord>, MetadataError> {
        // the bulk listing must exist; a 404 means the store is misconfigured
        match self.get_json::<Vec<MetadataRecord>>("/invoices").await? {
            Some(rows) => Ok(rows),
            None => Err(MetadataError::Status {
                status: StatusCode::NOT_FOUND.as_u16(),
                endpoint: "/invoices".to_string(),
            }),
        }
    }

    async fn get_by_token(&self, token_id: u64) -> Result<Option<MetadataRecord>, MetadataError> {
        self.get_json(&format!("/invoices/token/{}", token_id)).await
    }

    async fn list_by_business(&self, address: &str) -> Result<Vec<MetadataRecord>, MetadataError> {
        Ok(self
            .get_json(&format!("/invoices/business/{}", address))
            .await?
            .unwrap_or_default())
    }
}
