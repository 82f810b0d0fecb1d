use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Top-level error type for the marketplace engine
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Metadata store error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl AppError {
    /// Whether repeating the failed operation could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Ledger(e) => e.is_retryable(),
            AppError::Metadata(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Distributed ledger (JSON-RPC) errors
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("RPC transport failed: {0}")]
    Rpc(String),

    #[error("RPC returned error {code}: {message}")]
    RpcResponse { code: i64, message: String },

    #[error("Failed to decode ledger response: {0}")]
    Decode(String),

    #[error("Invoice token address is not configured")]
    NotConfigured,

    #[error("Ledger request timed out")]
    Timeout,
}

impl LedgerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Rpc(_) | LedgerError::Timeout)
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            LedgerError::Timeout
        } else if error.is_decode() {
            LedgerError::Decode(error.to_string())
        } else {
            LedgerError::Rpc(error.to_string())
        }
    }
}

/// Off-chain metadata store (HTTP) errors
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Metadata store returned {status} for {endpoint}")]
    Status { status: u16, endpoint: String },

    #[error("Failed to decode metadata response: {0}")]
    Decode(String),

    #[error("Metadata request timed out")]
    Timeout,
}

impl MetadataError {
    pub fn is_retryable(&self) -> bool {
        match self {
            MetadataError::Http(_) | MetadataError::Timeout => true,
            MetadataError::Status { status, .. } => *status >= 500,
            MetadataError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for MetadataError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            MetadataError::Timeout
        } else if error.is_decode() {
            MetadataError::Decode(error.to_string())
        } else {
            MetadataError::Http(error.to_string())
        }
    }
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Not found: {}", what),
                None,
            ),
            AppError::InvalidInput(reason) => (
                StatusCode::BAD_REQUEST,
                "INVALID_INPUT",
                reason,
                None,
            ),
            AppError::Ledger(LedgerError::NotConfigured) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "NOT_CONFIGURED",
                "Invoice token address is not configured".to_string(),
                None,
            ),
            AppError::Ledger(e) => (
                StatusCode::BAD_GATEWAY,
                "LEDGER_UNAVAILABLE",
                "The ledger could not be read".to_string(),
                Some(serde_json::json!({ "reason": e.to_string() })),
            ),
            AppError::Metadata(MetadataError::Status { status, endpoint }) => (
                StatusCode::BAD_GATEWAY,
                "METADATA_UNAVAILABLE",
                "The metadata store could not be read".to_string(),
                Some(serde_json::json!({ "status": status, "endpoint": endpoint })),
            ),
            AppError::Metadata(_) => (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_UNAVAILABLE",
                "An upstream service could not be read".to_string(),
                None,
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
