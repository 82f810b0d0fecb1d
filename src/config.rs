use serde::Deserialize;
use std::str::FromStr;

use crate::ledger::rpc::DecodeMode;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub bind_address: String,
    pub ledger_rpc_url: String,
    /// Invoice token contract; cycles fail with a configuration error while unset
    pub invoice_token_address: Option<String>,
    pub ledger_decode_mode: DecodeMode,
    pub metadata_api_url: String,
    pub metadata_timeout_ms: u64,
    pub ledger_timeout_ms: u64,
    pub block_poll_interval_ms: u64,
    pub fetch_retry_attempts: u32,
    pub fetch_retry_backoff_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Ok(Self {
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            ledger_rpc_url: std::env::var("LEDGER_RPC_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8545".to_string()),
            invoice_token_address: std::env::var("INVOICE_TOKEN_ADDRESS")
                .ok()
                .map(|addr| addr.trim().to_string())
                .filter(|addr| !addr.is_empty()),
            ledger_decode_mode: match std::env::var("LEDGER_DECODE_MODE") {
                Ok(mode) => mode.parse().map_err(config::ConfigError::Message)?,
                Err(_) => DecodeMode::Tuple,
            },
            metadata_api_url: std::env::var("METADATA_API_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:3001".to_string()),
            metadata_timeout_ms: env_number("METADATA_TIMEOUT_MS", 10_000)?,
            ledger_timeout_ms: env_number("LEDGER_TIMEOUT_MS", 15_000)?,
            block_poll_interval_ms: env_nonzero("BLOCK_POLL_INTERVAL_MS", 4_000)?,
            fetch_retry_attempts: env_number("FETCH_RETRY_ATTEMPTS", 3)?,
            fetch_retry_backoff_ms: env_number("FETCH_RETRY_BACKOFF_MS", 250)?,
        })
    }
}

fn env_number<T: FromStr>(key: &str, default: T) -> Result<T, config::ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| config::ConfigError::Message(format!("{} must be a number, got {:?}", key, raw))),
        Err(_) => Ok(default),
    }
}

/// Intervals feed `tokio::time::interval`, which rejects zero
fn env_nonzero(key: &str, default: u64) -> Result<u64, config::ConfigError> {
    match env_number(key, default)? {
        0 => Err(config::ConfigError::Message(format!("{} must be greater than zero", key))),
        value => Ok(value),
    }
}
