use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, instrument};

use super::abi::{self, INVOICE_DETAILS_SIGNATURE, INVOICE_MINTED_EVENT, NONCE_SIGNATURE, OWNER_SIGNATURE};
use super::models::{normalize_address, CallOutcome, RawInvoiceDetails};
use super::traits::LedgerSource;
use crate::error::LedgerError;

/// Upper bound on `eth_call`s per JSON-RPC batch request
const MAX_BATCH_SIZE: usize = 100;

/// How `idToInvoiceDetails` results are shaped after ABI decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    Tuple,
    Named,
}

impl FromStr for DecodeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tuple" | "positional" => Ok(DecodeMode::Tuple),
            "named" | "object" => Ok(DecodeMode::Named),
            other => Err(format!("unknown ledger decode mode: {}", other)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

impl RpcResponse {
    fn into_hex_result(self) -> Result<String, LedgerError> {
        if let Some(err) = self.error {
            return Err(LedgerError::RpcResponse { code: err.code, message: err.message });
        }
        match self.result {
            Some(Value::String(hex)) => Ok(hex),
            other => Err(LedgerError::Decode(format!("expected hex string result, got {:?}", other))),
        }
    }
}

/// Invoice token reader over EVM JSON-RPC
pub struct JsonRpcLedger {
    client: Client,
    rpc_url: String,
    contract: String,
    decode_mode: DecodeMode,
}

impl JsonRpcLedger {
    pub fn new(
        rpc_url: String,
        contract: String,
        decode_mode: DecodeMode,
        timeout: Duration,
    ) -> Result<Self, LedgerError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            rpc_url,
            contract: normalize_address(&contract),
            decode_mode,
        })
    }

    fn call_request(&self, id: usize, data: String) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "eth_call",
            "params": [{ "to": self.contract, "data": data }, "latest"],
        })
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let payload = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
        let response: RpcResponse = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = response.error {
            return Err(LedgerError::RpcResponse { code: err.code, message: err.message });
        }
        response
            .result
            .ok_or_else(|| LedgerError::Decode(format!("{} returned no result", method)))
    }

    /// One `eth_call` per calldata entry, batched; per-entry failures are isolated
    async fn batch_call(&self, calldata: Vec<String>) -> Result<Vec<CallOutcome<Vec<u8>>>, LedgerError> {
        let mut outcomes = Vec::with_capacity(calldata.len());

        for chunk in calldata.chunks(MAX_BATCH_SIZE) {
            let batch: Vec<Value> = chunk
                .iter()
                .enumerate()
                .map(|(i, data)| self.call_request(i, data.clone()))
                .collect();

            let body: Value = self
                .client
                .post(&self.rpc_url)
                .json(&batch)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            // A node that rejects the batch outright answers with a single object
            let responses: Vec<RpcResponse> = match body {
                Value::Array(_) => serde_json::from_value(body)
                    .map_err(|e| LedgerError::Decode(format!("malformed batch response: {}", e)))?,
                single => {
                    let response: RpcResponse = serde_json::from_value(single)
                        .map_err(|e| LedgerError::Decode(format!("malformed batch response: {}", e)))?;
                    return Err(match response.error {
                        Some(err) => LedgerError::RpcResponse { code: err.code, message: err.message },
                        None => LedgerError::Decode("batch request answered with a single response".to_string()),
                    });
                }
            };

            let mut by_id: HashMap<u64, RpcResponse> = responses
                .into_iter()
                .filter_map(|r| r.id.as_u64().map(|id| (id, r)))
                .collect();

            for i in 0..chunk.len() {
                let outcome = match by_id.remove(&(i as u64)) {
                    Some(response) => match response.into_hex_result().and_then(|hex| abi::decode_hex(&hex)) {
                        Ok(bytes) => CallOutcome::Success(bytes),
                        Err(e) => CallOutcome::Failure(e.to_string()),
                    },
                    None => CallOutcome::Failure("missing from batch response".to_string()),
                };
                outcomes.push(outcome);
            }
        }

        Ok(outcomes)
    }
}

#[async_trait]
impl LedgerSource for JsonRpcLedger {
    #[instrument(skip(self))]
    async fn invoice_count(&self) -> Result<u64, LedgerError> {
        let data = abi::encode_call(NONCE_SIGNATURE, None);
        let result = self
            .request("eth_call", json!([{ "to": self.contract, "data": data }, "latest"]))
            .await?;
        let hex = result
            .as_str()
            .ok_or_else(|| LedgerError::Decode("nonce() result is not a string".to_string()))?;
        let count = abi::decode_single_uint(&abi::decode_hex(hex)?)?;
        u64::try_from(count).map_err(|_| LedgerError::Decode(format!("nonce() out of range: {}", count)))
    }

    async fn invoice_details(
        &self,
        ids: &[u64],
    ) -> Result<Vec<CallOutcome<RawInvoiceDetails>>, LedgerError> {
        let calldata = ids
            .iter()
            .map(|id| abi::encode_call(INVOICE_DETAILS_SIGNATURE, Some(*id)))
            .collect();
        let named = self.decode_mode == DecodeMode::Named;
        let outcomes = self.batch_call(calldata).await?;
        debug!("Read {} invoice detail tuples", outcomes.len());

        Ok(outcomes
            .into_iter()
            .map(|outcome| match outcome {
                CallOutcome::Success(bytes) => CallOutcome::Success(abi::decode_details(&bytes, named)),
                CallOutcome::Failure(reason) => CallOutcome::Failure(reason),
            })
            .collect())
    }

    async fn invoice_owners(&self, ids: &[u64]) -> Result<Vec<CallOutcome<String>>, LedgerError> {
        let calldata = ids
            .iter()
            .map(|id| abi::encode_call(OWNER_SIGNATURE, Some(*id)))
            .collect();
        let outcomes = self.batch_call(calldata).await?;

        Ok(outcomes
            .into_iter()
            .map(|outcome| match outcome {
                CallOutcome::Success(bytes) => match abi::decode_single_address(&bytes) {
                    Ok(addr) => CallOutcome::Success(addr),
                    Err(e) => CallOutcome::Failure(e.to_string()),
                },
                CallOutcome::Failure(reason) => CallOutcome::Failure(reason),
            })
            .collect())
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        let result = self.request("eth_blockNumber", json!([])).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| LedgerError::Decode("eth_blockNumber result is not a string".to_string()))?;
        abi::decode_quantity(hex)
    }

    async fn mint_events(&self, from_block: u64, to_block: u64) -> Result<usize, LedgerError> {
        let filter = json!({
            "address": self.contract,
            "topics": [abi::event_topic(INVOICE_MINTED_EVENT)],
            "fromBlock": format!("0x{:x}", from_block),
            "toBlock": format!("0x{:x}", to_block),
        });
        let result = self.request("eth_getLogs", json!([filter])).await?;
        result
            .as_array()
            .map(|logs| logs.len())
            .ok_or_else(|| LedgerError::Decode("eth_getLogs result is not an array".to_string()))
    }
}
