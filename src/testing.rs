//! In-memory ledger and metadata sources with failure injection.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Notify};

use crate::error::{LedgerError, MetadataError};
use crate::ledger::models::{AbiValue, CallOutcome, LedgerRecord, RawInvoiceDetails};
use crate::ledger::LedgerSource;
use crate::metadata::{MetadataRecord, MetadataSource};

pub const CREATOR: &str = "0x00000000000000000000000000000000000000b1";
pub const HOLDER: &str = "0x00000000000000000000000000000000000000c1";

/// A plausible record; `created_by` is [`CREATOR`], `owner` is `owner`
pub fn record(id: u64, loan_amount: u128, invoice_value: u128, owner: &str) -> LedgerRecord {
    LedgerRecord {
        id,
        loan_amount,
        invoice_value,
        unit_value: 100,
        created_at: 1_700_000_000 + id,
        created_by: CREATOR.to_string(),
        campaign_duration: 2_592_000,
        campaign_end_time: 1_702_592_000 + id,
        maturity_date: 1_705_000_000,
        token_supply: 750,
        available_supply: 500,
        is_fulfilled: false,
        owner: owner.to_string(),
    }
}

pub fn metadata(token_id: Option<u64>, invoice_number: &str, invoice_value: u128, loan_amount: u128) -> MetadataRecord {
    MetadataRecord {
        invoice_number: Some(invoice_number.to_string()),
        customer_name: Some(format!("Customer of {}", invoice_number)),
        services: Some("Consulting".to_string()),
        description: Some(format!("Description of {}", invoice_number)),
        token_id,
        business_address: Some(HOLDER.to_string()),
        invoice_value: Some(invoice_value),
        loan_amount: Some(loan_amount),
        due_date: Some("2024-06-30".to_string()),
    }
}

fn to_tuple(record: &LedgerRecord) -> Vec<AbiValue> {
    vec![
        AbiValue::Uint(record.loan_amount),
        AbiValue::Uint(record.invoice_value),
        AbiValue::Uint(record.unit_value),
        AbiValue::Uint(record.created_at as u128),
        AbiValue::Address(record.created_by.clone()),
        AbiValue::Uint(record.campaign_duration as u128),
        AbiValue::Uint(record.campaign_end_time as u128),
        AbiValue::Uint(record.maturity_date as u128),
        AbiValue::Uint(record.token_supply),
        AbiValue::Uint(record.available_supply),
        AbiValue::Bool(record.is_fulfilled),
    ]
}

#[derive(Default)]
pub struct InMemoryLedger {
    records: Mutex<Vec<LedgerRecord>>,
    failing_details: Mutex<HashSet<u64>>,
    failing_owners: Mutex<HashSet<u64>>,
    unreachable: AtomicBool,
    count_reads: AtomicUsize,
    block: AtomicU64,
    mints_per_poll: AtomicUsize,
}

impl InMemoryLedger {
    pub fn from_records(records: Vec<LedgerRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Default::default()
        }
    }

    /// `n` invoices with loan `30_000 + id` and value `50_000 + id`, held by [`HOLDER`]
    pub fn with_invoices(n: u64) -> Self {
        Self::from_records(
            (0..n)
                .map(|id| record(id, 30_000 + id as u128, 50_000 + id as u128, HOLDER))
                .collect(),
        )
    }

    pub fn push_invoice(&self) {
        let mut records = self.records.lock();
        let id = records.len() as u64;
        records.push(record(id, 30_000 + id as u128, 50_000 + id as u128, HOLDER));
    }

    pub fn fail_details(&self, id: u64) {
        self.failing_details.lock().insert(id);
    }

    pub fn fail_owner(&self, id: u64) {
        self.failing_owners.lock().insert(id);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn count_reads(&self) -> usize {
        self.count_reads.load(Ordering::SeqCst)
    }

    pub fn advance_block(&self, mints: usize) {
        self.block.fetch_add(1, Ordering::SeqCst);
        self.mints_per_poll.store(mints, Ordering::SeqCst);
    }

    fn check_reachable(&self) -> Result<(), LedgerError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(LedgerError::Rpc("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerSource for InMemoryLedger {
    async fn invoice_count(&self) -> Result<u64, LedgerError> {
        self.check_reachable()?;
        self.count_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.lock().len() as u64)
    }

    async fn invoice_details(
        &self,
        ids: &[u64],
    ) -> Result<Vec<CallOutcome<RawInvoiceDetails>>, LedgerError> {
        self.check_reachable()?;
        let records = self.records.lock();
        let failing = self.failing_details.lock();
        Ok(ids
            .iter()
            .map(|id| {
                if failing.contains(id) {
                    return CallOutcome::Failure("execution reverted".to_string());
                }
                match records.get(*id as usize) {
                    Some(record) => CallOutcome::Success(RawInvoiceDetails::Positional(to_tuple(record))),
                    None => CallOutcome::Success(RawInvoiceDetails::Positional(Vec::new())),
                }
            })
            .collect())
    }

    async fn invoice_owners(&self, ids: &[u64]) -> Result<Vec<CallOutcome<String>>, LedgerError> {
        self.check_reachable()?;
        let records = self.records.lock();
        let failing = self.failing_owners.lock();
        Ok(ids
            .iter()
            .map(|id| match records.get(*id as usize) {
                Some(record) if !failing.contains(id) => CallOutcome::Success(record.owner.clone()),
                _ => CallOutcome::Failure("execution reverted".to_string()),
            })
            .collect())
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        self.check_reachable()?;
        Ok(self.block.load(Ordering::SeqCst))
    }

    async fn mint_events(&self, _from_block: u64, _to_block: u64) -> Result<usize, LedgerError> {
        self.check_reachable()?;
        Ok(self.mints_per_poll.swap(0, Ordering::SeqCst))
    }
}

/// One scripted answer to `list_invoices`, optionally held until released
struct ScriptedListing {
    rows: Vec<MetadataRecord>,
    gate: Option<oneshot::Receiver<()>>,
}

#[derive(Default)]
pub struct InMemoryMetadata {
    rows: Mutex<Vec<MetadataRecord>>,
    listing_down: AtomicBool,
    failing_tokens: Mutex<HashSet<u64>>,
    scripted: Mutex<VecDeque<ScriptedListing>>,
    list_calls: AtomicUsize,
    pub entered: Arc<Notify>,
}

impl InMemoryMetadata {
    pub fn new(rows: Vec<MetadataRecord>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Default::default()
        }
    }

    pub fn set_rows(&self, rows: Vec<MetadataRecord>) {
        *self.rows.lock() = rows;
    }

    pub fn set_listing_down(&self, down: bool) {
        self.listing_down.store(down, Ordering::SeqCst);
    }

    pub fn fail_token_lookup(&self, token_id: u64) {
        self.failing_tokens.lock().insert(token_id);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Queue an answer for the next `list_invoices`; returns the release handle
    /// when `gated`
    pub fn script_listing(&self, rows: Vec<MetadataRecord>, gated: bool) -> Option<oneshot::Sender<()>> {
        let (tx, rx) = oneshot::channel();
        let (gate, handle) = if gated { (Some(rx), Some(tx)) } else { (None, None) };
        self.scripted.lock().push_back(ScriptedListing { rows, gate });
        handle
    }
}

#[async_trait]
impl MetadataSource for InMemoryMetadata {
    async fn list_invoices(&self) -> Result<Vec<MetadataRecord>, MetadataError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.scripted.lock().pop_front();
        self.entered.notify_one();

        if let Some(script) = scripted {
            if let Some(gate) = script.gate {
                let _ = gate.await;
            }
            return Ok(script.rows);
        }

        if self.listing_down.load(Ordering::SeqCst) {
            return Err(MetadataError::Status { status: 503, endpoint: "/invoices".to_string() });
        }
        Ok(self.rows.lock().clone())
    }

    async fn get_by_token(&self, token_id: u64) -> Result<Option<MetadataRecord>, MetadataError> {
        if self.failing_tokens.lock().contains(&token_id) {
            return Err(MetadataError::Timeout);
        }
        Ok(self
            .rows
            .lock()
            .iter()
            .find(|row| row.token_id == Some(token_id))
            .cloned())
    }

    async fn list_by_business(&self, address: &str) -> Result<Vec<MetadataRecord>, MetadataError> {
        Ok(self
            .rows
            .lock()
            .iter()
            .filter(|row| row.belongs_to(address))
            .cloned()
            .collect())
    }
}
