use async_trait::async_trait;

use super::models::{CallOutcome, RawInvoiceDetails};
use crate::error::LedgerError;

/// Read access to the invoice token contract.
///
/// Batched reads return one outcome per requested identifier, in request
/// order. `Err` is reserved for failures of the whole call (transport down,
/// node rejected the batch); a single identifier failing is a
/// `CallOutcome::Failure` inside `Ok`.
#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// Number of invoices minted so far (`nonce()`), an exclusive upper bound
    async fn invoice_count(&self) -> Result<u64, LedgerError>;

    async fn invoice_details(
        &self,
        ids: &[u64],
    ) -> Result<Vec<CallOutcome<RawInvoiceDetails>>, LedgerError>;

    async fn invoice_owners(&self, ids: &[u64]) -> Result<Vec<CallOutcome<String>>, LedgerError>;

    async fn block_number(&self) -> Result<u64, LedgerError>;

    /// Number of `InvoiceMinted` logs in the inclusive block range
    async fn mint_events(&self, from_block: u64, to_block: u64) -> Result<usize, LedgerError>;
}
