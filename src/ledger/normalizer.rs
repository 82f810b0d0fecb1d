//! Shapes raw `idToInvoiceDetails` results into [`LedgerRecord`]s.
//!
//! Depending on decoding mode the ledger hands back either a positional tuple
//! or a name-keyed object. Both variants are handled explicitly and produce
//! the same record; anything that does not carry all eleven fields with the
//! expected types yields `None` and the record is skipped.

use std::collections::BTreeMap;

use super::models::{
    is_zero_address, normalize_address, AbiValue, LedgerRecord, RawInvoiceDetails,
    INVOICE_DETAIL_FIELDS,
};

/// The eleven details fields, extracted and type-checked
struct DetailFields {
    loan_amount: u128,
    invoice_value: u128,
    unit_value: u128,
    created_at: u64,
    created_by: String,
    campaign_duration: u64,
    campaign_end_time: u64,
    maturity_date: u64,
    token_supply: u128,
    available_supply: u128,
    is_fulfilled: bool,
}

fn extract<'a>(get: impl Fn(usize) -> Option<&'a AbiValue>) -> Option<DetailFields> {
    Some(DetailFields {
        loan_amount: get(0)?.as_uint()?,
        invoice_value: get(1)?.as_uint()?,
        unit_value: get(2)?.as_uint()?,
        created_at: get(3)?.as_u64()?,
        created_by: get(4)?.as_address()?.to_string(),
        campaign_duration: get(5)?.as_u64()?,
        campaign_end_time: get(6)?.as_u64()?,
        maturity_date: get(7)?.as_u64()?,
        token_supply: get(8)?.as_uint()?,
        available_supply: get(9)?.as_uint()?,
        is_fulfilled: get(10)?.as_bool()?,
    })
}

fn from_positional(values: &[AbiValue]) -> Option<DetailFields> {
    // an optional twelfth `data` field may trail the tuple
    if values.len() < INVOICE_DETAIL_FIELDS.len() || values.len() > INVOICE_DETAIL_FIELDS.len() + 1 {
        return None;
    }
    extract(|i| values.get(i))
}

fn from_named(fields: &BTreeMap<String, AbiValue>) -> Option<DetailFields> {
    extract(|i| fields.get(INVOICE_DETAIL_FIELDS[i]))
}

/// Normalize one raw result. `owner` is the `idToOwner` result; an unset
/// (zero) owner falls back to `createdBy`.
pub fn normalize(id: u64, raw: &RawInvoiceDetails, owner: Option<&str>) -> Option<LedgerRecord> {
    let fields = match raw {
        RawInvoiceDetails::Positional(values) => from_positional(values),
        RawInvoiceDetails::Named(map) => from_named(map),
    }?;

    // A never-minted slot decodes as all zeros
    if is_zero_address(&fields.created_by) && fields.token_supply == 0 {
        return None;
    }
    if fields.available_supply > fields.token_supply {
        return None;
    }

    let created_by = normalize_address(&fields.created_by);
    let owner = owner
        .filter(|addr| !is_zero_address(addr))
        .map(normalize_address)
        .unwrap_or_else(|| created_by.clone());

    Some(LedgerRecord {
        id,
        loan_amount: fields.loan_amount,
        invoice_value: fields.invoice_value,
        unit_value: fields.unit_value,
        created_at: fields.created_at,
        created_by,
        campaign_duration: fields.campaign_duration,
        campaign_end_time: fields.campaign_end_time,
        maturity_date: fields.maturity_date,
        token_supply: fields.token_supply,
        available_supply: fields.available_supply,
        is_fulfilled: fields.is_fulfilled,
        owner,
    })
}
