//! Minimal Solidity ABI codec for the invoice token's read functions.

use sha3::{Digest, Keccak256};
use std::collections::BTreeMap;

use super::models::{AbiValue, RawInvoiceDetails, INVOICE_DETAIL_FIELDS};
use crate::error::LedgerError;

const WORD: usize = 32;

pub const NONCE_SIGNATURE: &str = "nonce()";
pub const INVOICE_DETAILS_SIGNATURE: &str = "idToInvoiceDetails(uint256)";
pub const OWNER_SIGNATURE: &str = "idToOwner(uint256)";
pub const INVOICE_MINTED_EVENT: &str = "InvoiceMinted(address,uint256,uint256,string)";

/// Field kinds of the invoice details tuple, by position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Uint,
    Address,
    Bool,
}

const DETAIL_KINDS: [Kind; 11] = [
    Kind::Uint,
    Kind::Uint,
    Kind::Uint,
    Kind::Uint,
    Kind::Address,
    Kind::Uint,
    Kind::Uint,
    Kind::Uint,
    Kind::Uint,
    Kind::Uint,
    Kind::Bool,
];

pub fn keccak(input: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Keccak256::digest(input));
    out
}

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// topic0 of an event
pub fn event_topic(signature: &str) -> String {
    format!("0x{}", hex::encode(keccak(signature.as_bytes())))
}

pub fn encode_uint(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// `0x`-prefixed calldata for a function taking no or one uint argument
pub fn encode_call(signature: &str, arg: Option<u64>) -> String {
    let mut data = selector(signature).to_vec();
    if let Some(arg) = arg {
        data.extend_from_slice(&encode_uint(arg as u128));
    }
    format!("0x{}", hex::encode(data))
}

pub fn decode_hex(raw: &str) -> Result<Vec<u8>, LedgerError> {
    let body = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(body).map_err(|e| LedgerError::Decode(format!("invalid hex: {}", e)))
}

/// Parse an RPC quantity such as `0x1b4`
pub fn decode_quantity(raw: &str) -> Result<u64, LedgerError> {
    let body = raw.strip_prefix("0x").unwrap_or(raw);
    if body.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(body, 16)
        .map_err(|e| LedgerError::Decode(format!("invalid quantity {:?}: {}", raw, e)))
}

fn decode_uint_word(word: &[u8]) -> AbiValue {
    if word[..16].iter().any(|b| *b != 0) {
        return AbiValue::Raw(word.to_vec());
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    AbiValue::Uint(u128::from_be_bytes(low))
}

fn decode_address_word(word: &[u8]) -> AbiValue {
    if word[..12].iter().any(|b| *b != 0) {
        return AbiValue::Raw(word.to_vec());
    }
    AbiValue::Address(format!("0x{}", hex::encode(&word[12..])))
}

fn decode_bool_word(word: &[u8]) -> AbiValue {
    match decode_uint_word(word) {
        AbiValue::Uint(0) => AbiValue::Bool(false),
        AbiValue::Uint(1) => AbiValue::Bool(true),
        _ => AbiValue::Raw(word.to_vec()),
    }
}

/// Decode as many leading details fields as `data` holds complete words for.
///
/// A short or empty return (e.g. `0x` for an identifier the contract does not
/// know) yields fewer than eleven values, which the normalizer rejects.
pub fn decode_invoice_details(data: &[u8]) -> Vec<AbiValue> {
    data.chunks_exact(WORD)
        .zip(DETAIL_KINDS.iter())
        .map(|(word, kind)| match kind {
            Kind::Uint => decode_uint_word(word),
            Kind::Address => decode_address_word(word),
            Kind::Bool => decode_bool_word(word),
        })
        .collect()
}

pub fn decode_invoice_details_named(data: &[u8]) -> BTreeMap<String, AbiValue> {
    INVOICE_DETAIL_FIELDS
        .iter()
        .zip(decode_invoice_details(data))
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

pub fn decode_details(data: &[u8], named: bool) -> RawInvoiceDetails {
    if named {
        RawInvoiceDetails::Named(decode_invoice_details_named(data))
    } else {
        RawInvoiceDetails::Positional(decode_invoice_details(data))
    }
}

pub fn decode_single_uint(data: &[u8]) -> Result<u128, LedgerError> {
    match data.get(..WORD).map(decode_uint_word) {
        Some(AbiValue::Uint(n)) => Ok(n),
        Some(_) => Err(LedgerError::Decode("uint does not fit in 128 bits".to_string())),
        None => Err(LedgerError::Decode(format!("expected a 32 byte word, got {} bytes", data.len()))),
    }
}

pub fn decode_single_address(data: &[u8]) -> Result<String, LedgerError> {
    match data.get(..WORD).map(decode_address_word) {
        Some(AbiValue::Address(addr)) => Ok(addr),
        Some(_) => Err(LedgerError::Decode("malformed address word".to_string())),
        None => Err(LedgerError::Decode(format!("expected a 32 byte word, got {} bytes", data.len()))),
    }
}

#[cfg(test)]
pub(crate) fn encode_address(address: &str) -> [u8; 32] {
    let mut word = [0u8; 32];
    let bytes = decode_hex(address).unwrap();
    word[32 - bytes.len()..].copy_from_slice(&bytes);
    word
}

/// Test helper: ABI-encode a details tuple the way the contract returns it
#[cfg(test)]
pub(crate) fn encode_invoice_details(values: &[AbiValue]) -> Vec<u8> {
    let mut out = Vec::new();
    for value in values {
        match value {
            AbiValue::Uint(n) => out.extend_from_slice(&encode_uint(*n)),
            AbiValue::Address(addr) => out.extend_from_slice(&encode_address(addr)),
            AbiValue::Bool(b) => out.extend_from_slice(&encode_uint(*b as u128)),
            AbiValue::Raw(bytes) => out.extend_from_slice(bytes),
        }
    }
    out
}
