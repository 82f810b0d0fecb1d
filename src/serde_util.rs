//! Serde helpers for base-unit amounts.
//!
//! Ledger amounts are fixed-point integers that can exceed the range a
//! JavaScript consumer can represent exactly, so they travel as decimal
//! strings. The metadata store is loose about its numeric columns and may
//! hand back numbers, numeric strings, empty strings or null.

use serde::{Deserialize, Deserializer, Serializer};

/// Serialize a `u128` as a decimal string
pub mod amount_string {
    use super::*;

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.trim().parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseNumber {
    Int(u64),
    Float(f64),
    Text(String),
}

/// Deserialize an optional non-negative integer from a number, a numeric
/// string, or null. Fractions truncate toward zero and a string is read up
/// to its first non-digit, so `"50000.50"` is 50000. Anything without
/// leading digits becomes `None`.
pub fn loose_u128<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u128>, D::Error> {
    let raw: Option<LooseNumber> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value {
        LooseNumber::Int(n) => Some(n as u128),
        LooseNumber::Float(f) if f >= 0.0 && f < u128::MAX as f64 => Some(f.trunc() as u128),
        LooseNumber::Float(_) => None,
        LooseNumber::Text(s) => parse_leading_integer(&s),
    }))
}

/// Same as [`loose_u128`] but narrowed to ledger identifiers
pub fn loose_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Ok(loose_u128(deserializer)?.and_then(|n| u64::try_from(n).ok()))
}

/// Leading digits of a string, e.g. "50000", " 50000" or "50000.50" -> 50000
fn parse_leading_integer(raw: &str) -> Option<u128> {
    let trimmed = raw.trim_start();
    let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    if end == 0 {
        return None;
    }
    trimmed[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Deserialize)]
    struct Row {
        #[serde(default, deserialize_with = "loose_u128")]
        value: Option<u128>,
        #[serde(default, deserialize_with = "loose_u64")]
        token_id: Option<u64>,
    }

    #[derive(Serialize)]
    struct Amount {
        #[serde(with = "amount_string")]
        value: u128,
    }

    #[test]
    fn test_loose_numbers() {
        let row: Row = serde_json::from_str(r#"{"value": "50000", "token_id": 2}"#).unwrap();
        assert_eq!(row.value, Some(50_000));
        assert_eq!(row.token_id, Some(2));

        let row: Row = serde_json::from_str(r#"{"value": 30000.0, "token_id": null}"#).unwrap();
        assert_eq!(row.value, Some(30_000));
        assert_eq!(row.token_id, None);

        let row: Row = serde_json::from_str(r#"{"value": "", "token_id": "abc"}"#).unwrap();
        assert_eq!(row.value, None);
        assert_eq!(row.token_id, None);

        let row: Row = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(row.value, None);
    }

    #[test]
    fn test_fractional_amounts_truncate() {
        let row: Row = serde_json::from_str(r#"{"value": "50000.50", "token_id": "3rd"}"#).unwrap();
        assert_eq!(row.value, Some(50_000));
        assert_eq!(row.token_id, Some(3));

        let row: Row = serde_json::from_str(r#"{"value": 30000.99, "token_id": "-1"}"#).unwrap();
        assert_eq!(row.value, Some(30_000));
        assert_eq!(row.token_id, None);
    }

    #[test]
    fn test_amount_serializes_as_string() {
        let json = serde_json::to_string(&Amount { value: u128::MAX }).unwrap();
        assert_eq!(json, format!(r#"{{"value":"{}"}}"#, u128::MAX));
    }
}
