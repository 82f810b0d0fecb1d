use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::cmp::Ordering;

use crate::error::{AppError, AppResult};
use crate::reconcile::ListingRecord;

/// Base units per whole currency unit
pub const BASE_UNITS: Decimal = dec!(1000000);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    /// Campaign still open and not fulfilled
    Active,
    /// Past maturity and not fulfilled
    Matured,
    Fulfilled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Newest,
    Oldest,
    ValueHigh,
    ValueLow,
    MaturitySoon,
}

/// Filters and ordering applied on top of the merged listing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListingQuery {
    pub search: Option<String>,
    pub status: StatusFilter,
    /// Whole currency units
    pub min_value: Option<Decimal>,
    /// Whole currency units
    pub max_value: Option<Decimal>,
    pub sort_by: SortBy,
}

impl ListingQuery {
    pub fn validate(&self) -> AppResult<()> {
        for bound in [self.min_value, self.max_value].into_iter().flatten() {
            if bound.is_sign_negative() {
                return Err(AppError::InvalidInput(format!("value bound {} is negative", bound)));
            }
        }
        if let (Some(min), Some(max)) = (self.min_value, self.max_value) {
            if min > max {
                return Err(AppError::InvalidInput(format!(
                    "min_value {} exceeds max_value {}",
                    min, max
                )));
            }
        }
        Ok(())
    }

    /// Filtered and sorted copy of `listings`, evaluated at unix time `now`
    pub fn apply(&self, listings: &[ListingRecord], now: u64) -> Vec<ListingRecord> {
        let needle = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        // a bound too large to scale sits above every invoice value
        let min = match self.min_value.map(|v| v.checked_mul(BASE_UNITS)) {
            Some(None) => return Vec::new(),
            Some(scaled) => scaled,
            None => None,
        };
        let max = self.max_value.and_then(|v| v.checked_mul(BASE_UNITS));

        let mut out: Vec<ListingRecord> = listings
            .iter()
            .filter(|l| needle.as_deref().map_or(true, |n| matches_search(l, n)))
            .filter(|l| self.matches_status(l, now))
            .filter(|l| within(l.ledger.invoice_value, min, max))
            .cloned()
            .collect();

        out.sort_by(|a, b| self.compare(a, b).then_with(|| a.id().cmp(&b.id())));
        out
    }

    fn matches_status(&self, listing: &ListingRecord, now: u64) -> bool {
        let record = &listing.ledger;
        match self.status {
            StatusFilter::All => true,
            StatusFilter::Active => record.campaign_end_time > now && !record.is_fulfilled,
            StatusFilter::Matured => record.maturity_date <= now && !record.is_fulfilled,
            StatusFilter::Fulfilled => record.is_fulfilled,
        }
    }

    fn compare(&self, a: &ListingRecord, b: &ListingRecord) -> Ordering {
        let (a, b) = (&a.ledger, &b.ledger);
        match self.sort_by {
            SortBy::Newest => b.created_at.cmp(&a.created_at),
            SortBy::Oldest => a.created_at.cmp(&b.created_at),
            SortBy::ValueHigh => b.invoice_value.cmp(&a.invoice_value),
            SortBy::ValueLow => a.invoice_value.cmp(&b.invoice_value),
            SortBy::MaturitySoon => a.maturity_date.cmp(&b.maturity_date),
        }
    }
}

fn matches_search(listing: &ListingRecord, needle: &str) -> bool {
    [&listing.invoice_number, &listing.customer_name, &listing.services]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(needle))
}

fn within(value: u128, min: Option<Decimal>, max: Option<Decimal>) -> bool {
    // beyond Decimal range: above any bound a caller can express
    let value = match Decimal::from_u128(value) {
        Some(v) => v,
        None => return max.is_none(),
    };
    min.map_or(true, |m| value >= m) && max.map_or(true, |m| value <= m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{metadata, record, HOLDER};

    const NOW: u64 = 1_703_000_000;

    fn listing(id: u64, number: &str, invoice_value: u128) -> ListingRecord {
        let mut ledger = record(id, 1, invoice_value, HOLDER);
        ledger.created_at = 1_700_000_000 + id * 10;
        ListingRecord::with_metadata(ledger, &metadata(Some(id), number, invoice_value, 1))
    }

    fn ids(listings: &[ListingRecord]) -> Vec<u64> {
        listings.iter().map(|l| l.id()).collect()
    }

    #[test]
    fn test_default_query_sorts_newest_first() {
        let listings = vec![listing(0, "A", 5), listing(2, "B", 5), listing(1, "C", 5)];
        assert_eq!(ids(&ListingQuery::default().apply(&listings, NOW)), vec![2, 1, 0]);
    }

    #[test]
    fn test_search_is_case_insensitive_over_descriptive_fields() {
        let mut bare = ListingRecord::bare(record(3, 1, 1, HOLDER));
        bare.services = None;
        let listings = vec![listing(0, "INV-2024-001", 5), listing(1, "OTHER", 5), bare];
        let query = ListingQuery {
            search: Some("inv-2024".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(&query.apply(&listings, NOW)), vec![0]);
    }

    #[test]
    fn test_status_filters() {
        let mut open = listing(0, "OPEN", 5);
        open.ledger.campaign_end_time = NOW + 100;
        open.ledger.maturity_date = NOW + 1_000;
        let mut matured = listing(1, "MATURED", 5);
        matured.ledger.campaign_end_time = NOW - 1_000;
        matured.ledger.maturity_date = NOW;
        let mut fulfilled = listing(2, "PAID", 5);
        fulfilled.ledger.is_fulfilled = true;
        fulfilled.ledger.maturity_date = NOW - 1;
        let listings = vec![open, matured, fulfilled];

        let by_status = |status| {
            let query = ListingQuery { status, sort_by: SortBy::Oldest, ..Default::default() };
            ids(&query.apply(&listings, NOW))
        };
        assert_eq!(by_status(StatusFilter::Active), vec![0]);
        assert_eq!(by_status(StatusFilter::Matured), vec![1]);
        assert_eq!(by_status(StatusFilter::Fulfilled), vec![2]);
        assert_eq!(by_status(StatusFilter::All), vec![0, 1, 2]);
    }

    #[test]
    fn test_value_bounds_are_whole_units() {
        let listings = vec![
            listing(0, "A", 49_999_999),
            listing(1, "B", 50_000_000),
            listing(2, "C", 75_500_000),
            listing(3, "D", 100_000_001),
        ];
        let query = ListingQuery {
            min_value: Some(dec!(50)),
            max_value: Some(dec!(100)),
            sort_by: SortBy::ValueHigh,
            ..Default::default()
        };
        assert_eq!(ids(&query.apply(&listings, NOW)), vec![2, 1]);
    }

    #[test]
    fn test_ties_break_by_identifier() {
        let mut listings = vec![listing(4, "A", 7), listing(1, "B", 7), listing(3, "C", 7)];
        for l in &mut listings {
            l.ledger.maturity_date = NOW;
        }
        let query = ListingQuery { sort_by: SortBy::MaturitySoon, ..Default::default() };
        assert_eq!(ids(&query.apply(&listings, NOW)), vec![1, 3, 4]);
    }

    #[test]
    fn test_invalid_bounds_are_rejected() {
        let inverted = ListingQuery {
            min_value: Some(dec!(10)),
            max_value: Some(dec!(5)),
            ..Default::default()
        };
        assert!(matches!(inverted.validate(), Err(AppError::InvalidInput(_))));

        let negative = ListingQuery { min_value: Some(dec!(-1)), ..Default::default() };
        assert!(negative.validate().is_err());
        assert!(ListingQuery::default().validate().is_ok());
    }

    #[test]
    fn test_bounds_beyond_decimal_range_do_not_overflow() {
        let listings = vec![listing(0, "A", 5), listing(1, "B", u128::MAX)];

        let huge_min = ListingQuery { min_value: Some(Decimal::MAX), ..Default::default() };
        assert!(huge_min.validate().is_ok());
        assert!(huge_min.apply(&listings, NOW).is_empty());

        let huge_max = ListingQuery {
            max_value: Some(Decimal::MAX),
            sort_by: SortBy::Oldest,
            ..Default::default()
        };
        assert!(huge_max.validate().is_ok());
        assert_eq!(ids(&huge_max.apply(&listings, NOW)), vec![0, 1]);
    }
}
