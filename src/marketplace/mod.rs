//! Marketplace presentation over the published listing: search, status and
//! value filters, ordering.

pub mod query;

pub use query::{ListingQuery, SortBy, StatusFilter, BASE_UNITS};
