pub mod client;
pub mod models;

pub use client::{MetadataSource, MetadataStoreClient};
pub use models::MetadataRecord;
