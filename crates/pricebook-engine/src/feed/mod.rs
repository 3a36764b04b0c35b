//! Feed access: HTTP client, tabular stream reader and structured
//! index documents.

pub mod client;
pub mod index;
pub mod tabular;

pub use client::FeedClient;
pub use tabular::{ColumnMap, FeedRecord, TabularReader};
