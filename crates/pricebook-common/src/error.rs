//! Error types for pricebook

use thiserror::Error;

/// Result type alias for pricebook operations
pub type Result<T> = std::result::Result<T, PricebookError>;

/// Main error type for pricebook
#[derive(Error, Debug)]
pub enum PricebookError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Feed headers were not found before end of stream")]
    HeaderNotFound,

    #[error("Feed row error: {0}")]
    FeedRow(String),

    #[error("Mandatory feed unreachable: {0}")]
    FeedUnreachable(String),

    #[error("Unknown offering: {0}")]
    UnknownOffering(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Catalog store error: {0}")]
    Store(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
