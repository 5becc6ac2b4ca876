//! Error types for the network dashboard data engine

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the data engine
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Cache tier storage error
    #[error("Cache store error: {0}")]
    Store(String),

    /// A site's content table is missing (pending or broken site)
    #[error("Content table missing for site {site_id}")]
    MissingContentTable { site_id: u64 },

    /// Site directory or content provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Memory limit parse error
    #[error("Failed to parse memory limit: {0}")]
    MemoryLimitParse(String),
}
