//! Error types for the catalog service

use thiserror::Error;

/// Unified error type for catalog operations
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Referenced product does not exist
    #[error("Product not found")]
    NotFound,
    /// Product name uniqueness violated
    #[error("Product name already exists: {0}")]
    Conflict(String),
    /// Missing or malformed input field
    #[error("{0}")]
    InvalidArgument(String),
    /// CSV parsing or rendering failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// Database operation failed (disk, corruption, connection)
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result alias for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;
