//! Persistence layer for ignition
//!
//! Provides one flat table of per-requester usage records that survives
//! restarts. The gatekeeper in `ignition-core` is the only writer.

mod record;
mod sqlite;
mod traits;

pub use record::*;
pub use sqlite::*;
pub use traits::*;

use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt record: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
