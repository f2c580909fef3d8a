//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
///
/// A missing record is not an error: lookups return `Ok(None)` for that.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A page was inserted before the record it points at.
    #[error("page target {kind} {id} does not exist")]
    MissingTarget { kind: String, id: String },

    /// Invalid data offered to or found in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A blocking storage task failed to run to completion.
    #[error("storage task failed: {0}")]
    Task(String),

    /// A thread panicked while holding the connection lock. The connection
    /// stays unusable for the life of the store.
    #[error("connection lock poisoned: {0}")]
    LockPoisoned(String),

    /// The backend is temporarily unreachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether retrying the same operation could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            StoreError::Task(_) | StoreError::Unavailable(_) | StoreError::Io(_) => true,
            _ => false,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
