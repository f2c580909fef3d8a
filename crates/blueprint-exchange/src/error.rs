//! Error types for the exchange.

use blueprint_exchange_core::{CoreError, PayloadKind, RecordId};
use blueprint_exchange_store::StoreError;
use thiserror::Error;

/// Errors that can occur during exchange operations.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The exchange string could not be decoded or encoded.
    #[error("codec error: {0}")]
    Core(#[from] CoreError),

    /// The store failed. Never produced for a record that is merely absent.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// A page, record or stored string does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The selected id does not resolve to a record of the requested kind.
    #[error("invalid selection: no {kind} with id {id}")]
    InvalidSelection { kind: PayloadKind, id: RecordId },

    /// A stored book reaches itself through its child links.
    #[error("cyclic book tree at {0}")]
    CyclicTree(RecordId),

    /// A page whose target pair is malformed.
    #[error("invalid page: {0}")]
    InvalidPage(String),

    /// A page with this external listing id was already imported.
    #[error("page already imported from listing {0}")]
    AlreadyImported(String),
}

impl ExchangeError {
    /// Whether the failure means "nothing to show" rather than a fault.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ExchangeError::NotFound(_)
                | ExchangeError::InvalidSelection { .. }
                | ExchangeError::InvalidPage(_)
        )
    }
}

/// Result type for exchange operations.
pub type Result<T> = std::result::Result<T, ExchangeError>;
