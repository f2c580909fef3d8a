//! Error types for the Blueprint Exchange Core.

use thiserror::Error;

/// Errors raised by the codec and the child-tree resolver.
///
/// All of these are deterministic: the same input always fails the same way,
/// so callers should never retry them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("unsupported exchange string version: {0:?}")]
    UnsupportedVersion(char),

    #[error("malformed encoding: {0}")]
    MalformedEncoding(String),

    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("encoding error: {0}")]
    Encoding(String),
}
