//! # Blueprint Exchange Core
//!
//! Pure primitives for blueprint exchange strings: the string codec, content
//! hashing, and child-tree building for blueprint books.
//!
//! This crate contains no I/O, no storage, no async. It is pure computation
//! over exchange strings and their decoded JSON payloads.
//!
//! ## Key Types
//!
//! - [`ContentHash`] - SHA-1 content identity of a raw exchange string
//! - [`DecodedPayload`] - Tagged union over the `blueprint` / `blueprint_book` roots
//! - [`ChildTree`] - Ordered, nested listing of a book's children
//! - [`RecordId`] - Opaque identifier of a persisted record
//!
//! ## Wire Format
//!
//! An exchange string is `<version char><base64(zlib(utf8(json)))>`. Only
//! version `'0'` is defined. See the [`codec`] module.

pub mod codec;
pub mod error;
pub mod hash;
pub mod payload;
pub mod tree;
pub mod types;

pub use codec::{decode, decode_with_hash, encode, VERSION_TAG};
pub use error::CoreError;
pub use hash::{hash, ContentHash};
pub use payload::{DecodedPayload, PayloadKind};
pub use tree::{ChildEntry, ChildIdentity, ChildNode, ChildTree, ChildTreeResolver, ContentIdentity};
pub use types::RecordId;
