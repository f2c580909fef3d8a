//! # Blueprint Exchange
//!
//! The unified API for storing and viewing game blueprints shared as exchange
//! strings.
//!
//! ## Overview
//!
//! - **Import**: decode an exchange string, store the blueprint or book (and
//!   every nested child of a book) under its content hash, and create a page.
//! - **Selection**: resolve which blueprint or book a page view renders, from
//!   the page's target and the optional `selected` / `type` parameters.
//! - **Retrieval**: fetch a stored exchange string by hash and decode it.
//! - **Linked trees**: rebuild a book's tree by following stored book records,
//!   with cycle detection.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use blueprint_exchange::{Exchange, ExchangeConfig, PageInfo, SelectionQuery};
//! use blueprint_exchange::store::SqliteStore;
//!
//! async fn import_and_view(exchange_string: &str) {
//!     let store = SqliteStore::open("blueprints.db").unwrap();
//!     let exchange = Exchange::new(store, ExchangeConfig::default());
//!
//!     let imported = exchange
//!         .import(exchange_string, PageInfo::new("Main bus"))
//!         .await
//!         .unwrap();
//!
//!     let view = exchange
//!         .resolve_selection(&imported.page.id, &SelectionQuery::none())
//!         .await
//!         .unwrap();
//!     let payload = exchange.decode_selected(&view.selected).await.unwrap();
//!     println!("{:?}", payload.label());
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `blueprint_exchange::core` - Codec, hashing and child trees
//! - `blueprint_exchange::store` - Record types, the store trait, SQLite

pub mod error;
pub mod exchange;
mod linked;
mod lookup;
pub mod selection;

// Re-export component crates
pub use blueprint_exchange_core as core;
pub use blueprint_exchange_store as store;

pub use error::{ExchangeError, Result};
pub use exchange::{Exchange, ExchangeConfig, ImportResult, PageInfo};
pub use selection::{
    BlueprintSummary, BookSummary, Resolution, Selected, SelectionConfig, SelectionFallback,
    SelectionQuery, SelectionResolver,
};

pub use blueprint_exchange_core::{
    decode, decode_with_hash, encode, hash, ChildNode, ChildTree, ChildTreeResolver, ContentHash,
    CoreError, DecodedPayload, PayloadKind, RecordId,
};
