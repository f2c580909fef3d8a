//! # Blueprint Exchange Store
//!
//! Record storage for the blueprint exchange. Provides a trait-based interface
//! for blueprint, book and page persistence with SQLite and in-memory
//! implementations.
//!
//! ## Overview
//!
//! Records are looked up by opaque [`RecordId`] or by the [`ContentHash`] of
//! their exchange string. Every record's raw exchange string is kept in a
//! separate table keyed by that hash.
//!
//! ## Key Types
//!
//! - [`RecordStore`] - The async trait for all lookups and inserts
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`Blueprint`], [`BlueprintBook`], [`BlueprintPage`] - Persisted records
//!
//! ## Usage
//!
//! ```rust,no_run
//! use blueprint_exchange_store::{RecordStore, SqliteStore};
//! use blueprint_exchange_core::RecordId;
//!
//! async fn show_page() {
//!     let store = SqliteStore::open("blueprints.db").unwrap();
//!
//!     match store.get_blueprint_page(&RecordId::new("page-1")).await {
//!         Ok(Some(page)) => println!("{}", page.title),
//!         Ok(None) => println!("no such page"),
//!         Err(e) => eprintln!("store fault: {}", e),
//!     }
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Absence is not a fault**: lookups return `Ok(None)` for a missing id and
//!   `Err` only when the backend itself failed.
//! - **Idempotent inserts**: inserting an id twice returns `AlreadyExists`.
//! - **Pages follow targets**: a page can only be inserted once its blueprint or
//!   book exists.
//!
//! [`RecordId`]: blueprint_exchange_core::RecordId
//! [`ContentHash`]: blueprint_exchange_core::ContentHash

pub mod error;
pub mod memory;
pub mod migration;
pub mod records;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use records::{
    now_secs, Blueprint, BlueprintBook, BlueprintPage, BlueprintString, PageListing, PageTarget,
};
pub use sqlite::SqliteStore;
pub use traits::{InsertResult, RecordStore};
