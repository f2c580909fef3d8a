//! RecordStore trait: the abstract interface for record lookups and inserts.
//!
//! This trait keeps the exchange storage-agnostic. Implementations include
//! SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use blueprint_exchange_core::{ContentHash, RecordId};

use crate::error::Result;
use crate::records::{Blueprint, BlueprintBook, BlueprintPage, BlueprintString, PageListing};

/// Result of inserting a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// Record was inserted.
    Inserted,
    /// A record with this id, or of the same kind with this content hash,
    /// already exists (idempotent, not an error).
    AlreadyExists,
}

/// Async interface for record persistence.
///
/// Every lookup distinguishes three outcomes:
///
/// - `Ok(Some(record))`: found.
/// - `Ok(None)`: no such record. Retrying will not help.
/// - `Err(e)`: the backend failed; see [`StoreError::is_transient`].
///
/// [`StoreError::is_transient`]: crate::StoreError::is_transient
#[async_trait]
pub trait RecordStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Lookups by id
    // ─────────────────────────────────────────────────────────────────────────

    async fn get_blueprint(&self, id: &RecordId) -> Result<Option<Blueprint>>;

    async fn get_blueprint_book(&self, id: &RecordId) -> Result<Option<BlueprintBook>>;

    async fn get_blueprint_page(&self, id: &RecordId) -> Result<Option<BlueprintPage>>;

    /// Find the page migrated from this external listing id.
    async fn get_blueprint_page_by_factorioprints_id(
        &self,
        factorioprints_id: &str,
    ) -> Result<Option<BlueprintPage>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Lookups by content hash
    // ─────────────────────────────────────────────────────────────────────────

    /// Find a blueprint whose exchange string has this hash.
    async fn get_blueprint_by_hash(&self, hash: &ContentHash) -> Result<Option<Blueprint>>;

    /// Find a book whose exchange string has this hash.
    async fn get_blueprint_book_by_hash(
        &self,
        hash: &ContentHash,
    ) -> Result<Option<BlueprintBook>>;

    /// Get the raw exchange string stored under a hash.
    async fn get_blueprint_string(&self, hash: &ContentHash) -> Result<Option<BlueprintString>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Inserts
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a blueprint and store its exchange string under `blueprint_hash`.
    ///
    /// Returns `AlreadyExists` without writing when the id or the hash is
    /// taken by another blueprint. Fails with `InvalidData` if the string
    /// does not hash to `blueprint_hash`.
    async fn insert_blueprint(&self, blueprint: &Blueprint, exchange: &str)
        -> Result<InsertResult>;

    /// Insert a book and store its exchange string under `blueprint_hash`.
    ///
    /// Same uniqueness rule as [`RecordStore::insert_blueprint`].
    async fn insert_blueprint_book(
        &self,
        book: &BlueprintBook,
        exchange: &str,
    ) -> Result<InsertResult>;

    /// Insert a page.
    ///
    /// Returns `AlreadyExists` when the id or a set `factorioprints_id` is
    /// taken. Fails with `MissingTarget` if the page's blueprint or book does
    /// not exist yet, and with `InvalidData` if the page has both or neither.
    async fn insert_blueprint_page(&self, page: &BlueprintPage) -> Result<InsertResult>;

    // ─────────────────────────────────────────────────────────────────────────
    // Listings
    // ─────────────────────────────────────────────────────────────────────────

    /// Most recently updated pages, newest first.
    ///
    /// `page` is 1-based. `query`, when set, is a case-insensitive substring
    /// match on the title.
    async fn recent_blueprint_pages(
        &self,
        page: u32,
        per_page: u32,
        query: Option<&str>,
    ) -> Result<PageListing>;
}
