//! The Exchange: import, lookup and selection over a record store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use blueprint_exchange_core::{
    decode, decode_with_hash, encode, hash, ChildEntry, ChildTree, ChildTreeResolver, ContentHash,
    CoreError, DecodedPayload, PayloadKind, RecordId,
};
use blueprint_exchange_store::{
    now_secs, Blueprint, BlueprintBook, BlueprintPage, InsertResult, PageListing, PageTarget,
    RecordStore, StoreError,
};

use crate::error::{ExchangeError, Result};
use crate::linked;
use crate::lookup::with_retries;
use crate::selection::{Resolution, Selected, SelectionConfig, SelectionQuery, SelectionResolver};

/// Configuration for the Exchange.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    /// How page selections are resolved.
    pub selection: SelectionConfig,
    /// Re-decode every child string created during import before storing it.
    pub verify_on_import: bool,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            selection: SelectionConfig::default(),
            verify_on_import: true,
        }
    }
}

/// Page fields supplied by the uploader.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInfo {
    /// Page title. Falls back to the payload's label when blank.
    pub title: String,
    pub description_markdown: String,
    pub tags: Vec<String>,
    /// External listing id, for pages migrated from another site.
    pub factorioprints_id: Option<String>,
    /// Page timestamps to keep instead of the import time.
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

impl PageInfo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, markdown: impl Into<String>) -> Self {
        self.description_markdown = markdown.into();
        self
    }

    pub fn tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn factorioprints_id(mut self, id: impl Into<String>) -> Self {
        self.factorioprints_id = Some(id.into());
        self
    }

    /// Keep the given creation and update times on the page.
    pub fn timestamps(mut self, created_at: i64, updated_at: i64) -> Self {
        self.created_at = Some(created_at);
        self.updated_at = Some(updated_at);
        self
    }
}

/// Result of importing an exchange string.
#[derive(Debug, Clone)]
pub struct ImportResult {
    /// The newly created page.
    pub page: BlueprintPage,
    /// The blueprint or book the page points at.
    pub target: PageTarget,
    /// Content hash of the imported string.
    pub hash: ContentHash,
    /// Whether the target record was created, as opposed to reused by hash.
    pub created: bool,
    /// Number of nested blueprint and book records created for a book.
    pub children_created: usize,
}

/// A child found in a book payload that needs a record of its own.
struct PendingChild {
    provisional: RecordId,
    hash: ContentHash,
    exchange: String,
    payload: DecodedPayload,
    /// Subtree for a nested book, still keyed by provisional ids.
    children: Option<ChildTree>,
}

/// The main Exchange struct.
///
/// Provides a unified API for:
/// - Importing exchange strings as pages
/// - Resolving a page view's selected blueprint or book
/// - Fetching and decoding stored exchange strings
/// - Expanding book trees through stored records
pub struct Exchange<S: RecordStore> {
    store: Arc<S>,
    config: ExchangeConfig,
}

impl<S: RecordStore> Exchange<S> {
    pub fn new(store: S, config: ExchangeConfig) -> Self {
        Self {
            store: Arc::new(store),
            config,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Import
    // ─────────────────────────────────────────────────────────────────────────

    /// Import an exchange string and create a page for it.
    ///
    /// A blueprint or book whose string is already stored is reused rather
    /// than duplicated. For a new book, every nested blueprint and book gets
    /// its own record, keyed by the hash of its own re-encoded string, and the
    /// book's child tree is stored with final record ids.
    ///
    /// Import is not atomic. Records are written one at a time, so a failure
    /// part way leaves child records without a page. They are not lost: a
    /// later import of the same string finds them by hash and reuses them.
    /// Two imports racing on one string also converge on a single record,
    /// since stores accept only one record per content hash.
    ///
    /// Fails with [`ExchangeError::AlreadyImported`] if `info` carries an
    /// external listing id that another page already has.
    pub async fn import(&self, exchange: &str, info: PageInfo) -> Result<ImportResult> {
        let (hash, payload) = decode_with_hash(exchange)?;
        let now = now_secs();

        if let Some(external) = &info.factorioprints_id {
            if self
                .store
                .get_blueprint_page_by_factorioprints_id(external)
                .await?
                .is_some()
            {
                return Err(ExchangeError::AlreadyImported(external.clone()));
            }
        }

        let (target, created, children_created) = match payload.kind() {
            PayloadKind::Blueprint => match self.lookup_blueprint_by_hash(&hash).await? {
                Some(blueprint) => (PageTarget::Blueprint(blueprint.id), false, 0),
                None => {
                    let mut blueprint = blueprint_record(
                        RecordId::generate(),
                        hash,
                        &payload,
                        info.tags.clone(),
                        now,
                    );
                    blueprint.factorioprints_id = info.factorioprints_id.clone();
                    let (id, created) = self.store_blueprint(&blueprint, exchange).await?;
                    (PageTarget::Blueprint(id), created, 0)
                }
            },
            PayloadKind::BlueprintBook => match self.lookup_book_by_hash(&hash).await? {
                Some(book) => (PageTarget::BlueprintBook(book.id), false, 0),
                None => {
                    let (child_tree, children_created) =
                        self.import_children(&payload, now).await?;
                    let mut book =
                        book_record(RecordId::generate(), hash, &payload, child_tree, now);
                    book.factorioprints_id = info.factorioprints_id.clone();
                    let (id, created) = self.store_book(&book, exchange).await?;
                    (PageTarget::BlueprintBook(id), created, children_created)
                }
            },
        };

        let title = if info.title.trim().is_empty() {
            payload.label().unwrap_or_default().to_owned()
        } else {
            info.title
        };
        let mut page = BlueprintPage::new(target.clone(), title, info.description_markdown);
        page.tags = info.tags;
        page.factorioprints_id = info.factorioprints_id;
        if let Some(created_at) = info.created_at {
            page.created_at = created_at;
        }
        if let Some(updated_at) = info.updated_at {
            page.updated_at = updated_at;
        }

        if self.store.insert_blueprint_page(&page).await? == InsertResult::AlreadyExists {
            let key = page
                .factorioprints_id
                .clone()
                .unwrap_or_else(|| page.id.to_string());
            return Err(ExchangeError::AlreadyImported(key));
        }

        tracing::info!(
            page = %page.id,
            %hash,
            kind = %payload.kind(),
            created,
            children_created,
            "imported exchange string"
        );

        Ok(ImportResult {
            page,
            target,
            hash,
            created,
            children_created,
        })
    }

    /// Create records for every child of a book payload and return the
    /// book's tree with final ids.
    async fn import_children(
        &self,
        payload: &DecodedPayload,
        now: i64,
    ) -> Result<(ChildTree, usize)> {
        let mut pending = Vec::new();
        let mut seen = HashSet::new();

        let assign = |entry: &ChildEntry<'_>| -> std::result::Result<RecordId, CoreError> {
            let child = entry.to_payload();
            let exchange = encode(&child)?;
            let child_hash = hash(exchange.as_bytes());
            let provisional = RecordId::from_hash(&child_hash);

            if seen.insert(child_hash) {
                let children = match entry {
                    ChildEntry::BlueprintBook { children, .. } => Some((*children).clone()),
                    ChildEntry::Blueprint { .. } => None,
                };
                pending.push(PendingChild {
                    provisional: provisional.clone(),
                    hash: child_hash,
                    exchange,
                    payload: child,
                    children,
                });
            }
            Ok(provisional)
        };
        let tree = ChildTreeResolver::with_identity(assign).resolve(payload)?;

        // Nothing is written until every child checks out.
        if self.config.verify_on_import {
            for child in &pending {
                if decode(&child.exchange)? != child.payload {
                    return Err(CoreError::InvalidPayload(format!(
                        "child {} does not survive re-encoding",
                        child.hash
                    ))
                    .into());
                }
            }
        }

        // Children arrive post-order, so a nested book's own children are
        // already mapped by the time it is stored.
        let mut final_ids: HashMap<RecordId, RecordId> = HashMap::new();
        let mut created = 0;

        for child in pending {
            let id = match child.payload.kind() {
                PayloadKind::Blueprint => match self.lookup_blueprint_by_hash(&child.hash).await? {
                    Some(existing) => existing.id,
                    None => {
                        let record = blueprint_record(
                            RecordId::generate(),
                            child.hash,
                            &child.payload,
                            Vec::new(),
                            now,
                        );
                        let (id, inserted) =
                            self.store_blueprint(&record, &child.exchange).await?;
                        created += usize::from(inserted);
                        id
                    }
                },
                PayloadKind::BlueprintBook => match self.lookup_book_by_hash(&child.hash).await? {
                    Some(existing) => existing.id,
                    None => {
                        let subtree = child
                            .children
                            .unwrap_or_default()
                            .map_ids(&mut |id: &RecordId| remap(&final_ids, id));
                        let record = book_record(
                            RecordId::generate(),
                            child.hash,
                            &child.payload,
                            subtree,
                            now,
                        );
                        let (id, inserted) = self.store_book(&record, &child.exchange).await?;
                        created += usize::from(inserted);
                        id
                    }
                },
            };
            final_ids.insert(child.provisional, id);
        }

        let tree = tree.map_ids(&mut |id: &RecordId| remap(&final_ids, id));
        tracing::debug!(nodes = tree.node_count(), created, "resolved book children");
        Ok((tree, created))
    }

    /// Insert a blueprint, or find the one that won the hash.
    ///
    /// Returns the id to link to and whether `record` itself was stored.
    async fn store_blueprint(
        &self,
        record: &Blueprint,
        exchange: &str,
    ) -> Result<(RecordId, bool)> {
        match self.store.insert_blueprint(record, exchange).await? {
            InsertResult::Inserted => Ok((record.id.clone(), true)),
            InsertResult::AlreadyExists => {
                let existing = self
                    .lookup_blueprint_by_hash(&record.blueprint_hash)
                    .await?
                    .ok_or_else(|| invisible_record("blueprint", &record.blueprint_hash))?;
                tracing::debug!(
                    id = %existing.id,
                    hash = %record.blueprint_hash,
                    "reused concurrent blueprint"
                );
                Ok((existing.id, false))
            }
        }
    }

    /// Insert a book, or find the one that won the hash.
    async fn store_book(
        &self,
        record: &BlueprintBook,
        exchange: &str,
    ) -> Result<(RecordId, bool)> {
        match self.store.insert_blueprint_book(record, exchange).await? {
            InsertResult::Inserted => Ok((record.id.clone(), true)),
            InsertResult::AlreadyExists => {
                let existing = self
                    .lookup_book_by_hash(&record.blueprint_hash)
                    .await?
                    .ok_or_else(|| invisible_record("book", &record.blueprint_hash))?;
                tracing::debug!(
                    id = %existing.id,
                    hash = %record.blueprint_hash,
                    "reused concurrent book"
                );
                Ok((existing.id, false))
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolve a page view: the page, its target, and the selected entity.
    pub async fn resolve_selection(
        &self,
        page_id: &RecordId,
        query: &SelectionQuery,
    ) -> Result<Resolution> {
        SelectionResolver::new(self.store.as_ref(), &self.config.selection)
            .resolve(page_id, query)
            .await
    }

    /// The stored exchange string for a content hash.
    pub async fn exchange_string(&self, hash: &ContentHash) -> Result<String> {
        let store = self.store.as_ref();
        with_retries("exchange string", self.config.selection.lookup_retries, move || {
            store.get_blueprint_string(hash)
        })
        .await?
        .map(|s| s.exchange_string)
        .ok_or_else(|| ExchangeError::NotFound(format!("exchange string {}", hash)))
    }

    /// Fetch and decode the exchange string of a selected entity.
    pub async fn decode_selected(&self, selected: &Selected) -> Result<DecodedPayload> {
        let exchange = self.exchange_string(selected.blueprint_hash()).await?;
        Ok(decode(&exchange)?)
    }

    /// Rebuild a book's tree by following stored book records.
    ///
    /// Fails with [`ExchangeError::CyclicTree`] if a stored book reaches
    /// itself.
    pub async fn expand_linked_tree(&self, book_id: &RecordId) -> Result<ChildTree> {
        linked::expand_linked_tree(
            self.store.as_ref(),
            book_id,
            self.config.selection.lookup_retries,
        )
        .await
    }

    /// Most recently updated pages, newest first. `page` is 1-based.
    pub async fn recent_pages(
        &self,
        page: u32,
        per_page: u32,
        query: Option<&str>,
    ) -> Result<PageListing> {
        let query = query.map(str::trim).filter(|q| !q.is_empty());
        Ok(self.store.recent_blueprint_pages(page, per_page, query).await?)
    }

    async fn lookup_blueprint_by_hash(&self, hash: &ContentHash) -> Result<Option<Blueprint>> {
        let store = self.store.as_ref();
        Ok(with_retries("blueprint by hash", self.config.selection.lookup_retries, move || {
            store.get_blueprint_by_hash(hash)
        })
        .await?)
    }

    async fn lookup_book_by_hash(&self, hash: &ContentHash) -> Result<Option<BlueprintBook>> {
        let store = self.store.as_ref();
        Ok(with_retries("book by hash", self.config.selection.lookup_retries, move || {
            store.get_blueprint_book_by_hash(hash)
        })
        .await?)
    }
}

/// The store refused a record as a duplicate but cannot show the original.
fn invisible_record(kind: &str, hash: &ContentHash) -> ExchangeError {
    StoreError::Unavailable(format!("{} {} exists but is not visible yet", kind, hash)).into()
}

fn remap(final_ids: &HashMap<RecordId, RecordId>, id: &RecordId) -> RecordId {
    final_ids.get(id).cloned().unwrap_or_else(|| id.clone())
}

fn blueprint_record(
    id: RecordId,
    hash: ContentHash,
    payload: &DecodedPayload,
    tags: Vec<String>,
    now: i64,
) -> Blueprint {
    Blueprint {
        id,
        label: payload.label().unwrap_or_default().to_owned(),
        description: payload.description().map(str::to_owned),
        game_version: payload.game_version(),
        blueprint_hash: hash,
        image_hash: hash,
        tags,
        factorioprints_id: None,
        created_at: now,
        updated_at: now,
    }
}

fn book_record(
    id: RecordId,
    hash: ContentHash,
    payload: &DecodedPayload,
    child_tree: ChildTree,
    now: i64,
) -> BlueprintBook {
    BlueprintBook {
        id,
        label: payload.label().unwrap_or_default().to_owned(),
        description: payload.description().map(str::to_owned),
        child_tree,
        blueprint_hash: hash,
        is_modded: false,
        factorioprints_id: None,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blueprint_exchange_core::ChildNode;
    use blueprint_exchange_store::MemoryStore;
    use blueprint_exchange_testkit::StaleReadStore;

    const BELT: &str = "0eNp1jsEOgjAMht+l52kAUXBHX8MYM7QxTUa3bMVAyN5dBh68eGr7p9+Xf4bODugDsYCeAVlICCPo6/eY7jz0HQbQpQI2PYIGCYajd0F2HVoBBd7FBXOcFSPoYn9UMK0zpZsCejjelMRPHFdVpBcbm4F/Upl8zkmwh02TN/1TWIE1y/OSXTbkjSGuNaq2rJtz1dRtdTi1RUof6dpMPw==";
    const BOOK: &str = "0eNrNj0EOgjAQRe8y62oAUbA79BjGEKqzaISWtIVImt7dUky6wYSlq/bPzH8z3wJrB+wVF6ZmUr6AWmgeho9Yc/HEN9CExBEN9GajnIdRGG44Lp0gploMHUMFNCUgmg6BAhcalfE1Ar3U3iDFbJ7x+yOBKbzO3Qlwg503xB0E2oZh62uV/4+odDBnZZoX56zIy+xwKhPnnd97HbErof4kw3VjhhXKLkSJqMsmVLoJtcifNPcBKhixug==";

    fn exchange() -> Exchange<MemoryStore> {
        Exchange::new(MemoryStore::new(), ExchangeConfig::default())
    }

    #[tokio::test]
    async fn test_import_blueprint() {
        let exchange = exchange();
        let result = exchange
            .import(BELT, PageInfo::new("My belt").tags(["/belts/"]))
            .await
            .unwrap();

        assert!(result.created);
        assert_eq!(result.hash.to_hex(), "171af11311e028eda8bdbadefab7782bcddb667d");
        assert_eq!(result.page.title, "My belt");
        assert_eq!(result.page.tags, vec!["/belts/".to_string()]);

        let PageTarget::Blueprint(id) = &result.target else {
            panic!("expected a blueprint target");
        };
        let blueprint = exchange.store().get_blueprint(id).await.unwrap().unwrap();
        assert_eq!(blueprint.label, "Belt");
        assert_eq!(blueprint.image_hash, blueprint.blueprint_hash);
        assert_eq!(blueprint.game_version.as_deref(), Some("1.1.48.0"));

        assert_eq!(exchange.exchange_string(&result.hash).await.unwrap(), BELT);
    }

    #[tokio::test]
    async fn test_import_reuses_existing_target() {
        let exchange = exchange();
        let first = exchange.import(BELT, PageInfo::new("one")).await.unwrap();
        let second = exchange.import(BELT, PageInfo::new("two")).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.target, second.target);
        assert_ne!(first.page.id, second.page.id);
        assert_eq!(exchange.store().record_counts(), (1, 0, 2));
    }

    #[tokio::test]
    async fn test_import_book_creates_children() {
        let exchange = exchange();
        let result = exchange.import(BOOK, PageInfo::default()).await.unwrap();

        // Title falls back to the book's label.
        assert_eq!(result.page.title, "Book");
        assert_eq!(result.children_created, 3);
        assert_eq!(exchange.store().record_counts(), (2, 2, 1));

        let PageTarget::BlueprintBook(id) = &result.target else {
            panic!("expected a book target");
        };
        let book = exchange.store().get_blueprint_book(id).await.unwrap().unwrap();
        let names: Vec<_> = book.child_tree.iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["A", "B"]);

        // Every node id is a stored record of the right kind.
        let nested = &book.child_tree.0[1];
        let ChildNode::BlueprintBook { id: nested_id, children, .. } = nested else {
            panic!("second child should be a book");
        };
        let stored_nested = exchange
            .store()
            .get_blueprint_book(nested_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&stored_nested.child_tree, children);
        let c = exchange
            .store()
            .get_blueprint(children.0[0].id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(c.label, "C");

        // Stored links expand to the same tree.
        let expanded = exchange.expand_linked_tree(id).await.unwrap();
        assert_eq!(expanded, book.child_tree);
    }

    #[tokio::test]
    async fn test_import_then_select_child() {
        let exchange = exchange();
        let result = exchange.import(BOOK, PageInfo::new("book")).await.unwrap();
        let PageTarget::BlueprintBook(book_id) = &result.target else {
            panic!("expected a book target");
        };
        let book = exchange
            .store()
            .get_blueprint_book(book_id)
            .await
            .unwrap()
            .unwrap();
        let first = book.child_tree.0[0].id().clone();

        let resolution = exchange
            .resolve_selection(&result.page.id, &SelectionQuery::blueprint(first.clone()))
            .await
            .unwrap();
        assert_eq!(resolution.selected.id(), &first);

        let payload = exchange.decode_selected(&resolution.selected).await.unwrap();
        assert_eq!(payload.kind(), PayloadKind::Blueprint);
        assert_eq!(payload.label(), Some("A"));
    }

    #[tokio::test]
    async fn test_import_rejects_bad_strings() {
        let exchange = exchange();
        let err = exchange
            .import("1abc", PageInfo::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::Core(CoreError::UnsupportedVersion('1'))
        ));
        assert_eq!(exchange.store().record_counts(), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_unknown_string_is_not_found() {
        let exchange = exchange();
        let err = exchange
            .exchange_string(&ContentHash::compute(b"0missing"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_recent_pages_trims_query() {
        let exchange = exchange();
        exchange.import(BELT, PageInfo::new("Belt line")).await.unwrap();
        exchange.import(BOOK, PageInfo::new("Book of things")).await.unwrap();

        let all = exchange.recent_pages(1, 10, Some("   ")).await.unwrap();
        assert_eq!(all.count, 2);

        let belts = exchange.recent_pages(1, 10, Some(" belt ")).await.unwrap();
        assert_eq!(belts.count, 1);
        assert_eq!(belts.rows[0].title, "Belt line");
    }
    #[tokio::test]
    async fn test_concurrent_blueprint_import_converges() {
        let exchange = Exchange::new(
            StaleReadStore::new(MemoryStore::new()),
            ExchangeConfig::default(),
        );
        let first = exchange.import(BELT, PageInfo::new("one")).await.unwrap();

        // The second importer misses the first one's record and tries to
        // insert its own.
        exchange.store().hide_hash_lookups(1);
        let second = exchange.import(BELT, PageInfo::new("two")).await.unwrap();

        assert!(!second.created);
        assert_eq!(second.target, first.target);
        assert_eq!(exchange.store().inner().record_counts(), (1, 0, 2));
    }

    #[tokio::test]
    async fn test_concurrent_book_import_converges() {
        let exchange = Exchange::new(
            StaleReadStore::new(MemoryStore::new()),
            ExchangeConfig::default(),
        );
        let first = exchange.import(BOOK, PageInfo::new("one")).await.unwrap();

        exchange.store().hide_hash_lookups(1);
        let second = exchange.import(BOOK, PageInfo::new("two")).await.unwrap();

        assert!(!second.created);
        assert_eq!(second.children_created, 0);
        assert_eq!(second.target, first.target);
        assert_eq!(exchange.store().inner().record_counts(), (2, 2, 2));
    }

    #[tokio::test]
    async fn test_import_keeps_listing_id_and_timestamps() {
        let exchange = exchange();
        let info = PageInfo::new("Migrated")
            .factorioprints_id("-KnQ865j-qQ21WoUPbd3")
            .timestamps(1_500_000_000, 1_500_000_500);
        let result = exchange.import(BELT, info).await.unwrap();

        assert_eq!(result.page.created_at, 1_500_000_000);
        assert_eq!(result.page.updated_at, 1_500_000_500);
        assert_eq!(
            result.page.factorioprints_id.as_deref(),
            Some("-KnQ865j-qQ21WoUPbd3")
        );

        let found = exchange
            .store()
            .get_blueprint_page_by_factorioprints_id("-KnQ865j-qQ21WoUPbd3")
            .await
            .unwrap();
        assert_eq!(found, Some(result.page.clone()));

        let blueprint = exchange
            .store()
            .get_blueprint(result.target.id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            blueprint.factorioprints_id.as_deref(),
            Some("-KnQ865j-qQ21WoUPbd3")
        );

        let string = exchange
            .store()
            .get_blueprint_string(&result.hash)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(string.blueprint_id.as_ref(), Some(result.target.id()));
        assert_eq!(string.version, 1);
    }

    #[tokio::test]
    async fn test_listing_id_imports_once() {
        let exchange = exchange();
        exchange
            .import(BELT, PageInfo::new("one").factorioprints_id("fp-1"))
            .await
            .unwrap();

        let err = exchange
            .import(BOOK, PageInfo::new("two").factorioprints_id("fp-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::AlreadyImported(ref id) if id == "fp-1"));
        assert!(!err.is_not_found());
        // Rejected before any record was written.
        assert_eq!(exchange.store().record_counts(), (1, 0, 1));
    }
}
