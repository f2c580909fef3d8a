//! In-memory implementation of the RecordStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use blueprint_exchange_core::{ContentHash, RecordId};

use crate::error::{Result, StoreError};
use crate::records::{
    check_string_hash, now_secs, require_target, Blueprint, BlueprintBook, BlueprintPage,
    BlueprintString, PageListing, PageTarget,
};
use crate::traits::{InsertResult, RecordStore};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    blueprints: HashMap<RecordId, Blueprint>,
    books: HashMap<RecordId, BlueprintBook>,
    pages: HashMap<RecordId, BlueprintPage>,

    /// Raw exchange strings by content hash.
    strings: HashMap<ContentHash, BlueprintString>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    /// Number of records of every kind, for test assertions.
    pub fn record_counts(&self) -> (usize, usize, usize) {
        let inner = self.inner.read().unwrap();
        (inner.blueprints.len(), inner.books.len(), inner.pages.len())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreInner {
    fn store_string(&mut self, hash: &ContentHash, exchange: &str, owner: Option<&RecordId>) {
        self.strings
            .entry(*hash)
            .or_insert_with(|| BlueprintString {
                blueprint_hash: *hash,
                exchange_string: exchange.to_owned(),
                blueprint_id: owner.cloned(),
                version: 1,
                changes_markdown: String::new(),
                created_at: now_secs(),
            });
    }
}

/// Earliest record first, ties broken by id.
fn earliest<'a, T: 'a>(
    records: impl Iterator<Item = &'a T>,
    key: impl Fn(&T) -> (i64, &RecordId),
) -> Option<&'a T> {
    records.min_by(|a, b| key(*a).cmp(&key(*b)))
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_blueprint(&self, id: &RecordId) -> Result<Option<Blueprint>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.blueprints.get(id).cloned())
    }

    async fn get_blueprint_book(&self, id: &RecordId) -> Result<Option<BlueprintBook>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.books.get(id).cloned())
    }

    async fn get_blueprint_page(&self, id: &RecordId) -> Result<Option<BlueprintPage>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.pages.get(id).cloned())
    }

    async fn get_blueprint_page_by_factorioprints_id(
        &self,
        factorioprints_id: &str,
    ) -> Result<Option<BlueprintPage>> {
        let inner = self.inner.read().unwrap();
        Ok(earliest(
            inner
                .pages
                .values()
                .filter(|p| p.factorioprints_id.as_deref() == Some(factorioprints_id)),
            |p| (p.created_at, &p.id),
        )
        .cloned())
    }

    async fn get_blueprint_by_hash(&self, hash: &ContentHash) -> Result<Option<Blueprint>> {
        let inner = self.inner.read().unwrap();
        Ok(earliest(
            inner.blueprints.values().filter(|b| &b.blueprint_hash == hash),
            |b| (b.created_at, &b.id),
        )
        .cloned())
    }

    async fn get_blueprint_book_by_hash(
        &self,
        hash: &ContentHash,
    ) -> Result<Option<BlueprintBook>> {
        let inner = self.inner.read().unwrap();
        Ok(earliest(
            inner.books.values().filter(|b| &b.blueprint_hash == hash),
            |b| (b.created_at, &b.id),
        )
        .cloned())
    }

    async fn get_blueprint_string(&self, hash: &ContentHash) -> Result<Option<BlueprintString>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.strings.get(hash).cloned())
    }

    async fn insert_blueprint(
        &self,
        blueprint: &Blueprint,
        exchange: &str,
    ) -> Result<InsertResult> {
        check_string_hash(&blueprint.blueprint_hash, exchange)?;
        let mut inner = self.inner.write().unwrap();

        let taken = inner.blueprints.contains_key(&blueprint.id)
            || inner
                .blueprints
                .values()
                .any(|b| b.blueprint_hash == blueprint.blueprint_hash);
        if taken {
            return Ok(InsertResult::AlreadyExists);
        }

        inner.store_string(&blueprint.blueprint_hash, exchange, Some(&blueprint.id));
        inner
            .blueprints
            .insert(blueprint.id.clone(), blueprint.clone());
        Ok(InsertResult::Inserted)
    }

    async fn insert_blueprint_book(
        &self,
        book: &BlueprintBook,
        exchange: &str,
    ) -> Result<InsertResult> {
        check_string_hash(&book.blueprint_hash, exchange)?;
        let mut inner = self.inner.write().unwrap();

        let taken = inner.books.contains_key(&book.id)
            || inner
                .books
                .values()
                .any(|b| b.blueprint_hash == book.blueprint_hash);
        if taken {
            return Ok(InsertResult::AlreadyExists);
        }

        inner.store_string(&book.blueprint_hash, exchange, None);
        inner.books.insert(book.id.clone(), book.clone());
        Ok(InsertResult::Inserted)
    }

    async fn insert_blueprint_page(&self, page: &BlueprintPage) -> Result<InsertResult> {
        let target = require_target(page)?;
        let mut inner = self.inner.write().unwrap();

        let taken = inner.pages.contains_key(&page.id)
            || page.factorioprints_id.is_some()
                && inner
                    .pages
                    .values()
                    .any(|p| p.factorioprints_id == page.factorioprints_id);
        if taken {
            return Ok(InsertResult::AlreadyExists);
        }

        let exists = match &target {
            PageTarget::Blueprint(id) => inner.blueprints.contains_key(id),
            PageTarget::BlueprintBook(id) => inner.books.contains_key(id),
        };
        if !exists {
            return Err(StoreError::MissingTarget {
                kind: target.kind().to_string(),
                id: target.id().to_string(),
            });
        }

        inner.pages.insert(page.id.clone(), page.clone());
        Ok(InsertResult::Inserted)
    }

    async fn recent_blueprint_pages(
        &self,
        page: u32,
        per_page: u32,
        query: Option<&str>,
    ) -> Result<PageListing> {
        let inner = self.inner.read().unwrap();
        let needle = query.map(str::to_ascii_lowercase);

        let mut matching: Vec<&BlueprintPage> = inner
            .pages
            .values()
            .filter(|p| match &needle {
                Some(needle) => p.title.to_ascii_lowercase().contains(needle.as_str()),
                None => true,
            })
            .collect();
        matching.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let offset = page.saturating_sub(1) as usize * per_page as usize;
        Ok(PageListing {
            count: matching.len() as u64,
            rows: matching
                .into_iter()
                .skip(offset)
                .take(per_page as usize)
                .cloned()
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blueprint_exchange_core::ChildTree;

    const EXCHANGE: &str = "0eNqrVkrKKEnNLVayUkpKLCoqzSvJzM1RUkp6e3JmXklRfGpycp5SrQAA";

    fn make_blueprint(id: &str) -> Blueprint {
        let hash = ContentHash::compute(EXCHANGE.as_bytes());
        Blueprint {
            id: RecordId::new(id),
            label: "Test".into(),
            description: None,
            game_version: None,
            blueprint_hash: hash,
            image_hash: hash,
            tags: vec![],
            factorioprints_id: None,
            created_at: 100,
            updated_at: 100,
        }
    }

    fn make_page(id: &str, title: &str, target: PageTarget, updated_at: i64) -> BlueprintPage {
        let mut page = BlueprintPage::new(target, title, "");
        page.id = RecordId::new(id);
        page.updated_at = updated_at;
        page
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::new();
        let bp = make_blueprint("bp1");

        let result = store.insert_blueprint(&bp, EXCHANGE).await.unwrap();
        assert_eq!(result, InsertResult::Inserted);

        let fetched = store.get_blueprint(&bp.id).await.unwrap().unwrap();
        assert_eq!(fetched, bp);

        let by_hash = store
            .get_blueprint_by_hash(&bp.blueprint_hash)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_hash.id, bp.id);

        let string = store
            .get_blueprint_string(&bp.blueprint_hash)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(string.exchange_string, EXCHANGE);

        assert!(store
            .get_blueprint(&RecordId::new("missing"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_memory_store_idempotent() {
        let store = MemoryStore::new();
        let bp = make_blueprint("bp1");

        let r1 = store.insert_blueprint(&bp, EXCHANGE).await.unwrap();
        assert_eq!(r1, InsertResult::Inserted);

        let r2 = store.insert_blueprint(&bp, EXCHANGE).await.unwrap();
        assert_eq!(r2, InsertResult::AlreadyExists);
    }

    #[tokio::test]
    async fn test_second_record_with_same_hash_is_not_written() {
        let store = MemoryStore::new();
        store
            .insert_blueprint(&make_blueprint("bp1"), EXCHANGE)
            .await
            .unwrap();

        let result = store
            .insert_blueprint(&make_blueprint("bp2"), EXCHANGE)
            .await
            .unwrap();
        assert_eq!(result, InsertResult::AlreadyExists);
        assert_eq!(store.record_counts(), (1, 0, 0));
        assert!(store
            .get_blueprint(&RecordId::new("bp2"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_string_records_owner() {
        let store = MemoryStore::new();
        let bp = make_blueprint("bp1");
        store.insert_blueprint(&bp, EXCHANGE).await.unwrap();

        let string = store
            .get_blueprint_string(&bp.blueprint_hash)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(string.blueprint_id, Some(bp.id));
        assert_eq!(string.version, 1);
        assert_eq!(string.changes_markdown, "");
    }

    #[tokio::test]
    async fn test_hash_lookup_breaks_timestamp_ties_by_id() {
        let store = MemoryStore::new();
        {
            let mut inner = store.inner.write().unwrap();
            for id in ["b", "a", "c"] {
                inner.blueprints.insert(RecordId::new(id), make_blueprint(id));
            }
        }

        let hash = ContentHash::compute(EXCHANGE.as_bytes());
        for _ in 0..8 {
            let found = store.get_blueprint_by_hash(&hash).await.unwrap().unwrap();
            assert_eq!(found.id.as_str(), "a");
        }
    }

    #[tokio::test]
    async fn test_factorioprints_id_lookup() {
        let store = MemoryStore::new();
        let bp = make_blueprint("bp1");
        store.insert_blueprint(&bp, EXCHANGE).await.unwrap();
        let target = PageTarget::Blueprint(bp.id.clone());

        let mut page = make_page("p1", "Imported", target.clone(), 1);
        page.factorioprints_id = Some("-KnQ865j-qQ21WoUPbd3".into());
        store.insert_blueprint_page(&page).await.unwrap();

        let found = store
            .get_blueprint_page_by_factorioprints_id("-KnQ865j-qQ21WoUPbd3")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, page.id);
        assert!(store
            .get_blueprint_page_by_factorioprints_id("other")
            .await
            .unwrap()
            .is_none());

        let mut duplicate = make_page("p2", "Again", target.clone(), 2);
        duplicate.factorioprints_id = page.factorioprints_id.clone();
        assert_eq!(
            store.insert_blueprint_page(&duplicate).await.unwrap(),
            InsertResult::AlreadyExists
        );

        // Pages without an external id never collide.
        for id in ["p3", "p4"] {
            let plain = make_page(id, "Plain", target.clone(), 3);
            assert_eq!(
                store.insert_blueprint_page(&plain).await.unwrap(),
                InsertResult::Inserted
            );
        }
        assert_eq!(store.record_counts(), (1, 0, 3));
    }

    #[tokio::test]
    async fn test_rejects_mismatched_string() {
        let store = MemoryStore::new();
        let bp = make_blueprint("bp1");
        let err = store.insert_blueprint(&bp, "0other").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }

    #[tokio::test]
    async fn test_page_requires_existing_target() {
        let store = MemoryStore::new();
        let orphan = make_page("p1", "Orphan", PageTarget::BlueprintBook(RecordId::new("nope")), 1);

        let err = store.insert_blueprint_page(&orphan).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingTarget { .. }));

        let book = BlueprintBook {
            id: RecordId::new("nope"),
            label: "Book".into(),
            description: None,
            child_tree: ChildTree::new(),
            blueprint_hash: ContentHash::compute(EXCHANGE.as_bytes()),
            is_modded: false,
            factorioprints_id: None,
            created_at: 1,
            updated_at: 1,
        };
        store.insert_blueprint_book(&book, EXCHANGE).await.unwrap();
        assert_eq!(
            store.insert_blueprint_page(&orphan).await.unwrap(),
            InsertResult::Inserted
        );
    }

    #[tokio::test]
    async fn test_recent_pages_order_and_filter() {
        let store = MemoryStore::new();
        let bp = make_blueprint("bp1");
        store.insert_blueprint(&bp, EXCHANGE).await.unwrap();

        let target = PageTarget::Blueprint(bp.id.clone());
        for (id, title, at) in [
            ("p1", "Smelter Array", 10),
            ("p2", "Green Circuits", 30),
            ("p3", "smelting column", 20),
        ] {
            let page = make_page(id, title, target.clone(), at);
            store.insert_blueprint_page(&page).await.unwrap();
        }

        let all = store.recent_blueprint_pages(1, 10, None).await.unwrap();
        assert_eq!(all.count, 3);
        let ids: Vec<_> = all.rows.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p3", "p1"]);

        let smelt = store
            .recent_blueprint_pages(1, 10, Some("SMELT"))
            .await
            .unwrap();
        assert_eq!(smelt.count, 2);

        let second = store.recent_blueprint_pages(2, 2, None).await.unwrap();
        assert_eq!(second.count, 3);
        assert_eq!(second.rows.len(), 1);
        assert_eq!(second.rows[0].id.as_str(), "p1");
    }

    proptest::proptest! {
        #[test]
        fn prop_pages_partition_listing(
            stamps in proptest::collection::vec(0i64..5, 0..20),
            per_page in 1u32..7,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = MemoryStore::new();
                let bp = make_blueprint("bp1");
                store.insert_blueprint(&bp, EXCHANGE).await.unwrap();
                let target = PageTarget::Blueprint(bp.id.clone());
                for (i, at) in stamps.iter().enumerate() {
                    let page = make_page(&format!("p{:02}", i), "Page", target.clone(), *at);
                    store.insert_blueprint_page(&page).await.unwrap();
                }

                let mut seen = Vec::new();
                let mut n = 1;
                loop {
                    let listing = store
                        .recent_blueprint_pages(n, per_page, None)
                        .await
                        .unwrap();
                    assert_eq!(listing.count, stamps.len() as u64);
                    if listing.rows.is_empty() {
                        break;
                    }
                    seen.extend(listing.rows.into_iter().map(|p| (p.updated_at, p.id)));
                    n += 1;
                }

                assert_eq!(seen.len(), stamps.len());
                for pair in seen.windows(2) {
                    let (newer, older) = (&pair[0], &pair[1]);
                    assert!(newer.0 > older.0 || (newer.0 == older.0 && newer.1 < older.1));
                }
            });
        }
    }
}
