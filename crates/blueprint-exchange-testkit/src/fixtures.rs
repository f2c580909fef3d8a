//! Test fixtures and helpers.
//!
//! Payload builders, a pre-seeded store, and store wrappers that inject
//! lookup faults or stale reads.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use blueprint_exchange_core::{
    encode, hash, ChildNode, ChildTree, ContentHash, CoreError, DecodedPayload, PayloadKind,
    RecordId,
};
use blueprint_exchange_store::{
    Blueprint, BlueprintBook, BlueprintPage, BlueprintString, InsertResult, MemoryStore,
    PageListing, PageTarget, RecordStore, Result as StoreResult, StoreError,
};

/// Game version 1.1.48.0, packed.
pub const GAME_VERSION: u64 = 281479274823680;

/// A blueprint payload with a single inserter.
pub fn sample_blueprint(label: &str) -> DecodedPayload {
    let body = json!({
        "item": "blueprint",
        "label": label,
        "entities": [
            {"entity_number": 1, "name": "inserter", "position": {"x": 0.5, "y": 0.5}}
        ],
        "version": GAME_VERSION,
    });
    DecodedPayload::new(PayloadKind::Blueprint, into_map(body))
}

/// A book payload holding `children` in order.
pub fn sample_book(label: &str, children: Vec<DecodedPayload>) -> DecodedPayload {
    let entries: Vec<Value> = children
        .into_iter()
        .enumerate()
        .map(|(index, child)| {
            let mut entry = Map::new();
            entry.insert("index".into(), json!(index));
            entry.insert(child.kind().as_str().into(), Value::Object(child.body().clone()));
            Value::Object(entry)
        })
        .collect();

    let body = json!({
        "item": "blueprint-book",
        "label": label,
        "active_index": 0,
        "blueprints": entries,
        "version": GAME_VERSION,
    });
    DecodedPayload::new(PayloadKind::BlueprintBook, into_map(body))
}

/// Encode a fixture payload.
pub fn exchange_string(payload: &DecodedPayload) -> Result<String, CoreError> {
    encode(payload)
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// A memory store holding one blueprint page and one book page.
///
/// The book `book` contains blueprint `blueprint` and nothing else.
pub struct SeededStore {
    pub store: MemoryStore,
    pub blueprint: Blueprint,
    pub book: BlueprintBook,
    pub blueprint_page: BlueprintPage,
    pub book_page: BlueprintPage,
}

/// Build a [`SeededStore`].
pub async fn seeded_store() -> Result<SeededStore, StoreError> {
    let encoding_failed = |e: CoreError| StoreError::InvalidData(e.to_string());

    let blueprint_string =
        exchange_string(&sample_blueprint("Inserter")).map_err(encoding_failed)?;
    let blueprint_hash = hash(blueprint_string.as_bytes());
    let blueprint = Blueprint {
        id: RecordId::new("bp-inserter"),
        label: "Inserter".into(),
        description: None,
        game_version: Some("1.1.48.0".into()),
        blueprint_hash,
        image_hash: blueprint_hash,
        tags: vec!["/inserters/".into()],
        factorioprints_id: None,
        created_at: 1_600_000_000,
        updated_at: 1_600_000_000,
    };

    let book_string = exchange_string(&sample_book("Kit", vec![sample_blueprint("Inserter")]))
        .map_err(encoding_failed)?;
    let book = BlueprintBook {
        id: RecordId::new("book-kit"),
        label: "Kit".into(),
        description: None,
        child_tree: ChildTree::from(vec![ChildNode::Blueprint {
            id: blueprint.id.clone(),
            name: blueprint.label.clone(),
        }]),
        blueprint_hash: hash(book_string.as_bytes()),
        is_modded: false,
        factorioprints_id: None,
        created_at: 1_600_000_000,
        updated_at: 1_600_000_000,
    };

    let store = MemoryStore::new();
    store.insert_blueprint(&blueprint, &blueprint_string).await?;
    store.insert_blueprint_book(&book, &book_string).await?;

    let blueprint_page = BlueprintPage::new(
        PageTarget::Blueprint(blueprint.id.clone()),
        "Inserter",
        "A single inserter.",
    );
    let book_page = BlueprintPage::new(PageTarget::BlueprintBook(book.id.clone()), "Kit", "");
    store.insert_blueprint_page(&blueprint_page).await?;
    store.insert_blueprint_page(&book_page).await?;

    Ok(SeededStore {
        store,
        blueprint,
        book,
        blueprint_page,
        book_page,
    })
}

/// Wraps a store and fails its first `failures` lookups with
/// [`StoreError::Unavailable`]. Inserts and listings pass through.
pub struct FlakyStore<S> {
    inner: S,
    failures: u32,
    lookups: AtomicU32,
}

impl<S> FlakyStore<S> {
    pub fn new(inner: S, failures: u32) -> Self {
        Self {
            inner,
            failures,
            lookups: AtomicU32::new(0),
        }
    }

    /// Lookups attempted so far, failed ones included.
    pub fn lookups(&self) -> u32 {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn attempt(&self) -> StoreResult<()> {
        let n = self.lookups.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(StoreError::Unavailable(format!("injected failure {}", n + 1)));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for FlakyStore<S> {
    async fn get_blueprint(&self, id: &RecordId) -> StoreResult<Option<Blueprint>> {
        self.attempt()?;
        self.inner.get_blueprint(id).await
    }

    async fn get_blueprint_book(&self, id: &RecordId) -> StoreResult<Option<BlueprintBook>> {
        self.attempt()?;
        self.inner.get_blueprint_book(id).await
    }

    async fn get_blueprint_page(&self, id: &RecordId) -> StoreResult<Option<BlueprintPage>> {
        self.attempt()?;
        self.inner.get_blueprint_page(id).await
    }

    async fn get_blueprint_page_by_factorioprints_id(
        &self,
        factorioprints_id: &str,
    ) -> StoreResult<Option<BlueprintPage>> {
        self.attempt()?;
        self.inner
            .get_blueprint_page_by_factorioprints_id(factorioprints_id)
            .await
    }

    async fn get_blueprint_by_hash(&self, hash: &ContentHash) -> StoreResult<Option<Blueprint>> {
        self.attempt()?;
        self.inner.get_blueprint_by_hash(hash).await
    }

    async fn get_blueprint_book_by_hash(
        &self,
        hash: &ContentHash,
    ) -> StoreResult<Option<BlueprintBook>> {
        self.attempt()?;
        self.inner.get_blueprint_book_by_hash(hash).await
    }

    async fn get_blueprint_string(
        &self,
        hash: &ContentHash,
    ) -> StoreResult<Option<BlueprintString>> {
        self.attempt()?;
        self.inner.get_blueprint_string(hash).await
    }

    async fn insert_blueprint(
        &self,
        blueprint: &Blueprint,
        exchange: &str,
    ) -> StoreResult<InsertResult> {
        self.inner.insert_blueprint(blueprint, exchange).await
    }

    async fn insert_blueprint_book(
        &self,
        book: &BlueprintBook,
        exchange: &str,
    ) -> StoreResult<InsertResult> {
        self.inner.insert_blueprint_book(book, exchange).await
    }

    async fn insert_blueprint_page(&self, page: &BlueprintPage) -> StoreResult<InsertResult> {
        self.inner.insert_blueprint_page(page).await
    }

    async fn recent_blueprint_pages(
        &self,
        page: u32,
        per_page: u32,
        query: Option<&str>,
    ) -> StoreResult<PageListing> {
        self.inner.recent_blueprint_pages(page, per_page, query).await
    }
}

/// Wraps a store and answers the next `n` content-hash lookups with
/// `Ok(None)`, as if another writer's records were not visible yet.
/// Everything else passes through.
pub struct StaleReadStore<S> {
    inner: S,
    hidden: AtomicU32,
}

impl<S> StaleReadStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            hidden: AtomicU32::new(0),
        }
    }

    /// Hide the next `n` content-hash lookups.
    pub fn hide_hash_lookups(&self, n: u32) {
        self.hidden.store(n, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn hide(&self) -> bool {
        self.hidden
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for StaleReadStore<S> {
    async fn get_blueprint(&self, id: &RecordId) -> StoreResult<Option<Blueprint>> {
        self.inner.get_blueprint(id).await
    }

    async fn get_blueprint_book(&self, id: &RecordId) -> StoreResult<Option<BlueprintBook>> {
        self.inner.get_blueprint_book(id).await
    }

    async fn get_blueprint_page(&self, id: &RecordId) -> StoreResult<Option<BlueprintPage>> {
        self.inner.get_blueprint_page(id).await
    }

    async fn get_blueprint_page_by_factorioprints_id(
        &self,
        factorioprints_id: &str,
    ) -> StoreResult<Option<BlueprintPage>> {
        self.inner
            .get_blueprint_page_by_factorioprints_id(factorioprints_id)
            .await
    }

    async fn get_blueprint_by_hash(&self, hash: &ContentHash) -> StoreResult<Option<Blueprint>> {
        if self.hide() {
            return Ok(None);
        }
        self.inner.get_blueprint_by_hash(hash).await
    }

    async fn get_blueprint_book_by_hash(
        &self,
        hash: &ContentHash,
    ) -> StoreResult<Option<BlueprintBook>> {
        if self.hide() {
            return Ok(None);
        }
        self.inner.get_blueprint_book_by_hash(hash).await
    }

    async fn get_blueprint_string(
        &self,
        hash: &ContentHash,
    ) -> StoreResult<Option<BlueprintString>> {
        self.inner.get_blueprint_string(hash).await
    }

    async fn insert_blueprint(
        &self,
        blueprint: &Blueprint,
        exchange: &str,
    ) -> StoreResult<InsertResult> {
        self.inner.insert_blueprint(blueprint, exchange).await
    }

    async fn insert_blueprint_book(
        &self,
        book: &BlueprintBook,
        exchange: &str,
    ) -> StoreResult<InsertResult> {
        self.inner.insert_blueprint_book(book, exchange).await
    }

    async fn insert_blueprint_page(&self, page: &BlueprintPage) -> StoreResult<InsertResult> {
        self.inner.insert_blueprint_page(page).await
    }

    async fn recent_blueprint_pages(
        &self,
        page: u32,
        per_page: u32,
        query: Option<&str>,
    ) -> StoreResult<PageListing> {
        self.inner.recent_blueprint_pages(page, per_page, query).await
    }
}
