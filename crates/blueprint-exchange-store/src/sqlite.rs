//! SQLite implementation of the RecordStore trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{ffi, params, Connection, OptionalExtension, Row};

use blueprint_exchange_core::{ChildTree, ContentHash, RecordId};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::records::{
    check_string_hash, now_secs, require_target, Blueprint, BlueprintBook, BlueprintPage,
    BlueprintString, PageListing, PageTarget,
};
use crate::traits::{InsertResult, RecordStore};

const BLUEPRINT_COLUMNS: &str = "id, label, description, game_version, blueprint_hash, image_hash, \
     tags, created_at, updated_at, factorioprints_id";

const BOOK_COLUMNS: &str = "id, label, description, child_tree, blueprint_hash, is_modded, \
     created_at, updated_at, factorioprints_id";

const PAGE_COLUMNS: &str = "id, blueprint_id, blueprint_book_id, title, description_markdown, \
     tags, created_at, updated_at, factorioprints_id";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking thread pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?
    }
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn hash_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<ContentHash> {
    let hex: String = row.get(idx)?;
    ContentHash::from_hex(&hex).map_err(|e| conversion_error(idx, e))
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| conversion_error(idx, e))
}

fn id_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<RecordId>> {
    Ok(row.get::<_, Option<String>>(idx)?.map(RecordId::new))
}

fn row_to_blueprint(row: &Row<'_>) -> rusqlite::Result<Blueprint> {
    Ok(Blueprint {
        id: RecordId::new(row.get::<_, String>(0)?),
        label: row.get(1)?,
        description: row.get(2)?,
        game_version: row.get(3)?,
        blueprint_hash: hash_column(row, 4)?,
        image_hash: hash_column(row, 5)?,
        tags: json_column(row, 6)?,
        factorioprints_id: row.get(9)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn row_to_book(row: &Row<'_>) -> rusqlite::Result<BlueprintBook> {
    Ok(BlueprintBook {
        id: RecordId::new(row.get::<_, String>(0)?),
        label: row.get(1)?,
        description: row.get(2)?,
        child_tree: json_column::<ChildTree>(row, 3)?,
        blueprint_hash: hash_column(row, 4)?,
        is_modded: row.get(5)?,
        factorioprints_id: row.get(8)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn row_to_page(row: &Row<'_>) -> rusqlite::Result<BlueprintPage> {
    Ok(BlueprintPage {
        id: RecordId::new(row.get::<_, String>(0)?),
        blueprint_id: id_column(row, 1)?,
        blueprint_book_id: id_column(row, 2)?,
        title: row.get(3)?,
        description_markdown: row.get(4)?,
        tags: json_column(row, 5)?,
        factorioprints_id: row.get(8)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn insert_string(
    conn: &Connection,
    hash: &ContentHash,
    exchange: &str,
    owner: Option<&RecordId>,
) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO blueprint_strings
             (blueprint_hash, exchange_string, blueprint_id, version, changes_markdown, created_at)
         VALUES (?1, ?2, ?3, 1, '', ?4)",
        params![hash.to_hex(), exchange, owner.map(RecordId::as_str), now_secs()],
    )?;
    Ok(())
}

/// Whether any row of `table` has `value` in `column`.
fn exists(conn: &Connection, table: &str, column: &str, value: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            &format!("SELECT 1 FROM {} WHERE {} = ?1 LIMIT 1", table, column),
            params![value],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Map a unique-key violation to `AlreadyExists`. The checks before each
/// insert cover one process; the indexes cover writers sharing the file.
fn inserted(result: rusqlite::Result<usize>) -> Result<InsertResult> {
    match result {
        Ok(_) => Ok(InsertResult::Inserted),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if matches!(
                e.extended_code,
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            ) =>
        {
            Ok(InsertResult::AlreadyExists)
        }
        Err(e) => Err(e.into()),
    }
}

/// Escape `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'`.
fn escape_like(query: &str) -> String {
    let mut out = String::with_capacity(query.len() + 2);
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn get_blueprint(&self, id: &RecordId) -> Result<Option<Blueprint>> {
        let id = id.clone();
        self.blocking(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM blueprints WHERE id = ?1", BLUEPRINT_COLUMNS),
                params![id.as_str()],
                row_to_blueprint,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get_blueprint_book(&self, id: &RecordId) -> Result<Option<BlueprintBook>> {
        let id = id.clone();
        self.blocking(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM blueprint_books WHERE id = ?1", BOOK_COLUMNS),
                params![id.as_str()],
                row_to_book,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get_blueprint_page(&self, id: &RecordId) -> Result<Option<BlueprintPage>> {
        let id = id.clone();
        self.blocking(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM blueprint_pages WHERE id = ?1", PAGE_COLUMNS),
                params![id.as_str()],
                row_to_page,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get_blueprint_page_by_factorioprints_id(
        &self,
        factorioprints_id: &str,
    ) -> Result<Option<BlueprintPage>> {
        let factorioprints_id = factorioprints_id.to_owned();
        self.blocking(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM blueprint_pages WHERE factorioprints_id = ?1
                     ORDER BY created_at, id LIMIT 1",
                    PAGE_COLUMNS
                ),
                params![factorioprints_id],
                row_to_page,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get_blueprint_by_hash(&self, hash: &ContentHash) -> Result<Option<Blueprint>> {
        let hex = hash.to_hex();
        self.blocking(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM blueprints WHERE blueprint_hash = ?1
                     ORDER BY created_at, id LIMIT 1",
                    BLUEPRINT_COLUMNS
                ),
                params![hex],
                row_to_blueprint,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get_blueprint_book_by_hash(
        &self,
        hash: &ContentHash,
    ) -> Result<Option<BlueprintBook>> {
        let hex = hash.to_hex();
        self.blocking(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM blueprint_books WHERE blueprint_hash = ?1
                     ORDER BY created_at, id LIMIT 1",
                    BOOK_COLUMNS
                ),
                params![hex],
                row_to_book,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get_blueprint_string(&self, hash: &ContentHash) -> Result<Option<BlueprintString>> {
        let hash = *hash;
        self.blocking(move |conn| {
            conn.query_row(
                "SELECT exchange_string, blueprint_id, version, changes_markdown, created_at
                 FROM blueprint_strings WHERE blueprint_hash = ?1",
                params![hash.to_hex()],
                |row| {
                    Ok(BlueprintString {
                        blueprint_hash: hash,
                        exchange_string: row.get(0)?,
                        blueprint_id: id_column(row, 1)?,
                        version: row.get(2)?,
                        changes_markdown: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn insert_blueprint(
        &self,
        blueprint: &Blueprint,
        exchange: &str,
    ) -> Result<InsertResult> {
        check_string_hash(&blueprint.blueprint_hash, exchange)?;
        let blueprint = blueprint.clone();
        let exchange = exchange.to_owned();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;

            let hex = blueprint.blueprint_hash.to_hex();
            if exists(&tx, "blueprints", "id", blueprint.id.as_str())?
                || exists(&tx, "blueprints", "blueprint_hash", &hex)?
            {
                return Ok(InsertResult::AlreadyExists);
            }

            insert_string(&tx, &blueprint.blueprint_hash, &exchange, Some(&blueprint.id))?;
            let result = inserted(tx.execute(
                &format!(
                    "INSERT INTO blueprints ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    BLUEPRINT_COLUMNS
                ),
                params![
                    blueprint.id.as_str(),
                    blueprint.label,
                    blueprint.description,
                    blueprint.game_version,
                    hex,
                    blueprint.image_hash.to_hex(),
                    serde_json::to_string(&blueprint.tags)?,
                    blueprint.created_at,
                    blueprint.updated_at,
                    blueprint.factorioprints_id,
                ],
            ))?;
            if result == InsertResult::AlreadyExists {
                return Ok(result);
            }
            tx.commit()?;

            tracing::debug!(id = %blueprint.id, hash = %blueprint.blueprint_hash, "inserted blueprint");
            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn insert_blueprint_book(
        &self,
        book: &BlueprintBook,
        exchange: &str,
    ) -> Result<InsertResult> {
        check_string_hash(&book.blueprint_hash, exchange)?;
        let book = book.clone();
        let exchange = exchange.to_owned();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;

            let hex = book.blueprint_hash.to_hex();
            if exists(&tx, "blueprint_books", "id", book.id.as_str())?
                || exists(&tx, "blueprint_books", "blueprint_hash", &hex)?
            {
                return Ok(InsertResult::AlreadyExists);
            }

            insert_string(&tx, &book.blueprint_hash, &exchange, None)?;
            let result = inserted(tx.execute(
                &format!(
                    "INSERT INTO blueprint_books ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    BOOK_COLUMNS
                ),
                params![
                    book.id.as_str(),
                    book.label,
                    book.description,
                    serde_json::to_string(&book.child_tree)?,
                    hex,
                    book.is_modded,
                    book.created_at,
                    book.updated_at,
                    book.factorioprints_id,
                ],
            ))?;
            if result == InsertResult::AlreadyExists {
                return Ok(result);
            }
            tx.commit()?;

            tracing::debug!(
                id = %book.id,
                hash = %book.blueprint_hash,
                children = book.child_tree.node_count(),
                "inserted blueprint book"
            );
            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn insert_blueprint_page(&self, page: &BlueprintPage) -> Result<InsertResult> {
        let target = require_target(page)?;
        let page = page.clone();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;

            let external_taken = match &page.factorioprints_id {
                Some(external) => exists(&tx, "blueprint_pages", "factorioprints_id", external)?,
                None => false,
            };
            if external_taken || exists(&tx, "blueprint_pages", "id", page.id.as_str())? {
                return Ok(InsertResult::AlreadyExists);
            }

            let table = match &target {
                PageTarget::Blueprint(_) => "blueprints",
                PageTarget::BlueprintBook(_) => "blueprint_books",
            };
            if !exists(&tx, table, "id", target.id().as_str())? {
                return Err(StoreError::MissingTarget {
                    kind: target.kind().to_string(),
                    id: target.id().to_string(),
                });
            }

            let result = inserted(tx.execute(
                &format!(
                    "INSERT INTO blueprint_pages ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    PAGE_COLUMNS
                ),
                params![
                    page.id.as_str(),
                    page.blueprint_id.as_ref().map(RecordId::as_str),
                    page.blueprint_book_id.as_ref().map(RecordId::as_str),
                    page.title,
                    page.description_markdown,
                    serde_json::to_string(&page.tags)?,
                    page.created_at,
                    page.updated_at,
                    page.factorioprints_id,
                ],
            ))?;
            if result == InsertResult::Inserted {
                tx.commit()?;
            }
            Ok(result)
        })
        .await
    }

    async fn recent_blueprint_pages(
        &self,
        page: u32,
        per_page: u32,
        query: Option<&str>,
    ) -> Result<PageListing> {
        let pattern = query.map(|q| format!("%{}%", escape_like(q)));
        let offset = i64::from(page.saturating_sub(1)) * i64::from(per_page);

        self.blocking(move |conn| {
            let count: i64 = conn.query_row(
                r"SELECT COUNT(*) FROM blueprint_pages
                  WHERE ?1 IS NULL OR title LIKE ?1 ESCAPE '\'",
                params![pattern],
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                r"SELECT {} FROM blueprint_pages
                  WHERE ?1 IS NULL OR title LIKE ?1 ESCAPE '\'
                  ORDER BY updated_at DESC, id ASC
                  LIMIT ?2 OFFSET ?3",
                PAGE_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![pattern, i64::from(per_page), offset], row_to_page)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(PageListing {
                count: count as u64,
                rows,
            })
        })
        .await
    }
}
