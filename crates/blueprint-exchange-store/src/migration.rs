//! Database schema migrations for SQLite.
//!
//! Each migration moves the schema from version N to N+1. Applied versions are
//! recorded in `schema_migrations`.

use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::records::now_secs;

/// Current schema version.
pub const CURRENT_VERSION: u32 = 2;

/// Initialize or migrate the database schema.
///
/// Idempotent: running it against an up-to-date database does nothing.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database is at schema version {}, newer than supported {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_secs()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "migrated schema");
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        2 => apply_v2(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Raw exchange strings, keyed by SHA-1 hex of the string
        CREATE TABLE blueprint_strings (
            blueprint_hash TEXT PRIMARY KEY,
            exchange_string TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE blueprints (
            id TEXT PRIMARY KEY,
            label TEXT NOT NULL,
            description TEXT,
            game_version TEXT,
            blueprint_hash TEXT NOT NULL REFERENCES blueprint_strings(blueprint_hash),
            image_hash TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]',   -- JSON array of strings
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE blueprint_books (
            id TEXT PRIMARY KEY,
            label TEXT NOT NULL,
            description TEXT,
            child_tree TEXT NOT NULL,          -- JSON ChildTree
            blueprint_hash TEXT NOT NULL REFERENCES blueprint_strings(blueprint_hash),
            is_modded INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE blueprint_pages (
            id TEXT PRIMARY KEY,
            blueprint_id TEXT REFERENCES blueprints(id),
            blueprint_book_id TEXT REFERENCES blueprint_books(id),
            title TEXT NOT NULL,
            description_markdown TEXT NOT NULL DEFAULT '',
            tags TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,

            CHECK ((blueprint_id IS NULL) <> (blueprint_book_id IS NULL))
        );

        CREATE INDEX idx_blueprints_hash ON blueprints(blueprint_hash);
        CREATE INDEX idx_blueprint_books_hash ON blueprint_books(blueprint_hash);
        CREATE INDEX idx_blueprint_pages_updated ON blueprint_pages(updated_at);
        "#,
    )?;

    Ok(())
}

/// Migration v2: external listing ids, string ownership and revisions, and
/// one blueprint or book per content hash.
fn apply_v2(conn: &Connection) -> Result<()> {
    for table in ["blueprints", "blueprint_books"] {
        let duplicates: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM (
                    SELECT blueprint_hash FROM {} GROUP BY blueprint_hash HAVING COUNT(*) > 1
                )",
                table
            ),
            [],
            |row| row.get(0),
        )?;
        if duplicates > 0 {
            return Err(StoreError::Migration(format!(
                "{} has {} content hashes shared by several records",
                table, duplicates
            )));
        }
    }

    conn.execute_batch(
        r#"
        ALTER TABLE blueprints ADD COLUMN factorioprints_id TEXT;
        ALTER TABLE blueprint_books ADD COLUMN factorioprints_id TEXT;
        ALTER TABLE blueprint_pages ADD COLUMN factorioprints_id TEXT;

        ALTER TABLE blueprint_strings ADD COLUMN blueprint_id TEXT;
        ALTER TABLE blueprint_strings ADD COLUMN version INTEGER NOT NULL DEFAULT 1;
        ALTER TABLE blueprint_strings ADD COLUMN changes_markdown TEXT NOT NULL DEFAULT '';

        UPDATE blueprint_strings SET blueprint_id = (
            SELECT id FROM blueprints
            WHERE blueprints.blueprint_hash = blueprint_strings.blueprint_hash
        );

        DROP INDEX idx_blueprints_hash;
        DROP INDEX idx_blueprint_books_hash;
        CREATE UNIQUE INDEX idx_blueprints_hash ON blueprints(blueprint_hash);
        CREATE UNIQUE INDEX idx_blueprint_books_hash ON blueprint_books(blueprint_hash);

        CREATE UNIQUE INDEX idx_blueprint_pages_factorioprints
            ON blueprint_pages(factorioprints_id) WHERE factorioprints_id IS NOT NULL;
        CREATE INDEX idx_blueprint_strings_owner ON blueprint_strings(blueprint_id, version);
        "#,
    )?;

    Ok(())
}
