//! Table layout of one entity database.
//!
//! ## Tables
//!
//! - `records` - One row per record: primary key plus canonical JSON
//! - `index_entries` - `(index_name, key, record_id)` triples, one per key a
//!   record contributes to a secondary index (several for multi-entry indexes)
//! - `declared_indexes` - Indexes whose entries have been built
//!
//! `PRAGMA user_version` carries [`SCHEMA_VERSION`].

use shopkart_core::{IndexName, Record, codec};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info, instrument};

use crate::error::{Result, StoreError};

/// Layout version written to `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

// PRAGMA does not take bound parameters.
const SET_VERSION: &str = "PRAGMA user_version = 1";

const CREATE_TABLES: [&str; 4] = [
    r"
    CREATE TABLE IF NOT EXISTS records (
        id INTEGER PRIMARY KEY,
        data TEXT NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS index_entries (
        index_name TEXT NOT NULL,
        key TEXT NOT NULL,
        record_id INTEGER NOT NULL,
        PRIMARY KEY (index_name, key, record_id)
    ) WITHOUT ROWID
    ",
    r"
    CREATE INDEX IF NOT EXISTS index_entries_by_record
        ON index_entries (record_id)
    ",
    r"
    CREATE TABLE IF NOT EXISTS declared_indexes (
        name TEXT PRIMARY KEY
    )
    ",
];

/// Create tables on first use and build any index declared for `R` that is
/// missing on disk. Safe to run on every open.
///
/// # Errors
///
/// Returns [`StoreError::DataCorruption`] if the database was written by a
/// newer layout or holds rows that no longer decode, and
/// [`StoreError::Backend`] for database failures.
#[instrument(skip(pool), fields(entity = %R::ENTITY))]
pub async fn prepare<R: Record>(pool: &SqlitePool) -> Result<()> {
    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await?;
    if version > SCHEMA_VERSION {
        return Err(StoreError::DataCorruption(format!(
            "{} database has layout version {version}, newest supported is {SCHEMA_VERSION}",
            R::ENTITY
        )));
    }

    let mut tx = pool.begin().await?;
    for statement in CREATE_TABLES {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    let built: Vec<String> = sqlx::query_scalar("SELECT name FROM declared_indexes")
        .fetch_all(&mut *tx)
        .await?;
    for index in R::ENTITY.indexes() {
        if !built.iter().any(|name| name == index.as_str()) {
            backfill::<R>(&mut tx, *index).await?;
        }
    }

    if version < SCHEMA_VERSION {
        sqlx::query(SET_VERSION).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    debug!("Indexed schema ready");
    Ok(())
}

/// Build entries for `index` from every stored record.
async fn backfill<R: Record>(tx: &mut Transaction<'_, Sqlite>, index: IndexName) -> Result<()> {
    let rows: Vec<(i64, String)> = sqlx::query_as("SELECT id, data FROM records ORDER BY id")
        .fetch_all(&mut **tx)
        .await?;

    for (id, data) in &rows {
        let record: R = codec::decode_record(data).map_err(|e| {
            StoreError::DataCorruption(format!("{} record {id} does not decode: {e}", R::ENTITY))
        })?;
        insert_entries(tx, *id, index, &record).await?;
    }

    sqlx::query("INSERT INTO declared_indexes (name) VALUES (?)")
        .bind(index.as_str())
        .execute(&mut **tx)
        .await?;
    info!(index = %index, records = rows.len(), "Built secondary index");
    Ok(())
}

/// Insert `record`'s keys for one index.
pub(super) async fn insert_entries<R: Record>(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    index: IndexName,
    record: &R,
) -> Result<()> {
    for key in record.index_keys(index) {
        sqlx::query(
            r"
            INSERT OR IGNORE INTO index_entries (index_name, key, record_id)
            VALUES (?, ?, ?)
            ",
        )
        .bind(index.as_str())
        .bind(key.as_str())
        .bind(id)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Replace every index entry of `record`.
pub(super) async fn reindex<R: Record>(
    tx: &mut Transaction<'_, Sqlite>,
    record: &R,
) -> Result<()> {
    let id = record.key();
    sqlx::query("DELETE FROM index_entries WHERE record_id = ?")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    for index in R::ENTITY.indexes() {
        insert_entries(tx, id, *index, record).await?;
    }
    Ok(())
}
