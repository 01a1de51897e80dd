//! Indexed store: one `SQLite` database per entity type.
//!
//! # Databases
//!
//! - `products.sqlite` - indexes `ownerId`, `category` (one entry per label), `status`
//! - `users.sqlite` - index `email` (case-folded)
//! - `orders.sqlite` - indexes `buyerId`, `sellerId`, `status`
//!
//! Records are stored as canonical JSON. Every operation runs as a single
//! statement or a single transaction on its entity's database, so a failure
//! never leaves a half-applied write, and entity types never block each other.

pub mod schema;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use shopkart_core::{EntityType, IndexKey, IndexName, Record, WriteMode, codec};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::{debug, info, instrument};

use crate::config::StoreLocation;
use crate::error::{Result, StoreError};

/// Handle to the indexed databases. Cheap to clone.
#[derive(Debug, Clone)]
pub struct IndexedStore {
    products: SqlitePool,
    users: SqlitePool,
    orders: SqlitePool,
}

/// Create a connection pool for one entity database.
///
/// In-memory databases live as long as their single connection, so that
/// connection is never reaped.
async fn create_pool(
    location: &StoreLocation,
    entity: EntityType,
    max_connections: u32,
) -> Result<SqlitePool> {
    match location {
        StoreLocation::Directory(dir) => {
            let dir = dir.join("indexed");
            std::fs::create_dir_all(&dir)?;
            let options = SqliteConnectOptions::new()
                .filename(dir.join(format!("{entity}.sqlite")))
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(Duration::from_secs(10));
            Ok(SqlitePoolOptions::new()
                .max_connections(max_connections.max(1))
                .acquire_timeout(Duration::from_secs(10))
                .connect_with(options)
                .await?)
        }
        StoreLocation::InMemory => {
            let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
            Ok(SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?)
        }
    }
}

fn decode_row<R: Record>(id: i64, data: &str) -> Result<R> {
    codec::decode_record(data).map_err(|e| {
        StoreError::DataCorruption(format!("{} record {id} does not decode: {e}", R::ENTITY))
    })
}

fn encode<R: Record>(record: &R) -> Result<String> {
    record
        .validate()
        .map_err(|source| StoreError::validation(R::ENTITY, record.key(), source))?;
    codec::encode_record(record)
        .map_err(|e| StoreError::Serialization(codec::CodecError::Encode(e)))
}

impl IndexedStore {
    /// Open the databases at `location`, creating tables and indexes on first
    /// use. Opening an existing location reuses what is there.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if a database cannot be opened and
    /// [`StoreError::DataCorruption`] if stored data cannot be indexed.
    #[instrument(skip_all)]
    pub async fn open(location: &StoreLocation, max_connections: u32) -> Result<Self> {
        let store = Self {
            products: create_pool(location, EntityType::Products, max_connections).await?,
            users: create_pool(location, EntityType::Users, max_connections).await?,
            orders: create_pool(location, EntityType::Orders, max_connections).await?,
        };
        schema::prepare::<shopkart_core::Product>(&store.products).await?;
        schema::prepare::<shopkart_core::User>(&store.users).await?;
        schema::prepare::<shopkart_core::Order>(&store.orders).await?;
        info!(?location, "Indexed store open");
        Ok(store)
    }

    /// Open a store rooted at a directory.
    ///
    /// # Errors
    ///
    /// See [`IndexedStore::open`].
    pub async fn open_dir(dir: &Path) -> Result<Self> {
        Self::open(&StoreLocation::Directory(dir.to_path_buf()), 4).await
    }

    /// Open a fresh in-memory store.
    ///
    /// # Errors
    ///
    /// See [`IndexedStore::open`].
    pub async fn in_memory() -> Result<Self> {
        Self::open(&StoreLocation::InMemory, 1).await
    }

    const fn pool(&self, entity: EntityType) -> &SqlitePool {
        match entity {
            EntityType::Products => &self.products,
            EntityType::Users => &self.users,
            EntityType::Orders => &self.orders,
        }
    }

    /// Close every pool. Pending operations finish first.
    pub async fn close(&self) {
        self.products.close().await;
        self.users.close().await;
        self.orders.close().await;
    }

    /// Point lookup.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] or [`StoreError::DataCorruption`].
    pub async fn get<R: Record>(&self, id: i64) -> Result<Option<R>> {
        let data: Option<String> = sqlx::query_scalar("SELECT data FROM records WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool(R::ENTITY))
            .await?;
        data.map(|data| decode_row(id, &data)).transpose()
    }

    /// Write with the entity type's [`WriteMode`]: products and orders are
    /// added (duplicate keys fail), users are upserted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] for an add-style duplicate,
    /// [`StoreError::Validation`] for an invalid record, or [`StoreError::Backend`].
    pub async fn put<R: Record>(&self, record: &R) -> Result<()> {
        match R::ENTITY.write_mode() {
            WriteMode::Add => self.add(record).await,
            WriteMode::Upsert => self.upsert(record).await,
        }
    }

    /// Insert a new record; fail if the key exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] if a record with the same key
    /// exists, [`StoreError::Validation`] for an invalid record, or
    /// [`StoreError::Backend`].
    #[instrument(skip_all, fields(entity = %R::ENTITY, id = record.key()))]
    pub async fn add<R: Record>(&self, record: &R) -> Result<()> {
        let data = encode(record)?;
        let id = record.key();
        let duplicate = || StoreError::DuplicateKey {
            entity: R::ENTITY,
            id,
        };

        let mut tx = self.pool(R::ENTITY).begin().await?;
        let inserted = sqlx::query(
            r"
            INSERT INTO records (id, data) VALUES (?, ?)
            ON CONFLICT (id) DO NOTHING
            ",
        )
        .bind(id)
        .bind(&data)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return duplicate();
            }
            StoreError::Backend(e)
        })?;
        if inserted.rows_affected() == 0 {
            return Err(duplicate());
        }
        schema::reindex(&mut tx, record).await?;
        tx.commit().await?;
        debug!("Added record");
        Ok(())
    }

    /// Insert or replace.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] for an invalid record or
    /// [`StoreError::Backend`].
    #[instrument(skip_all, fields(entity = %R::ENTITY, id = record.key()))]
    pub async fn upsert<R: Record>(&self, record: &R) -> Result<()> {
        let data = encode(record)?;
        let mut tx = self.pool(R::ENTITY).begin().await?;
        sqlx::query(
            r"
            INSERT INTO records (id, data) VALUES (?, ?)
            ON CONFLICT (id) DO UPDATE SET data = excluded.data
            ",
        )
        .bind(record.key())
        .bind(&data)
        .execute(&mut *tx)
        .await?;
        schema::reindex(&mut tx, record).await?;
        tx.commit().await?;
        debug!("Upserted record");
        Ok(())
    }

    /// Replace an existing record in full.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no record has this key,
    /// [`StoreError::Validation`] for an invalid record, or [`StoreError::Backend`].
    #[instrument(skip_all, fields(entity = %R::ENTITY, id = record.key()))]
    pub async fn replace<R: Record>(&self, record: &R) -> Result<()> {
        let data = encode(record)?;
        let id = record.key();
        let mut tx = self.pool(R::ENTITY).begin().await?;
        let updated = sqlx::query("UPDATE records SET data = ? WHERE id = ?")
            .bind(&data)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: R::ENTITY,
                id,
            });
        }
        schema::reindex(&mut tx, record).await?;
        tx.commit().await?;
        debug!("Replaced record");
        Ok(())
    }

    /// Every record, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] or [`StoreError::DataCorruption`].
    pub async fn get_all<R: Record>(&self) -> Result<Vec<R>> {
        let rows: Vec<(i64, String)> = sqlx::query_as("SELECT id, data FROM records ORDER BY id")
            .fetch_all(self.pool(R::ENTITY))
            .await?;
        rows.iter().map(|(id, data)| decode_row(*id, data)).collect()
    }

    /// Records whose `index` contains `key`, ordered by record key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownIndex`] if `R`'s entity type does not
    /// declare `index`, or [`StoreError::Backend`] / [`StoreError::DataCorruption`].
    #[instrument(skip(self), fields(entity = %R::ENTITY))]
    pub async fn get_by_index<R: Record>(&self, index: IndexName, key: &IndexKey) -> Result<Vec<R>> {
        if !R::ENTITY.declares(index) {
            return Err(StoreError::UnknownIndex {
                entity: R::ENTITY,
                index,
            });
        }
        let rows: Vec<(i64, String)> = sqlx::query_as(
            r"
            SELECT r.id, r.data
            FROM index_entries e
            JOIN records r ON r.id = e.record_id
            WHERE e.index_name = ? AND e.key = ?
            ORDER BY r.id
            ",
        )
        .bind(index.as_str())
        .bind(key.as_str())
        .fetch_all(self.pool(R::ENTITY))
        .await?;
        debug!(matches = rows.len(), "Index lookup");
        rows.iter().map(|(id, data)| decode_row(*id, data)).collect()
    }

    /// Delete a record. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`].
    #[instrument(skip(self))]
    pub async fn delete(&self, entity: EntityType, id: i64) -> Result<bool> {
        let mut tx = self.pool(entity).begin().await?;
        sqlx::query("DELETE FROM index_entries WHERE record_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM records WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(deleted.rows_affected() > 0)
    }

    /// Delete every record of an entity type. Indexes stay declared.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`].
    #[instrument(skip(self))]
    pub async fn clear(&self, entity: EntityType) -> Result<()> {
        let mut tx = self.pool(entity).begin().await?;
        sqlx::query("DELETE FROM index_entries")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM records").execute(&mut *tx).await?;
        tx.commit().await?;
        info!("Cleared indexed collection");
        Ok(())
    }

    /// Number of records of an entity type.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`].
    pub async fn count(&self, entity: EntityType) -> Result<u64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records")
            .fetch_one(self.pool(entity))
            .await?;
        Ok(u64::try_from(n).unwrap_or(0))
    }
}
