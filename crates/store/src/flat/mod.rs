//! Flat store: whole collections stored as one JSON array per key.
//!
//! This is the legacy layout. Each entity type lives under its collection key
//! (`products`, `users`, `orders`) as a single blob that is read and written in
//! full. There are no indexes. The medium is synchronous; every call is run on
//! the blocking pool so the async handle never stalls the runtime.

pub mod medium;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use shopkart_core::codec::{self, CodecError};
use shopkart_core::{DecodeIssue, Decoded, EntityType, Record};
use tracing::{debug, instrument, warn};

use crate::error::{MediumError, Result, StoreError};

pub use medium::{AnyMedium, DirMedium, FlatMedium, MemoryMedium};

/// Percentage of the quota above which storage is reported as nearly full.
pub const NEARLY_FULL_PERCENT: f64 = 80.0;

/// Flat medium usage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorageEstimate {
    /// Bytes in use.
    pub used: u64,
    /// Quota in bytes.
    pub quota: u64,
    /// `used / quota` as a percentage.
    pub percent: f64,
    /// Above [`NEARLY_FULL_PERCENT`].
    pub nearly_full: bool,
}

impl StorageEstimate {
    #[allow(clippy::cast_precision_loss)] // Byte counts stay far below 2^52
    fn new(used: u64, quota: u64) -> Self {
        let percent = if quota == 0 {
            100.0
        } else {
            used as f64 / quota as f64 * 100.0
        };
        Self {
            used,
            quota,
            percent,
            nearly_full: percent > NEARLY_FULL_PERCENT,
        }
    }
}

/// Outcome of [`FlatStore::repair`].
#[derive(Debug, Clone)]
pub struct RepairReport {
    /// Collection repaired.
    pub entity: EntityType,
    /// Records kept.
    pub kept: usize,
    /// Elements dropped, with reasons.
    pub dropped: Vec<DecodeIssue>,
}

/// Async handle over a [`FlatMedium`].
#[derive(Debug)]
pub struct FlatStore<M> {
    medium: Arc<M>,
}

impl<M> Clone for FlatStore<M> {
    fn clone(&self) -> Self {
        Self {
            medium: Arc::clone(&self.medium),
        }
    }
}

impl<M: FlatMedium> FlatStore<M> {
    /// Wrap a medium.
    #[must_use]
    pub fn new(medium: M) -> Self {
        Self {
            medium: Arc::new(medium),
        }
    }

    /// The underlying medium.
    #[must_use]
    pub fn medium(&self) -> &M {
        &self.medium
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&M) -> Result<T, MediumError> + Send + 'static,
    {
        let medium = Arc::clone(&self.medium);
        tokio::task::spawn_blocking(move || op(&medium))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(format!("Task join failed: {e}"))))?
            .map_err(StoreError::from)
    }

    /// Raw value under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the medium cannot be read.
    pub async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_owned();
        self.blocking(move |m| m.get(&key)).await
    }

    /// Store a raw value under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::QuotaExceeded`] (nothing written) or [`StoreError::Io`].
    pub async fn set_raw(&self, key: &str, value: String) -> Result<()> {
        let key = key.to_owned();
        self.blocking(move |m| m.set(&key, &value)).await
    }

    /// Remove `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the medium cannot be written.
    pub async fn remove(&self, key: &str) -> Result<()> {
        let key = key.to_owned();
        self.blocking(move |m| m.remove(&key)).await
    }

    /// Every key on the medium.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the medium cannot be listed.
    pub async fn keys(&self) -> Result<Vec<String>> {
        self.blocking(|m| m.keys()).await
    }

    /// Deserialize the JSON value under `key`. Unparseable values read as `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the medium cannot be read.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.get_raw(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, error = %e, "Ignoring unparseable flat value");
                Ok(None)
            }
        }
    }

    /// Serialize `value` as JSON under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`], [`StoreError::QuotaExceeded`] or
    /// [`StoreError::Io`].
    pub async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value).map_err(CodecError::Encode)?;
        self.set_raw(key, raw).await
    }

    /// Read every record of `R`'s collection, in stored order.
    ///
    /// A missing collection is empty. A blob that is not a JSON array reads as
    /// empty with a single issue; elements that do not decode are skipped and
    /// reported in [`Decoded::issues`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] only; bad data never fails a read.
    #[instrument(skip(self), fields(entity = %R::ENTITY))]
    pub async fn read_all<R: Record>(&self) -> Result<Decoded<R>> {
        let Some(blob) = self.get_raw(R::ENTITY.as_str()).await? else {
            return Ok(Decoded::empty());
        };
        let decoded = match codec::decode_collection::<R>(&blob) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(error = %e, "Flat collection is unreadable, treating as empty");
                Decoded {
                    records: Vec::new(),
                    issues: vec![DecodeIssue {
                        position: 0,
                        id: None,
                        reason: e.to_string(),
                    }],
                }
            }
        };
        if !decoded.issues.is_empty() {
            warn!(
                dropped = decoded.issues.len(),
                kept = decoded.records.len(),
                "Skipped unreadable records"
            );
        }
        debug!(count = decoded.records.len(), "Read flat collection");
        Ok(decoded)
    }

    /// Replace `R`'s collection with `records`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] if a record fails write validation,
    /// [`StoreError::QuotaExceeded`] if the blob does not fit (nothing written),
    /// or [`StoreError::Io`].
    #[instrument(skip(self, records), fields(entity = %R::ENTITY, count = records.len()))]
    pub async fn write_all<R: Record>(&self, records: &[R]) -> Result<()> {
        let blob = codec::encode_collection(records).map_err(|e| match e {
            CodecError::Invalid { id, source } => StoreError::validation(R::ENTITY, id, source),
            other => StoreError::Serialization(other),
        })?;
        self.set_raw(R::ENTITY.as_str(), blob).await?;
        debug!("Wrote flat collection");
        Ok(())
    }

    /// Rewrite `R`'s collection keeping only records that decode and pass
    /// write validation.
    ///
    /// The collection is only rewritten when something was dropped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::QuotaExceeded`] or [`StoreError::Io`].
    #[instrument(skip(self), fields(entity = %R::ENTITY))]
    pub async fn repair<R: Record>(&self) -> Result<RepairReport> {
        let Decoded { records, mut issues } = self.read_all::<R>().await?;
        let total = records.len();
        let mut kept = Vec::with_capacity(total);
        for (position, record) in records.into_iter().enumerate() {
            match record.validate() {
                Ok(()) => kept.push(record),
                Err(e) => issues.push(DecodeIssue {
                    position,
                    id: Some(record.key()),
                    reason: e.to_string(),
                }),
            }
        }

        if !issues.is_empty() {
            self.write_all(&kept).await?;
            warn!(kept = kept.len(), dropped = issues.len(), "Repaired flat collection");
        }
        Ok(RepairReport {
            entity: R::ENTITY,
            kept: kept.len(),
            dropped: issues,
        })
    }

    /// Remove a whole collection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the medium cannot be written.
    pub async fn clear(&self, entity: EntityType) -> Result<()> {
        self.remove(entity.as_str()).await
    }

    /// Current quota usage.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the medium cannot be listed.
    pub async fn usage(&self) -> Result<StorageEstimate> {
        let (used, quota) = self.blocking(|m| Ok((m.usage()?, m.quota()))).await?;
        Ok(StorageEstimate::new(used, quota))
    }
}
