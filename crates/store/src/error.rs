//! Store error types.

use shopkart_core::{CodecError, EntityType, IndexName, ProductId, ValidationError};
use thiserror::Error;

/// Errors raised by a flat medium.
#[derive(Debug, Error)]
pub enum MediumError {
    /// Writing `key` would push the medium past its byte quota. Nothing was written.
    #[error("quota exceeded writing `{key}`: {needed} bytes needed, quota is {quota}")]
    QuotaExceeded {
        /// Key being written.
        key: String,
        /// Total usage the write would have produced.
        needed: u64,
        /// Configured quota.
        quota: u64,
    },
    /// Reading or writing the medium failed.
    #[error("medium I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by store operations.
///
/// Reads never fail because a record or collection is absent; absence is an
/// empty result or `None`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A collection or record could not be encoded, or a flat blob could not be
    /// decoded where a caller asked for strict decoding.
    #[error("serialization error: {0}")]
    Serialization(#[from] CodecError),

    /// A flat write exceeded the medium's quota and was not applied.
    #[error("storage quota exceeded: {needed} bytes needed, quota is {quota}")]
    QuotaExceeded {
        /// Total usage the write would have produced.
        needed: u64,
        /// Configured quota.
        quota: u64,
    },

    /// An add-style write hit an existing key.
    #[error("{entity} record {id} already exists")]
    DuplicateKey {
        /// Collection written to.
        entity: EntityType,
        /// Conflicting key.
        id: i64,
    },

    /// Flat medium I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The indexed backend failed.
    #[error("indexed store error: {0}")]
    Backend(#[from] sqlx::Error),

    /// A record was refused before reaching the medium.
    #[error("invalid {entity} record {id}: {source}")]
    Validation {
        /// Collection written to.
        entity: EntityType,
        /// Key of the rejected record.
        id: i64,
        /// What was wrong.
        #[source]
        source: ValidationError,
    },

    /// Replace or confirm of a record that does not exist.
    #[error("{entity} record {id} not found")]
    NotFound {
        /// Collection searched.
        entity: EntityType,
        /// Missing key.
        id: i64,
    },

    /// Lookup on an index the entity type does not declare.
    #[error("{entity} has no index named {index}")]
    UnknownIndex {
        /// Collection searched.
        entity: EntityType,
        /// Requested index.
        index: IndexName,
    },

    /// A stored row no longer decodes as a record.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// The product is inactive, out of stock or gone.
    #[error("product {0} is not available")]
    NotAvailable(ProductId),

    /// Fewer units in stock than requested.
    #[error("product {product} has {available} in stock, {requested} requested")]
    InsufficientStock {
        /// Product ordered.
        product: ProductId,
        /// Units asked for.
        requested: u32,
        /// Units in stock.
        available: u32,
    },

    /// The operation needs a logged-in user.
    #[error("no user is logged in")]
    NotLoggedIn,
}

impl From<MediumError> for StoreError {
    fn from(err: MediumError) -> Self {
        match err {
            MediumError::QuotaExceeded { needed, quota, .. } => Self::QuotaExceeded { needed, quota },
            MediumError::Io(e) => Self::Io(e),
        }
    }
}

impl StoreError {
    /// Whether this is a duplicate-key rejection.
    #[must_use]
    pub const fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }

    pub(crate) fn validation(entity: EntityType, id: i64, source: ValidationError) -> Self {
        Self::Validation { entity, id, source }
    }
}

/// Store result type.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
