//! Record codec: JSON collections in, typed records out.
//!
//! Every persisted collection is a JSON array of records. Decoding is done one
//! element at a time so that a single malformed record is dropped (and
//! reported) instead of poisoning the whole collection. Legacy field names are
//! resolved by each record's `Deserialize` impl, so code downstream of the
//! codec only ever sees the canonical shape.

pub(crate) mod lenient;

use serde_json::Value;
use thiserror::Error;

use crate::records::{Record, ValidationError};
use crate::types::{EmailError, PriceError};

/// Why a single record could not be read.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// A required field is absent or empty.
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    /// A numeric field could not be read as an integer.
    #[error("field `{field}` is not a valid integer")]
    InvalidNumber {
        /// Offending field.
        field: &'static str,
    },
    /// A timestamp field is neither RFC 3339 nor epoch milliseconds.
    #[error("field `{field}` is not a valid timestamp")]
    InvalidTimestamp {
        /// Offending field.
        field: &'static str,
    },
    /// Stock below zero.
    #[error("stock cannot be negative, got {0}")]
    NegativeStock(i64),
    /// A count (stock, quantity, reviews) is out of range.
    #[error("field `{field}` is out of range")]
    OutOfRange {
        /// Offending field.
        field: &'static str,
    },
    /// Price is zero, negative or overflowed.
    #[error("invalid price: {0}")]
    Price(#[from] PriceError),
    /// Email failed to parse.
    #[error("invalid email: {0}")]
    Email(#[from] EmailError),
}

/// Errors from encoding or decoding a whole collection.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The blob is not a JSON array of objects.
    #[error("malformed collection: {0}")]
    Malformed(#[source] serde_json::Error),
    /// The blob parsed but is not an array.
    #[error("collection is not a JSON array")]
    NotAnArray,
    /// Serializing records failed.
    #[error("failed to encode records: {0}")]
    Encode(#[source] serde_json::Error),
    /// A record failed write validation.
    #[error("record {id} rejected: {source}")]
    Invalid {
        /// Key of the rejected record.
        id: i64,
        /// What was wrong with it.
        #[source]
        source: ValidationError,
    },
}

/// A record that was skipped while decoding a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeIssue {
    /// Position of the element in the stored array.
    pub position: usize,
    /// The element's `id`, when one could be read.
    pub id: Option<i64>,
    /// Human-readable reason.
    pub reason: String,
}

/// Result of decoding a collection: the good records plus what was dropped.
#[derive(Debug, Clone)]
pub struct Decoded<R> {
    /// Records that decoded cleanly, in stored order.
    pub records: Vec<R>,
    /// Elements that were dropped.
    pub issues: Vec<DecodeIssue>,
}

impl<R> Decoded<R> {
    /// An empty result with no issues.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            records: Vec::new(),
            issues: Vec::new(),
        }
    }
}

impl<R> Default for Decoded<R> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Decode a stored collection blob.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] if the blob is not valid JSON and
/// [`CodecError::NotAnArray`] if it is valid JSON of the wrong shape.
/// Individual bad elements are reported in [`Decoded::issues`], not as errors.
pub fn decode_collection<R: Record>(blob: &str) -> Result<Decoded<R>, CodecError> {
    let value: Value = serde_json::from_str(blob).map_err(CodecError::Malformed)?;
    let Value::Array(items) = value else {
        return Err(CodecError::NotAnArray);
    };

    let mut decoded = Decoded {
        records: Vec::with_capacity(items.len()),
        issues: Vec::new(),
    };
    for (position, item) in items.into_iter().enumerate() {
        let id = item.get("id").and_then(|id| {
            id.as_i64()
                .or_else(|| id.as_str().and_then(|s| s.trim().parse().ok()))
        });
        match serde_json::from_value::<R>(item) {
            Ok(record) => decoded.records.push(record),
            Err(e) => decoded.issues.push(DecodeIssue {
                position,
                id,
                reason: e.to_string(),
            }),
        }
    }
    Ok(decoded)
}

/// Encode records as a collection blob after validating each one.
///
/// # Errors
///
/// Returns [`CodecError::Invalid`] for the first record that fails
/// [`Record::validate`], or [`CodecError::Encode`] if serialization fails.
pub fn encode_collection<R: Record>(records: &[R]) -> Result<String, CodecError> {
    for record in records {
        record.validate().map_err(|source| CodecError::Invalid {
            id: record.key(),
            source,
        })?;
    }
    serde_json::to_string(records).map_err(CodecError::Encode)
}

/// Decode a single stored record.
///
/// # Errors
///
/// Returns the underlying `serde_json` error if the JSON does not describe a
/// valid record.
pub fn decode_record<R: Record>(json: &str) -> Result<R, serde_json::Error> {
    serde_json::from_str(json)
}

/// Encode a single record in canonical form.
///
/// # Errors
///
/// Returns the underlying `serde_json` error if serialization fails.
pub fn encode_record<R: Record>(record: &R) -> Result<String, serde_json::Error> {
    serde_json::to_string(record)
}
