//! Tolerant field readers for records written by older clients.
//!
//! Older clients stored IDs as numbers or numeric strings, timestamps as ISO
//! strings or epoch milliseconds, and categories as a comma-joined string.
//! These helpers accept every form and produce one canonical value.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use super::RecordError;

/// An integer that may arrive as a JSON number or as a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum LenientInt {
    Int(i64),
    Float(f64),
    Text(String),
}

impl LenientInt {
    pub(crate) fn resolve(self, field: &'static str) -> Result<i64, RecordError> {
        match self {
            Self::Int(n) => Ok(n),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(f) if f.fract() == 0.0 && f.is_finite() => Ok(f as i64),
            Self::Float(_) => Err(RecordError::InvalidNumber { field }),
            Self::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| RecordError::InvalidNumber { field }),
        }
    }
}

/// Category labels: either `"Electronics, Fashion"` or `["Electronics", "Fashion"]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Labels {
    Joined(String),
    List(Vec<String>),
}

impl Labels {
    pub(crate) fn resolve(self) -> Vec<String> {
        let raw: Vec<String> = match self {
            Self::Joined(s) => s.split(',').map(str::to_owned).collect(),
            Self::List(list) => list,
        };
        raw.into_iter()
            .map(|label| label.trim().to_owned())
            .filter(|label| !label.is_empty())
            .collect()
    }
}

/// A timestamp as RFC 3339 text or epoch milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Timestamp {
    Millis(i64),
    Float(f64),
    Text(String),
}

impl Timestamp {
    pub(crate) fn resolve(self, field: &'static str) -> Result<DateTime<Utc>, RecordError> {
        let invalid = || RecordError::InvalidTimestamp { field };
        match self {
            Self::Millis(ms) => Utc.timestamp_millis_opt(ms).single().ok_or_else(invalid),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(ms) if ms.is_finite() => Utc
                .timestamp_millis_opt(ms as i64)
                .single()
                .ok_or_else(invalid),
            Self::Float(_) => Err(invalid()),
            Self::Text(s) => {
                let s = s.trim();
                if let Ok(ms) = s.parse::<i64>() {
                    return Utc.timestamp_millis_opt(ms).single().ok_or_else(invalid);
                }
                DateTime::parse_from_rfc3339(s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|_| invalid())
            }
        }
    }
}

/// Trimmed text, `None` when empty.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}
