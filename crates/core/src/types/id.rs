//! Newtype IDs for type-safe record references.
//!
//! Record identifiers are time-derived: the number of milliseconds since the
//! Unix epoch at creation, bumped forward when two records are created within
//! the same millisecond. Use the `define_id!` macro to create wrappers that keep
//! product, user and order IDs from being mixed up.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `i64` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `PartialOrd`, `Ord`, `Hash`
/// - Conversion methods: `new()`, `as_i64()`
/// - `From<i64>` and `Into<i64>` implementations
/// - `From<$name>` for [`IndexKey`](crate::records::IndexKey)
///
/// # Example
///
/// ```rust
/// # use shopkart_core::define_id;
/// define_id!(SellerId);
/// define_id!(ReviewId);
///
/// let seller_id = SellerId::new(1);
/// let review_id = ReviewId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: SellerId = review_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create a new ID from an i64 value.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the underlying i64 value.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::core::num::ParseIntError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl From<$name> for $crate::records::IndexKey {
            fn from(id: $name) -> Self {
                Self::from(id.0)
            }
        }
    };
}

define_id!(ProductId);
define_id!(UserId);
define_id!(OrderId);

/// Generator for time-derived record IDs.
///
/// Each call returns `max(now_ms, last + 1)`, so IDs handed out by one
/// generator are strictly increasing even when several records are created in
/// the same millisecond. IDs from two independent generators can still collide;
/// the stores reject such collisions as duplicate keys.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicI64,
}

impl IdGenerator {
    /// Create a generator that has not issued any IDs yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    /// Next ID using the current wall-clock time.
    pub fn next_raw(&self) -> i64 {
        self.next_at(Utc::now().timestamp_millis())
    }

    /// Next ID as a typed wrapper.
    pub fn next_id<T: From<i64>>(&self) -> T {
        T::from(self.next_raw())
    }

    /// Next ID given an explicit clock reading in milliseconds.
    pub fn next_at(&self, now_ms: i64) -> i64 {
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now_ms.max(prev.saturating_add(1));
            match self.last.compare_exchange_weak(
                prev,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => prev = actual,
            }
        }
    }
}
