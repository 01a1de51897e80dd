//! Persisted record types and the metadata stores need to handle them.
//!
//! Each entity type (`products`, `users`, `orders`) is a named collection in
//! both storage backends. The [`Record`] trait ties a Rust type to its entity
//! type, primary key, secondary-index keys and write validation, so the stores
//! can be written once, generically.

pub mod order;
pub mod product;
pub mod user;

use core::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use order::Order;
pub use product::{Product, ProductDraft};
pub use user::{Profile, User};

use crate::types::{Email, OrderStatus, ProductStatus};

/// A named record category in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityType {
    Products,
    Users,
    Orders,
}

impl EntityType {
    /// Every entity type, in migration order.
    pub const ALL: [Self; 3] = [Self::Products, Self::Users, Self::Orders];

    /// Collection key used by both backends.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Users => "users",
            Self::Orders => "orders",
        }
    }

    /// How `put` treats an existing record with the same key.
    #[must_use]
    pub const fn write_mode(self) -> WriteMode {
        match self {
            Self::Products | Self::Orders => WriteMode::Add,
            Self::Users => WriteMode::Upsert,
        }
    }

    /// Secondary indexes declared for this entity type.
    #[must_use]
    pub const fn indexes(self) -> &'static [IndexName] {
        match self {
            Self::Products => &[IndexName::OwnerId, IndexName::Category, IndexName::Status],
            Self::Users => &[IndexName::Email],
            Self::Orders => &[IndexName::BuyerId, IndexName::SellerId, IndexName::Status],
        }
    }

    /// Whether `index` is declared for this entity type.
    #[must_use]
    pub fn declares(self, index: IndexName) -> bool {
        self.indexes().contains(&index)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "products" => Ok(Self::Products),
            "users" => Ok(Self::Users),
            "orders" => Ok(Self::Orders),
            _ => Err(format!("unknown entity type: {s}")),
        }
    }
}

/// Conflict behaviour of `put`, fixed per entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Insert; fail if the key already exists.
    Add,
    /// Insert or replace.
    Upsert,
}

/// Name of a secondary index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexName {
    OwnerId,
    Category,
    Status,
    BuyerId,
    SellerId,
    Email,
}

impl IndexName {
    /// Name as stored on disk and accepted on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OwnerId => "ownerId",
            Self::Category => "category",
            Self::Status => "status",
            Self::BuyerId => "buyerId",
            Self::SellerId => "sellerId",
            Self::Email => "email",
        }
    }
}

impl fmt::Display for IndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IndexName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ownerId" => Ok(Self::OwnerId),
            "category" => Ok(Self::Category),
            "status" => Ok(Self::Status),
            "buyerId" => Ok(Self::BuyerId),
            "sellerId" => Ok(Self::SellerId),
            "email" => Ok(Self::Email),
            _ => Err(format!("unknown index: {s}")),
        }
    }
}

/// Equality key stored in a secondary index.
///
/// Integers and enums are stored in their textual form, so one key column
/// serves every index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexKey(String);

impl IndexKey {
    /// Key as stored.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for IndexKey {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl From<&str> for IndexKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for IndexKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<ProductStatus> for IndexKey {
    fn from(status: ProductStatus) -> Self {
        Self(status.as_str().to_owned())
    }
}

impl From<OrderStatus> for IndexKey {
    fn from(status: OrderStatus) -> Self {
        Self(status.as_str().to_owned())
    }
}

impl From<&Email> for IndexKey {
    fn from(email: &Email) -> Self {
        Self(email.key())
    }
}

/// Why a record was refused by a write operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Name is empty after trimming.
    #[error("name cannot be empty")]
    EmptyName,
    /// Products carry one or two category labels.
    #[error("expected 1 or 2 category labels, got {0}")]
    CategoryCount(usize),
    /// Products carry at least one image.
    #[error("at least one image is required")]
    MissingImage,
    /// Orders are for at least one unit.
    #[error("quantity must be at least 1")]
    ZeroQuantity,
    /// Orders need somewhere to ship to.
    #[error("shipping address cannot be empty")]
    EmptyShippingAddress,
    /// Order total does not match unit price times quantity.
    #[error("total price does not match unit price times quantity")]
    TotalMismatch,
    /// Price arithmetic failed.
    #[error("invalid price: {0}")]
    Price(#[from] crate::types::PriceError),
}

/// A type persisted by the stores.
///
/// `Deserialize` must accept every legacy shape the record was ever written in
/// and reject records that violate read invariants; `Serialize` must emit the
/// canonical shape.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection this record lives in.
    const ENTITY: EntityType;

    /// Primary key.
    fn key(&self) -> i64;

    /// Keys this record contributes to `index`. Empty for undeclared indexes.
    fn index_keys(&self, index: IndexName) -> Vec<IndexKey>;

    /// Invariants checked before any write reaches a medium.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    fn validate(&self) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_modes() {
        assert_eq!(EntityType::Products.write_mode(), WriteMode::Add);
        assert_eq!(EntityType::Orders.write_mode(), WriteMode::Add);
        assert_eq!(EntityType::Users.write_mode(), WriteMode::Upsert);
    }

    #[test]
    fn test_declared_indexes() {
        assert!(EntityType::Products.declares(IndexName::OwnerId));
        assert!(EntityType::Products.declares(IndexName::Category));
        assert!(EntityType::Products.declares(IndexName::Status));
        assert!(!EntityType::Products.declares(IndexName::BuyerId));
        assert!(EntityType::Orders.declares(IndexName::SellerId));
        assert!(EntityType::Users.declares(IndexName::Email));
    }

    #[test]
    fn test_names_round_trip_through_from_str() {
        for entity in EntityType::ALL {
            assert_eq!(entity.as_str().parse::<EntityType>(), Ok(entity));
            for index in entity.indexes() {
                assert_eq!(index.as_str().parse::<IndexName>(), Ok(*index));
            }
        }
    }

    #[test]
    fn test_index_keys_are_textual() {
        assert_eq!(IndexKey::from(42_i64).as_str(), "42");
        assert_eq!(IndexKey::from(ProductStatus::Active).as_str(), "ACTIVE");
        assert_eq!(IndexKey::from(OrderStatus::Pending).as_str(), "PENDING");
    }
}
