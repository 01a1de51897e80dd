//! ShopKart Store - Local persistence for the marketplace.
//!
//! Two stores hold the same three collections (`products`, `users`, `orders`):
//!
//! - [`flat`] - The legacy layout, one JSON array per collection on a
//!   quota-limited key/value medium. Also holds session keys.
//! - [`indexed`] - One `SQLite` database per entity type, keyed by ID with
//!   secondary indexes declared per entity.
//!
//! On top of them:
//!
//! - [`migration`] - One-way, idempotent copy from flat to indexed
//! - [`query`] - Visibility, search, category, sort and limit over products
//! - [`stats`] - Seller dashboard figures, always recomputed from a fresh read
//! - [`session`] - Login state and per-email saved profiles
//! - [`marketplace`] - The handle applications hold; migrates on first use
//! - [`refresh`] - Fixed-interval re-reads of a view without overlapping runs
//!
//! # Configuration
//!
//! [`StoreConfig::from_env`] reads `SHOPKART_DATA_DIR`,
//! `SHOPKART_FLAT_QUOTA_BYTES`, `SHOPKART_INDEXED_MAX_CONNECTIONS` and
//! `SHOPKART_REFRESH_INTERVAL_SECS`, loading a `.env` file first if present.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod flat;
pub mod indexed;
pub mod marketplace;
pub mod migration;
pub mod query;
pub mod refresh;
pub mod session;
pub mod stats;

pub use config::{ConfigError, StoreConfig, StoreLocation};
pub use error::{MediumError, Result, StoreError};
pub use flat::{AnyMedium, DirMedium, FlatMedium, FlatStore, MemoryMedium, StorageEstimate};
pub use indexed::IndexedStore;
pub use marketplace::Marketplace;
pub use migration::{MigrationReport, Migrator};
pub use query::{ProductQuery, SortKey, Visibility};
pub use refresh::ViewRefresher;
pub use session::{LoginOutcome, Session};
pub use stats::{InventoryStats, OrderStats, SellerStats};
