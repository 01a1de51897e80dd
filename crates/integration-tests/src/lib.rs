//! Integration tests for ShopKart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopkart-integration-tests
//! ```
//!
//! Every test gets its own temporary data directory, so the flat files and
//! `SQLite` databases are real and tests can reopen them.
//!
//! # Test Categories
//!
//! - `migration` - Flat-to-indexed migration, idempotence, reopen
//! - `queries` - Visibility, determinism, sort stability, index consistency
//! - `orders` - Order snapshots and seller stats
//! - `session` - Login, logout and profile restore across restarts

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc, clippy::expect_used)]

use secrecy::SecretString;
use shopkart_core::{Price, ProductDraft, User};
use shopkart_store::{Marketplace, StoreConfig};
use tempfile::TempDir;

/// A marketplace over a temporary directory.
pub struct TestContext {
    pub dir: TempDir,
    pub market: Marketplace,
}

impl TestContext {
    /// Open a fresh store.
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let market = open(&dir).await;
        Self { dir, market }
    }

    /// Close the store and open it again over the same directory.
    pub async fn reopen(self) -> Self {
        self.market.close().await;
        let market = open(&self.dir).await;
        Self {
            dir: self.dir,
            market,
        }
    }

    /// Write a raw flat collection, as a legacy client would have.
    pub async fn seed_flat(&self, key: &str, json: &str) {
        self.market
            .flat()
            .set_raw(key, json.to_owned())
            .await
            .expect("Failed to seed flat store");
    }
}

async fn open(dir: &TempDir) -> Marketplace {
    Marketplace::open(StoreConfig::in_dir(dir.path()))
        .await
        .expect("Failed to open marketplace")
}

/// A user as the auth service returns it.
pub fn user(id: i64, name: &str, email: &str) -> User {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "name": name,
        "email": email,
    }))
    .expect("Invalid user fixture")
}

/// A throwaway bearer token.
pub fn token() -> SecretString {
    SecretString::from("integration-token".to_owned())
}

/// A listing draft priced in whole rupees.
pub fn draft(name: &str, rupees: i64, stock: u32, category: &str) -> ProductDraft {
    ProductDraft {
        name: name.to_owned(),
        description: format!("{name} in good shape"),
        price: Price::from_paise(rupees * 100).expect("Invalid price fixture"),
        stock,
        categories: vec![category.to_owned()],
        images: vec![format!("https://img.example/{}.jpg", name.to_lowercase())],
        contact_phone: None,
        brand: None,
        condition: None,
        warranty: None,
    }
}
