//! Integration tests for the flat-to-indexed migration.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::collections::BTreeSet;

use shopkart_core::{EntityType, Order, Product, User};
use shopkart_integration_tests::TestContext;

const LEGACY_PRODUCTS: &str = r#"[
    {"id": 1, "name": "Product A", "price": 250, "stock": 3, "category": "Books",
     "sellerId": 10, "image": "a.jpg", "createdAt": "2024-03-01T10:00:00.000Z"},
    {"id": 2, "name": "Product B", "price": "99.5", "stock": "7", "category": ["Toys", "Kids"],
     "sellerId": "11", "imageUrl": "b.jpg", "status": "SOLD_OUT", "createdAt": 1709287200000},
    {"id": 3, "name": "Bundle", "price": 10, "stock": 1, "category": "Toys, Kids, Games",
     "sellerId": 11, "image": "c.jpg"},
    "not a record"
]"#;

const LEGACY_USERS: &str = r#"[
    {"id": 10, "name": "Meera", "email": "Meera@Shop.in", "pincode": "411001"},
    {"id": 11, "email": "kiran@shop.in", "phone": "9000000000"}
]"#;

const LEGACY_ORDERS: &str = r#"[
    {"id": 500, "buyerId": 11, "sellerId": 10, "productId": 1, "productName": "Product A",
     "quantity": 2, "totalPrice": 500, "status": "PENDING", "shippingAddress": "Pune"}
]"#;

fn ids(products: &[Product]) -> BTreeSet<i64> {
    products.iter().map(|p| p.id.as_i64()).collect()
}

// ============================================================================
// Single Record
// ============================================================================

#[tokio::test]
async fn test_single_product_migrates_exactly_once() {
    let ctx = TestContext::new().await;
    ctx.seed_flat(
        "products",
        r#"[{"id": 1, "name": "Product A", "price": 250, "stock": 3,
             "category": "Books", "sellerId": 10, "image": "a.jpg"}]"#,
    )
    .await;

    ctx.market.ensure_migrated().await.expect("Migration failed");
    let all: Vec<Product> = ctx.market.indexed().await.unwrap().get_all().await.unwrap();
    assert_eq!(all.iter().filter(|p| p.id.as_i64() == 1).count(), 1);

    // A new handle runs the migration again over the same data.
    let ctx = ctx.reopen().await;
    let report = ctx.market.ensure_migrated().await.expect("Migration failed");
    assert_eq!(report.entity(EntityType::Products).unwrap().already_present, 1);
    let all: Vec<Product> = ctx.market.indexed().await.unwrap().get_all().await.unwrap();
    assert_eq!(all.iter().filter(|p| p.id.as_i64() == 1).count(), 1);
}

// ============================================================================
// Legacy Data
// ============================================================================

#[tokio::test]
async fn test_legacy_collections_migrate_with_normalization() {
    let ctx = TestContext::new().await;
    ctx.seed_flat("products", LEGACY_PRODUCTS).await;
    ctx.seed_flat("users", LEGACY_USERS).await;
    ctx.seed_flat("orders", LEGACY_ORDERS).await;

    let report = ctx.market.ensure_migrated().await.expect("Migration failed");
    let products = report.entity(EntityType::Products).unwrap();
    assert_eq!(products.migrated, 2);
    assert_eq!(products.failed.len(), 1, "three category labels are rejected");
    assert_eq!(products.dropped.len(), 1, "string element is unreadable");
    assert_eq!(report.entity(EntityType::Users).unwrap().migrated, 2);
    assert_eq!(report.entity(EntityType::Orders).unwrap().migrated, 1);

    let b: Product = ctx.market.indexed().await.unwrap().get(2).await.unwrap().unwrap();
    assert_eq!(b.stock, 7);
    assert_eq!(b.owner_id.as_i64(), 11);
    assert_eq!(b.categories, vec!["Toys".to_owned(), "Kids".to_owned()]);
    assert_eq!(b.images, vec!["b.jpg".to_owned()]);
    assert!(!b.is_listed(), "unknown status reads as inactive");

    let kiran: User = ctx.market.indexed().await.unwrap().get(11).await.unwrap().unwrap();
    assert_eq!(kiran.name, "kiran@shop.in");

    let order: Order = ctx.market.indexed().await.unwrap().get(500).await.unwrap().unwrap();
    assert_eq!(order.product_price.to_string(), "₹250.00");
}

#[tokio::test]
async fn test_migration_is_idempotent_and_leaves_flat_data() {
    let ctx = TestContext::new().await;
    ctx.seed_flat("products", LEGACY_PRODUCTS).await;

    ctx.market.ensure_migrated().await.unwrap();
    let once: Vec<Product> = ctx.market.indexed().await.unwrap().get_all().await.unwrap();

    let ctx = ctx.reopen().await;
    let report = ctx.market.ensure_migrated().await.unwrap();
    assert_eq!(report.total_migrated(), 0);
    let twice: Vec<Product> = ctx.market.indexed().await.unwrap().get_all().await.unwrap();

    assert_eq!(ids(&once), ids(&twice));
    assert_eq!(once, twice);
    let flat = ctx.market.flat().get_raw("products").await.unwrap();
    assert_eq!(flat.as_deref(), Some(LEGACY_PRODUCTS));
}

#[tokio::test]
async fn test_indexed_writes_survive_remigration() {
    let ctx = TestContext::new().await;
    ctx.seed_flat("products", LEGACY_PRODUCTS).await;
    ctx.market.ensure_migrated().await.unwrap();

    let mut a: Product = ctx.market.indexed().await.unwrap().get(1).await.unwrap().unwrap();
    a.stock = 40;
    ctx.market.update_product(a).await.unwrap();

    let ctx = ctx.reopen().await;
    ctx.market.ensure_migrated().await.unwrap();
    let a: Product = ctx.market.indexed().await.unwrap().get(1).await.unwrap().unwrap();
    assert_eq!(a.stock, 40, "stale flat copy must not overwrite newer data");
}

#[tokio::test]
async fn test_corrupt_flat_blob_migrates_nothing() {
    let ctx = TestContext::new().await;
    ctx.seed_flat("products", "{ not json").await;

    let report = ctx.market.ensure_migrated().await.expect("Corrupt data must not fail");
    let products = report.entity(EntityType::Products).unwrap();
    assert_eq!(products.migrated, 0);
    assert_eq!(products.dropped.len(), 1);
    assert_eq!(
        ctx.market.indexed().await.unwrap().count(EntityType::Products).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_repair_then_migrate() {
    let ctx = TestContext::new().await;
    ctx.seed_flat("products", LEGACY_PRODUCTS).await;

    let reports = ctx.market.repair_flat().await.unwrap();
    assert_eq!(reports[0].kept, 2);
    assert_eq!(reports[0].dropped.len(), 2);

    let report = ctx.market.ensure_migrated().await.unwrap();
    let products = report.entity(EntityType::Products).unwrap();
    assert_eq!(products.migrated, 2);
    assert!(products.failed.is_empty());
    assert!(products.dropped.is_empty());
}
