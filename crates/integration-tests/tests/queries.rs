//! Integration tests for product queries and index consistency.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use shopkart_core::{IndexKey, IndexName, Product, ProductStatus, UserId};
use shopkart_integration_tests::{TestContext, draft, token, user};
use shopkart_store::{ProductQuery, SortKey};

/// Two sellers, five products, all created at the same instant.
const SAME_INSTANT: &str = r#"[
    {"id": 5, "name": "Desk Lamp", "price": 450, "stock": 5, "category": "Home, Lighting",
     "sellerId": 1, "image": "5.jpg", "rating": 4.5, "createdAt": 1700000000000},
    {"id": 2, "name": "Kettle", "price": 899, "stock": 4, "category": "Home",
     "sellerId": 1, "image": "2.jpg", "rating": 4.5, "createdAt": 1700000000000},
    {"id": 9, "name": "Football", "price": 450, "stock": 0, "category": "Sports",
     "sellerId": 2, "image": "9.jpg", "createdAt": 1700000000000},
    {"id": 7, "name": "Yoga Mat", "price": 300, "stock": 12, "category": "Sports, Home",
     "sellerId": 2, "image": "7.jpg", "status": "INACTIVE", "createdAt": 1700000000000},
    {"id": 3, "name": "Teapot", "price": 450, "stock": 2, "category": "Kitchen",
     "sellerId": 2, "image": "3.jpg", "description": "Pairs with a kettle",
     "createdAt": 1700000000000}
]"#;

fn ids(products: &[Product]) -> Vec<i64> {
    products.iter().map(|p| p.id.as_i64()).collect()
}

async fn seeded() -> TestContext {
    let ctx = TestContext::new().await;
    ctx.seed_flat("products", SAME_INSTANT).await;
    ctx
}

// ============================================================================
// Visibility
// ============================================================================

#[tokio::test]
async fn test_buyer_listing_hides_inactive_and_sold_out() {
    let ctx = seeded().await;
    let listed = ctx.market.buyer_listing(ProductQuery::default()).await.unwrap();
    assert_eq!(ids(&listed), vec![2, 3, 5]);
}

#[tokio::test]
async fn test_seller_view_shows_everything_owned() {
    let ctx = seeded().await;
    let own = ctx
        .market
        .seller_products(UserId::new(2), ProductQuery::default())
        .await
        .unwrap();
    assert_eq!(ids(&own), vec![3, 7, 9]);
}

// ============================================================================
// Determinism & Stability
// ============================================================================

#[tokio::test]
async fn test_identical_queries_give_identical_results() {
    let ctx = seeded().await;
    let query = ProductQuery::all().search("e").sort(SortKey::PriceAsc);
    let first = ctx.market.products(&query).await.unwrap();
    let second = ctx.market.products(&query).await.unwrap();
    assert_eq!(first, second);

    // Also across a restart.
    let ctx = ctx.reopen().await;
    let third = ctx.market.products(&query).await.unwrap();
    assert_eq!(ids(&first), ids(&third));
}

#[tokio::test]
async fn test_equal_keys_keep_collection_order() {
    let ctx = seeded().await;
    let newest = ctx.market.products(&ProductQuery::all()).await.unwrap();
    assert_eq!(ids(&newest), vec![2, 3, 5, 7, 9]);

    let by_price = ctx
        .market
        .products(&ProductQuery::all().sort(SortKey::PriceAsc))
        .await
        .unwrap();
    assert_eq!(ids(&by_price), vec![7, 3, 5, 9, 2]);

    let by_rating = ctx
        .market
        .products(&ProductQuery::all().sort(SortKey::RatingDesc))
        .await
        .unwrap();
    assert_eq!(&ids(&by_rating)[..2], &[2, 5]);
}

#[tokio::test]
async fn test_search_and_category_filters() {
    let ctx = seeded().await;
    let kettles = ctx
        .market
        .buyer_listing(ProductQuery::default().search("KETTLE"))
        .await
        .unwrap();
    assert_eq!(ids(&kettles), vec![2, 3], "name or description match");

    let home = ctx
        .market
        .products(&ProductQuery::all().category("Home"))
        .await
        .unwrap();
    assert_eq!(ids(&home), vec![2, 5, 7]);

    let limited = ctx
        .market
        .products(&ProductQuery::all().sort(SortKey::PriceDesc).limit(2))
        .await
        .unwrap();
    assert_eq!(ids(&limited), vec![2, 3]);
}

// ============================================================================
// Index Consistency
// ============================================================================

#[tokio::test]
async fn test_owner_index_matches_full_scan() {
    let ctx = seeded().await;
    ctx.market.ensure_migrated().await.unwrap();
    let indexed = ctx.market.indexed().await.unwrap();
    let all: Vec<Product> = indexed.get_all().await.unwrap();

    for owner in [1, 2, 3] {
        let by_index: Vec<Product> = indexed
            .get_by_index(IndexName::OwnerId, &IndexKey::from(UserId::new(owner)))
            .await
            .unwrap();
        let by_scan: Vec<Product> = all
            .iter()
            .filter(|p| p.owner_id == UserId::new(owner))
            .cloned()
            .collect();
        assert_eq!(by_index, by_scan, "owner {owner}");
    }
}

#[tokio::test]
async fn test_indexes_follow_updates() {
    let ctx = seeded().await;
    ctx.market.ensure_migrated().await.unwrap();

    let mut lamp: Product = ctx.market.product(shopkart_core::ProductId::new(5)).await.unwrap().unwrap();
    lamp.categories = vec!["Office".to_owned()];
    lamp.status = ProductStatus::Inactive;
    ctx.market.update_product(lamp).await.unwrap();

    let indexed = ctx.market.indexed().await.unwrap();
    let home: Vec<Product> = indexed
        .get_by_index(IndexName::Category, &IndexKey::from("Home"))
        .await
        .unwrap();
    assert_eq!(ids(&home), vec![2, 7]);
    let office: Vec<Product> = indexed
        .get_by_index(IndexName::Category, &IndexKey::from("Office"))
        .await
        .unwrap();
    assert_eq!(ids(&office), vec![5]);
    let active: Vec<Product> = indexed
        .get_by_index(IndexName::Status, &IndexKey::from(ProductStatus::Active))
        .await
        .unwrap();
    assert_eq!(ids(&active), vec![2, 3, 9]);
}

#[tokio::test]
async fn test_published_product_is_listed_first() {
    let ctx = seeded().await;
    ctx.market
        .login(user(1, "Anil", "anil@shop.in"), token())
        .await
        .unwrap();
    let fresh = ctx
        .market
        .publish_product(draft("Blender", 1999, 6, "Kitchen"))
        .await
        .unwrap();

    let listed = ctx.market.buyer_listing(ProductQuery::default()).await.unwrap();
    assert_eq!(listed[0].id, fresh.id);
    let recent = ctx.market.recent_products(UserId::new(1)).await.unwrap();
    assert_eq!(ids(&recent)[0], fresh.id.as_i64());
    assert_eq!(recent.len(), 3);
}
