//! Integration tests for orders and seller stats.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use rust_decimal::Decimal;
use shopkart_core::{Order, OrderStatus, UserId};
use shopkart_integration_tests::{TestContext, draft, token, user};
use shopkart_store::StoreError;

const SELLER: i64 = 100;
const BUYER: i64 = 200;

/// Seller lists a kettle, then the buyer logs in.
async fn with_listing() -> (TestContext, shopkart_core::Product) {
    let ctx = TestContext::new().await;
    ctx.market
        .login(user(SELLER, "Seller", "seller@shop.in"), token())
        .await
        .unwrap();
    let kettle = ctx
        .market
        .publish_product(draft("Kettle", 899, 5, "Home"))
        .await
        .unwrap();
    ctx.market.logout().await.unwrap();
    ctx.market
        .login(user(BUYER, "Buyer", "buyer@shop.in"), token())
        .await
        .unwrap();
    (ctx, kettle)
}

// ============================================================================
// Snapshots
// ============================================================================

#[tokio::test]
async fn test_order_survives_product_deletion() {
    let (ctx, kettle) = with_listing().await;
    let order = ctx.market.place_order(kettle.id, 2, "12 MG Road, Pune").await.unwrap();
    assert_eq!(order.total_price.amount(), Decimal::from(1798));

    assert!(ctx.market.delete_product(kettle.id).await.unwrap());
    assert!(ctx.market.product(kettle.id).await.unwrap().is_none());

    let ctx = ctx.reopen().await;
    let stored: Order = ctx
        .market
        .indexed()
        .await
        .unwrap()
        .get(order.id.as_i64())
        .await
        .unwrap()
        .expect("Order must outlive its product");
    assert_eq!(stored.product_name, "Kettle");
    assert_eq!(stored.product_image.as_deref(), Some("https://img.example/kettle.jpg"));
    assert_eq!(stored.total_price, order.total_price);
    assert_eq!(stored, order);
}

#[tokio::test]
async fn test_order_keeps_price_at_purchase() {
    let (ctx, kettle) = with_listing().await;
    let order = ctx.market.place_order(kettle.id, 1, "Pune").await.unwrap();

    let mut repriced = kettle.clone();
    repriced.price = shopkart_core::Price::from_paise(99_900).unwrap();
    ctx.market.update_product(repriced).await.unwrap();

    let orders = ctx.market.buyer_orders(UserId::new(BUYER)).await.unwrap();
    assert_eq!(orders[0].product_price, kettle.price);
    assert_eq!(orders[0].id, order.id);
}

#[tokio::test]
async fn test_order_rejections() {
    let (ctx, kettle) = with_listing().await;

    let err = ctx.market.place_order(kettle.id, 6, "Pune").await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::InsufficientStock {
            requested: 6,
            available: 5,
            ..
        }
    ));

    let err = ctx.market.place_order(kettle.id, 1, "   ").await.unwrap_err();
    assert!(matches!(err, StoreError::Validation { .. }));

    let err = ctx.market.place_order(kettle.id, 0, "Pune").await.unwrap_err();
    assert!(matches!(err, StoreError::Validation { .. }));

    ctx.market.logout().await.unwrap();
    let err = ctx.market.place_order(kettle.id, 1, "Pune").await.unwrap_err();
    assert!(matches!(err, StoreError::NotLoggedIn));
}

// ============================================================================
// Seller Stats
// ============================================================================

#[tokio::test]
async fn test_seller_stats_example() {
    let ctx = TestContext::new().await;
    ctx.seed_flat(
        "products",
        r#"[
            {"id": 1, "name": "Lamp", "price": 100, "stock": 2, "status": "ACTIVE",
             "category": "Home", "sellerId": 100, "image": "1.jpg"},
            {"id": 2, "name": "Rug", "price": 50, "stock": 20, "status": "INACTIVE",
             "category": "Home", "sellerId": 100, "image": "2.jpg"},
            {"id": 3, "name": "Other seller", "price": 9000, "stock": 1,
             "category": "Home", "sellerId": 999, "image": "3.jpg"}
        ]"#,
    )
    .await;

    let stats = ctx.market.seller_stats(UserId::new(SELLER)).await.unwrap();
    assert_eq!(stats.inventory.count, 2);
    assert_eq!(stats.inventory.active_count, 1);
    assert_eq!(stats.inventory.total_inventory_value, Decimal::from(200));
    assert_eq!(stats.inventory.low_stock_count, 1);
    assert_eq!(stats.orders.total, 0);
}

#[tokio::test]
async fn test_stats_reflect_latest_writes() {
    let (ctx, kettle) = with_listing().await;
    let seller = UserId::new(SELLER);

    let order = ctx.market.place_order(kettle.id, 1, "Pune").await.unwrap();
    let before = ctx.market.seller_stats(seller).await.unwrap();
    assert_eq!(before.orders.pending, 1);
    assert_eq!(before.inventory.total_inventory_value, Decimal::from(899 * 5));

    let confirmed = ctx.market.confirm_order(order.id).await.unwrap();
    assert_eq!(confirmed.status, OrderStatus::Confirmed);
    assert!(confirmed.updated_at >= order.updated_at);

    let after = ctx.market.seller_stats(seller).await.unwrap();
    assert_eq!(after.orders.pending, 0);
    assert_eq!(after.orders.confirmed, 1);

    let seller_orders = ctx.market.seller_orders(seller).await.unwrap();
    assert_eq!(seller_orders, vec![confirmed]);
}
