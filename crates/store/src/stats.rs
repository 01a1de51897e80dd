//! Seller dashboard figures.

use rust_decimal::Decimal;
use serde::Serialize;
use shopkart_core::{Order, OrderStatus, Product, ProductStatus};

/// Products with fewer units than this count as low on stock.
pub const LOW_STOCK_THRESHOLD: u32 = 10;

/// Inventory figures over a set of products.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryStats {
    /// Products in the set.
    pub count: usize,
    /// Products with status `ACTIVE`.
    pub active_count: usize,
    /// Sum of `price × stock` over active products.
    #[serde(with = "rust_decimal::serde::float")]
    pub total_inventory_value: Decimal,
    /// Products with `stock < LOW_STOCK_THRESHOLD`.
    pub low_stock_count: usize,
}

impl InventoryStats {
    /// Compute from `products`.
    #[must_use]
    pub fn compute(products: &[Product]) -> Self {
        products.iter().fold(Self::default(), |mut stats, p| {
            stats.count += 1;
            if p.status == ProductStatus::Active {
                stats.active_count += 1;
                stats.total_inventory_value += p.inventory_value();
            }
            if p.stock < LOW_STOCK_THRESHOLD {
                stats.low_stock_count += 1;
            }
            stats
        })
    }
}

/// Order counts for a seller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStats {
    /// All orders.
    pub total: usize,
    /// Awaiting confirmation.
    pub pending: usize,
    /// Confirmed.
    pub confirmed: usize,
}

impl OrderStats {
    /// Compute from `orders`.
    #[must_use]
    pub fn compute(orders: &[Order]) -> Self {
        orders.iter().fold(Self::default(), |mut stats, o| {
            stats.total += 1;
            match o.status {
                OrderStatus::Pending => stats.pending += 1,
                OrderStatus::Confirmed => stats.confirmed += 1,
            }
            stats
        })
    }
}

/// Everything the seller dashboard shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerStats {
    /// Listings.
    pub inventory: InventoryStats,
    /// Orders received.
    pub orders: OrderStats,
}
