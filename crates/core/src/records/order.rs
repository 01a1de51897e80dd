//! Orders.
//!
//! An order copies the product's name, primary image and unit price at the
//! moment it is placed. Editing or deleting the product afterwards never
//! changes the order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{EntityType, IndexKey, IndexName, Product, Record, User, ValidationError};
use crate::codec::RecordError;
use crate::codec::lenient::{LenientInt, Timestamp, non_empty};
use crate::types::{OrderId, OrderStatus, Price, ProductId, UserId};

/// A buyer's order for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "OrderWire")]
pub struct Order {
    pub id: OrderId,
    pub buyer_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer_name: Option<String>,
    pub seller_id: UserId,
    pub product_id: ProductId,
    pub product_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_image: Option<String>,
    /// Unit price when the order was placed.
    pub product_price: Price,
    pub quantity: u32,
    pub total_price: Price,
    pub status: OrderStatus,
    pub shipping_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller_phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build a pending order from the product as it is right now.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ZeroQuantity`] or
    /// [`ValidationError::EmptyShippingAddress`] for bad input, and
    /// [`ValidationError::Price`] if the total overflows.
    pub fn snapshot(
        id: OrderId,
        buyer: &User,
        product: &Product,
        quantity: u32,
        shipping_address: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if quantity == 0 {
            return Err(ValidationError::ZeroQuantity);
        }
        let order = Self {
            id,
            buyer_id: buyer.id,
            buyer_name: non_empty(Some(buyer.name.clone())),
            seller_id: product.owner_id,
            product_id: product.id,
            product_name: product.name.clone(),
            product_image: product.primary_image().map(str::to_owned),
            product_price: product.price,
            quantity,
            total_price: product.price.times(quantity)?,
            status: OrderStatus::Pending,
            shipping_address: shipping_address.trim().to_owned(),
            seller_phone: product.contact_phone.clone(),
            created_at: now,
            updated_at: now,
        };
        order.validate()?;
        Ok(order)
    }

    /// Mark the order confirmed by the seller.
    pub fn confirm(&mut self, now: DateTime<Utc>) {
        self.status = OrderStatus::Confirmed;
        self.updated_at = now;
    }

    /// Total as a plain decimal.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.total_price.amount()
    }
}

impl Record for Order {
    const ENTITY: EntityType = EntityType::Orders;

    fn key(&self) -> i64 {
        self.id.as_i64()
    }

    fn index_keys(&self, index: IndexName) -> Vec<IndexKey> {
        match index {
            IndexName::BuyerId => vec![self.buyer_id.into()],
            IndexName::SellerId => vec![self.seller_id.into()],
            IndexName::Status => vec![self.status.into()],
            IndexName::OwnerId | IndexName::Category | IndexName::Email => Vec::new(),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.quantity == 0 {
            return Err(ValidationError::ZeroQuantity);
        }
        if self.shipping_address.trim().is_empty() {
            return Err(ValidationError::EmptyShippingAddress);
        }
        if self.product_name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.product_price.times(self.quantity)? != self.total_price {
            return Err(ValidationError::TotalMismatch);
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderWire {
    #[serde(default)]
    id: Option<LenientInt>,
    #[serde(default)]
    buyer_id: Option<LenientInt>,
    #[serde(default)]
    buyer_name: Option<String>,
    #[serde(default)]
    seller_id: Option<LenientInt>,
    #[serde(default)]
    product_id: Option<LenientInt>,
    #[serde(default)]
    product_name: Option<String>,
    #[serde(default)]
    product_image: Option<String>,
    #[serde(default)]
    product_price: Option<Price>,
    #[serde(default)]
    quantity: Option<LenientInt>,
    #[serde(default)]
    total_price: Option<Price>,
    #[serde(default)]
    status: Option<OrderStatus>,
    #[serde(default)]
    shipping_address: Option<String>,
    #[serde(default)]
    seller_phone: Option<String>,
    #[serde(default)]
    created_at: Option<Timestamp>,
    #[serde(default)]
    updated_at: Option<Timestamp>,
}

fn required_id(raw: Option<LenientInt>, field: &'static str) -> Result<i64, RecordError> {
    raw.ok_or(RecordError::MissingField(field))?.resolve(field)
}

impl TryFrom<OrderWire> for Order {
    type Error = RecordError;

    fn try_from(wire: OrderWire) -> Result<Self, Self::Error> {
        let quantity = match wire.quantity {
            Some(raw) => u32::try_from(raw.resolve("quantity")?)
                .ok()
                .filter(|q| *q > 0)
                .ok_or(RecordError::OutOfRange { field: "quantity" })?,
            None => 1,
        };
        let total_price = wire
            .total_price
            .ok_or(RecordError::MissingField("totalPrice"))?;
        let product_price = match wire.product_price {
            Some(price) => price,
            None => total_price.per_unit(quantity)?,
        };
        let created_at = match wire.created_at {
            Some(ts) => ts.resolve("createdAt")?,
            None => DateTime::UNIX_EPOCH,
        };
        let updated_at = match wire.updated_at {
            Some(ts) => ts.resolve("updatedAt")?,
            None => created_at,
        };

        Ok(Self {
            id: OrderId::new(required_id(wire.id, "id")?),
            buyer_id: UserId::new(required_id(wire.buyer_id, "buyerId")?),
            buyer_name: non_empty(wire.buyer_name),
            seller_id: UserId::new(required_id(wire.seller_id, "sellerId")?),
            product_id: ProductId::new(required_id(wire.product_id, "productId")?),
            product_name: non_empty(wire.product_name)
                .ok_or(RecordError::MissingField("productName"))?,
            product_image: non_empty(wire.product_image),
            product_price,
            quantity,
            total_price,
            status: wire.status.unwrap_or_default(),
            shipping_address: wire.shipping_address.unwrap_or_default().trim().to_owned(),
            seller_phone: non_empty(wire.seller_phone),
            created_at,
            updated_at,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product() -> Product {
        serde_json::from_value(json!({
            "id": 100, "name": "Kettle", "price": 450, "stock": 3,
            "category": "Home", "ownerId": 7, "images": ["k1", "k2"],
            "contactPhone": "9876543210"
        }))
        .unwrap()
    }

    fn buyer() -> User {
        serde_json::from_value(json!({"id": 9, "name": "Ravi", "email": "ravi@shop.in"})).unwrap()
    }

    #[test]
    fn test_snapshot_copies_product_fields() {
        let now = Utc::now();
        let order = Order::snapshot(OrderId::new(1), &buyer(), &product(), 2, " MG Road ", now)
            .unwrap();
        assert_eq!(order.seller_id, UserId::new(7));
        assert_eq!(order.buyer_id, UserId::new(9));
        assert_eq!(order.product_name, "Kettle");
        assert_eq!(order.product_image.as_deref(), Some("k1"));
        assert_eq!(order.total(), Decimal::from(900));
        assert_eq!(order.shipping_address, "MG Road");
        assert_eq!(order.seller_phone.as_deref(), Some("9876543210"));
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_snapshot_rejects_bad_input() {
        let now = Utc::now();
        assert_eq!(
            Order::snapshot(OrderId::new(1), &buyer(), &product(), 0, "x", now),
            Err(ValidationError::ZeroQuantity)
        );
        assert_eq!(
            Order::snapshot(OrderId::new(1), &buyer(), &product(), 1, "  ", now),
            Err(ValidationError::EmptyShippingAddress)
        );
    }

    #[test]
    fn test_legacy_order_derives_unit_price() {
        let order: Order = serde_json::from_value(json!({
            "id": 1_709_287_200_000_i64, "buyerId": 9, "sellerId": "7", "productId": 100,
            "productName": "Kettle", "productImage": "k1", "quantity": 1,
            "totalPrice": 450, "status": "PENDING", "shippingAddress": "MG Road",
            "createdAt": "2024-03-01T10:00:00.000Z"
        }))
        .unwrap();
        assert_eq!(order.product_price.amount(), Decimal::from(450));
        assert_eq!(order.seller_id, UserId::new(7));
        assert_eq!(order.updated_at, order.created_at);
        assert!(order.validate().is_ok());

        let out = serde_json::to_value(&order).unwrap();
        assert_eq!(out["productPrice"], 450.0);
        assert_eq!(out["status"], "PENDING");
    }

    #[test]
    fn test_confirm() {
        let now = Utc::now();
        let mut order =
            Order::snapshot(OrderId::new(1), &buyer(), &product(), 1, "MG Road", now).unwrap();
        order.confirm(now);
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.index_keys(IndexName::Status), vec![IndexKey::from("CONFIRMED")]);
        assert_eq!(order.index_keys(IndexName::SellerId), vec![IndexKey::from(7_i64)]);
    }
}
