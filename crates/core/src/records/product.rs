//! Product records.
//!
//! # Wire shape
//!
//! ```json
//! {
//!   "id": 1709287200000, "name": "Kettle", "description": "1.5L steel",
//!   "price": 899.0, "stock": 4, "category": "Home, Kitchen",
//!   "image": "data:image/jpeg;base64,...", "images": ["data:image/jpeg;base64,..."],
//!   "ownerId": 7, "contactPhone": "9876543210", "brand": "Generic",
//!   "condition": "New", "warranty": "No warranty", "status": "ACTIVE",
//!   "rating": 0.0, "reviewCount": 0,
//!   "createdAt": "2024-03-01T10:00:00Z", "updatedAt": "2024-03-01T10:00:00Z"
//! }
//! ```
//!
//! `image` always mirrors `images[0]`. On read, `sellerId`, `sellerPhone`,
//! `reviews` and `imageUrl` are accepted in place of their canonical names.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{EntityType, IndexKey, IndexName, Record, ValidationError};
use crate::codec::RecordError;
use crate::codec::lenient::{Labels, LenientInt, Timestamp, non_empty};
use crate::types::{Price, ProductId, ProductStatus, UserId};

/// Default brand for products published without one.
pub const DEFAULT_BRAND: &str = "Generic";
/// Default condition for products published without one.
pub const DEFAULT_CONDITION: &str = "New";
/// Default warranty text for products published without one.
pub const DEFAULT_WARRANTY: &str = "No warranty";

/// Most category labels a product may carry.
pub const MAX_CATEGORY_LABELS: usize = 2;

/// A product listed by a seller.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub stock: u32,
    /// One or two labels, e.g. `["Electronics", "Fashion"]`.
    pub categories: Vec<String>,
    /// Encoded images; the first one is the primary image.
    pub images: Vec<String>,
    /// Seller who owns the listing.
    pub owner_id: UserId,
    pub contact_phone: Option<String>,
    pub brand: String,
    pub condition: String,
    pub warranty: String,
    pub status: ProductStatus,
    pub rating: f64,
    pub review_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Primary image, if any.
    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// Whether buyers can see this product: active and in stock.
    #[must_use]
    pub fn is_listed(&self) -> bool {
        self.status == ProductStatus::Active && self.stock > 0
    }

    /// `price × stock`.
    #[must_use]
    pub fn inventory_value(&self) -> Decimal {
        self.price.amount() * Decimal::from(self.stock)
    }

    /// Whether one of the labels equals `category` exactly.
    #[must_use]
    pub fn has_category(&self, category: &str) -> bool {
        let category = category.trim();
        self.categories.iter().any(|label| label == category)
    }

    /// Labels joined the way the remote API expects them.
    #[must_use]
    pub fn category_label(&self) -> String {
        self.categories.join(", ")
    }
}

impl Record for Product {
    const ENTITY: EntityType = EntityType::Products;

    fn key(&self) -> i64 {
        self.id.as_i64()
    }

    fn index_keys(&self, index: IndexName) -> Vec<IndexKey> {
        match index {
            IndexName::OwnerId => vec![self.owner_id.into()],
            IndexName::Category => self
                .categories
                .iter()
                .map(|label| IndexKey::from(label.as_str()))
                .collect(),
            IndexName::Status => vec![self.status.into()],
            IndexName::BuyerId | IndexName::SellerId | IndexName::Email => Vec::new(),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        let labels = self.categories.len();
        if labels == 0
            || labels > MAX_CATEGORY_LABELS
            || self.categories.iter().any(|l| l.trim().is_empty())
        {
            return Err(ValidationError::CategoryCount(labels));
        }
        if self.images.iter().all(|img| img.trim().is_empty()) {
            return Err(ValidationError::MissingImage);
        }
        Ok(())
    }
}

/// Seller input for a new listing, before an ID and owner are assigned.
#[derive(Debug, Clone)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub price: Price,
    pub stock: u32,
    pub categories: Vec<String>,
    pub images: Vec<String>,
    pub contact_phone: Option<String>,
    pub brand: Option<String>,
    pub condition: Option<String>,
    pub warranty: Option<String>,
}

impl ProductDraft {
    /// Turn the draft into an active product.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MissingImage`] when no image was uploaded, or
    /// whatever [`Record::validate`] rejects.
    pub fn into_product(
        self,
        id: ProductId,
        owner_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Product, ValidationError> {
        let images: Vec<String> = self
            .images
            .into_iter()
            .filter(|img| !img.trim().is_empty())
            .collect();
        if images.is_empty() {
            return Err(ValidationError::MissingImage);
        }

        let mut categories: Vec<String> = Vec::new();
        for label in self.categories {
            let label = label.trim().to_owned();
            if !label.is_empty() && !categories.contains(&label) {
                categories.push(label);
            }
        }

        let product = Product {
            id,
            name: self.name.trim().to_owned(),
            description: self.description.trim().to_owned(),
            price: self.price,
            stock: self.stock,
            categories,
            images,
            owner_id,
            contact_phone: non_empty(self.contact_phone),
            brand: non_empty(self.brand).unwrap_or_else(|| DEFAULT_BRAND.to_owned()),
            condition: non_empty(self.condition).unwrap_or_else(|| DEFAULT_CONDITION.to_owned()),
            warranty: non_empty(self.warranty).unwrap_or_else(|| DEFAULT_WARRANTY.to_owned()),
            status: ProductStatus::Active,
            rating: 0.0,
            review_count: 0,
            created_at: now,
            updated_at: now,
        };
        product.validate()?;
        Ok(product)
    }
}

/// Everything a stored product may contain, in any historical spelling.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductWire {
    #[serde(default)]
    id: Option<LenientInt>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    price: Option<Decimal>,
    #[serde(default)]
    stock: Option<LenientInt>,
    #[serde(default)]
    category: Option<Labels>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    images: Option<Vec<String>>,
    #[serde(default, alias = "sellerId")]
    owner_id: Option<LenientInt>,
    #[serde(default, alias = "sellerPhone")]
    contact_phone: Option<String>,
    #[serde(default)]
    brand: Option<String>,
    #[serde(default)]
    condition: Option<String>,
    #[serde(default)]
    warranty: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default, alias = "reviews")]
    review_count: Option<LenientInt>,
    #[serde(default)]
    created_at: Option<Timestamp>,
    #[serde(default)]
    updated_at: Option<Timestamp>,
}

impl TryFrom<ProductWire> for Product {
    type Error = RecordError;

    fn try_from(wire: ProductWire) -> Result<Self, Self::Error> {
        let id = wire.id.ok_or(RecordError::MissingField("id"))?.resolve("id")?;
        let name = non_empty(wire.name).ok_or(RecordError::MissingField("name"))?;
        let price = Price::new(wire.price.ok_or(RecordError::MissingField("price"))?)?;
        let owner_id = wire
            .owner_id
            .ok_or(RecordError::MissingField("ownerId"))?
            .resolve("ownerId")?;

        let stock = match wire.stock {
            Some(raw) => {
                let stock = raw.resolve("stock")?;
                if stock < 0 {
                    return Err(RecordError::NegativeStock(stock));
                }
                u32::try_from(stock).map_err(|_| RecordError::OutOfRange { field: "stock" })?
            }
            None => 0,
        };

        let review_count = match wire.review_count {
            Some(raw) => u32::try_from(raw.resolve("reviewCount")?)
                .map_err(|_| RecordError::OutOfRange { field: "reviewCount" })?,
            None => 0,
        };

        let mut images: Vec<String> = wire
            .images
            .unwrap_or_default()
            .into_iter()
            .filter(|img| !img.trim().is_empty())
            .collect();
        if images.is_empty()
            && let Some(primary) = non_empty(wire.image).or_else(|| non_empty(wire.image_url))
        {
            images.push(primary);
        }

        let created_at = match wire.created_at {
            Some(ts) => ts.resolve("createdAt")?,
            None => DateTime::UNIX_EPOCH,
        };
        let updated_at = match wire.updated_at {
            Some(ts) => ts.resolve("updatedAt")?,
            None => created_at,
        };

        let status = wire
            .status
            .map_or(Ok(ProductStatus::Active), |s| s.parse::<ProductStatus>())
            .unwrap_or(ProductStatus::Inactive);

        Ok(Self {
            id: ProductId::new(id),
            name,
            description: wire.description.unwrap_or_default().trim().to_owned(),
            price,
            stock,
            categories: wire.category.map(Labels::resolve).unwrap_or_default(),
            images,
            owner_id: UserId::new(owner_id),
            contact_phone: non_empty(wire.contact_phone),
            brand: non_empty(wire.brand).unwrap_or_else(|| DEFAULT_BRAND.to_owned()),
            condition: non_empty(wire.condition).unwrap_or_else(|| DEFAULT_CONDITION.to_owned()),
            warranty: non_empty(wire.warranty).unwrap_or_else(|| DEFAULT_WARRANTY.to_owned()),
            status,
            rating: wire.rating.filter(|r| r.is_finite()).unwrap_or(0.0),
            review_count,
            created_at,
            updated_at,
        })
    }
}

/// Canonical output shape.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductJson<'a> {
    id: ProductId,
    name: &'a str,
    description: &'a str,
    price: Price,
    stock: u32,
    category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
    images: &'a [String],
    owner_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    contact_phone: Option<&'a str>,
    brand: &'a str,
    condition: &'a str,
    warranty: &'a str,
    status: ProductStatus,
    rating: f64,
    review_count: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Serialize for Product {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ProductJson {
            id: self.id,
            name: &self.name,
            description: &self.description,
            price: self.price,
            stock: self.stock,
            category: self.category_label(),
            image: self.primary_image(),
            images: &self.images,
            owner_id: self.owner_id,
            contact_phone: self.contact_phone.as_deref(),
            brand: &self.brand,
            condition: &self.condition,
            warranty: &self.warranty,
            status: self.status,
            rating: self.rating,
            review_count: self.review_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Product {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = ProductWire::deserialize(deserializer)?;
        Self::try_from(wire).map_err(serde::de::Error::custom)
    }
}
