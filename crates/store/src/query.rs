//! Product and order views.
//!
//! A product query runs four steps in order: visibility, text search, category
//! filter, sort. The sort is stable, so products that compare equal keep the
//! order they were loaded in, and the same input always gives the same output.
//! Queries never modify what they read.

use std::future::Future;
use std::str::FromStr;

use shopkart_core::{IndexKey, IndexName, Order, Product, ProductStatus, UserId};

use crate::error::Result;
use crate::flat::{FlatMedium, FlatStore};
use crate::indexed::IndexedStore;

/// Number of products in the "recent products" view.
pub const RECENT_LIMIT: usize = 5;

/// Which products a viewer may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Active and in stock.
    #[default]
    Buyer,
    /// Everything one seller owns, whatever its status or stock.
    Owner(UserId),
    /// No restriction.
    All,
}

impl Visibility {
    /// Whether `product` is visible.
    #[must_use]
    pub fn admits(self, product: &Product) -> bool {
        match self {
            Self::Buyer => product.is_listed(),
            Self::Owner(owner) => product.owner_id == owner,
            Self::All => true,
        }
    }
}

/// Product ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Most recently created first.
    #[default]
    Newest,
    /// Cheapest first.
    PriceAsc,
    /// Most expensive first.
    PriceDesc,
    /// Best rated first.
    RatingDesc,
}

impl SortKey {
    /// Name accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "price-asc",
            Self::PriceDesc => "price-desc",
            Self::RatingDesc => "rating",
        }
    }

    fn sort(self, products: &mut [Product]) {
        match self {
            Self::Newest => products.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            Self::PriceAsc => products.sort_by(|a, b| a.price.cmp(&b.price)),
            Self::PriceDesc => products.sort_by(|a, b| b.price.cmp(&a.price)),
            Self::RatingDesc => products.sort_by(|a, b| b.rating.total_cmp(&a.rating)),
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "newest" => Ok(Self::Newest),
            "price-asc" | "price-low" => Ok(Self::PriceAsc),
            "price-desc" | "price-high" => Ok(Self::PriceDesc),
            "rating" | "rating-desc" => Ok(Self::RatingDesc),
            _ => Err(format!("unknown sort key: {s}")),
        }
    }
}

/// Somewhere products can be loaded from.
///
/// Sources may narrow the load using `visibility` (an index lookup, say) but
/// must return every product the visibility admits, in a deterministic order.
pub trait ProductSource {
    /// Load candidate products.
    fn load(&self, visibility: Visibility) -> impl Future<Output = Result<Vec<Product>>> + Send;
}

impl ProductSource for IndexedStore {
    async fn load(&self, visibility: Visibility) -> Result<Vec<Product>> {
        match visibility {
            Visibility::Owner(owner) => {
                self.get_by_index(IndexName::OwnerId, &IndexKey::from(owner))
                    .await
            }
            Visibility::Buyer => {
                self.get_by_index(IndexName::Status, &IndexKey::from(ProductStatus::Active))
                    .await
            }
            Visibility::All => self.get_all().await,
        }
    }
}

impl<M: FlatMedium> ProductSource for FlatStore<M> {
    async fn load(&self, _visibility: Visibility) -> Result<Vec<Product>> {
        Ok(self.read_all::<Product>().await?.records)
    }
}

/// A product query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductQuery {
    /// Visibility filter.
    pub visibility: Visibility,
    /// Case-insensitive substring over name, description and labels.
    pub search: Option<String>,
    /// Exact label match.
    pub category: Option<String>,
    /// Ordering.
    pub sort: SortKey,
    /// Keep at most this many results.
    pub limit: Option<usize>,
}

impl ProductQuery {
    /// What buyers browse.
    #[must_use]
    pub fn buyer() -> Self {
        Self::default()
    }

    /// A seller's own listings.
    #[must_use]
    pub fn owner(owner: UserId) -> Self {
        Self {
            visibility: Visibility::Owner(owner),
            ..Self::default()
        }
    }

    /// Everything.
    #[must_use]
    pub fn all() -> Self {
        Self {
            visibility: Visibility::All,
            ..Self::default()
        }
    }

    /// A seller's newest [`RECENT_LIMIT`] listings.
    #[must_use]
    pub fn recent(owner: UserId) -> Self {
        Self::owner(owner).limit(RECENT_LIMIT)
    }

    /// Set the search text. Blank text disables the filter.
    #[must_use]
    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    /// Set the category filter. A blank label disables the filter.
    #[must_use]
    pub fn category(mut self, label: impl Into<String>) -> Self {
        self.category = Some(label.into());
        self
    }

    /// Set the ordering.
    #[must_use]
    pub const fn sort(mut self, sort: SortKey) -> Self {
        self.sort = sort;
        self
    }

    /// Cap the number of results.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Run the query over already-loaded products.
    #[must_use]
    pub fn apply(&self, products: &[Product]) -> Vec<Product> {
        let needle = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        let category = self
            .category
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let mut matched: Vec<Product> = products
            .iter()
            .filter(|p| self.visibility.admits(p))
            .filter(|p| needle.as_deref().is_none_or(|n| matches_text(p, n)))
            .filter(|p| category.is_none_or(|c| p.has_category(c)))
            .cloned()
            .collect();

        self.sort.sort(&mut matched);
        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }

    /// Load from `source` and run the query.
    ///
    /// # Errors
    ///
    /// Returns whatever the source fails with.
    pub async fn run<S: ProductSource + Sync>(&self, source: &S) -> Result<Vec<Product>> {
        let products = source.load(self.visibility).await?;
        Ok(self.apply(&products))
    }
}

fn matches_text(product: &Product, needle: &str) -> bool {
    product.name.to_lowercase().contains(needle)
        || product.description.to_lowercase().contains(needle)
        || product
            .categories
            .iter()
            .any(|label| label.to_lowercase().contains(needle))
}

/// Whose orders to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderParty {
    /// Orders for a seller's products.
    Seller(UserId),
    /// Orders a buyer placed.
    Buyer(UserId),
}

/// Orders for `party`, newest first.
///
/// # Errors
///
/// Returns [`crate::StoreError::Backend`] or [`crate::StoreError::DataCorruption`].
pub async fn orders_for(store: &IndexedStore, party: OrderParty) -> Result<Vec<Order>> {
    let (index, id) = match party {
        OrderParty::Seller(id) => (IndexName::SellerId, id),
        OrderParty::Buyer(id) => (IndexName::BuyerId, id),
    };
    let mut orders: Vec<Order> = store.get_by_index(index, &IndexKey::from(id)).await?;
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(orders)
}
