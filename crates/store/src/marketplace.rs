//! The marketplace handle: both stores, the session and the one-time migration.
//!
//! Every indexed read or write first makes sure the flat collections have been
//! migrated. The migration runs at most once per handle; concurrent callers
//! wait for the same run.

use std::sync::Arc;

use chrono::Utc;
use secrecy::SecretString;
use shopkart_core::{
    EntityType, IdGenerator, Order, OrderId, Product, ProductDraft, ProductId, Profile, Record,
    User, UserId,
};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use crate::config::{StoreConfig, StoreLocation};
use crate::error::{Result, StoreError};
use crate::flat::{AnyMedium, DirMedium, FlatStore, MemoryMedium, RepairReport, StorageEstimate};
use crate::indexed::IndexedStore;
use crate::migration::{MigrationReport, Migrator};
use crate::query::{OrderParty, ProductQuery, Visibility, orders_for};
use crate::session::{LoginOutcome, Session};
use crate::stats::{InventoryStats, OrderStats, SellerStats};

/// Application handle. Cheap to clone; clones share stores and migration state.
#[derive(Debug, Clone)]
pub struct Marketplace {
    config: StoreConfig,
    flat: FlatStore<AnyMedium>,
    indexed: IndexedStore,
    session: Session<AnyMedium>,
    ids: Arc<IdGenerator>,
    migration: Arc<OnceCell<MigrationReport>>,
}

impl Marketplace {
    /// Open both stores at `config.location`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the flat directory cannot be created, or
    /// [`StoreError::Backend`] if a database cannot be opened.
    #[instrument(skip_all, fields(location = ?config.location))]
    pub async fn open(config: StoreConfig) -> Result<Self> {
        let medium = match &config.location {
            StoreLocation::Directory(dir) => {
                AnyMedium::Dir(DirMedium::open(dir.join("flat"), config.flat_quota_bytes)?)
            }
            StoreLocation::InMemory => AnyMedium::Memory(MemoryMedium::new(config.flat_quota_bytes)),
        };
        let flat = FlatStore::new(medium);
        let indexed = IndexedStore::open(&config.location, config.indexed_max_connections).await?;
        info!("Opened marketplace store");

        Ok(Self {
            session: Session::new(flat.clone()),
            flat,
            indexed,
            config,
            ids: Arc::new(IdGenerator::new()),
            migration: Arc::new(OnceCell::new()),
        })
    }

    /// Configuration this handle was opened with.
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The legacy flat store.
    #[must_use]
    pub const fn flat(&self) -> &FlatStore<AnyMedium> {
        &self.flat
    }


    /// Session state.
    #[must_use]
    pub const fn session(&self) -> &Session<AnyMedium> {
        &self.session
    }

    /// Migrate flat data into the indexed store unless this handle already has.
    ///
    /// # Errors
    ///
    /// Returns an error only if a medium cannot be read. A failed run is not
    /// cached; the next call tries again.
    pub async fn ensure_migrated(&self) -> Result<&MigrationReport> {
        self.migration
            .get_or_try_init(|| async {
                let report = Migrator::new(&self.flat, &self.indexed).run().await?;
                info!(
                    migrated = report.total_migrated(),
                    failed = report.total_failed(),
                    "Migration complete"
                );
                Ok::<_, StoreError>(report)
            })
            .await
    }

    /// The indexed store, once flat data has been migrated into it.
    ///
    /// # Errors
    ///
    /// Returns whatever [`Self::ensure_migrated`] returns.
    pub async fn indexed(&self) -> Result<&IndexedStore> {
        self.ensure_migrated().await?;
        Ok(&self.indexed)
    }

    /// Publish a listing owned by the logged-in user.
    ///
    /// The seller's phone is used as contact phone when the draft has none.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotLoggedIn`], [`StoreError::Validation`] or a
    /// backend error.
    #[instrument(skip_all, fields(name = %draft.name))]
    pub async fn publish_product(&self, mut draft: ProductDraft) -> Result<Product> {
        let seller = self.session.require_user().await?;
        if draft.contact_phone.is_none() {
            draft.contact_phone.clone_from(&seller.phone);
        }
        let id: ProductId = self.ids.next_id();
        let product = draft
            .into_product(id, seller.id, Utc::now())
            .map_err(|e| StoreError::validation(EntityType::Products, id.as_i64(), e))?;

        self.indexed().await?.put(&product).await?;
        info!(product_id = %product.id, seller_id = %seller.id, "Published product");
        Ok(product)
    }

    /// Save edits to an existing listing and stamp `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the product does not exist, or
    /// [`StoreError::Validation`].
    #[instrument(skip_all, fields(product_id = %product.id))]
    pub async fn update_product(&self, mut product: Product) -> Result<Product> {
        product.updated_at = Utc::now();
        self.indexed().await?.replace(&product).await?;
        debug!("Updated product");
        Ok(product)
    }

    /// Delete a listing. Existing orders keep their snapshot.
    ///
    /// # Errors
    ///
    /// Returns a backend error.
    pub async fn delete_product(&self, id: ProductId) -> Result<bool> {
        let removed = self
            .indexed()
            .await?
            .delete(EntityType::Products, id.as_i64())
            .await?;
        info!(product_id = %id, removed, "Deleted product");
        Ok(removed)
    }

    /// One product.
    ///
    /// # Errors
    ///
    /// Returns a backend error or [`StoreError::DataCorruption`].
    pub async fn product(&self, id: ProductId) -> Result<Option<Product>> {
        self.indexed().await?.get(id.as_i64()).await
    }

    /// Run `query` as given.
    ///
    /// # Errors
    ///
    /// Returns a backend error or [`StoreError::DataCorruption`].
    pub async fn products(&self, query: &ProductQuery) -> Result<Vec<Product>> {
        query.run(self.indexed().await?).await
    }

    /// Buyer-facing listing: active products only, whatever `query` asks for.
    ///
    /// # Errors
    ///
    /// Returns a backend error or [`StoreError::DataCorruption`].
    pub async fn buyer_listing(&self, query: ProductQuery) -> Result<Vec<Product>> {
        let query = ProductQuery {
            visibility: Visibility::Buyer,
            ..query
        };
        self.products(&query).await
    }

    /// Every listing owned by `seller`, any status.
    ///
    /// # Errors
    ///
    /// Returns a backend error or [`StoreError::DataCorruption`].
    pub async fn seller_products(&self, seller: UserId, query: ProductQuery) -> Result<Vec<Product>> {
        let query = ProductQuery {
            visibility: Visibility::Owner(seller),
            ..query
        };
        self.products(&query).await
    }

    /// The seller's newest listings for the dashboard.
    ///
    /// # Errors
    ///
    /// Returns a backend error or [`StoreError::DataCorruption`].
    pub async fn recent_products(&self, seller: UserId) -> Result<Vec<Product>> {
        self.products(&ProductQuery::recent(seller)).await
    }

    /// Dashboard figures for `seller`, read fresh from the indexed store.
    ///
    /// # Errors
    ///
    /// Returns a backend error or [`StoreError::DataCorruption`].
    #[instrument(skip(self))]
    pub async fn seller_stats(&self, seller: UserId) -> Result<SellerStats> {
        let products = self.seller_products(seller, ProductQuery::default()).await?;
        let orders = self.seller_orders(seller).await?;
        Ok(SellerStats {
            inventory: InventoryStats::compute(&products),
            orders: OrderStats::compute(&orders),
        })
    }

    /// Place an order for the logged-in user.
    ///
    /// The order carries a snapshot of the product as it is now. Stock is not
    /// decremented.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotLoggedIn`], [`StoreError::NotAvailable`] if the
    /// product is missing or not listed, [`StoreError::InsufficientStock`], or
    /// [`StoreError::Validation`] for a bad quantity or address.
    #[instrument(skip(self, shipping_address))]
    pub async fn place_order(
        &self,
        product_id: ProductId,
        quantity: u32,
        shipping_address: &str,
    ) -> Result<Order> {
        let buyer = self.session.require_user().await?;
        let indexed = self.indexed().await?;
        let product: Product = indexed
            .get(product_id.as_i64())
            .await?
            .filter(Product::is_listed)
            .ok_or(StoreError::NotAvailable(product_id))?;
        if product.stock < quantity {
            return Err(StoreError::InsufficientStock {
                product: product_id,
                requested: quantity,
                available: product.stock,
            });
        }

        let id: OrderId = self.ids.next_id();
        let order = Order::snapshot(id, &buyer, &product, quantity, shipping_address, Utc::now())
            .map_err(|e| StoreError::validation(EntityType::Orders, id.as_i64(), e))?;
        indexed.put(&order).await?;
        info!(order_id = %order.id, buyer_id = %buyer.id, seller_id = %order.seller_id, "Placed order");
        Ok(order)
    }

    /// Confirm a pending order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the order does not exist.
    #[instrument(skip(self))]
    pub async fn confirm_order(&self, id: OrderId) -> Result<Order> {
        let indexed = self.indexed().await?;
        let mut order: Order = indexed
            .get(id.as_i64())
            .await?
            .ok_or(StoreError::NotFound {
                entity: EntityType::Orders,
                id: id.as_i64(),
            })?;
        order.confirm(Utc::now());
        indexed.replace(&order).await?;
        info!("Confirmed order");
        Ok(order)
    }

    /// Orders for `seller`'s products, newest first.
    ///
    /// # Errors
    ///
    /// Returns a backend error or [`StoreError::DataCorruption`].
    pub async fn seller_orders(&self, seller: UserId) -> Result<Vec<Order>> {
        orders_for(self.indexed().await?, OrderParty::Seller(seller)).await
    }

    /// Orders `buyer` placed, newest first.
    ///
    /// # Errors
    ///
    /// Returns a backend error or [`StoreError::DataCorruption`].
    pub async fn buyer_orders(&self, buyer: UserId) -> Result<Vec<Order>> {
        orders_for(self.indexed().await?, OrderParty::Buyer(buyer)).await
    }

    /// Log in and record the user in the indexed store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] for a user without a name, or a
    /// medium error.
    pub async fn login(&self, user: User, token: SecretString) -> Result<LoginOutcome> {
        user.validate()
            .map_err(|e| StoreError::validation(EntityType::Users, user.key(), e))?;
        let outcome = self.session.login(user, token).await?;
        self.remember_user(&outcome.user).await?;
        Ok(outcome)
    }

    /// Start a session for a new account and record it in the indexed store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] or a medium error.
    pub async fn register(&self, user: User, token: SecretString) -> Result<User> {
        user.validate()
            .map_err(|e| StoreError::validation(EntityType::Users, user.key(), e))?;
        let user = self.session.register(user, token).await?;
        self.remember_user(&user).await?;
        Ok(user)
    }

    /// Edit the logged-in user's profile.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotLoggedIn`] or a medium error.
    pub async fn update_profile(&self, edit: Profile) -> Result<User> {
        let user = self.session.update_profile(edit).await?;
        self.remember_user(&user).await?;
        Ok(user)
    }

    /// End the session. See [`Session::logout`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the session cannot be cleared.
    pub async fn logout(&self) -> Result<Option<User>> {
        self.session.logout().await
    }

    async fn remember_user(&self, user: &User) -> Result<()> {
        let mut stored = user.clone();
        stored.token = None;
        self.indexed().await?.upsert(&stored).await
    }

    /// Flat medium usage.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the medium cannot be read.
    pub async fn usage(&self) -> Result<StorageEstimate> {
        self.flat.usage().await
    }

    /// Drop unreadable or invalid records from every flat collection.
    ///
    /// # Errors
    ///
    /// Returns a medium error.
    pub async fn repair_flat(&self) -> Result<Vec<RepairReport>> {
        Ok(vec![
            self.flat.repair::<Product>().await?,
            self.flat.repair::<User>().await?,
            self.flat.repair::<Order>().await?,
        ])
    }

    /// Close the database pools.
    pub async fn close(&self) {
        self.indexed.close().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use shopkart_core::{Price, ProductStatus};

    async fn market() -> Marketplace {
        Marketplace::open(StoreConfig::in_memory()).await.unwrap()
    }

    fn user(id: i64, name: &str, email: &str) -> User {
        serde_json::from_value(json!({"id": id, "name": name, "email": email, "phone": "98"}))
            .unwrap()
    }

    fn token() -> SecretString {
        SecretString::from("t".to_owned())
    }

    fn draft(name: &str, rupees: i64, stock: u32) -> ProductDraft {
        ProductDraft {
            name: name.to_owned(),
            description: format!("{name} for sale"),
            price: Price::from_paise(rupees * 100).unwrap(),
            stock,
            categories: vec!["Home".to_owned()],
            images: vec!["data:image/png;base64,AA".to_owned()],
            contact_phone: None,
            brand: None,
            condition: None,
            warranty: None,
        }
    }

    #[tokio::test]
    async fn test_publish_requires_login() {
        let err = market().await.publish_product(draft("Kettle", 10, 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotLoggedIn));
    }

    #[tokio::test]
    async fn test_publish_and_list() {
        let market = market().await;
        market.login(user(1, "Seller", "s@shop.in"), token()).await.unwrap();
        let kettle = market.publish_product(draft("Kettle", 899, 4)).await.unwrap();
        assert_eq!(kettle.owner_id, UserId::new(1));
        assert_eq!(kettle.contact_phone.as_deref(), Some("98"));

        let listed = market.buyer_listing(ProductQuery::default()).await.unwrap();
        assert_eq!(listed, vec![kettle.clone()]);

        let mut hidden = kettle.clone();
        hidden.status = ProductStatus::Inactive;
        market.update_product(hidden).await.unwrap();
        assert!(market.buyer_listing(ProductQuery::default()).await.unwrap().is_empty());
        assert_eq!(
            market
                .seller_products(UserId::new(1), ProductQuery::default())
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_update_cannot_remove_last_image() {
        let market = market().await;
        market.login(user(1, "Seller", "s@shop.in"), token()).await.unwrap();
        let kettle = market.publish_product(draft("Kettle", 899, 4)).await.unwrap();

        let mut bare = kettle.clone();
        bare.images.clear();
        let err = market.update_product(bare).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
        assert_eq!(market.product(kettle.id).await.unwrap(), Some(kettle));
    }

    #[tokio::test]
    async fn test_place_and_confirm_order() {
        let market = market().await;
        market.login(user(1, "Seller", "s@shop.in"), token()).await.unwrap();
        let kettle = market.publish_product(draft("Kettle", 100, 3)).await.unwrap();
        market.logout().await.unwrap();

        market.login(user(2, "Buyer", "b@shop.in"), token()).await.unwrap();
        let err = market.place_order(kettle.id, 5, "Pune").await.unwrap_err();
        assert!(matches!(err, StoreError::InsufficientStock { available: 3, .. }));

        let order = market.place_order(kettle.id, 2, "Pune").await.unwrap();
        assert_eq!(order.total(), rust_decimal::Decimal::from(200));
        assert_eq!(market.buyer_orders(UserId::new(2)).await.unwrap(), vec![order.clone()]);

        let confirmed = market.confirm_order(order.id).await.unwrap();
        let stats = market.seller_stats(UserId::new(1)).await.unwrap();
        assert_eq!(stats.orders.confirmed, 1);
        assert_eq!(stats.orders.pending, 0);
        assert_eq!(confirmed.product_name, "Kettle");
        // Stock is untouched by ordering.
        assert_eq!(market.product(kettle.id).await.unwrap().unwrap().stock, 3);
    }

    #[tokio::test]
    async fn test_order_for_missing_product() {
        let market = market().await;
        market.login(user(2, "Buyer", "b@shop.in"), token()).await.unwrap();
        let err = market
            .place_order(ProductId::new(99), 1, "Pune")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotAvailable(_)));
    }

    #[tokio::test]
    async fn test_login_records_user_without_token() {
        let market = market().await;
        market.login(user(5, "Asha", "asha@shop.in"), token()).await.unwrap();
        let stored: User = market
            .indexed()
            .await
            .unwrap()
            .get(5)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.token.is_none());
        assert_eq!(stored.name, "Asha");
    }

    #[tokio::test]
    async fn test_migration_runs_once() {
        let market = market().await;
        market
            .flat()
            .set_raw(
                "products",
                r#"[{"id": 1, "name": "Old", "price": 5, "stock": 1, "category": "Home",
                    "sellerId": 3, "image": "x"}]"#
                    .to_owned(),
            )
            .await
            .unwrap();
        let first = market.ensure_migrated().await.unwrap().total_migrated();
        assert_eq!(first, 1);
        let again = market.ensure_migrated().await.unwrap().total_migrated();
        assert_eq!(again, 1);
        let indexed = market.indexed().await.unwrap();
        assert_eq!(indexed.count(EntityType::Products).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_indexed_access_migrates_first() {
        let market = market().await;
        market
            .flat()
            .set_raw(
                "products",
                r#"[{"id": 4, "name": "Lamp", "price": 50, "stock": 2, "category": "Home",
                    "sellerId": 3, "image": "l"}]"#
                    .to_owned(),
            )
            .await
            .unwrap();

        let lamp: Option<Product> = market.indexed().await.unwrap().get(4).await.unwrap();
        assert_eq!(lamp.unwrap().name, "Lamp");
    }
}
