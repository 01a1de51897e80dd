//! Product queries and seller stats.

use shopkart_core::{Product, UserId};
use shopkart_store::{Marketplace, ProductQuery, SellerStats, SortKey};

use super::CommandError;

/// Arguments of `shopkart products`.
#[derive(Debug)]
pub struct ListArgs {
    pub seller: Option<UserId>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub sort: SortKey,
    pub limit: Option<usize>,
    pub json: bool,
}

impl ListArgs {
    fn query(&self) -> ProductQuery {
        let mut query = self
            .seller
            .map_or_else(ProductQuery::buyer, ProductQuery::owner)
            .sort(self.sort);
        if let Some(text) = &self.search {
            query = query.search(text.clone());
        }
        if let Some(label) = &self.category {
            query = query.category(label.clone());
        }
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        query
    }
}

/// Print the products matching `args`.
///
/// # Errors
///
/// Returns an error if the indexed store cannot be read.
pub async fn list(market: &Marketplace, args: ListArgs) -> Result<(), CommandError> {
    let products = market.products(&args.query()).await?;
    tracing::debug!(count = products.len(), "Query complete");

    #[allow(clippy::print_stdout)]
    {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&products)?);
        } else {
            for product in &products {
                println!("{}", row(product));
            }
        }
    }
    Ok(())
}

fn row(product: &Product) -> String {
    format!(
        "{:>14}  {:<32}  {:>12}  stock {:>4}  {:<8}  {}",
        product.id.as_i64(),
        product.name,
        product.price.to_string(),
        product.stock,
        product.status.as_str(),
        product.category_label()
    )
}

/// Print dashboard figures for `seller` as JSON.
///
/// # Errors
///
/// Returns an error if the indexed store cannot be read.
pub async fn stats(market: &Marketplace, seller: UserId) -> Result<(), CommandError> {
    let stats: SellerStats = market.seller_stats(seller).await?;
    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }
    Ok(())
}
