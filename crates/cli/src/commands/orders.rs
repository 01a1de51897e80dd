//! Order listings.

use shopkart_core::UserId;
use shopkart_store::Marketplace;

use super::CommandError;

/// Print orders for a seller or a buyer, newest first.
///
/// # Errors
///
/// Returns an error if the indexed store cannot be read.
pub async fn list(
    market: &Marketplace,
    seller: Option<i64>,
    buyer: Option<i64>,
    json: bool,
) -> Result<(), CommandError> {
    let orders = match (seller, buyer) {
        (Some(seller), _) => market.seller_orders(UserId::new(seller)).await?,
        (None, Some(buyer)) => market.buyer_orders(UserId::new(buyer)).await?,
        (None, None) => Vec::new(),
    };

    #[allow(clippy::print_stdout)]
    {
        if json {
            println!("{}", serde_json::to_string_pretty(&orders)?);
        } else {
            for order in &orders {
                println!(
                    "{:>14}  {:<9}  {:<32} x{:<3} {:>12}  buyer {}  {}",
                    order.id.as_i64(),
                    order.status.as_str(),
                    order.product_name,
                    order.quantity,
                    order.total_price.to_string(),
                    order.buyer_id,
                    order.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
    }
    Ok(())
}
