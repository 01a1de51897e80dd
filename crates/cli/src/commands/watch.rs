//! Live seller dashboard.
//!
//! Re-reads the seller's figures every `SHOPKART_REFRESH_INTERVAL_SECS` and
//! prints them each time a read completes. Stops on Ctrl-C.

use shopkart_core::UserId;
use shopkart_store::Marketplace;
use tracing::info;

use super::CommandError;

/// Watch `seller`'s dashboard until interrupted.
///
/// # Errors
///
/// Returns an error if output cannot be encoded or the interrupt handler
/// cannot be installed.
pub async fn run(market: &Marketplace, seller: UserId) -> Result<(), CommandError> {
    let refresher = market.watch_seller_stats(seller);
    let mut updates = refresher.subscribe();
    info!(%seller, interval = ?market.config().refresh_interval, "Watching seller dashboard");

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = updates.borrow_and_update().clone();
                if let Some(stats) = latest {
                    #[allow(clippy::print_stdout)]
                    {
                        println!("{}", serde_json::to_string(&*stats)?);
                    }
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.map_err(CommandError::Signal)?;
                info!("Interrupted");
                break;
            }
        }
    }
    Ok(())
}
