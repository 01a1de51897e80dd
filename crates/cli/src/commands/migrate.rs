//! Flat-to-indexed migration.
//!
//! # Usage
//!
//! ```bash
//! shopkart migrate
//! ```
//!
//! Safe to repeat: records already in the indexed store are left alone and
//! reported as already present.

use shopkart_store::Marketplace;
use tracing::{info, warn};

use super::CommandError;

/// Run the migration and print a per-collection report.
///
/// # Errors
///
/// Returns an error if either store cannot be read.
pub async fn run(market: &Marketplace) -> Result<(), CommandError> {
    info!("Running migration...");
    let report = market.ensure_migrated().await?;

    #[allow(clippy::print_stdout)]
    {
        for entity in &report.entities {
            println!("{entity}");
            for failed in &entity.failed {
                println!("  failed {}: {}", failed.id, failed.reason);
            }
            for dropped in &entity.dropped {
                println!("  unreadable at position {}: {}", dropped.position, dropped.reason);
            }
        }
        if report.session_user_migrated {
            println!("session user migrated");
        }
    }

    if report.total_failed() > 0 {
        warn!(failed = report.total_failed(), "Some records were not migrated");
    }
    info!(migrated = report.total_migrated(), "Migration complete!");
    Ok(())
}
