//! Flat-store maintenance: import, repair, usage.
//!
//! # Usage
//!
//! ```bash
//! # Replace the flat products collection with a legacy export
//! shopkart import products export/products.json
//!
//! # Drop records that no longer read back
//! shopkart repair
//!
//! # How close the flat medium is to its quota
//! shopkart usage
//! ```
//!
//! Imported data lands in the flat store exactly as given; `migrate` then
//! moves it into the indexed store.

use std::path::Path;

use shopkart_core::{Decoded, EntityType, Order, Product, Record, User, codec};
use shopkart_store::Marketplace;
use tracing::{info, warn};

use super::CommandError;

/// Replace `entity`'s flat collection with the array in `file`.
///
/// The file must be a JSON array. Elements that do not read as records are
/// reported but still stored; `repair` removes them.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not a JSON array, or the
/// flat medium refuses the write.
pub async fn import(market: &Marketplace, entity: EntityType, file: &Path) -> Result<(), CommandError> {
    let blob = tokio::fs::read_to_string(file)
        .await
        .map_err(|source| CommandError::Read {
            path: file.display().to_string(),
            source,
        })?;

    let (readable, unreadable) = match entity {
        EntityType::Products => counts(&codec::decode_collection::<Product>(&blob)?),
        EntityType::Users => counts(&codec::decode_collection::<User>(&blob)?),
        EntityType::Orders => counts(&codec::decode_collection::<Order>(&blob)?),
    };
    if unreadable > 0 {
        warn!(%entity, unreadable, "Some elements do not read as records");
    }

    market.flat().set_raw(entity.as_str(), blob).await?;
    info!(%entity, readable, unreadable, "Imported into flat store");

    #[allow(clippy::print_stdout)]
    {
        println!("{entity}: {readable} readable, {unreadable} unreadable");
    }
    Ok(())
}

fn counts<R: Record>(decoded: &Decoded<R>) -> (usize, usize) {
    (decoded.records.len(), decoded.issues.len())
}

/// Rewrite every flat collection without its unreadable or invalid records.
///
/// # Errors
///
/// Returns an error if the flat medium cannot be read or written.
pub async fn repair(market: &Marketplace) -> Result<(), CommandError> {
    let reports = market.repair_flat().await?;

    #[allow(clippy::print_stdout)]
    {
        for report in &reports {
            println!(
                "{}: {} kept, {} dropped",
                report.entity,
                report.kept,
                report.dropped.len()
            );
            for issue in &report.dropped {
                let id = issue.id.map_or_else(|| "-".to_owned(), |id| id.to_string());
                println!("  position {} (id {id}): {}", issue.position, issue.reason);
            }
        }
    }
    Ok(())
}

/// Print flat medium usage.
///
/// # Errors
///
/// Returns an error if the flat medium cannot be read.
pub async fn usage(market: &Marketplace) -> Result<(), CommandError> {
    let estimate = market.usage().await?;
    if estimate.nearly_full {
        warn!(percent = estimate.percent, "Flat storage is nearly full");
    }

    #[allow(clippy::print_stdout)]
    {
        println!(
            "{} of {} bytes used ({:.1}%)",
            estimate.used, estimate.quota, estimate.percent
        );
    }
    Ok(())
}
