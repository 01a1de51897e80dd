//! ShopKart CLI - Migration, inspection and repair of the local data store.
//!
//! # Usage
//!
//! ```bash
//! # Load a legacy collection into the flat store
//! shopkart import products legacy/products.json
//!
//! # Copy flat collections into the indexed store
//! shopkart migrate
//!
//! # Buyer listing, cheapest first
//! shopkart products --search kettle --sort price-asc
//!
//! # Seller dashboard
//! shopkart stats --seller 1700000000000
//!
//! # Re-print a seller's dashboard every refresh interval
//! shopkart watch --seller 1700000000000
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run the flat-to-indexed migration
//! - `products` - Query products
//! - `stats` - Seller dashboard figures
//! - `orders` - Orders by seller or buyer
//! - `import` - Load a JSON array into a flat collection
//! - `repair` - Drop unreadable records from the flat collections
//! - `usage` - Flat medium usage
//! - `watch` - Periodically re-read a seller's dashboard
//!
//! Configuration comes from `SHOPKART_*` environment variables (see
//! `shopkart_store::config`); `--data-dir` overrides `SHOPKART_DATA_DIR`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shopkart_core::{EntityType, UserId};
use shopkart_store::{Marketplace, SortKey, StoreConfig, StoreLocation};

mod commands;

#[derive(Parser)]
#[command(name = "shopkart")]
#[command(author, version, about = "ShopKart local data store tools")]
struct Cli {
    /// Data directory (overrides `SHOPKART_DATA_DIR`)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy flat collections into the indexed store
    Migrate,
    /// Query products
    Products {
        /// Only this seller's products, any status
        #[arg(long)]
        seller: Option<i64>,

        /// Case-insensitive text to match in name, description or category
        #[arg(short, long)]
        search: Option<String>,

        /// Category label
        #[arg(short, long)]
        category: Option<String>,

        /// Sort order (`newest`, `price-asc`, `price-desc`, `rating`)
        #[arg(long, default_value = "newest")]
        sort: SortKey,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Seller dashboard figures
    Stats {
        /// Seller ID
        #[arg(long)]
        seller: i64,
    },
    /// List orders, newest first
    Orders {
        /// Orders for this seller's products
        #[arg(long, conflicts_with = "buyer", required_unless_present = "buyer")]
        seller: Option<i64>,

        /// Orders placed by this buyer
        #[arg(long)]
        buyer: Option<i64>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Load a JSON array file into a flat collection, replacing it
    Import {
        /// Collection (`products`, `users`, `orders`)
        entity: EntityType,

        /// JSON file holding an array of records
        file: PathBuf,
    },
    /// Drop unreadable or invalid records from the flat collections
    Repair,
    /// Show flat medium usage
    Usage,
    /// Re-read a seller's dashboard every refresh interval until interrupted
    Watch {
        /// Seller ID
        #[arg(long)]
        seller: i64,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = StoreConfig::from_env()?;
    if let Some(dir) = cli.data_dir {
        config.location = StoreLocation::Directory(dir);
    }
    let market = Marketplace::open(config).await?;

    match cli.command {
        Commands::Migrate => commands::migrate::run(&market).await?,
        Commands::Products {
            seller,
            search,
            category,
            sort,
            limit,
            json,
        } => {
            let args = commands::products::ListArgs {
                seller: seller.map(UserId::new),
                search,
                category,
                sort,
                limit,
                json,
            };
            commands::products::list(&market, args).await?;
        }
        Commands::Stats { seller } => {
            commands::products::stats(&market, UserId::new(seller)).await?;
        }
        Commands::Orders {
            seller,
            buyer,
            json,
        } => commands::orders::list(&market, seller, buyer, json).await?,
        Commands::Import { entity, file } => commands::data::import(&market, entity, &file).await?,
        Commands::Repair => commands::data::repair(&market).await?,
        Commands::Usage => commands::data::usage(&market).await?,
        Commands::Watch { seller } => commands::watch::run(&market, UserId::new(seller)).await?,
    }

    market.close().await;
    Ok(())
}
