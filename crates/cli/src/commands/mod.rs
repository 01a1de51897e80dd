//! Subcommand implementations.

pub mod data;
pub mod migrate;
pub mod orders;
pub mod products;
pub mod watch;

use thiserror::Error;

/// Errors reported by subcommands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] shopkart_store::StoreError),

    /// Input file could not be read.
    #[error("Cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Input file is not a JSON array of records.
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] shopkart_core::CodecError),

    /// Output could not be encoded.
    #[error("Cannot encode output: {0}")]
    Output(#[from] serde_json::Error),

    /// Interrupt handler could not be installed.
    #[error("Signal error: {0}")]
    Signal(std::io::Error),
}
