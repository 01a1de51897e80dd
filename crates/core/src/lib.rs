//! ShopKart Core - Record types and codec for the local data store.
//!
//! This crate provides the domain model shared by every ShopKart component:
//! - `store` - Flat and indexed storage backends, migration, queries
//! - `cli` - Command-line tools for migrations and inspection
//!
//! # Architecture
//!
//! The core crate contains only types, traits and the JSON codec - no I/O, no
//! database access. Anything that reads or writes a medium lives in the
//! `shopkart-store` crate.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, tokens and statuses
//! - [`records`] - `Product`, `User`, `Order` and the [`Record`] trait
//! - [`codec`] - Collection encoding/decoding with legacy-field normalization

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod codec;
pub mod records;
pub mod types;

pub use codec::{CodecError, DecodeIssue, Decoded, RecordError};
pub use records::*;
pub use types::*;
