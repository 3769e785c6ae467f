//! Emporium Core - Shared types library.
//!
//! This crate provides common types used across all Emporium components:
//! - `storefront` - Cart manager, checkout engine and the HTTP layer in front of them
//! - `cli` - Command-line tools for migrations, seeding and token issuing
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, quantities and checkout states

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
