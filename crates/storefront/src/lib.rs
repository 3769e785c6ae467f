//! Emporium storefront library.
//!
//! Cart and checkout engine for a small shop, with the axum HTTP layer that
//! exposes it. The engine services in [`services`] are generic over the
//! [`db::ShopStore`] contract so they run against `PostgreSQL` in production
//! and an in-memory store in tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
