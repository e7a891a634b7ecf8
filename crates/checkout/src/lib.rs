//! eVault checkout library.
//!
//! Turns a shopper's cart into a priced, persisted order:
//!
//! - [`cart`] - persisted and session carts, resolution against the catalog
//! - [`pricing`] - bulk-discount tiers, GST, delivery and coupon discount
//! - [`coupon`] - coupon activity and validity window checks
//! - [`checkout`] - quotes and the all-or-nothing checkout
//! - [`admin`] - catalog writes and staff order actions
//! - [`db`] - store traits with in-memory and `PostgreSQL` implementations

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod admin;
pub mod cart;
pub mod checkout;
pub mod clock;
pub mod config;
pub mod coupon;
pub mod db;
pub mod error;
pub mod models;
pub mod pricing;

pub use checkout::{CheckoutOrchestrator, Quote};
pub use error::CheckoutError;
