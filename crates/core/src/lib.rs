//! eVault Core - Shared types library.
//!
//! This crate provides common types used across all eVault components:
//! - `checkout` - Cart, pricing, coupon and checkout pipeline
//! - `cli` - Command-line tools for migrations, seeding and staff actions
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, slugs and order statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
