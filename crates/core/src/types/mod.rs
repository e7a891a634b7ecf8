//! Core types for eVault.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod money;
pub mod slug;
pub mod status;

pub use id::*;
pub use money::{CurrencyCode, Money};
pub use slug::{Slug, slugify};
pub use status::*;
