//! Catalog and order administration.

pub mod catalog;
pub mod orders;

pub use catalog::{CatalogAdmin, CatalogError, MAX_COUPON_CODE_LENGTH};
pub use orders::{OrderAdmin, OrderAdminError};
