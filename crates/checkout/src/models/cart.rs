//! Cart models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use evault_core::{CartId, ProductId, UserId};

use super::Product;

/// A signed-in user's persisted cart. Created lazily on the first add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// A raw cart entry: a product reference and the quantity asked for.
///
/// The product may no longer exist; [`crate::cart::CartAggregator`] drops
/// such entries when it resolves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEntry {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl CartEntry {
    #[must_use]
    pub const fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// A cart entry resolved to its live product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLine {
    pub product: Product,
    /// Always positive.
    pub quantity: u32,
}
