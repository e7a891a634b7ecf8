//! Catalog product models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use evault_core::{BulkDiscountTierId, Money, ProductId, Slug};

/// A spare part offered in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Display title.
    pub title: String,
    /// URL slug, generated once from the title.
    pub slug: Slug,
    /// Manufacturer part number (unique when present).
    pub part_number: Option<String>,
    /// Long-form description.
    pub description: String,
    /// Selling price per unit, before bulk discounts.
    pub price: Money,
    /// Maximum retail price.
    pub mrp: Money,
    /// Units on hand.
    pub stock: u32,
    /// Staff override that hides the product from sale regardless of stock.
    pub is_out_of_stock_manual: bool,
    /// Bulk-discount tiers, highest `min_quantity` first.
    pub bulk_discounts: Vec<BulkDiscountTier>,
    /// When the product was created.
    pub created_at: DateTime<Utc>,
    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Out of stock either because nothing is on hand or because staff said so.
    #[must_use]
    pub const fn is_out_of_stock(&self) -> bool {
        self.stock == 0 || self.is_out_of_stock_manual
    }

    /// Label shown on product pages.
    #[must_use]
    pub const fn stock_status(&self) -> &'static str {
        if self.is_out_of_stock() {
            "Out of Stock"
        } else {
            "In Stock"
        }
    }

    /// Units that can actually be sold right now.
    #[must_use]
    pub const fn available(&self) -> u32 {
        if self.is_out_of_stock_manual {
            0
        } else {
            self.stock
        }
    }

    /// Whether `quantity` units can be sold.
    #[must_use]
    pub const fn can_fulfil(&self, quantity: u32) -> bool {
        !self.is_out_of_stock() && self.stock >= quantity
    }

    /// Sort tiers highest threshold first.
    pub fn sort_tiers(&mut self) {
        self.bulk_discounts
            .sort_by(|a, b| b.min_quantity.cmp(&a.min_quantity));
    }
}

/// A quantity-based discount on one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDiscountTier {
    /// Unique tier ID.
    pub id: BulkDiscountTierId,
    /// Product the tier belongs to.
    pub product_id: ProductId,
    /// Minimum line quantity for the tier to apply.
    pub min_quantity: u32,
    /// Percentage taken off the unit price, in `[0, 100]`.
    pub discount_percentage: Decimal,
}

/// Input for creating a product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub title: String,
    /// Explicit slug; generated from the title when absent.
    #[serde(default)]
    pub slug: Option<Slug>,
    #[serde(default)]
    pub part_number: Option<String>,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    pub mrp: Money,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub is_out_of_stock_manual: bool,
}

/// Input for attaching a bulk-discount tier to a product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBulkDiscountTier {
    pub product_id: ProductId,
    pub min_quantity: u32,
    pub discount_percentage: Decimal,
}
