//! Seed the catalog from a YAML or JSON file.
//!
//! ```yaml
//! products:
//!   - title: Brake Pad Set
//!     part_number: BP-100
//!     price: "850.00"
//!     mrp: "999.00"
//!     stock: 40
//!     tiers:
//!       - min_quantity: 10
//!         discount_percentage: "5"
//! coupons:
//!   - code: DIWALI15
//!     discount_percentage: "15"
//!     valid_from: 2026-10-20T00:00:00Z
//!     valid_until: 2026-11-05T23:59:59Z
//! ```
//!
//! JSON files with the same shape are accepted too.

use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use evault_checkout::admin::CatalogAdmin;
use evault_checkout::db::CatalogWriter;
use evault_checkout::models::{NewBulkDiscountTier, NewCoupon, NewProduct};

/// Contents of a seed file.
#[derive(Debug, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub products: Vec<SeedProduct>,
    #[serde(default)]
    pub coupons: Vec<NewCoupon>,
}

/// A product with its tiers.
#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    #[serde(flatten)]
    pub product: NewProduct,
    #[serde(default)]
    pub tiers: Vec<SeedTier>,
}

#[derive(Debug, Deserialize)]
pub struct SeedTier {
    pub min_quantity: u32,
    pub discount_percentage: Decimal,
}

/// Counts of what a seed run created.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub products: usize,
    pub tiers: usize,
    pub coupons: usize,
}

/// Seed from a file on disk.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or any entry is
/// rejected. Entries created before the failure are kept.
pub async fn from_file<W: CatalogWriter>(
    store: &W,
    file_path: &str,
) -> Result<SeedSummary, Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading seed file");
    let content = tokio::fs::read_to_string(path).await?;
    let file: SeedFile = serde_yaml::from_str(&content)?;

    let summary = seed(store, &file).await?;
    info!(
        products = summary.products,
        tiers = summary.tiers,
        coupons = summary.coupons,
        "Seeding complete"
    );
    Ok(summary)
}

/// Create everything in `file`, in file order.
///
/// # Errors
///
/// Returns the first catalog error.
pub async fn seed<W: CatalogWriter>(
    store: &W,
    file: &SeedFile,
) -> Result<SeedSummary, Box<dyn std::error::Error>> {
    let admin = CatalogAdmin::new(store);
    let mut summary = SeedSummary::default();

    for entry in &file.products {
        let product = admin.create_product(&entry.product).await?;
        summary.products += 1;

        for tier in &entry.tiers {
            admin
                .add_tier(&NewBulkDiscountTier {
                    product_id: product.id,
                    min_quantity: tier.min_quantity,
                    discount_percentage: tier.discount_percentage,
                })
                .await?;
            summary.tiers += 1;
        }
    }

    for coupon in &file.coupons {
        admin.create_coupon(coupon).await?;
        summary.coupons += 1;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use evault_checkout::db::{Catalog, MemoryStore};
    use evault_core::Money;

    use super::*;

    const SEED: &str = r#"
products:
  - title: Brake Pad Set
    part_number: BP-100
    price: "1000.00"
    mrp: "1200.00"
    stock: 40
    tiers:
      - min_quantity: 10
        discount_percentage: "5"
      - min_quantity: 100
        discount_percentage: "15"
  - title: Brake Pad Set
    price: "400.00"
    mrp: "450.00"
coupons:
  - code: DIWALI15
    discount_percentage: "15"
    valid_from: 2026-10-20T00:00:00Z
    valid_until: 2026-11-05T23:59:59Z
"#;

    #[tokio::test]
    async fn test_seed_creates_everything() {
        let file: SeedFile = serde_yaml::from_str(SEED).unwrap();
        let store = MemoryStore::new();

        let summary = seed(&store, &file).await.unwrap();
        assert_eq!(
            summary,
            SeedSummary {
                products: 2,
                tiers: 2,
                coupons: 1
            }
        );

        let products = store
            .products(&[evault_core::ProductId::new(1), evault_core::ProductId::new(2)])
            .await
            .unwrap();
        assert_eq!(products[0].price, Money::new(dec!(1000.00)));
        assert_eq!(products[0].bulk_discounts[0].min_quantity, 100);
        assert_eq!(products[1].slug.as_str(), "brake-pad-set-1");
        assert_eq!(products[1].stock, 0);

        let coupon = store.coupon_by_code("DIWALI15").await.unwrap().unwrap();
        assert!(coupon.active);
    }

    #[test]
    fn test_json_is_accepted() {
        let file: SeedFile =
            serde_yaml::from_str(r#"{"coupons": [], "products": [{"title": "Horn", "price": "250", "mrp": "300"}]}"#)
                .unwrap();
        assert_eq!(file.products.len(), 1);
        assert!(file.products[0].tiers.is_empty());
    }
}
