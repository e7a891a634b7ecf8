//! Out-of-band catalog writes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, instrument};

use evault_core::{Money, ProductId, Slug};

use crate::db::{CatalogWriter, RepositoryError};
use crate::models::{BulkDiscountTier, Coupon, NewBulkDiscountTier, NewCoupon, NewProduct, Product};

/// Longest coupon code the `coupon.code` column holds.
pub const MAX_COUPON_CODE_LENGTH: usize = 20;

/// Errors that can occur when writing catalog data.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("title is required")]
    EmptyTitle,

    #[error("{0} must not be negative")]
    NegativeAmount(&'static str),

    #[error("discount percentage must be between 0 and 100, got {0}")]
    InvalidPercentage(Decimal),

    #[error("minimum quantity must be at least 1")]
    InvalidMinQuantity,

    #[error("coupon code must be 1 to {MAX_COUPON_CODE_LENGTH} characters")]
    InvalidCouponCode,

    #[error("validity window ends before it starts")]
    InvalidWindow {
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    },

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("{0}")]
    Duplicate(String),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl From<RepositoryError> for CatalogError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Conflict(msg) => Self::Duplicate(msg),
            other => Self::Repository(other),
        }
    }
}

/// Creates products, bulk-discount tiers and coupons.
#[derive(Debug, Clone, Copy)]
pub struct CatalogAdmin<'a, W> {
    store: &'a W,
}

impl<'a, W: CatalogWriter> CatalogAdmin<'a, W> {
    #[must_use]
    pub const fn new(store: &'a W) -> Self {
        Self { store }
    }

    /// Create a product.
    ///
    /// An explicit slug is used as given. Otherwise one is generated from the
    /// title, with `-1`, `-2`, ... appended until it is free.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` for a blank title, negative prices, or a taken
    /// slug or part number.
    #[instrument(skip(self, product), fields(title = %product.title))]
    pub async fn create_product(&self, product: &NewProduct) -> Result<Product, CatalogError> {
        if product.title.trim().is_empty() {
            return Err(CatalogError::EmptyTitle);
        }
        if product.price.is_negative() {
            return Err(CatalogError::NegativeAmount("price"));
        }
        if product.mrp.is_negative() {
            return Err(CatalogError::NegativeAmount("mrp"));
        }

        let mut product = product.clone();
        product.part_number = product
            .part_number
            .map(|p| p.trim().to_owned())
            .filter(|p| !p.is_empty());

        let slug = match &product.slug {
            Some(slug) => slug.clone(),
            None => self.free_slug(&product.title).await?,
        };

        let created = self.store.insert_product(&product, &slug).await?;
        info!(product_id = %created.id, slug = %created.slug, "Product created");
        Ok(created)
    }

    /// Attach a bulk-discount tier to a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` for a zero threshold, a percentage outside
    /// `[0, 100]`, an unknown product or a duplicate threshold.
    pub async fn add_tier(
        &self,
        tier: &NewBulkDiscountTier,
    ) -> Result<BulkDiscountTier, CatalogError> {
        if tier.min_quantity < 1 {
            return Err(CatalogError::InvalidMinQuantity);
        }
        check_percentage(tier.discount_percentage)?;

        self.store.insert_bulk_tier(tier).await.map_err(|e| match e {
            RepositoryError::NotFound => CatalogError::ProductNotFound(tier.product_id),
            other => CatalogError::from(other),
        })
    }

    /// Create a coupon. The code is trimmed; matching stays case-sensitive.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` for a bad code, percentage or window, or a
    /// duplicate code.
    pub async fn create_coupon(&self, coupon: &NewCoupon) -> Result<Coupon, CatalogError> {
        let mut coupon = coupon.clone();
        coupon.code = coupon.code.trim().to_owned();

        if coupon.code.is_empty() || coupon.code.chars().count() > MAX_COUPON_CODE_LENGTH {
            return Err(CatalogError::InvalidCouponCode);
        }
        check_percentage(coupon.discount_percentage)?;
        if coupon.valid_until < coupon.valid_from {
            return Err(CatalogError::InvalidWindow {
                valid_from: coupon.valid_from,
                valid_until: coupon.valid_until,
            });
        }

        let created = self.store.insert_coupon(&coupon).await?;
        info!(coupon_id = %created.id, code = %created.code, "Coupon created");
        Ok(created)
    }

    /// Change a product's price. Placed orders keep the price they were
    /// placed at.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` for a negative price or an unknown product.
    pub async fn update_price(&self, id: ProductId, price: Money) -> Result<(), CatalogError> {
        if price.is_negative() {
            return Err(CatalogError::NegativeAmount("price"));
        }
        self.store
            .update_product_price(id, price)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CatalogError::ProductNotFound(id),
                other => CatalogError::from(other),
            })
    }

    async fn free_slug(&self, title: &str) -> Result<Slug, CatalogError> {
        let base = Slug::from_title(title);
        if !self.store.slug_exists(&base).await? {
            return Ok(base);
        }
        let mut n = 1;
        loop {
            let candidate = base.with_suffix(n);
            if !self.store.slug_exists(&candidate).await? {
                return Ok(candidate);
            }
            n += 1;
        }
    }
}

fn check_percentage(percent: Decimal) -> Result<(), CatalogError> {
    if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
        return Err(CatalogError::InvalidPercentage(percent));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::db::{Catalog, MemoryStore};

    fn brake_pad() -> NewProduct {
        NewProduct {
            title: "Brake Pad Set".to_owned(),
            slug: None,
            part_number: None,
            description: "Front axle".to_owned(),
            price: Money::new(dec!(850.00)),
            mrp: Money::new(dec!(999.00)),
            stock: 20,
            is_out_of_stock_manual: false,
        }
    }

    fn coupon(code: &str) -> NewCoupon {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        NewCoupon {
            code: code.to_owned(),
            discount_percentage: dec!(15),
            active: true,
            valid_from: from,
            valid_until: from + Duration::days(90),
        }
    }

    #[tokio::test]
    async fn test_slug_collisions_get_suffixes() {
        let store = MemoryStore::new();
        let admin = CatalogAdmin::new(&store);

        let first = admin.create_product(&brake_pad()).await.unwrap();
        let second = admin.create_product(&brake_pad()).await.unwrap();
        let third = admin.create_product(&brake_pad()).await.unwrap();

        assert_eq!(first.slug.as_str(), "brake-pad-set");
        assert_eq!(second.slug.as_str(), "brake-pad-set-1");
        assert_eq!(third.slug.as_str(), "brake-pad-set-2");
    }

    #[tokio::test]
    async fn test_explicit_slug_kept() {
        let store = MemoryStore::new();
        let mut product = brake_pad();
        product.slug = Some(Slug::from_stored("bp-front".to_owned()));
        let created = CatalogAdmin::new(&store)
            .create_product(&product)
            .await
            .unwrap();
        assert_eq!(created.slug.as_str(), "bp-front");
    }

    #[tokio::test]
    async fn test_duplicate_part_number_rejected() {
        let store = MemoryStore::new();
        let admin = CatalogAdmin::new(&store);
        let mut product = brake_pad();
        product.part_number = Some(" BP-100 ".to_owned());
        let created = admin.create_product(&product).await.unwrap();
        assert_eq!(created.part_number.as_deref(), Some("BP-100"));

        let err = admin.create_product(&product).await.unwrap_err();
        assert!(matches!(err, CatalogError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_tier_validation() {
        let store = MemoryStore::new();
        let admin = CatalogAdmin::new(&store);
        let product = admin.create_product(&brake_pad()).await.unwrap();

        let mut tier = NewBulkDiscountTier {
            product_id: product.id,
            min_quantity: 10,
            discount_percentage: dec!(101),
        };
        assert!(matches!(
            admin.add_tier(&tier).await.unwrap_err(),
            CatalogError::InvalidPercentage(_)
        ));

        tier.discount_percentage = dec!(5);
        admin.add_tier(&tier).await.unwrap();
        assert!(matches!(
            admin.add_tier(&tier).await.unwrap_err(),
            CatalogError::Duplicate(_)
        ));

        tier.product_id = ProductId::new(404);
        tier.min_quantity = 20;
        assert!(matches!(
            admin.add_tier(&tier).await.unwrap_err(),
            CatalogError::ProductNotFound(_)
        ));

        let stored = store.product(product.id).await.unwrap().unwrap();
        assert_eq!(stored.bulk_discounts.len(), 1);
    }

    #[tokio::test]
    async fn test_coupon_validation() {
        let store = MemoryStore::new();
        let admin = CatalogAdmin::new(&store);

        assert!(matches!(
            admin.create_coupon(&coupon("  ")).await.unwrap_err(),
            CatalogError::InvalidCouponCode
        ));
        assert!(matches!(
            admin
                .create_coupon(&coupon("THIS-CODE-IS-WAY-TOO-LONG"))
                .await
                .unwrap_err(),
            CatalogError::InvalidCouponCode
        ));

        let mut backwards = coupon("BACK");
        backwards.valid_until = backwards.valid_from - Duration::days(1);
        assert!(matches!(
            admin.create_coupon(&backwards).await.unwrap_err(),
            CatalogError::InvalidWindow { .. }
        ));

        let created = admin.create_coupon(&coupon(" DIWALI15 ")).await.unwrap();
        assert_eq!(created.code, "DIWALI15");
        assert!(matches!(
            admin.create_coupon(&coupon("DIWALI15")).await.unwrap_err(),
            CatalogError::Duplicate(_)
        ));
    }

    #[tokio::test]
    async fn test_update_price() {
        let store = MemoryStore::new();
        let admin = CatalogAdmin::new(&store);
        let product = admin.create_product(&brake_pad()).await.unwrap();

        admin
            .update_price(product.id, Money::new(dec!(799.00)))
            .await
            .unwrap();
        assert_eq!(
            store.product(product.id).await.unwrap().unwrap().price,
            Money::new(dec!(799.00))
        );
        assert!(matches!(
            admin
                .update_price(ProductId::new(999), Money::new(dec!(1)))
                .await
                .unwrap_err(),
            CatalogError::ProductNotFound(_)
        ));
    }
}
