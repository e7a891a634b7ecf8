//! Integration tests for eVault.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p evault-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `checkout_flow` - Guest and registered checkout, pricing, coupons
//! - `checkout_atomicity` - Stock checks, rollback, concurrent checkouts
//! - `order_lifecycle` - Staff status changes
//!
//! Every test runs against the in-memory store. [`FlakyStore`] wraps it to
//! inject failures part-way through a checkout.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use evault_checkout::CheckoutOrchestrator;
use evault_checkout::admin::CatalogAdmin;
use evault_checkout::cart::{EphemeralCart, MemorySession};
use evault_checkout::clock::FixedClock;
use evault_checkout::db::{
    Catalog, CheckoutStore, CheckoutTx, MemoryStore, MemoryTx, RepositoryError,
};
use evault_checkout::models::{
    CartEntry, Coupon, DeliveryAddress, NewBulkDiscountTier, NewCoupon, NewDeliveryAddress,
    NewOrder, NewOrderLine, NewProduct, Order, OrderLine, Product,
};
use evault_core::{Money, OrderId, ProductId, UserId};

/// Instant every test shop's clock is stopped at.
#[must_use]
pub fn shop_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// A store with a fixed clock and fixture helpers.
#[derive(Debug, Clone, Default)]
pub struct TestShop {
    pub store: MemoryStore,
}

impl TestShop {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn orchestrator(&self) -> CheckoutOrchestrator<MemoryStore, FixedClock> {
        CheckoutOrchestrator::with_clock(self.store.clone(), FixedClock(shop_time()))
    }

    /// Create a product priced at `price` with `stock` units.
    pub async fn product(&self, title: &str, price: Decimal, stock: u32) -> Product {
        CatalogAdmin::new(&self.store)
            .create_product(&NewProduct {
                title: title.to_owned(),
                slug: None,
                part_number: None,
                description: String::new(),
                price: Money::new(price),
                mrp: Money::new(price),
                stock,
                is_out_of_stock_manual: false,
            })
            .await
            .expect("create product")
    }

    pub async fn tier(&self, product: ProductId, min_quantity: u32, percent: Decimal) {
        CatalogAdmin::new(&self.store)
            .add_tier(&NewBulkDiscountTier {
                product_id: product,
                min_quantity,
                discount_percentage: percent,
            })
            .await
            .expect("add tier");
    }

    pub async fn coupon(
        &self,
        code: &str,
        percent: Decimal,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Coupon {
        CatalogAdmin::new(&self.store)
            .create_coupon(&NewCoupon {
                code: code.to_owned(),
                discount_percentage: percent,
                active: true,
                valid_from,
                valid_until,
            })
            .await
            .expect("create coupon")
    }

    pub async fn stock(&self, id: ProductId) -> u32 {
        self.store
            .product(id)
            .await
            .expect("read product")
            .expect("product exists")
            .stock
    }
}

/// A guest cart and a handle on its session map.
#[must_use]
pub fn guest_cart() -> (EphemeralCart<MemorySession>, MemorySession) {
    let session = MemorySession::new();
    (EphemeralCart::new(session.clone()), session)
}

/// A complete delivery address.
#[must_use]
pub fn address() -> NewDeliveryAddress {
    NewDeliveryAddress {
        full_name: "Meera Iyer".to_owned(),
        phone: "9900112233".to_owned(),
        email: Some("meera@example.in".to_owned()),
        local_address: "22 Temple Street".to_owned(),
        landmark: None,
        city: "Coimbatore".to_owned(),
        district: "Coimbatore".to_owned(),
        state: "Tamil Nadu".to_owned(),
        pincode: "641001".to_owned(),
    }
}

// =============================================================================
// Failure Injection
// =============================================================================

/// Checkout step at which a [`FlakyStore`] transaction fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    OrderLine,
    DeliveryAddress,
    ClearCart,
    Commit,
}

/// A [`MemoryStore`] whose checkout transactions fail at one step.
#[derive(Debug, Clone)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_at: FailAt,
}

impl CheckoutStore for FlakyStore {
    type Tx = FlakyTx;

    async fn begin(&self) -> Result<FlakyTx, RepositoryError> {
        Ok(FlakyTx {
            inner: self.inner.begin().await?,
            fail_at: self.fail_at,
        })
    }
}

pub struct FlakyTx {
    inner: MemoryTx,
    fail_at: FailAt,
}

impl FlakyTx {
    fn fail(&self, step: FailAt) -> Result<(), RepositoryError> {
        if self.fail_at == step {
            return Err(RepositoryError::DataCorruption(format!(
                "injected failure at {step:?}"
            )));
        }
        Ok(())
    }
}

impl CheckoutTx for FlakyTx {
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        self.inner.lock_products(ids).await
    }

    async fn cart_entries(&mut self, user: UserId) -> Result<Vec<CartEntry>, RepositoryError> {
        self.inner.cart_entries(user).await
    }

    async fn find_coupon(&mut self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        self.inner.find_coupon(code).await
    }

    async fn decrement_stock(
        &mut self,
        id: ProductId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        self.inner.decrement_stock(id, quantity).await
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order, RepositoryError> {
        self.inner.insert_order(order).await
    }

    async fn insert_order_line(
        &mut self,
        line: &NewOrderLine,
    ) -> Result<OrderLine, RepositoryError> {
        self.fail(FailAt::OrderLine)?;
        self.inner.insert_order_line(line).await
    }

    async fn insert_delivery_address(
        &mut self,
        order: OrderId,
        address: &NewDeliveryAddress,
    ) -> Result<DeliveryAddress, RepositoryError> {
        self.fail(FailAt::DeliveryAddress)?;
        self.inner.insert_delivery_address(order, address).await
    }

    async fn clear_cart(&mut self, user: UserId) -> Result<(), RepositoryError> {
        self.fail(FailAt::ClearCart)?;
        self.inner.clear_cart(user).await
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        self.fail(FailAt::Commit)?;
        self.inner.commit().await
    }
}
