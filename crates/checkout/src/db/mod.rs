//! Persistence for the checkout pipeline.
//!
//! # Stores
//!
//! - [`MemoryStore`] - in-process store used by tests and embedded callers
//! - [`PgStore`] - `PostgreSQL` store backed by sqlx
//!
//! # Tables
//!
//! - `product`, `bulk_discount_tier` - catalog (written out-of-band)
//! - `coupon`
//! - `cart`, `cart_line` - persisted carts of signed-in users
//! - `customer_order`, `order_line`, `delivery_address`
//!
//! # Migrations
//!
//! Migrations are stored in `crates/checkout/migrations/` and run via:
//! ```bash
//! cargo run -p evault-cli -- migrate
//! ```
//!
//! # Transactions
//!
//! Checkout runs through [`CheckoutStore::begin`]. Dropping a [`CheckoutTx`]
//! without calling [`CheckoutTx::commit`] discards every write made through
//! it. Products read with [`CheckoutTx::lock_products`] stay locked against
//! other checkout transactions until the transaction ends.

pub mod memory;
pub mod postgres;

use std::future::Future;

use thiserror::Error;

use evault_core::{Money, OrderId, OrderStatus, ProductId, Slug, UserId};

use crate::models::{
    BulkDiscountTier, CartEntry, Coupon, DeliveryAddress, NewBulkDiscountTier, NewCoupon,
    NewDeliveryAddress, NewOrder, NewOrderLine, NewProduct, Order, OrderDetails, OrderLine,
    Product,
};

pub use memory::{MemoryStore, MemoryTx};
pub use postgres::{PgStore, PgTx, create_pool};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique slug).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Read access to products and coupons.
pub trait Catalog: Send + Sync {
    /// Get a product with its bulk-discount tiers.
    fn product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;

    /// Get every product in `ids` that exists. Missing IDs are skipped.
    fn products(
        &self,
        ids: &[ProductId],
    ) -> impl Future<Output = Result<Vec<Product>, RepositoryError>> + Send;

    /// Get a coupon by its exact code.
    fn coupon_by_code(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Option<Coupon>, RepositoryError>> + Send;
}

/// Out-of-band catalog writes.
pub trait CatalogWriter: Send + Sync {
    /// Whether any product already uses `slug`.
    fn slug_exists(&self, slug: &Slug)
    -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Insert a product under `slug`.
    ///
    /// Returns `RepositoryError::Conflict` if the slug or part number is taken.
    fn insert_product(
        &self,
        product: &NewProduct,
        slug: &Slug,
    ) -> impl Future<Output = Result<Product, RepositoryError>> + Send;

    /// Insert a tier. Returns `RepositoryError::Conflict` for a duplicate
    /// `(product, min_quantity)` and `RepositoryError::NotFound` for an
    /// unknown product.
    fn insert_bulk_tier(
        &self,
        tier: &NewBulkDiscountTier,
    ) -> impl Future<Output = Result<BulkDiscountTier, RepositoryError>> + Send;

    /// Insert a coupon. Returns `RepositoryError::Conflict` for a duplicate code.
    fn insert_coupon(
        &self,
        coupon: &NewCoupon,
    ) -> impl Future<Output = Result<Coupon, RepositoryError>> + Send;

    /// Change a product's selling price.
    fn update_product_price(
        &self,
        id: ProductId,
        price: Money,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Persisted carts of signed-in users.
pub trait CartRepository: Send + Sync {
    /// Lines of the user's cart in the order they were added. Empty if the
    /// user has no cart.
    fn cart_entries(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Vec<CartEntry>, RepositoryError>> + Send;

    /// Set the quantity of one line, creating the cart and line as needed.
    fn upsert_cart_line(
        &self,
        user: UserId,
        product: ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete one line. Missing lines are ignored.
    fn delete_cart_line(
        &self,
        user: UserId,
        product: ProductId,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete every line of the user's cart.
    fn clear_cart(&self, user: UserId)
    -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Order reads and the staff status update.
pub trait OrderRepository: Send + Sync {
    /// Get an order with its lines and address.
    fn order_details(
        &self,
        id: OrderId,
    ) -> impl Future<Output = Result<Option<OrderDetails>, RepositoryError>> + Send;

    /// Orders placed by a user, newest first.
    fn orders_for_user(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Vec<Order>, RepositoryError>> + Send;

    /// Move an order from `expected` to `next`.
    ///
    /// A `None` tracking link keeps the current one. Returns `false` without
    /// writing if the order is no longer in `expected`.
    fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        tracking_link: Option<&str>,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;
}

/// A store that can run checkout transactions.
pub trait CheckoutStore: Send + Sync {
    type Tx: CheckoutTx;

    /// Start a checkout transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, RepositoryError>> + Send;
}

/// Writes made by one checkout. See the module docs for locking rules.
pub trait CheckoutTx: Send {
    /// Read and lock the products in `ids`. Missing IDs are skipped.
    fn lock_products(
        &mut self,
        ids: &[ProductId],
    ) -> impl Future<Output = Result<Vec<Product>, RepositoryError>> + Send;

    /// Read and lock a signed-in user's cart lines, oldest first.
    ///
    /// Cart writes for the same user wait until the transaction ends.
    fn cart_entries(
        &mut self,
        user: UserId,
    ) -> impl Future<Output = Result<Vec<CartEntry>, RepositoryError>> + Send;

    /// Get a coupon by its exact code.
    fn find_coupon(
        &mut self,
        code: &str,
    ) -> impl Future<Output = Result<Option<Coupon>, RepositoryError>> + Send;

    /// Take `quantity` units off a product's stock.
    ///
    /// Returns `RepositoryError::Conflict` rather than letting stock go negative.
    fn decrement_stock(
        &mut self,
        id: ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Insert an order with status `Pending`.
    fn insert_order(
        &mut self,
        order: &NewOrder,
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;

    fn insert_order_line(
        &mut self,
        line: &NewOrderLine,
    ) -> impl Future<Output = Result<OrderLine, RepositoryError>> + Send;

    /// Insert the order's address, unverified.
    fn insert_delivery_address(
        &mut self,
        order: OrderId,
        address: &NewDeliveryAddress,
    ) -> impl Future<Output = Result<DeliveryAddress, RepositoryError>> + Send;

    /// Delete every line of the user's persisted cart.
    fn clear_cart(
        &mut self,
        user: UserId,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Make every write visible and release the locks.
    fn commit(self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Convert a stored quantity into a `u32`.
pub(crate) fn quantity_from_db(value: i32, what: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative {what}: {value}")))
}

/// Convert a quantity into the `INTEGER` column type.
pub(crate) fn quantity_to_db(value: u32, what: &str) -> Result<i32, RepositoryError> {
    i32::try_from(value)
        .map_err(|_| RepositoryError::Conflict(format!("{what} out of range: {value}")))
}
