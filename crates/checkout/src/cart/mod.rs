//! Shopper carts.
//!
//! A signed-in user's cart lives in the datastore ([`PersistedCart`]); a
//! guest's cart lives in their session ([`EphemeralCart`]). Both implement
//! [`CartSource`], so pricing and checkout never care which one they got.
//!
//! [`CartAggregator`] turns raw entries into live products. Entries that no
//! longer resolve are dropped rather than reported.

pub mod ephemeral;
pub mod persisted;

use std::collections::{BTreeSet, HashMap};
use std::future::Future;

use thiserror::Error;
use tracing::debug;

use evault_core::{ProductId, UserId};

use crate::db::{Catalog, RepositoryError};
use crate::models::{CartEntry, Product, ResolvedLine};

pub use ephemeral::{
    EphemeralCart, MemorySession, SESSION_CART_KEY, SessionCart, SessionCartStore,
    TowerSessionCart,
};
pub use persisted::PersistedCart;

/// Who owns a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shopper {
    /// A signed-in user with a persisted cart.
    Registered(UserId),
    /// An anonymous visitor with a session cart.
    Guest,
}

impl Shopper {
    /// The owning user, if signed in.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Registered(id) => Some(*id),
            Self::Guest => None,
        }
    }
}

/// Errors that can occur when reading or changing a cart.
#[derive(Debug, Error)]
pub enum CartError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The session backend failed.
    #[error("session error: {0}")]
    Session(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// The product can't cover the quantity the cart would hold.
    #[error("only {available} of {title} available, {requested} requested")]
    InsufficientStock {
        product_id: ProductId,
        title: String,
        available: u32,
        requested: u32,
    },

    #[error("quantity must be at least 1")]
    InvalidQuantity,
}

/// Where a shopper's cart lines are kept.
pub trait CartSource: Send + Sync {
    fn shopper(&self) -> Shopper;

    /// Current raw entries. Empty if no cart exists yet.
    fn lines(&self) -> impl Future<Output = Result<Vec<CartEntry>, CartError>> + Send;

    /// Set the quantity of one product. A quantity of zero removes the line.
    fn add_or_update(
        &self,
        product: ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), CartError>> + Send;

    /// Remove one product. Missing lines are ignored.
    fn remove(&self, product: ProductId) -> impl Future<Output = Result<(), CartError>> + Send;

    /// Remove every line.
    fn clear(&self) -> impl Future<Output = Result<(), CartError>> + Send;
}

/// Resolves raw cart entries into priced-ready lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct CartAggregator;

impl CartAggregator {
    /// Load a cart and resolve it against the catalog.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the cart or the catalog can't be read.
    pub async fn resolve<C, S>(catalog: &C, cart: &S) -> Result<Vec<ResolvedLine>, CartError>
    where
        C: Catalog,
        S: CartSource,
    {
        let entries = cart.lines().await?;
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        let products = catalog.products(&Self::product_ids(&entries)).await?;
        Ok(Self::join(&entries, products))
    }

    /// Distinct product IDs referenced by `entries`, ascending.
    #[must_use]
    pub fn product_ids(entries: &[CartEntry]) -> Vec<ProductId> {
        entries
            .iter()
            .map(|e| e.product_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Pair entries with already-loaded products, keeping entry order.
    ///
    /// Entries with a zero quantity or no matching product are dropped.
    #[must_use]
    pub fn join(entries: &[CartEntry], products: Vec<Product>) -> Vec<ResolvedLine> {
        let by_id: HashMap<ProductId, Product> =
            products.into_iter().map(|p| (p.id, p)).collect();

        entries
            .iter()
            .filter_map(|entry| {
                if entry.quantity == 0 {
                    debug!(product_id = %entry.product_id, "Dropping cart entry with zero quantity");
                    return None;
                }
                let Some(product) = by_id.get(&entry.product_id) else {
                    debug!(product_id = %entry.product_id, "Dropping cart entry for missing product");
                    return None;
                };
                Some(ResolvedLine {
                    product: product.clone(),
                    quantity: entry.quantity,
                })
            })
            .collect()
    }
}

/// Add, update and remove operations with stock checks.
#[derive(Debug, Clone, Copy)]
pub struct CartService<'a, C> {
    catalog: &'a C,
}

impl<'a, C: Catalog> CartService<'a, C> {
    #[must_use]
    pub const fn new(catalog: &'a C) -> Self {
        Self { catalog }
    }

    /// Add `quantity` units of a product on top of what the cart holds.
    ///
    /// Returns the line's new quantity.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for zero, `ProductNotFound` for an
    /// unknown product and `InsufficientStock` when the product can't cover
    /// the new line quantity.
    pub async fn add<S: CartSource>(
        &self,
        cart: &S,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<u32, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        let product = self.product(product_id).await?;

        let current = cart
            .lines()
            .await?
            .iter()
            .filter(|e| e.product_id == product_id)
            .map(|e| e.quantity)
            .sum::<u32>();
        let requested = current.saturating_add(quantity);

        Self::ensure_stock(&product, requested)?;
        cart.add_or_update(product_id, requested).await?;
        Ok(requested)
    }

    /// Set a line's quantity. Anything below 1 removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductNotFound` or `InsufficientStock` as for
    /// [`CartService::add`].
    pub async fn update<S: CartSource>(
        &self,
        cart: &S,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), CartError> {
        if quantity < 1 {
            return cart.remove(product_id).await;
        }
        let product = self.product(product_id).await?;
        Self::ensure_stock(&product, quantity)?;
        cart.add_or_update(product_id, quantity).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the cart backend fails.
    pub async fn remove<S: CartSource>(
        &self,
        cart: &S,
        product_id: ProductId,
    ) -> Result<(), CartError> {
        cart.remove(product_id).await
    }

    async fn product(&self, id: ProductId) -> Result<Product, CartError> {
        self.catalog
            .product(id)
            .await?
            .ok_or(CartError::ProductNotFound(id))
    }

    fn ensure_stock(product: &Product, requested: u32) -> Result<(), CartError> {
        if product.can_fulfil(requested) {
            return Ok(());
        }
        Err(CartError::InsufficientStock {
            product_id: product.id,
            title: product.title.clone(),
            available: product.available(),
            requested,
        })
    }
}
