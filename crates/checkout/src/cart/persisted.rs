//! Datastore-backed cart of a signed-in user.

use evault_core::{ProductId, UserId};

use super::{CartError, CartSource, Shopper};
use crate::db::{CartRepository, RepositoryError};
use crate::models::CartEntry;

/// A signed-in user's cart, read and written through a [`CartRepository`].
#[derive(Debug)]
pub struct PersistedCart<'a, R> {
    repo: &'a R,
    user: UserId,
}

impl<'a, R> PersistedCart<'a, R> {
    #[must_use]
    pub const fn new(repo: &'a R, user: UserId) -> Self {
        Self { repo, user }
    }

    #[must_use]
    pub const fn user(&self) -> UserId {
        self.user
    }
}

impl<R: CartRepository> CartSource for PersistedCart<'_, R> {
    fn shopper(&self) -> Shopper {
        Shopper::Registered(self.user)
    }

    async fn lines(&self) -> Result<Vec<CartEntry>, CartError> {
        Ok(self.repo.cart_entries(self.user).await?)
    }

    async fn add_or_update(&self, product: ProductId, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove(product).await;
        }
        self.repo
            .upsert_cart_line(self.user, product, quantity)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CartError::ProductNotFound(product),
                other => CartError::Repository(other),
            })
    }

    async fn remove(&self, product: ProductId) -> Result<(), CartError> {
        Ok(self.repo.delete_cart_line(self.user, product).await?)
    }

    async fn clear(&self) -> Result<(), CartError> {
        Ok(self.repo.clear_cart(self.user).await?)
    }
}
