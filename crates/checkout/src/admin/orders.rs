//! Staff actions on placed orders.

use thiserror::Error;
use tracing::{info, instrument, warn};

use evault_core::{OrderId, OrderStatus, UserId};

use crate::db::{OrderRepository, RepositoryError};
use crate::models::{Order, OrderDetails};

/// Errors that can occur during staff order actions.
#[derive(Debug, Error)]
pub enum OrderAdminError {
    #[error("order {0} not found")]
    NotFound(OrderId),

    /// Status only moves forward.
    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Someone else changed the status first.
    #[error("order {id} is no longer {expected}")]
    Conflict { id: OrderId, expected: OrderStatus },

    #[error("tracking link must be an http(s) URL")]
    InvalidTrackingLink,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Order lookups and status changes for staff.
#[derive(Debug, Clone, Copy)]
pub struct OrderAdmin<'a, R> {
    repo: &'a R,
}

impl<'a, R: OrderRepository> OrderAdmin<'a, R> {
    #[must_use]
    pub const fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    /// Load an order with its lines and address.
    ///
    /// # Errors
    ///
    /// Returns `OrderAdminError::NotFound` for an unknown order.
    pub async fn details(&self, id: OrderId) -> Result<OrderDetails, OrderAdminError> {
        self.repo
            .order_details(id)
            .await?
            .ok_or(OrderAdminError::NotFound(id))
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderAdminError::Repository` if the store fails.
    pub async fn orders_for_user(&self, user: UserId) -> Result<Vec<Order>, OrderAdminError> {
        Ok(self.repo.orders_for_user(user).await?)
    }

    /// Move an order forward, optionally setting its tracking link.
    ///
    /// Any later status may be chosen, so `Pending` can go straight to
    /// `Delivered`. A blank link leaves the current one in place.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` for a move that isn't forward, `Conflict`
    /// if the status changed since it was read, and `InvalidTrackingLink`
    /// for a link that isn't an http(s) URL.
    #[instrument(skip(self))]
    pub async fn advance(
        &self,
        id: OrderId,
        to: OrderStatus,
        tracking_link: Option<&str>,
    ) -> Result<Order, OrderAdminError> {
        let tracking_link = tracking_link.map(str::trim).filter(|l| !l.is_empty());
        if let Some(link) = tracking_link
            && !(link.starts_with("https://") || link.starts_with("http://"))
        {
            return Err(OrderAdminError::InvalidTrackingLink);
        }

        let from = self.details(id).await?.order.status;
        if !from.can_advance_to(to) {
            return Err(OrderAdminError::InvalidTransition { from, to });
        }

        if !self
            .repo
            .update_order_status(id, from, to, tracking_link)
            .await?
        {
            warn!(order_id = %id, expected = %from, "Order status changed concurrently");
            return Err(OrderAdminError::Conflict { id, expected: from });
        }

        info!(order_id = %id, %from, %to, "Order status advanced");
        Ok(self.details(id).await?.order)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use evault_core::Money;

    use super::*;
    use crate::db::{CheckoutStore, CheckoutTx, MemoryStore};
    use crate::models::NewOrder;

    async fn placed_order(store: &MemoryStore) -> OrderId {
        let mut tx = store.begin().await.unwrap();
        let order = tx
            .insert_order(&NewOrder {
                user_id: Some(UserId::new(5)),
                coupon_id: None,
                subtotal: Money::from_paise(10_000),
                tax: Money::from_paise(1_800),
                delivery_charge: Money::from_paise(5_000),
                discount: Money::ZERO,
                total: Money::from_paise(16_800),
                placed_at: Utc::now(),
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        order.id
    }

    #[tokio::test]
    async fn test_advance_forward_with_tracking() {
        let store = MemoryStore::new();
        let id = placed_order(&store).await;
        let admin = OrderAdmin::new(&store);

        let order = admin
            .advance(id, OrderStatus::Shipped, Some(" https://track.example/AB12 "))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.tracking_link.as_deref(), Some("https://track.example/AB12"));

        let order = admin.advance(id, OrderStatus::Delivered, None).await.unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(order.tracking_link.as_deref(), Some("https://track.example/AB12"));
    }

    #[tokio::test]
    async fn test_backwards_and_same_status_rejected() {
        let store = MemoryStore::new();
        let id = placed_order(&store).await;
        let admin = OrderAdmin::new(&store);

        assert!(matches!(
            admin.advance(id, OrderStatus::Pending, None).await.unwrap_err(),
            OrderAdminError::InvalidTransition { .. }
        ));

        admin.advance(id, OrderStatus::Delivered, None).await.unwrap();
        assert!(matches!(
            admin.advance(id, OrderStatus::Shipped, None).await.unwrap_err(),
            OrderAdminError::InvalidTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Shipped
            }
        ));
    }

    #[tokio::test]
    async fn test_bad_tracking_link_and_unknown_order() {
        let store = MemoryStore::new();
        let id = placed_order(&store).await;
        let admin = OrderAdmin::new(&store);

        assert!(matches!(
            admin
                .advance(id, OrderStatus::Shipped, Some("javascript:alert(1)"))
                .await
                .unwrap_err(),
            OrderAdminError::InvalidTrackingLink
        ));
        assert!(matches!(
            admin
                .advance(OrderId::new(99), OrderStatus::Shipped, None)
                .await
                .unwrap_err(),
            OrderAdminError::NotFound(_)
        ));
        assert_eq!(admin.orders_for_user(UserId::new(5)).await.unwrap().len(), 1);
    }
}
