//! Quote and checkout.
//!
//! # Checkout steps
//!
//! Everything between `begin` and `commit` runs in one store transaction:
//!
//! 1. Validate the address and load the cart (outside the transaction).
//! 2. Re-read a persisted cart under lock, so the lines ordered are the
//!    lines cleared.
//! 3. Look up and validate the coupon.
//! 4. Lock the cart's products and check stock, summed per product.
//! 5. Decrement stock.
//! 6. Price the order from the locked products and insert it as `Pending`.
//! 7. Insert one line per cart line and the delivery address.
//! 8. Clear a persisted cart, then commit.
//!
//! A guest's session cart is cleared after the commit. Failing to clear it
//! is logged; the order stands.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use evault_core::{Money, ProductId};

use crate::cart::{CartAggregator, CartSource, Shopper};
use crate::clock::{Clock, SystemClock};
use crate::coupon::{CouponValidator, normalize_code};
use crate::db::{Catalog, CheckoutStore, CheckoutTx};
use crate::error::CheckoutError;
use crate::models::{
    CartEntry, Coupon, NewDeliveryAddress, NewOrder, NewOrderLine, OrderDetails, Product,
    ResolvedLine,
};
use crate::pricing::{LinePrice, OrderPricing, PricingEngine};

/// A priced cart that has not been ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub lines: Vec<LinePrice>,
    pub pricing: OrderPricing,
}

/// Runs quotes and checkouts against a store.
#[derive(Debug, Clone)]
pub struct CheckoutOrchestrator<S, K = SystemClock> {
    store: S,
    clock: K,
    delivery_charge: Option<Money>,
}

impl<S> CheckoutOrchestrator<S> {
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S, K> CheckoutOrchestrator<S, K> {
    #[must_use]
    pub const fn with_clock(store: S, clock: K) -> Self {
        Self {
            store,
            clock,
            delivery_charge: None,
        }
    }

    /// Charge `charge` for delivery instead of
    /// [`DEFAULT_DELIVERY_CHARGE`](crate::pricing::DEFAULT_DELIVERY_CHARGE).
    #[must_use]
    pub fn with_delivery_charge(mut self, charge: Option<Money>) -> Self {
        self.delivery_charge = charge;
        self
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }
}

impl<S: Catalog, K: Clock> CheckoutOrchestrator<S, K> {
    /// Price a shopper's cart without placing an order.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` or `InvalidCoupon` exactly as
    /// [`CheckoutOrchestrator::checkout`] would, or a read failure.
    #[instrument(skip(self, cart), fields(shopper = ?cart.shopper()))]
    pub async fn quote<C: CartSource>(
        &self,
        cart: &C,
        coupon_code: Option<&str>,
    ) -> Result<Quote, CheckoutError> {
        let lines = CartAggregator::resolve(&self.store, cart).await?;
        self.quote_lines(&lines, coupon_code).await
    }

    /// Price explicit entries, as typed by staff.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidQuantity` if any entry has a zero
    /// quantity, otherwise as [`CheckoutOrchestrator::quote`].
    #[instrument(skip(self, entries), fields(entries = entries.len()))]
    pub async fn quote_entries(
        &self,
        entries: &[CartEntry],
        coupon_code: Option<&str>,
    ) -> Result<Quote, CheckoutError> {
        if entries.iter().any(|e| e.quantity == 0) {
            return Err(CheckoutError::InvalidQuantity);
        }
        let products = self
            .store
            .products(&CartAggregator::product_ids(entries))
            .await?;
        let lines = CartAggregator::join(entries, products);
        self.quote_lines(&lines, coupon_code).await
    }

    async fn quote_lines(
        &self,
        lines: &[ResolvedLine],
        coupon_code: Option<&str>,
    ) -> Result<Quote, CheckoutError> {
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let now = self.clock.now();
        let coupon = match normalize_code(coupon_code) {
            Some(code) => Some(accept_coupon(
                self.store.coupon_by_code(code).await?,
                code,
                now,
            )?),
            None => None,
        };

        Ok(Quote {
            lines: PricingEngine::lines(lines),
            pricing: PricingEngine::price_order(
                lines,
                coupon.as_ref(),
                self.delivery_charge,
                now,
            ),
        })
    }
}

impl<S: CheckoutStore, K: Clock> CheckoutOrchestrator<S, K> {
    /// Turn a cart into an order.
    ///
    /// A signed-in shopper's cart is read again inside the transaction and
    /// that read is what gets ordered and cleared.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError` if the address is invalid, the cart is empty,
    /// the coupon is refused, a product lacks stock or the store fails. In
    /// every case stock, orders and the cart are left untouched.
    #[instrument(skip(self, cart, address), fields(shopper = ?cart.shopper()))]
    pub async fn checkout<C: CartSource>(
        &self,
        cart: &C,
        address: &NewDeliveryAddress,
        coupon_code: Option<&str>,
    ) -> Result<OrderDetails, CheckoutError> {
        address.validate()?;

        let shopper = cart.shopper();
        let entries = ordered_entries(cart.lines().await?);
        if entries.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let mut tx = self.store.begin().await?;
        let now = self.clock.now();

        let entries = match shopper {
            Shopper::Registered(user) => ordered_entries(tx.cart_entries(user).await?),
            Shopper::Guest => entries,
        };
        if entries.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let coupon = match normalize_code(coupon_code) {
            Some(code) => Some(accept_coupon(tx.find_coupon(code).await?, code, now)?),
            None => None,
        };

        let locked = tx
            .lock_products(&CartAggregator::product_ids(&entries))
            .await?;
        let lines = CartAggregator::join(&entries, locked);
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let demand = demand_per_product(&lines);
        for (product, requested) in demand.values() {
            if !product.can_fulfil(*requested) {
                warn!(
                    product_id = %product.id,
                    available = product.available(),
                    requested,
                    "Insufficient stock at checkout"
                );
                return Err(CheckoutError::InsufficientStock {
                    product_id: product.id,
                    title: product.title.clone(),
                    available: product.available(),
                    requested: *requested,
                });
            }
        }
        for (id, (_, requested)) in &demand {
            tx.decrement_stock(*id, *requested).await?;
        }

        let stored =
            PricingEngine::price_order(&lines, coupon.as_ref(), self.delivery_charge, now)
                .rounded();
        let order = tx
            .insert_order(&NewOrder {
                user_id: shopper.user_id(),
                coupon_id: stored.coupon_id,
                subtotal: stored.subtotal,
                tax: stored.tax,
                delivery_charge: stored.delivery_charge,
                discount: stored.discount,
                total: stored.total,
                placed_at: now,
            })
            .await?;

        let mut order_lines = Vec::with_capacity(lines.len());
        for line in PricingEngine::lines(&lines) {
            let inserted = tx
                .insert_order_line(&NewOrderLine {
                    order_id: order.id,
                    product_id: line.product_id,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    discounted_unit_price: line.effective_unit_price,
                    line_total: line.line_total,
                })
                .await?;
            order_lines.push(inserted);
        }

        let delivery_address = tx.insert_delivery_address(order.id, address).await?;

        if let Shopper::Registered(user) = shopper {
            tx.clear_cart(user).await?;
        }
        tx.commit().await?;

        if shopper == Shopper::Guest
            && let Err(e) = cart.clear().await
        {
            warn!(order_id = %order.id, error = %e, "Order placed but session cart was not cleared");
        }

        info!(
            order_id = %order.id,
            lines = order_lines.len(),
            total = %order.total,
            "Order placed"
        );

        Ok(OrderDetails {
            order,
            lines: order_lines,
            address: Some(delivery_address),
        })
    }
}

/// Check a looked-up coupon, logging the exact reason on refusal.
fn accept_coupon(
    found: Option<Coupon>,
    code: &str,
    now: DateTime<Utc>,
) -> Result<Coupon, CheckoutError> {
    CouponValidator::validate(found, now).map_err(|reason| {
        warn!(code, %reason, "Coupon rejected");
        CheckoutError::InvalidCoupon(reason)
    })
}

fn ordered_entries(entries: Vec<CartEntry>) -> Vec<CartEntry> {
    entries.into_iter().filter(|e| e.quantity > 0).collect()
}

/// Total quantity asked for each product across all lines.
fn demand_per_product(lines: &[ResolvedLine]) -> BTreeMap<ProductId, (&Product, u32)> {
    let mut demand: BTreeMap<ProductId, (&Product, u32)> = BTreeMap::new();
    for line in lines {
        demand
            .entry(line.product.id)
            .and_modify(|(_, q)| *q = q.saturating_add(line.quantity))
            .or_insert((&line.product, line.quantity));
    }
    demand
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    use evault_core::{Money, OrderStatus, Slug, UserId};

    use super::*;
    use crate::cart::{EphemeralCart, MemorySession, PersistedCart};
    use crate::clock::FixedClock;
    use crate::coupon::CouponRejection;
    use crate::db::{CartRepository, CatalogWriter, MemoryStore, OrderRepository};
    use crate::models::{NewCoupon, NewProduct};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 9, 30, 0).unwrap()
    }

    fn address() -> NewDeliveryAddress {
        NewDeliveryAddress {
            full_name: "Ravi Kumar".to_owned(),
            phone: "9812345678".to_owned(),
            local_address: "4 Station Road".to_owned(),
            city: "Nagpur".to_owned(),
            district: "Nagpur".to_owned(),
            state: "Maharashtra".to_owned(),
            pincode: "440001".to_owned(),
            ..NewDeliveryAddress::default()
        }
    }

    async fn product(store: &MemoryStore, title: &str, price: Money, stock: u32) -> Product {
        let new = NewProduct {
            title: title.to_owned(),
            slug: None,
            part_number: None,
            description: String::new(),
            price,
            mrp: price,
            stock,
            is_out_of_stock_manual: false,
        };
        store
            .insert_product(&new, &Slug::from_title(title))
            .await
            .unwrap()
    }

    fn orchestrator(store: &MemoryStore) -> CheckoutOrchestrator<MemoryStore, FixedClock> {
        CheckoutOrchestrator::with_clock(store.clone(), FixedClock(now()))
    }

    #[tokio::test]
    async fn test_guest_checkout_places_order_and_clears_session() {
        let store = MemoryStore::new();
        let p = product(&store, "Headlamp", Money::new(dec!(500.00)), 5).await;
        let session = MemorySession::new();
        let cart = EphemeralCart::new(session.clone());
        cart.add_or_update(p.id, 2).await.unwrap();

        let details = orchestrator(&store)
            .checkout(&cart, &address(), None)
            .await
            .unwrap();

        assert_eq!(details.order.user_id, None);
        assert_eq!(details.order.status, OrderStatus::Pending);
        assert_eq!(details.order.total, Money::new(dec!(1230.00)));
        assert_eq!(details.lines.len(), 1);
        assert!(!details.address.unwrap().verified);
        assert!(session.snapshot().await.is_empty());
        assert_eq!(store.product(p.id).await.unwrap().unwrap().stock, 3);
    }

    #[tokio::test]
    async fn test_registered_checkout_clears_persisted_cart() {
        let store = MemoryStore::new();
        let p = product(&store, "Horn", Money::new(dec!(250.00)), 10).await;
        let user = UserId::new(11);
        store.upsert_cart_line(user, p.id, 4).await.unwrap();
        let cart = PersistedCart::new(&store, user);

        let details = orchestrator(&store)
            .checkout(&cart, &address(), None)
            .await
            .unwrap();

        assert_eq!(details.order.user_id, Some(user));
        assert!(store.cart_entries(user).await.unwrap().is_empty());
        assert_eq!(store.orders_for_user(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_cart_rejected() {
        let store = MemoryStore::new();
        let cart = EphemeralCart::new(MemorySession::new());
        let err = orchestrator(&store)
            .checkout(&cart, &address(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));

        let err = orchestrator(&store).quote(&cart, None).await.unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[tokio::test]
    async fn test_invalid_address_rejected_before_anything_else() {
        let store = MemoryStore::new();
        let cart = EphemeralCart::new(MemorySession::new());
        let mut addr = address();
        addr.city = "  ".to_owned();
        let err = orchestrator(&store)
            .checkout(&cart, &addr, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn test_insufficient_stock_changes_nothing() {
        let store = MemoryStore::new();
        let p = product(&store, "Radiator", Money::new(dec!(3000.00)), 2).await;
        let session = MemorySession::new();
        let cart = EphemeralCart::new(session.clone());
        cart.add_or_update(p.id, 3).await.unwrap();

        let err = orchestrator(&store)
            .checkout(&cart, &address(), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::InsufficientStock {
                available: 2,
                requested: 3,
                ..
            }
        ));
        assert_eq!(store.product(p.id).await.unwrap().unwrap().stock, 2);
        assert_eq!(store.order_count().await, 0);
        assert_eq!(session.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_coupon_rejected_in_quote_and_checkout() {
        let store = MemoryStore::new();
        let p = product(&store, "Fuse", Money::new(dec!(20.00)), 50).await;
        let cart = EphemeralCart::new(MemorySession::new());
        cart.add_or_update(p.id, 1).await.unwrap();
        let orch = orchestrator(&store);

        let err = orch.quote(&cart, Some("NOPE")).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InvalidCoupon(CouponRejection::NotFound)
        ));
        let err = orch
            .checkout(&cart, &address(), Some("NOPE"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InvalidCoupon(CouponRejection::NotFound)
        ));
        assert_eq!(store.product(p.id).await.unwrap().unwrap().stock, 50);
    }

    #[tokio::test]
    async fn test_blank_coupon_means_none() {
        let store = MemoryStore::new();
        let p = product(&store, "Bulb", Money::new(dec!(100.00)), 5).await;
        let cart = EphemeralCart::new(MemorySession::new());
        cart.add_or_update(p.id, 1).await.unwrap();

        let quote = orchestrator(&store).quote(&cart, Some("   ")).await.unwrap();
        assert_eq!(quote.pricing.discount, Money::ZERO);
        assert_eq!(quote.pricing.total, Money::new(dec!(168.00)));
    }

    #[tokio::test]
    async fn test_coupon_applies_and_is_recorded() {
        let store = MemoryStore::new();
        let p = product(&store, "Mirror", Money::new(dec!(1000.00)), 5).await;
        let coupon = store
            .insert_coupon(&NewCoupon {
                code: "SAVE10".to_owned(),
                discount_percentage: dec!(10),
                active: true,
                valid_from: now() - Duration::days(1),
                valid_until: now() + Duration::days(1),
            })
            .await
            .unwrap();
        let cart = EphemeralCart::new(MemorySession::new());
        cart.add_or_update(p.id, 1).await.unwrap();

        let details = orchestrator(&store)
            .checkout(&cart, &address(), Some(" SAVE10 "))
            .await
            .unwrap();
        assert_eq!(details.order.coupon_id, Some(coupon.id));
        assert_eq!(details.order.discount, Money::new(dec!(123.00)));
        assert_eq!(details.order.total, Money::new(dec!(1107.00)));
    }

    #[tokio::test]
    async fn test_delivery_charge_override_reaches_the_order() {
        let store = MemoryStore::new();
        let p = product(&store, "Battery", Money::new(dec!(1000.00)), 5).await;
        let cart = EphemeralCart::new(MemorySession::new());
        cart.add_or_update(p.id, 1).await.unwrap();
        let orch = orchestrator(&store).with_delivery_charge(Some(Money::ZERO));

        let quote = orch.quote(&cart, None).await.unwrap();
        assert_eq!(quote.pricing.delivery_charge, Money::ZERO);
        assert_eq!(quote.pricing.total, Money::new(dec!(1180.00)));

        let details = orch.checkout(&cart, &address(), None).await.unwrap();
        assert_eq!(details.order.delivery_charge, Money::ZERO);
        assert_eq!(details.order.total, Money::new(dec!(1180.00)));
    }

    #[tokio::test]
    async fn test_quote_entries_rejects_zero_quantity() {
        let store = MemoryStore::new();
        let err = orchestrator(&store)
            .quote_entries(&[CartEntry::new(ProductId::new(1), 0)], None)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidQuantity));
    }

    #[test]
    fn test_demand_sums_duplicate_products() {
        let p = Product {
            id: ProductId::new(1),
            title: "Gasket".to_owned(),
            slug: Slug::from_title("Gasket"),
            part_number: None,
            description: String::new(),
            price: Money::new(dec!(10)),
            mrp: Money::new(dec!(10)),
            stock: 3,
            is_out_of_stock_manual: false,
            bulk_discounts: Vec::new(),
            created_at: now(),
            updated_at: now(),
        };
        let lines = [
            ResolvedLine {
                product: p.clone(),
                quantity: 2,
            },
            ResolvedLine {
                product: p,
                quantity: 2,
            },
        ];
        let demand = demand_per_product(&lines);
        assert_eq!(demand.len(), 1);
        assert_eq!(demand[&ProductId::new(1)].1, 4);
    }
}
