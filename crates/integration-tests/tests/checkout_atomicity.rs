//! Integration tests for checkout atomicity.
//!
//! A checkout either commits every write or none. These tests check stock,
//! orders and carts after rejected, failed and concurrent checkouts.

use rust_decimal_macros::dec;

use evault_checkout::admin::CatalogAdmin;
use evault_checkout::cart::{
    CartError, CartSource, EphemeralCart, MemorySession, PersistedCart, Shopper,
};
use evault_checkout::clock::FixedClock;
use evault_checkout::db::{CartRepository, MemoryStore, RepositoryError};
use evault_checkout::models::{CartEntry, NewProduct};
use evault_checkout::{CheckoutError, CheckoutOrchestrator};
use evault_core::{Money, ProductId, UserId};
use evault_integration_tests::{FailAt, FlakyStore, TestShop, address, guest_cart, shop_time};

// =============================================================================
// Stock Checks
// =============================================================================

#[tokio::test]
async fn test_over_quantity_leaves_everything_unchanged() {
    let shop = TestShop::new();
    let pump = shop.product("Fuel Pump", dec!(2600.00), 2).await;
    let hose = shop.product("Fuel Hose", dec!(150.00), 10).await;

    let (cart, session) = guest_cart();
    cart.add_or_update(hose.id, 1).await.unwrap();
    cart.add_or_update(pump.id, 3).await.unwrap();

    let err = shop
        .orchestrator()
        .checkout(&cart, &address(), None)
        .await
        .unwrap_err();

    match err {
        CheckoutError::InsufficientStock {
            product_id,
            available,
            requested,
            ..
        } => {
            assert_eq!(product_id, pump.id);
            assert_eq!(available, 2);
            assert_eq!(requested, 3);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }
    assert_eq!(shop.stock(pump.id).await, 2);
    assert_eq!(shop.stock(hose.id).await, 10);
    assert_eq!(shop.store.order_count().await, 0);
    assert_eq!(session.snapshot().await.len(), 2);
}

#[tokio::test]
async fn test_manually_out_of_stock_product_rejected() {
    let shop = TestShop::new();
    let hidden = CatalogAdmin::new(&shop.store)
        .create_product(&NewProduct {
            title: "Discontinued Bumper".to_owned(),
            slug: None,
            part_number: Some("DB-01".to_owned()),
            description: String::new(),
            price: Money::new(dec!(4000.00)),
            mrp: Money::new(dec!(4500.00)),
            stock: 5,
            is_out_of_stock_manual: true,
        })
        .await
        .unwrap();

    let (cart, _) = guest_cart();
    cart.add_or_update(hidden.id, 1).await.unwrap();

    let err = shop
        .orchestrator()
        .checkout(&cart, &address(), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::InsufficientStock { available: 0, .. }
    ));
    assert_eq!(shop.stock(hidden.id).await, 5);
}

#[tokio::test]
async fn test_exact_stock_can_be_bought() {
    let shop = TestShop::new();
    let chain = shop.product("Drive Chain", dec!(900.00), 4).await;

    let (cart, _) = guest_cart();
    cart.add_or_update(chain.id, 4).await.unwrap();
    shop.orchestrator()
        .checkout(&cart, &address(), None)
        .await
        .unwrap();

    assert_eq!(shop.stock(chain.id).await, 0);
}

// =============================================================================
// Rollback
// =============================================================================

#[tokio::test]
async fn test_failure_mid_checkout_rolls_everything_back() {
    for fail_at in [
        FailAt::OrderLine,
        FailAt::DeliveryAddress,
        FailAt::ClearCart,
        FailAt::Commit,
    ] {
        let shop = TestShop::new();
        let disc = shop.product("Brake Disc", dec!(1800.00), 6).await;
        let user = UserId::new(8);
        shop.store.upsert_cart_line(user, disc.id, 2).await.unwrap();

        let orchestrator = CheckoutOrchestrator::with_clock(
            FlakyStore {
                inner: shop.store.clone(),
                fail_at,
            },
            FixedClock(shop_time()),
        );
        let cart = PersistedCart::new(&shop.store, user);

        let err = orchestrator
            .checkout(&cart, &address(), None)
            .await
            .unwrap_err();

        assert!(
            matches!(
                err,
                CheckoutError::Persistence(RepositoryError::DataCorruption(_))
            ),
            "{fail_at:?}: {err:?}"
        );
        assert_eq!(shop.stock(disc.id).await, 6, "{fail_at:?}");
        assert_eq!(shop.store.order_count().await, 0, "{fail_at:?}");
        assert_eq!(
            shop.store.cart_entries(user).await.unwrap(),
            vec![CartEntry::new(disc.id, 2)],
            "{fail_at:?}"
        );
    }
}

#[tokio::test]
async fn test_guest_session_kept_when_commit_fails() {
    let shop = TestShop::new();
    let bulb = shop.product("Headlight Bulb", dec!(120.00), 30).await;
    let session = MemorySession::new();
    let cart = EphemeralCart::new(session.clone());
    cart.add_or_update(bulb.id, 3).await.unwrap();

    let orchestrator = CheckoutOrchestrator::with_clock(
        FlakyStore {
            inner: shop.store.clone(),
            fail_at: FailAt::Commit,
        },
        FixedClock(shop_time()),
    );
    assert!(
        orchestrator
            .checkout(&cart, &address(), None)
            .await
            .is_err()
    );

    assert_eq!(shop.stock(bulb.id).await, 30);
    assert_eq!(cart.lines().await.unwrap(), vec![CartEntry::new(bulb.id, 3)]);
}

// =============================================================================
// Cart Changes During Checkout
// =============================================================================

/// A persisted cart that gets one more write right after checkout reads it,
/// as a second request from the same user would.
struct ChangedAfterRead<'a> {
    inner: PersistedCart<'a, MemoryStore>,
    write: CartEntry,
}

impl CartSource for ChangedAfterRead<'_> {
    fn shopper(&self) -> Shopper {
        self.inner.shopper()
    }

    async fn lines(&self) -> Result<Vec<CartEntry>, CartError> {
        let lines = self.inner.lines().await?;
        self.inner
            .add_or_update(self.write.product_id, self.write.quantity)
            .await?;
        Ok(lines)
    }

    async fn add_or_update(&self, product: ProductId, quantity: u32) -> Result<(), CartError> {
        self.inner.add_or_update(product, quantity).await
    }

    async fn remove(&self, product: ProductId) -> Result<(), CartError> {
        self.inner.remove(product).await
    }

    async fn clear(&self) -> Result<(), CartError> {
        self.inner.clear().await
    }
}

#[tokio::test]
async fn test_line_added_after_cart_read_is_ordered() {
    let shop = TestShop::new();
    let pads = shop.product("Brake Pads", dec!(800.00), 10).await;
    let fluid = shop.product("Brake Fluid", dec!(250.00), 10).await;
    let user = UserId::new(21);
    shop.store.upsert_cart_line(user, pads.id, 1).await.unwrap();

    let cart = ChangedAfterRead {
        inner: PersistedCart::new(&shop.store, user),
        write: CartEntry::new(fluid.id, 2),
    };
    let details = shop
        .orchestrator()
        .checkout(&cart, &address(), None)
        .await
        .unwrap();

    let ordered: Vec<(ProductId, u32)> = details
        .lines
        .iter()
        .map(|l| (l.product_id, l.quantity))
        .collect();
    assert_eq!(ordered, vec![(pads.id, 1), (fluid.id, 2)]);
    assert_eq!(details.order.subtotal, Money::new(dec!(1300.00)));
    assert_eq!(shop.stock(fluid.id).await, 8);
    assert!(shop.store.cart_entries(user).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_quantity_changed_after_cart_read_is_ordered() {
    let shop = TestShop::new();
    let pads = shop.product("Brake Pads", dec!(800.00), 10).await;
    let user = UserId::new(22);
    shop.store.upsert_cart_line(user, pads.id, 1).await.unwrap();

    let cart = ChangedAfterRead {
        inner: PersistedCart::new(&shop.store, user),
        write: CartEntry::new(pads.id, 3),
    };
    let details = shop
        .orchestrator()
        .checkout(&cart, &address(), None)
        .await
        .unwrap();

    assert_eq!(details.lines.len(), 1);
    assert_eq!(details.lines[0].quantity, 3);
    assert_eq!(shop.stock(pads.id).await, 7);
    assert!(shop.store.cart_entries(user).await.unwrap().is_empty());
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkouts_on_last_unit() {
    let shop = TestShop::new();
    let last = shop.product("Rare Carburettor", dec!(5200.00), 1).await;

    let mut handles = Vec::new();
    for _ in 0..2 {
        let orchestrator = shop.orchestrator();
        let (cart, _) = guest_cart();
        cart.add_or_update(last.id, 1).await.unwrap();
        handles.push(tokio::spawn(async move {
            orchestrator.checkout(&cart, &address(), None).await
        }));
    }

    let mut placed = 0;
    let mut out_of_stock = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => placed += 1,
            Err(CheckoutError::InsufficientStock { available: 0, .. }) => out_of_stock += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(placed, 1);
    assert_eq!(out_of_stock, 1);
    assert_eq!(shop.stock(last.id).await, 0);
    assert_eq!(shop.store.order_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_checkouts_never_oversell() {
    let shop = TestShop::new();
    let kit = shop.product("Clutch Kit", dec!(3100.00), 5).await;

    let mut handles = Vec::new();
    for _ in 0..12 {
        let orchestrator = shop.orchestrator();
        let (cart, _) = guest_cart();
        cart.add_or_update(kit.id, 2).await.unwrap();
        handles.push(tokio::spawn(async move {
            orchestrator.checkout(&cart, &address(), None).await
        }));
    }

    let mut placed = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            placed += 1;
        }
    }

    // 5 units, 2 per order
    assert_eq!(placed, 2);
    assert_eq!(shop.stock(kit.id).await, 1);
    assert_eq!(shop.store.order_count().await, 2);
}
