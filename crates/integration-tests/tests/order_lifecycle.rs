//! Integration tests for staff order actions after checkout.

use rust_decimal_macros::dec;

use evault_checkout::admin::{OrderAdmin, OrderAdminError};
use evault_checkout::cart::CartSource;
use evault_checkout::db::OrderRepository;
use evault_core::{OrderStatus, UserId};
use evault_integration_tests::{TestShop, address, guest_cart};

async fn placed_order(shop: &TestShop) -> evault_core::OrderId {
    let horn = shop.product("Electric Horn", dec!(450.00), 10).await;
    let (cart, _) = guest_cart();
    cart.add_or_update(horn.id, 1).await.unwrap();
    shop.orchestrator()
        .checkout(&cart, &address(), None)
        .await
        .unwrap()
        .order
        .id
}

#[tokio::test]
async fn test_order_moves_forward_to_delivered() {
    let shop = TestShop::new();
    let id = placed_order(&shop).await;
    let admin = OrderAdmin::new(&shop.store);

    let details = admin.details(id).await.unwrap();
    assert_eq!(details.order.status, OrderStatus::Pending);
    let address = details.address.unwrap();
    assert!(!address.verified);
    assert_eq!(address.city, "Coimbatore");

    let shipped = admin
        .advance(id, OrderStatus::Shipped, Some("https://track.example/XY99"))
        .await
        .unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);

    let delivered = admin.advance(id, OrderStatus::Delivered, None).await.unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert_eq!(
        delivered.tracking_link.as_deref(),
        Some("https://track.example/XY99")
    );
    assert!(delivered.status.is_terminal());
}

#[tokio::test]
async fn test_status_never_moves_backwards() {
    let shop = TestShop::new();
    let id = placed_order(&shop).await;
    let admin = OrderAdmin::new(&shop.store);

    admin.advance(id, OrderStatus::Shipped, None).await.unwrap();
    let err = admin
        .advance(id, OrderStatus::Pending, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderAdminError::InvalidTransition {
            from: OrderStatus::Shipped,
            to: OrderStatus::Pending
        }
    ));
    assert_eq!(
        admin.details(id).await.unwrap().order.status,
        OrderStatus::Shipped
    );
}

#[tokio::test]
async fn test_stale_status_update_is_refused() {
    let shop = TestShop::new();
    let id = placed_order(&shop).await;

    assert!(
        shop.store
            .update_order_status(id, OrderStatus::Pending, OrderStatus::Shipped, None)
            .await
            .unwrap()
    );
    // A second writer that also saw Pending loses
    assert!(
        !shop
            .store
            .update_order_status(id, OrderStatus::Pending, OrderStatus::Delivered, None)
            .await
            .unwrap()
    );
    assert_eq!(
        shop.store.order_details(id).await.unwrap().unwrap().order.status,
        OrderStatus::Shipped
    );
}

#[tokio::test]
async fn test_guest_orders_have_no_owner() {
    let shop = TestShop::new();
    let id = placed_order(&shop).await;

    let details = OrderAdmin::new(&shop.store).details(id).await.unwrap();
    assert_eq!(details.order.user_id, None);
    assert!(
        OrderAdmin::new(&shop.store)
            .orders_for_user(UserId::new(1))
            .await
            .unwrap()
            .is_empty()
    );
}
