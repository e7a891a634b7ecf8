//! Order models.
//!
//! Orders are written once at checkout. Afterwards only `status` and
//! `tracking_link` change, and only through [`crate::admin::OrderAdmin`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use evault_core::{CouponId, Money, OrderId, OrderLineId, OrderStatus, ProductId, UserId};

use super::DeliveryAddress;

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Owning user; `None` for guest checkout.
    pub user_id: Option<UserId>,
    /// Coupon applied at checkout. Kept even if the coupon is later deactivated.
    pub coupon_id: Option<CouponId>,
    pub subtotal: Money,
    /// GST at 18% of the subtotal.
    pub tax: Money,
    pub delivery_charge: Money,
    /// Coupon discount taken off subtotal + tax + delivery.
    pub discount: Money,
    pub total: Money,
    pub status: OrderStatus,
    pub tracking_link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One product line of a placed order, with prices frozen at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    /// The product's price when the order was placed.
    pub unit_price: Money,
    /// Unit price after the bulk-discount tier that applied at order time.
    pub discounted_unit_price: Money,
    pub line_total: Money,
}

/// An order with its lines and delivery address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order: Order,
    pub lines: Vec<OrderLine>,
    pub address: Option<DeliveryAddress>,
}

/// Row values for inserting an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Option<UserId>,
    pub coupon_id: Option<CouponId>,
    pub subtotal: Money,
    pub tax: Money,
    pub delivery_charge: Money,
    pub discount: Money,
    pub total: Money,
    pub placed_at: DateTime<Utc>,
}

/// Row values for inserting an order line.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
    pub discounted_unit_price: Money,
    pub line_total: Money,
}
