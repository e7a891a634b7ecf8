//! Order pricing.
//!
//! # Rules
//!
//! 1. Each line gets the bulk-discount tier with the highest `min_quantity`
//!    not exceeding the line quantity; no qualifying tier means base price.
//! 2. `subtotal` is the sum of line totals.
//! 3. `tax` is GST at a flat 18% of the subtotal.
//! 4. `delivery_charge` is ₹50 unless the order carries an override.
//! 5. A valid coupon takes its percentage off `subtotal + tax + delivery`.
//!    Tax and delivery are discounted along with the goods.
//! 6. Everything stays exact until the total is rounded to paise
//!    (half-to-even).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use evault_core::{CouponId, Money, ProductId};

use crate::coupon::CouponValidator;
use crate::models::{Coupon, Product, ResolvedLine};

/// GST applied to every order, in percent.
pub const GST_PERCENT: Decimal = Decimal::from_parts(18, 0, 0, false, 0);

/// Delivery charge used when an order has no override.
pub const DEFAULT_DELIVERY_CHARGE: Money =
    Money::new(Decimal::from_parts(5_000, 0, 0, false, 2));

/// Price breakdown of one cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinePrice {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Product base price.
    pub unit_price: Money,
    /// Unit price after the applied tier.
    pub effective_unit_price: Money,
    /// Percentage of the tier that applied, if any.
    pub tier_discount_percentage: Option<Decimal>,
    pub line_total: Money,
}

/// Totals of an order, at full precision except for `total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderPricing {
    pub subtotal: Money,
    pub tax: Money,
    pub delivery_charge: Money,
    pub discount: Money,
    /// Rounded to paise.
    pub total: Money,
    /// Coupon that produced `discount`.
    pub coupon_id: Option<CouponId>,
}

impl OrderPricing {
    /// Components rounded to paise for storage. `total` is already rounded
    /// and is not recomputed from the rounded parts.
    #[must_use]
    pub fn rounded(&self) -> Self {
        Self {
            subtotal: self.subtotal.round_to_cents(),
            tax: self.tax.round_to_cents(),
            delivery_charge: self.delivery_charge.round_to_cents(),
            discount: self.discount.round_to_cents(),
            total: self.total,
            coupon_id: self.coupon_id,
        }
    }
}

/// Stateless pricing calculator.
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingEngine;

impl PricingEngine {
    /// Effective unit price of `product` when bought `quantity` at a time.
    #[must_use]
    pub fn price_line(product: &Product, quantity: u32) -> Money {
        match Self::applicable_tier(product, quantity) {
            Some(percent) => product.price - product.price.percent(percent),
            None => product.price,
        }
    }

    /// Full breakdown of one line.
    #[must_use]
    pub fn line(product: &Product, quantity: u32) -> LinePrice {
        let tier = Self::applicable_tier(product, quantity);
        let effective = Self::price_line(product, quantity);
        LinePrice {
            product_id: product.id,
            quantity,
            unit_price: product.price,
            effective_unit_price: effective,
            tier_discount_percentage: tier,
            line_total: effective * quantity,
        }
    }

    /// Price every line of a cart.
    #[must_use]
    pub fn lines(lines: &[ResolvedLine]) -> Vec<LinePrice> {
        lines
            .iter()
            .map(|l| Self::line(&l.product, l.quantity))
            .collect()
    }

    /// Compute order totals.
    ///
    /// `coupon` only contributes a discount if it passes
    /// [`CouponValidator::check`] at `now`. `delivery_override` replaces
    /// [`DEFAULT_DELIVERY_CHARGE`].
    #[must_use]
    pub fn price_order(
        lines: &[ResolvedLine],
        coupon: Option<&Coupon>,
        delivery_override: Option<Money>,
        now: DateTime<Utc>,
    ) -> OrderPricing {
        let subtotal: Money = lines
            .iter()
            .map(|l| Self::price_line(&l.product, l.quantity) * l.quantity)
            .sum();
        let tax = subtotal.percent(GST_PERCENT);
        let delivery_charge = delivery_override.unwrap_or(DEFAULT_DELIVERY_CHARGE);
        let pre_discount = subtotal + tax + delivery_charge;

        let coupon = coupon.filter(|c| CouponValidator::check(c, now).is_ok());
        let discount = coupon.map_or(Money::ZERO, |c| pre_discount.percent(c.discount_percentage));

        OrderPricing {
            subtotal,
            tax,
            delivery_charge,
            discount,
            total: (pre_discount - discount).round_to_cents(),
            coupon_id: coupon.map(|c| c.id),
        }
    }

    /// Discount percentage of the highest threshold tier `quantity` reaches.
    fn applicable_tier(product: &Product, quantity: u32) -> Option<Decimal> {
        product
            .bulk_discounts
            .iter()
            .filter(|t| t.min_quantity <= quantity)
            .max_by_key(|t| t.min_quantity)
            .map(|t| t.discount_percentage)
    }
}
