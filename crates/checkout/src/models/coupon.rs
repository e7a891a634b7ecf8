//! Coupon models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use evault_core::CouponId;

/// A percentage-off coupon redeemable during a time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    /// Code typed by the customer (unique, case-sensitive).
    pub code: String,
    /// Percentage taken off the order total, in `[0, 100]`.
    pub discount_percentage: Decimal,
    pub active: bool,
    /// First instant the coupon can be redeemed (inclusive).
    pub valid_from: DateTime<Utc>,
    /// Last instant the coupon can be redeemed (inclusive).
    pub valid_until: DateTime<Utc>,
}

/// Input for creating a coupon.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCoupon {
    pub code: String,
    pub discount_percentage: Decimal,
    #[serde(default = "default_active")]
    pub active: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

const fn default_active() -> bool {
    true
}
