//! Coupon validation.
//!
//! Customers only ever see "Invalid or expired coupon". The exact
//! [`CouponRejection`] is kept for logs and tests.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::Coupon;

/// Why a coupon code was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CouponRejection {
    /// No coupon has this code.
    #[error("coupon not found")]
    NotFound,
    /// The coupon exists but is switched off.
    #[error("coupon is inactive")]
    Inactive,
    /// `valid_until` is in the past.
    #[error("coupon has expired")]
    Expired,
    /// `valid_from` is in the future.
    #[error("coupon is not valid yet")]
    NotYetValid,
}

/// Normalize a code typed on the checkout form.
///
/// Surrounding whitespace is ignored and a blank code means no coupon.
#[must_use]
pub fn normalize_code(code: Option<&str>) -> Option<&str> {
    code.map(str::trim).filter(|c| !c.is_empty())
}

/// Checks a coupon's active flag and redemption window.
#[derive(Debug, Clone, Copy, Default)]
pub struct CouponValidator;

impl CouponValidator {
    /// Check an already-loaded coupon.
    ///
    /// Both window bounds are inclusive. When a coupon fails several checks
    /// the first in the order inactive, not yet valid, expired is reported.
    ///
    /// # Errors
    ///
    /// Returns the [`CouponRejection`] describing the first failed check.
    pub fn check(coupon: &Coupon, now: DateTime<Utc>) -> Result<(), CouponRejection> {
        if !coupon.active {
            return Err(CouponRejection::Inactive);
        }
        if now < coupon.valid_from {
            return Err(CouponRejection::NotYetValid);
        }
        if now > coupon.valid_until {
            return Err(CouponRejection::Expired);
        }
        Ok(())
    }

    /// Validate the result of looking a code up.
    ///
    /// # Errors
    ///
    /// Returns [`CouponRejection::NotFound`] when `found` is `None`, otherwise
    /// whatever [`CouponValidator::check`] reports.
    pub fn validate(found: Option<Coupon>, now: DateTime<Utc>) -> Result<Coupon, CouponRejection> {
        let coupon = found.ok_or(CouponRejection::NotFound)?;
        Self::check(&coupon, now)?;
        Ok(coupon)
    }
}
