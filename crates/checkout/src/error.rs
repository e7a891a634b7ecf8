//! Checkout pipeline errors.

use thiserror::Error;

use evault_core::ProductId;

use crate::cart::CartError;
use crate::coupon::CouponRejection;
use crate::db::RepositoryError;
use crate::models::AddressError;

/// Errors that can occur when quoting or placing an order.
///
/// Nothing is written when any of these is returned.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// No resolvable lines in the cart.
    #[error("cart is empty")]
    EmptyCart,

    /// A line asks for more than the product has.
    #[error("insufficient stock for {title}: {available} available, {requested} requested")]
    InsufficientStock {
        product_id: ProductId,
        title: String,
        available: u32,
        requested: u32,
    },

    /// The coupon code was refused. The reason is for logs only.
    #[error("invalid coupon: {0}")]
    InvalidCoupon(CouponRejection),

    #[error("invalid delivery address: {0}")]
    InvalidAddress(#[from] AddressError),

    /// A line quantity below 1 was supplied directly.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error("persistence failure: {0}")]
    Persistence(#[from] RepositoryError),
}

impl CheckoutError {
    /// Text that is safe to show the customer.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptyCart => "Your cart is empty.".to_owned(),
            Self::InsufficientStock {
                title, available, ..
            } => format!("Only {available} of {title} left in stock."),
            Self::InvalidCoupon(_) => "Invalid or expired coupon".to_owned(),
            Self::InvalidAddress(e) => format!("Please check your delivery address: {e}."),
            Self::InvalidQuantity => "Quantity must be at least 1.".to_owned(),
            Self::Cart(CartError::InsufficientStock {
                title, available, ..
            }) => format!("Only {available} of {title} left in stock."),
            Self::Cart(_) | Self::Persistence(_) => {
                "Something went wrong placing your order. Please try again.".to_owned()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coupon_reasons_share_one_message() {
        for reason in [
            CouponRejection::NotFound,
            CouponRejection::Inactive,
            CouponRejection::Expired,
            CouponRejection::NotYetValid,
        ] {
            assert_eq!(
                CheckoutError::InvalidCoupon(reason).user_message(),
                "Invalid or expired coupon"
            );
        }
    }

    #[test]
    fn test_persistence_details_stay_internal() {
        let err = CheckoutError::Persistence(RepositoryError::DataCorruption(
            "negative stock: -1".to_owned(),
        ));
        assert!(!err.user_message().contains("stock"));
        assert!(err.to_string().contains("negative stock"));
    }
}
