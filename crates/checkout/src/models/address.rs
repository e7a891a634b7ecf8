//! Delivery address captured at checkout.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use evault_core::{DeliveryAddressId, OrderId};

/// Maximum length of a phone number.
pub const MAX_PHONE_LENGTH: usize = 15;
/// Maximum length of a postal PIN code.
pub const MAX_PINCODE_LENGTH: usize = 10;

/// Errors that can occur when validating a [`NewDeliveryAddress`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// A required field is empty or whitespace.
    #[error("{0} is required")]
    Missing(&'static str),
    /// A field exceeds its column length.
    #[error("{field} must be at most {max} characters")]
    TooLong {
        /// Field name.
        field: &'static str,
        /// Maximum allowed length.
        max: usize,
    },
}

/// Shipping details for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub id: DeliveryAddressId,
    pub order_id: OrderId,
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub local_address: String,
    pub landmark: Option<String>,
    pub city: String,
    pub district: String,
    pub state: String,
    pub pincode: String,
    /// Set by staff after confirming the address with the customer.
    pub verified: bool,
}

/// Shipping details as submitted on the checkout form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewDeliveryAddress {
    pub full_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    pub local_address: String,
    #[serde(default)]
    pub landmark: Option<String>,
    pub city: String,
    pub district: String,
    pub state: String,
    pub pincode: String,
}

impl NewDeliveryAddress {
    /// Check required fields and column lengths.
    ///
    /// # Errors
    ///
    /// Returns the first [`AddressError`] found, in form order.
    pub fn validate(&self) -> Result<(), AddressError> {
        let required = [
            ("full_name", &self.full_name),
            ("phone", &self.phone),
            ("local_address", &self.local_address),
            ("city", &self.city),
            ("district", &self.district),
            ("state", &self.state),
            ("pincode", &self.pincode),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(AddressError::Missing(field));
            }
        }

        if self.phone.trim().chars().count() > MAX_PHONE_LENGTH {
            return Err(AddressError::TooLong {
                field: "phone",
                max: MAX_PHONE_LENGTH,
            });
        }
        if self.pincode.trim().chars().count() > MAX_PINCODE_LENGTH {
            return Err(AddressError::TooLong {
                field: "pincode",
                max: MAX_PINCODE_LENGTH,
            });
        }

        Ok(())
    }
}
