//! Domain models for the checkout pipeline.
//!
//! Models are plain data. Persistence lives in [`crate::db`]; pricing rules
//! live in [`crate::pricing`].

pub mod address;
pub mod cart;
pub mod coupon;
pub mod order;
pub mod product;

pub use address::{AddressError, DeliveryAddress, NewDeliveryAddress};
pub use cart::{Cart, CartEntry, ResolvedLine};
pub use coupon::{Coupon, NewCoupon};
pub use order::{NewOrder, NewOrderLine, Order, OrderDetails, OrderLine};
pub use product::{BulkDiscountTier, NewBulkDiscountTier, NewProduct, Product};
