//! In-process store.
//!
//! All state sits behind one async mutex. A checkout transaction holds that
//! mutex from [`CheckoutStore::begin`] until it is committed or dropped and
//! writes to a private copy, so transactions are fully serialized and a
//! dropped transaction leaves no trace.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use evault_core::{
    BulkDiscountTierId, CartId, CartLineId, CouponId, DeliveryAddressId, Money, OrderId,
    OrderLineId, OrderStatus, ProductId, Slug, UserId,
};

use super::{
    CartRepository, Catalog, CatalogWriter, CheckoutStore, CheckoutTx, OrderRepository,
    RepositoryError,
};
use crate::models::{
    BulkDiscountTier, Cart, CartEntry, Coupon, DeliveryAddress, NewBulkDiscountTier, NewCoupon,
    NewDeliveryAddress, NewOrder, NewOrderLine, NewProduct, Order, OrderDetails, OrderLine,
    Product,
};

#[derive(Debug, Clone, Default)]
struct Sequences {
    product: i32,
    tier: i32,
    coupon: i32,
    cart: i32,
    cart_line: i32,
    order: i32,
    order_line: i32,
    address: i32,
}

fn next(seq: &mut i32) -> i32 {
    *seq += 1;
    *seq
}

#[derive(Debug, Clone)]
struct CartLineRow {
    id: CartLineId,
    cart_id: CartId,
    product_id: ProductId,
    quantity: u32,
}

/// Every table of the store.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    seq: Sequences,
    products: BTreeMap<ProductId, Product>,
    coupons: BTreeMap<CouponId, Coupon>,
    carts: BTreeMap<UserId, Cart>,
    cart_lines: Vec<CartLineRow>,
    orders: BTreeMap<OrderId, Order>,
    order_lines: Vec<OrderLine>,
    addresses: BTreeMap<OrderId, DeliveryAddress>,
}

impl MemoryState {
    fn products(&self, ids: &[ProductId]) -> Vec<Product> {
        ids.iter()
            .filter_map(|id| self.products.get(id).cloned())
            .collect()
    }

    fn coupon_by_code(&self, code: &str) -> Option<Coupon> {
        self.coupons.values().find(|c| c.code == code).cloned()
    }

    fn cart_entries(&self, user: UserId) -> Vec<CartEntry> {
        let Some(cart) = self.carts.get(&user) else {
            return Vec::new();
        };
        let mut lines: Vec<&CartLineRow> = self
            .cart_lines
            .iter()
            .filter(|l| l.cart_id == cart.id)
            .collect();
        lines.sort_by_key(|l| l.id);
        lines
            .into_iter()
            .map(|l| CartEntry::new(l.product_id, l.quantity))
            .collect()
    }

    fn clear_cart(&mut self, user: UserId) {
        if let Some(cart) = self.carts.get(&user) {
            let cart_id = cart.id;
            self.cart_lines.retain(|l| l.cart_id != cart_id);
        }
    }
}

/// In-process implementation of every store trait.
///
/// Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of orders placed so far.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }
}

impl Catalog for MemoryStore {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.state.lock().await.products(ids))
    }

    async fn coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        Ok(self.state.lock().await.coupon_by_code(code))
    }
}

impl CatalogWriter for MemoryStore {
    async fn slug_exists(&self, slug: &Slug) -> Result<bool, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state.products.values().any(|p| &p.slug == slug))
    }

    async fn insert_product(
        &self,
        product: &NewProduct,
        slug: &Slug,
    ) -> Result<Product, RepositoryError> {
        let mut state = self.state.lock().await;

        if state.products.values().any(|p| &p.slug == slug) {
            return Err(RepositoryError::Conflict(format!("slug {slug} already exists")));
        }
        if let Some(part) = &product.part_number
            && state
                .products
                .values()
                .any(|p| p.part_number.as_ref() == Some(part))
        {
            return Err(RepositoryError::Conflict(format!(
                "part number {part} already exists"
            )));
        }

        let now = Utc::now();
        let id = ProductId::new(next(&mut state.seq.product));
        let created = Product {
            id,
            title: product.title.clone(),
            slug: slug.clone(),
            part_number: product.part_number.clone(),
            description: product.description.clone(),
            price: product.price,
            mrp: product.mrp,
            stock: product.stock,
            is_out_of_stock_manual: product.is_out_of_stock_manual,
            bulk_discounts: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        state.products.insert(id, created.clone());
        Ok(created)
    }

    async fn insert_bulk_tier(
        &self,
        tier: &NewBulkDiscountTier,
    ) -> Result<BulkDiscountTier, RepositoryError> {
        let mut state = self.state.lock().await;
        let id = BulkDiscountTierId::new(state.seq.tier + 1);

        let product = state
            .products
            .get_mut(&tier.product_id)
            .ok_or(RepositoryError::NotFound)?;
        if product
            .bulk_discounts
            .iter()
            .any(|t| t.min_quantity == tier.min_quantity)
        {
            return Err(RepositoryError::Conflict(format!(
                "product {} already has a tier at {}",
                tier.product_id, tier.min_quantity
            )));
        }

        let created = BulkDiscountTier {
            id,
            product_id: tier.product_id,
            min_quantity: tier.min_quantity,
            discount_percentage: tier.discount_percentage,
        };
        product.bulk_discounts.push(created.clone());
        product.sort_tiers();
        state.seq.tier += 1;
        Ok(created)
    }

    async fn insert_coupon(&self, coupon: &NewCoupon) -> Result<Coupon, RepositoryError> {
        let mut state = self.state.lock().await;
        if state.coupon_by_code(&coupon.code).is_some() {
            return Err(RepositoryError::Conflict(format!(
                "coupon {} already exists",
                coupon.code
            )));
        }

        let id = CouponId::new(next(&mut state.seq.coupon));
        let created = Coupon {
            id,
            code: coupon.code.clone(),
            discount_percentage: coupon.discount_percentage,
            active: coupon.active,
            valid_from: coupon.valid_from,
            valid_until: coupon.valid_until,
        };
        state.coupons.insert(id, created.clone());
        Ok(created)
    }

    async fn update_product_price(
        &self,
        id: ProductId,
        price: Money,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let product = state.products.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        product.price = price;
        product.updated_at = Utc::now();
        Ok(())
    }
}

impl CartRepository for MemoryStore {
    async fn cart_entries(&self, user: UserId) -> Result<Vec<CartEntry>, RepositoryError> {
        Ok(self.state.lock().await.cart_entries(user))
    }

    async fn upsert_cart_line(
        &self,
        user: UserId,
        product: ProductId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        if !state.products.contains_key(&product) {
            return Err(RepositoryError::NotFound);
        }

        let cart_id = if let Some(cart) = state.carts.get(&user) {
            cart.id
        } else {
            let cart = Cart {
                id: CartId::new(next(&mut state.seq.cart)),
                user_id: user,
                created_at: Utc::now(),
            };
            let id = cart.id;
            state.carts.insert(user, cart);
            id
        };

        if let Some(line) = state
            .cart_lines
            .iter_mut()
            .find(|l| l.cart_id == cart_id && l.product_id == product)
        {
            line.quantity = quantity;
        } else {
            let id = CartLineId::new(next(&mut state.seq.cart_line));
            state.cart_lines.push(CartLineRow {
                id,
                cart_id,
                product_id: product,
                quantity,
            });
        }
        Ok(())
    }

    async fn delete_cart_line(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        if let Some(cart_id) = state.carts.get(&user).map(|c| c.id) {
            state
                .cart_lines
                .retain(|l| !(l.cart_id == cart_id && l.product_id == product));
        }
        Ok(())
    }

    async fn clear_cart(&self, user: UserId) -> Result<(), RepositoryError> {
        self.state.lock().await.clear_cart(user);
        Ok(())
    }
}

impl OrderRepository for MemoryStore {
    async fn order_details(&self, id: OrderId) -> Result<Option<OrderDetails>, RepositoryError> {
        let state = self.state.lock().await;
        let Some(order) = state.orders.get(&id).cloned() else {
            return Ok(None);
        };
        let mut lines: Vec<OrderLine> = state
            .order_lines
            .iter()
            .filter(|l| l.order_id == id)
            .cloned()
            .collect();
        lines.sort_by_key(|l| l.id);
        Ok(Some(OrderDetails {
            order,
            lines,
            address: state.addresses.get(&id).cloned(),
        }))
    }

    async fn orders_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .rev()
            .filter(|o| o.user_id == Some(user))
            .cloned()
            .collect())
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        tracking_link: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        let order = state.orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if order.status != expected {
            return Ok(false);
        }
        order.status = next;
        if let Some(link) = tracking_link {
            order.tracking_link = Some(link.to_owned());
        }
        order.updated_at = Utc::now();
        Ok(true)
    }
}

impl CheckoutStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, RepositoryError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(MemoryTx { guard, staged })
    }
}

/// A serialized transaction over a [`MemoryStore`].
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

impl CheckoutTx for MemoryTx {
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.staged.products(ids))
    }

    async fn cart_entries(&mut self, user: UserId) -> Result<Vec<CartEntry>, RepositoryError> {
        Ok(self.staged.cart_entries(user))
    }

    async fn find_coupon(&mut self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        Ok(self.staged.coupon_by_code(code))
    }

    async fn decrement_stock(
        &mut self,
        id: ProductId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        let product = self
            .staged
            .products
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        let current = product.stock;
        product.stock = current.checked_sub(quantity).ok_or_else(|| {
            RepositoryError::Conflict(format!(
                "stock of product {id} would go negative ({current} - {quantity})"
            ))
        })?;
        product.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let id = OrderId::new(next(&mut self.staged.seq.order));
        let created = Order {
            id,
            user_id: order.user_id,
            coupon_id: order.coupon_id,
            subtotal: order.subtotal,
            tax: order.tax,
            delivery_charge: order.delivery_charge,
            discount: order.discount,
            total: order.total,
            status: OrderStatus::Pending,
            tracking_link: None,
            created_at: order.placed_at,
            updated_at: order.placed_at,
        };
        self.staged.orders.insert(id, created.clone());
        Ok(created)
    }

    async fn insert_order_line(
        &mut self,
        line: &NewOrderLine,
    ) -> Result<OrderLine, RepositoryError> {
        if !self.staged.orders.contains_key(&line.order_id) {
            return Err(RepositoryError::NotFound);
        }
        let created = OrderLine {
            id: OrderLineId::new(next(&mut self.staged.seq.order_line)),
            order_id: line.order_id,
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            discounted_unit_price: line.discounted_unit_price,
            line_total: line.line_total,
        };
        self.staged.order_lines.push(created.clone());
        Ok(created)
    }

    async fn insert_delivery_address(
        &mut self,
        order: OrderId,
        address: &NewDeliveryAddress,
    ) -> Result<DeliveryAddress, RepositoryError> {
        if !self.staged.orders.contains_key(&order) {
            return Err(RepositoryError::NotFound);
        }
        if self.staged.addresses.contains_key(&order) {
            return Err(RepositoryError::Conflict(format!(
                "order {order} already has a delivery address"
            )));
        }
        let created = DeliveryAddress {
            id: DeliveryAddressId::new(next(&mut self.staged.seq.address)),
            order_id: order,
            full_name: address.full_name.trim().to_owned(),
            phone: address.phone.trim().to_owned(),
            email: address.email.clone(),
            local_address: address.local_address.trim().to_owned(),
            landmark: address.landmark.clone(),
            city: address.city.trim().to_owned(),
            district: address.district.trim().to_owned(),
            state: address.state.trim().to_owned(),
            pincode: address.pincode.trim().to_owned(),
            verified: false,
        };
        self.staged.addresses.insert(order, created.clone());
        Ok(created)
    }

    async fn clear_cart(&mut self, user: UserId) -> Result<(), RepositoryError> {
        self.staged.clear_cart(user);
        Ok(())
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        let Self { mut guard, staged } = self;
        *guard = staged;
        Ok(())
    }
}
