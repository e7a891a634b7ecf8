//! `PostgreSQL` store.
//!
//! Queries are checked at runtime (`sqlx::query_as`) so the crate builds
//! without a live database. Row structs mirror the tables and are converted
//! into domain models, rejecting values the models can't represent.
//!
//! Checkout locks product rows with `SELECT ... FOR UPDATE`, ordered by ID so
//! two checkouts touching the same products always lock them in the same
//! order.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use evault_core::{
    BulkDiscountTierId, CouponId, DeliveryAddressId, Money, OrderId, OrderLineId, OrderStatus,
    ProductId, Slug, UserId,
};

use super::{
    CartRepository, Catalog, CatalogWriter, CheckoutStore, CheckoutTx, OrderRepository,
    RepositoryError, quantity_from_db, quantity_to_db,
};
use crate::models::{
    BulkDiscountTier, CartEntry, Coupon, DeliveryAddress, NewBulkDiscountTier, NewCoupon,
    NewDeliveryAddress, NewOrder, NewOrderLine, NewProduct, Order, OrderDetails, OrderLine,
    Product,
};

/// Create a `PostgreSQL` connection pool.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database_url: &SecretString,
    max_connections: u32,
    min_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(min_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

// =============================================================================
// Internal Row Types
// =============================================================================

const PRODUCT_COLUMNS: &str = "id, title, slug, part_number, description, price, mrp, stock, \
     is_out_of_stock_manual, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, user_id, coupon_id, subtotal, tax, delivery_charge, discount, \
     total, status, tracking_link, created_at, updated_at";

const ORDER_LINE_COLUMNS: &str =
    "id, order_id, product_id, quantity, unit_price, discounted_unit_price, line_total";

const ADDRESS_COLUMNS: &str = "id, order_id, full_name, phone, email, local_address, landmark, \
     city, district, state, pincode, verified";

const COUPON_COLUMNS: &str = "id, code, discount_percentage, active, valid_from, valid_until";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    title: String,
    slug: String,
    part_number: Option<String>,
    description: String,
    price: Decimal,
    mrp: Decimal,
    stock: i32,
    is_out_of_stock_manual: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ProductId::new(row.id),
            title: row.title,
            slug: Slug::from_stored(row.slug),
            part_number: row.part_number,
            description: row.description,
            price: Money::new(row.price),
            mrp: Money::new(row.mrp),
            stock: quantity_from_db(row.stock, "stock")?,
            is_out_of_stock_manual: row.is_out_of_stock_manual,
            bulk_discounts: Vec::new(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TierRow {
    id: i32,
    product_id: i32,
    min_quantity: i32,
    discount_percentage: Decimal,
}

impl TryFrom<TierRow> for BulkDiscountTier {
    type Error = RepositoryError;

    fn try_from(row: TierRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: BulkDiscountTierId::new(row.id),
            product_id: ProductId::new(row.product_id),
            min_quantity: quantity_from_db(row.min_quantity, "min_quantity")?,
            discount_percentage: row.discount_percentage,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: i32,
    code: String,
    discount_percentage: Decimal,
    active: bool,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
}

impl From<CouponRow> for Coupon {
    fn from(row: CouponRow) -> Self {
        Self {
            id: CouponId::new(row.id),
            code: row.code,
            discount_percentage: row.discount_percentage,
            active: row.active,
            valid_from: row.valid_from,
            valid_until: row.valid_until,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartEntryRow {
    product_id: i32,
    quantity: i32,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: Option<i32>,
    coupon_id: Option<i32>,
    subtotal: Decimal,
    tax: Decimal,
    delivery_charge: Decimal,
    discount: Decimal,
    total: Decimal,
    status: OrderStatus,
    tracking_link: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: OrderId::new(row.id),
            user_id: row.user_id.map(UserId::new),
            coupon_id: row.coupon_id.map(CouponId::new),
            subtotal: Money::new(row.subtotal),
            tax: Money::new(row.tax),
            delivery_charge: Money::new(row.delivery_charge),
            discount: Money::new(row.discount),
            total: Money::new(row.total),
            status: row.status,
            tracking_link: row.tracking_link,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    id: i32,
    order_id: i32,
    product_id: i32,
    quantity: i32,
    unit_price: Decimal,
    discounted_unit_price: Decimal,
    line_total: Decimal,
}

impl TryFrom<OrderLineRow> for OrderLine {
    type Error = RepositoryError;

    fn try_from(row: OrderLineRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OrderLineId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: ProductId::new(row.product_id),
            quantity: quantity_from_db(row.quantity, "order line quantity")?,
            unit_price: Money::new(row.unit_price),
            discounted_unit_price: Money::new(row.discounted_unit_price),
            line_total: Money::new(row.line_total),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    id: i32,
    order_id: i32,
    full_name: String,
    phone: String,
    email: Option<String>,
    local_address: String,
    landmark: Option<String>,
    city: String,
    district: String,
    state: String,
    pincode: String,
    verified: bool,
}

impl From<AddressRow> for DeliveryAddress {
    fn from(row: AddressRow) -> Self {
        Self {
            id: DeliveryAddressId::new(row.id),
            order_id: OrderId::new(row.order_id),
            full_name: row.full_name,
            phone: row.phone,
            email: row.email,
            local_address: row.local_address,
            landmark: row.landmark,
            city: row.city,
            district: row.district,
            state: row.state,
            pincode: row.pincode,
            verified: row.verified,
        }
    }
}

// =============================================================================
// Shared Queries
// =============================================================================

fn ids_to_db(ids: &[ProductId]) -> Vec<i32> {
    ids.iter().map(ProductId::as_i32).collect()
}

/// Map unique and foreign-key violations onto repository errors.
fn map_constraint(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict(format!("{what} already exists"));
        }
        if db_err.is_foreign_key_violation() {
            return RepositoryError::NotFound;
        }
    }
    RepositoryError::Database(e)
}

/// Load products and their tiers, optionally locking the product rows.
async fn load_products(
    conn: &mut PgConnection,
    ids: &[ProductId],
    lock: bool,
) -> Result<Vec<Product>, RepositoryError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let ids = ids_to_db(ids);

    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM product WHERE id = ANY($1) ORDER BY id{}",
        if lock { " FOR UPDATE" } else { "" }
    );
    let rows = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

    let tier_rows = sqlx::query_as::<_, TierRow>(
        r"
        SELECT id, product_id, min_quantity, discount_percentage
        FROM bulk_discount_tier
        WHERE product_id = ANY($1)
        ORDER BY product_id, min_quantity DESC
        ",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut tiers: HashMap<i32, Vec<BulkDiscountTier>> = HashMap::new();
    for row in tier_rows {
        let product_id = row.product_id;
        tiers
            .entry(product_id)
            .or_default()
            .push(BulkDiscountTier::try_from(row)?);
    }

    let mut products = Vec::with_capacity(rows.len());
    for row in rows {
        let id = row.id;
        let mut product = Product::try_from(row)?;
        product.bulk_discounts = tiers.remove(&id).unwrap_or_default();
        products.push(product);
    }
    Ok(products)
}

async fn find_coupon(
    conn: &mut PgConnection,
    code: &str,
) -> Result<Option<Coupon>, RepositoryError> {
    let sql = format!("SELECT {COUPON_COLUMNS} FROM coupon WHERE code = $1");
    let row = sqlx::query_as::<_, CouponRow>(&sql)
        .bind(code)
        .fetch_optional(conn)
        .await?;
    Ok(row.map(Coupon::from))
}

/// Read a user's cart lines, locking them and their `cart` row when `lock`
/// is set.
///
/// Cart writes for the user touch the same `cart` row, so they wait until
/// the locking transaction ends.
async fn load_cart_entries(
    conn: &mut PgConnection,
    user: UserId,
    lock: bool,
) -> Result<Vec<CartEntry>, RepositoryError> {
    let sql = format!(
        r"
        SELECT cl.product_id, cl.quantity
        FROM cart_line cl
        JOIN cart c ON c.id = cl.cart_id
        WHERE c.user_id = $1
        ORDER BY cl.added_at, cl.id{}
        ",
        if lock { " FOR UPDATE" } else { "" }
    );
    let rows = sqlx::query_as::<_, CartEntryRow>(&sql)
        .bind(user.as_i32())
        .fetch_all(conn)
        .await?;

    rows.into_iter()
        .map(|r| {
            Ok(CartEntry::new(
                ProductId::new(r.product_id),
                quantity_from_db(r.quantity, "cart quantity")?,
            ))
        })
        .collect()
}

async fn clear_user_cart(conn: &mut PgConnection, user: UserId) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        DELETE FROM cart_line
        USING cart
        WHERE cart_line.cart_id = cart.id AND cart.user_id = $1
        ",
    )
    .bind(user.as_i32())
    .execute(conn)
    .await?;
    Ok(())
}

// =============================================================================
// Store
// =============================================================================

/// `PostgreSQL` implementation of every store trait.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Catalog for PgStore {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Ok(load_products(&mut conn, &[id], false).await?.into_iter().next())
    }

    async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_products(&mut conn, ids, false).await
    }

    async fn coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        find_coupon(&mut conn, code).await
    }
}

impl CatalogWriter for PgStore {
    async fn slug_exists(&self, slug: &Slug) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM product WHERE slug = $1)")
                .bind(slug.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn insert_product(
        &self,
        product: &NewProduct,
        slug: &Slug,
    ) -> Result<Product, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO product (title, slug, part_number, description, price, mrp, stock,
                                 is_out_of_stock_manual)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PRODUCT_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(&product.title)
            .bind(slug.as_str())
            .bind(product.part_number.as_deref())
            .bind(&product.description)
            .bind(product.price.amount())
            .bind(product.mrp.amount())
            .bind(quantity_to_db(product.stock, "stock")?)
            .bind(product.is_out_of_stock_manual)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_constraint(e, "product slug or part number"))?;
        Product::try_from(row)
    }

    async fn insert_bulk_tier(
        &self,
        tier: &NewBulkDiscountTier,
    ) -> Result<BulkDiscountTier, RepositoryError> {
        let row = sqlx::query_as::<_, TierRow>(
            r"
            INSERT INTO bulk_discount_tier (product_id, min_quantity, discount_percentage)
            VALUES ($1, $2, $3)
            RETURNING id, product_id, min_quantity, discount_percentage
            ",
        )
        .bind(tier.product_id.as_i32())
        .bind(quantity_to_db(tier.min_quantity, "min_quantity")?)
        .bind(tier.discount_percentage)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_constraint(e, "bulk discount tier"))?;
        BulkDiscountTier::try_from(row)
    }

    async fn insert_coupon(&self, coupon: &NewCoupon) -> Result<Coupon, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO coupon (code, discount_percentage, active, valid_from, valid_until)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {COUPON_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, CouponRow>(&sql)
            .bind(&coupon.code)
            .bind(coupon.discount_percentage)
            .bind(coupon.active)
            .bind(coupon.valid_from)
            .bind(coupon.valid_until)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_constraint(e, "coupon code"))?;
        Ok(Coupon::from(row))
    }

    async fn update_product_price(
        &self,
        id: ProductId,
        price: Money,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE product SET price = $2, updated_at = NOW() WHERE id = $1")
                .bind(id.as_i32())
                .bind(price.amount())
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

impl CartRepository for PgStore {
    async fn cart_entries(&self, user: UserId) -> Result<Vec<CartEntry>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_cart_entries(&mut conn, user, false).await
    }

    async fn upsert_cart_line(
        &self,
        user: UserId,
        product: ProductId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        let quantity = quantity_to_db(quantity, "cart quantity")?;
        let mut tx = self.pool.begin().await?;

        let cart_id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO cart (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id
            ",
        )
        .bind(user.as_i32())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r"
            INSERT INTO cart_line (cart_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity
            ",
        )
        .bind(cart_id)
        .bind(product.as_i32())
        .bind(quantity)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_constraint(e, "cart line"))?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_cart_line(
        &self,
        user: UserId,
        product: ProductId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            DELETE FROM cart_line
            USING cart
            WHERE cart_line.cart_id = cart.id AND cart.user_id = $1 AND cart_line.product_id = $2
            ",
        )
        .bind(user.as_i32())
        .bind(product.as_i32())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_cart(&self, user: UserId) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        clear_user_cart(&mut conn, user).await
    }
}

impl OrderRepository for PgStore {
    async fn order_details(&self, id: OrderId) -> Result<Option<OrderDetails>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM customer_order WHERE id = $1");
        let Some(order) = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id.as_i32())
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let sql = format!("SELECT {ORDER_LINE_COLUMNS} FROM order_line WHERE order_id = $1 ORDER BY id");
        let lines = sqlx::query_as::<_, OrderLineRow>(&sql)
            .bind(id.as_i32())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(OrderLine::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let sql = format!("SELECT {ADDRESS_COLUMNS} FROM delivery_address WHERE order_id = $1");
        let address = sqlx::query_as::<_, AddressRow>(&sql)
            .bind(id.as_i32())
            .fetch_optional(&self.pool)
            .await?
            .map(DeliveryAddress::from);

        Ok(Some(OrderDetails {
            order: Order::from(order),
            lines,
            address,
        }))
    }

    async fn orders_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM customer_order WHERE user_id = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user.as_i32())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        tracking_link: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE customer_order
            SET status = $3,
                tracking_link = COALESCE($4, tracking_link),
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            ",
        )
        .bind(id.as_i32())
        .bind(expected)
        .bind(next)
        .bind(tracking_link)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM customer_order WHERE id = $1)")
                .bind(id.as_i32())
                .fetch_one(&self.pool)
                .await?;
        if exists {
            Ok(false)
        } else {
            Err(RepositoryError::NotFound)
        }
    }
}

impl CheckoutStore for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, RepositoryError> {
        Ok(PgTx {
            tx: self.pool.begin().await?,
        })
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A checkout transaction. Rolls back when dropped without [`CheckoutTx::commit`].
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

impl CheckoutTx for PgTx {
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        load_products(&mut self.tx, &ids, true).await
    }

    async fn cart_entries(&mut self, user: UserId) -> Result<Vec<CartEntry>, RepositoryError> {
        load_cart_entries(&mut self.tx, user, true).await
    }

    async fn find_coupon(&mut self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        find_coupon(&mut self.tx, code).await
    }

    async fn decrement_stock(
        &mut self,
        id: ProductId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE product
            SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            ",
        )
        .bind(id.as_i32())
        .bind(quantity_to_db(quantity, "quantity")?)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "stock of product {id} would go negative"
            )));
        }
        Ok(())
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO customer_order (user_id, coupon_id, subtotal, tax, delivery_charge,
                                        discount, total, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING {ORDER_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(order.user_id)
            .bind(order.coupon_id)
            .bind(order.subtotal.amount())
            .bind(order.tax.amount())
            .bind(order.delivery_charge.amount())
            .bind(order.discount.amount())
            .bind(order.total.amount())
            .bind(OrderStatus::Pending)
            .bind(order.placed_at)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_constraint(e, "order"))?;
        Ok(Order::from(row))
    }

    async fn insert_order_line(
        &mut self,
        line: &NewOrderLine,
    ) -> Result<OrderLine, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO order_line (order_id, product_id, quantity, unit_price,
                                    discounted_unit_price, line_total)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ORDER_LINE_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, OrderLineRow>(&sql)
            .bind(line.order_id.as_i32())
            .bind(line.product_id.as_i32())
            .bind(quantity_to_db(line.quantity, "quantity")?)
            .bind(line.unit_price.amount())
            .bind(line.discounted_unit_price.amount())
            .bind(line.line_total.amount())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_constraint(e, "order line"))?;
        OrderLine::try_from(row)
    }

    async fn insert_delivery_address(
        &mut self,
        order: OrderId,
        address: &NewDeliveryAddress,
    ) -> Result<DeliveryAddress, RepositoryError> {
        let sql = format!(
            r"
            INSERT INTO delivery_address (order_id, full_name, phone, email, local_address,
                                          landmark, city, district, state, pincode)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {ADDRESS_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, AddressRow>(&sql)
            .bind(order.as_i32())
            .bind(address.full_name.trim())
            .bind(address.phone.trim())
            .bind(address.email.as_deref())
            .bind(address.local_address.trim())
            .bind(address.landmark.as_deref())
            .bind(address.city.trim())
            .bind(address.district.trim())
            .bind(address.state.trim())
            .bind(address.pincode.trim())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_constraint(e, "delivery address"))?;
        Ok(DeliveryAddress::from(row))
    }

    async fn clear_cart(&mut self, user: UserId) -> Result<(), RepositoryError> {
        clear_user_cart(&mut self.tx, user).await
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }
}
