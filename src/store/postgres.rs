//! Postgres record store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::{RecordStore, Result, StoreError};
use crate::domain::aggregates::{Cart, CartLine, Coupon, Order, OrderLine, ProductImage, ProductVariant, StatusChange, TrackingEntry, User};
use crate::domain::value_objects::UnknownVariant;

#[derive(Clone)]
pub struct PgRecordStore { pool: PgPool }

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[derive(sqlx::FromRow)]
struct UserRow { id: Uuid, email: String, full_name: String, password_hash: String, address: Option<String>, role: String, loyalty_points: i64, is_active: bool, created_at: DateTime<Utc>, updated_at: DateTime<Utc> }

#[derive(sqlx::FromRow)]
struct CartRow { id: Uuid, user_id: Uuid, items: Json<Vec<CartLine>>, created_at: DateTime<Utc>, updated_at: DateTime<Utc> }

#[derive(sqlx::FromRow)]
struct VariantRow {
    id: Uuid, product_id: Uuid, brand_id: Uuid, category_id: Uuid, variant_name: String, price: Decimal, original_price: Option<Decimal>,
    discount: Decimal, quantity: i32, is_active: bool, average_rating: f64, review_count: i32, images: Json<Vec<ProductImage>>,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CouponRow { code: String, discount_amount: Decimal, usage_count: i32, usage_limit: i32, orders_used: Vec<Uuid>, is_active: bool, created_at: DateTime<Utc>, updated_at: DateTime<Utc> }

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid, user_id: Option<Uuid>, user_name: Option<String>, email: String, coupon_code: Option<String>, address: String,
    items: Json<Vec<OrderLine>>, subtotal: Decimal, shipping_fee: Decimal, tax: Decimal, total_amount: i64, discount_amount: Decimal,
    loyalty_points_used: i64, loyalty_points_earned: i64, status: String, payment_method: String, payment_status: String,
    order_tracking: Json<Vec<TrackingEntry>>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

fn parse<T: std::str::FromStr<Err = UnknownVariant>>(value: &str) -> Result<T> {
    value.parse().map_err(|e: UnknownVariant| StoreError::Corrupt(e.to_string()))
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;
    fn try_from(r: UserRow) -> Result<Self> {
        Ok(User { id: r.id, email: r.email, full_name: r.full_name, password_hash: r.password_hash, address: r.address, role: parse(&r.role)?, loyalty_points: r.loyalty_points, is_active: r.is_active, created_at: r.created_at, updated_at: r.updated_at })
    }
}

impl From<CartRow> for Cart {
    fn from(r: CartRow) -> Self { Cart { id: r.id, user_id: r.user_id, items: r.items.0, created_at: r.created_at, updated_at: r.updated_at } }
}

impl From<VariantRow> for ProductVariant {
    fn from(r: VariantRow) -> Self {
        ProductVariant {
            id: r.id, product_id: r.product_id, brand_id: r.brand_id, category_id: r.category_id, variant_name: r.variant_name, price: r.price,
            original_price: r.original_price, discount: r.discount, quantity: r.quantity, is_active: r.is_active, average_rating: r.average_rating,
            review_count: r.review_count, images: r.images.0, created_at: r.created_at, updated_at: r.updated_at,
        }
    }
}

impl From<CouponRow> for Coupon {
    fn from(r: CouponRow) -> Self {
        Coupon { code: r.code, discount_amount: r.discount_amount, usage_count: r.usage_count, usage_limit: r.usage_limit, orders_used: r.orders_used, is_active: r.is_active, created_at: r.created_at, updated_at: r.updated_at }
    }
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;
    fn try_from(r: OrderRow) -> Result<Self> {
        Ok(Order {
            id: r.id, user_id: r.user_id, user_name: r.user_name, email: r.email, coupon_code: r.coupon_code, address: r.address, items: r.items.0,
            subtotal: r.subtotal, shipping_fee: r.shipping_fee, tax: r.tax, total_amount: r.total_amount, discount_amount: r.discount_amount,
            loyalty_points_used: r.loyalty_points_used, loyalty_points_earned: r.loyalty_points_earned, status: parse(&r.status)?,
            payment_method: parse(&r.payment_method)?, payment_status: parse(&r.payment_status)?, order_tracking: r.order_tracking.0,
            created_at: r.created_at, updated_at: r.updated_at,
        })
    }
}

/// Maps a unique-constraint violation to [`StoreError::Conflict`].
fn conflict_or(e: sqlx::Error, what: impl Into<String>) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(what.into()),
        _ => StoreError::Database(e),
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1").bind(id).fetch_optional(&self.pool).await?.map(User::try_from).transpose()
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1").bind(email).fetch_optional(&self.pool).await?.map(User::try_from).transpose()
    }

    async fn insert_user(&self, u: &User) -> Result<User> {
        sqlx::query_as::<_, UserRow>("INSERT INTO users (id, email, full_name, password_hash, address, role, loyalty_points, is_active, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *")
            .bind(u.id).bind(&u.email).bind(&u.full_name).bind(&u.password_hash).bind(&u.address).bind(u.role.as_str()).bind(u.loyalty_points).bind(u.is_active).bind(u.created_at).bind(u.updated_at)
            .fetch_one(&self.pool).await.map_err(|e| conflict_or(e, format!("user with email {}", u.email)))?.try_into()
    }

    async fn adjust_loyalty_points(&self, id: Uuid, spend: i64, earn: i64) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRow>("UPDATE users SET loyalty_points = loyalty_points - $2 + $3, updated_at = GREATEST(clock_timestamp(), updated_at + INTERVAL '1 microsecond') WHERE id = $1 AND loyalty_points >= $2 RETURNING *")
            .bind(id).bind(spend).bind(earn).fetch_optional(&self.pool).await?.map(User::try_from).transpose()
    }

    async fn cart_by_user(&self, user_id: Uuid) -> Result<Option<Cart>> {
        Ok(sqlx::query_as::<_, CartRow>("SELECT * FROM carts WHERE user_id = $1").bind(user_id).fetch_optional(&self.pool).await?.map(Cart::from))
    }

    async fn find_or_create_cart(&self, user_id: Uuid) -> Result<Cart> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = sqlx::query_as::<_, CartRow>("INSERT INTO carts (id, user_id, items, created_at, updated_at) VALUES ($1, $2, '[]', NOW(), NOW()) ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id RETURNING *")
            .bind(Uuid::now_v7()).bind(user_id).fetch_one(&self.pool).await?;
        Ok(row.into())
    }

    async fn save_cart_items(&self, cart_id: Uuid, items: &[CartLine]) -> Result<Option<Cart>> {
        Ok(sqlx::query_as::<_, CartRow>("UPDATE carts SET items = $2, updated_at = GREATEST(clock_timestamp(), updated_at + INTERVAL '1 microsecond') WHERE id = $1 RETURNING *")
            .bind(cart_id).bind(Json(items)).fetch_optional(&self.pool).await?.map(Cart::from))
    }

    async fn delete_cart(&self, cart_id: Uuid) -> Result<bool> {
        Ok(sqlx::query("DELETE FROM carts WHERE id = $1").bind(cart_id).execute(&self.pool).await?.rows_affected() > 0)
    }

    async fn variant_by_id(&self, id: Uuid) -> Result<Option<ProductVariant>> {
        Ok(sqlx::query_as::<_, VariantRow>("SELECT * FROM product_variants WHERE id = $1").bind(id).fetch_optional(&self.pool).await?.map(ProductVariant::from))
    }

    async fn upsert_variant(&self, v: &ProductVariant) -> Result<ProductVariant> {
        let row = sqlx::query_as::<_, VariantRow>(
            "INSERT INTO product_variants (id, product_id, brand_id, category_id, variant_name, price, original_price, discount, quantity, is_active, average_rating, review_count, images, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             ON CONFLICT (id) DO UPDATE SET variant_name = EXCLUDED.variant_name, price = EXCLUDED.price, original_price = EXCLUDED.original_price, discount = EXCLUDED.discount, \
             quantity = EXCLUDED.quantity, is_active = EXCLUDED.is_active, images = EXCLUDED.images, updated_at = GREATEST(clock_timestamp(), product_variants.updated_at + INTERVAL '1 microsecond') RETURNING *")
            .bind(v.id).bind(v.product_id).bind(v.brand_id).bind(v.category_id).bind(&v.variant_name).bind(v.price).bind(v.original_price).bind(v.discount)
            .bind(v.quantity).bind(v.is_active).bind(v.average_rating).bind(v.review_count).bind(Json(&v.images)).bind(v.created_at).bind(v.updated_at)
            .fetch_one(&self.pool).await?;
        Ok(row.into())
    }

    async fn decrement_stock(&self, id: Uuid, n: i32) -> Result<Option<ProductVariant>> {
        Ok(sqlx::query_as::<_, VariantRow>("UPDATE product_variants SET quantity = quantity - $2, updated_at = GREATEST(clock_timestamp(), updated_at + INTERVAL '1 microsecond') WHERE id = $1 AND is_active AND quantity >= $2 RETURNING *")
            .bind(id).bind(n).fetch_optional(&self.pool).await?.map(ProductVariant::from))
    }

    async fn increment_stock(&self, id: Uuid, n: i32) -> Result<Option<ProductVariant>> {
        Ok(sqlx::query_as::<_, VariantRow>("UPDATE product_variants SET quantity = quantity + $2, updated_at = GREATEST(clock_timestamp(), updated_at + INTERVAL '1 microsecond') WHERE id = $1 RETURNING *")
            .bind(id).bind(n).fetch_optional(&self.pool).await?.map(ProductVariant::from))
    }

    async fn coupon_by_code(&self, code: &str) -> Result<Option<Coupon>> {
        Ok(sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons WHERE code = $1").bind(code).fetch_optional(&self.pool).await?.map(Coupon::from))
    }

    async fn insert_coupon(&self, c: &Coupon) -> Result<Coupon> {
        let row = sqlx::query_as::<_, CouponRow>("INSERT INTO coupons (code, discount_amount, usage_count, usage_limit, orders_used, is_active, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *")
            .bind(&c.code).bind(c.discount_amount).bind(c.usage_count).bind(c.usage_limit).bind(&c.orders_used).bind(c.is_active).bind(c.created_at).bind(c.updated_at)
            .fetch_one(&self.pool).await.map_err(|e| conflict_or(e, format!("coupon {}", c.code)))?;
        Ok(row.into())
    }

    async fn claim_coupon(&self, code: &str, order_id: Uuid) -> Result<Option<Coupon>> {
        Ok(sqlx::query_as::<_, CouponRow>("UPDATE coupons SET usage_count = usage_count + 1, orders_used = array_append(orders_used, $2), updated_at = GREATEST(clock_timestamp(), updated_at + INTERVAL '1 microsecond') WHERE code = $1 AND is_active AND usage_count < usage_limit RETURNING *")
            .bind(code).bind(order_id).fetch_optional(&self.pool).await?.map(Coupon::from))
    }

    async fn release_coupon(&self, code: &str, order_id: Uuid) -> Result<Option<Coupon>> {
        Ok(sqlx::query_as::<_, CouponRow>("UPDATE coupons SET usage_count = usage_count - 1, orders_used = array_remove(orders_used, $2), updated_at = GREATEST(clock_timestamp(), updated_at + INTERVAL '1 microsecond') WHERE code = $1 AND $2 = ANY(orders_used) RETURNING *")
            .bind(code).bind(order_id).fetch_optional(&self.pool).await?.map(Coupon::from))
    }

    async fn insert_order(&self, o: &Order) -> Result<Order> {
        sqlx::query_as::<_, OrderRow>(
            "INSERT INTO orders (id, user_id, user_name, email, coupon_code, address, items, subtotal, shipping_fee, tax, total_amount, discount_amount, \
             loyalty_points_used, loyalty_points_earned, status, payment_method, payment_status, order_tracking, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20) RETURNING *")
            .bind(o.id).bind(o.user_id).bind(&o.user_name).bind(&o.email).bind(&o.coupon_code).bind(&o.address).bind(Json(&o.items))
            .bind(o.subtotal).bind(o.shipping_fee).bind(o.tax).bind(o.total_amount).bind(o.discount_amount)
            .bind(o.loyalty_points_used).bind(o.loyalty_points_earned).bind(o.status.as_str()).bind(o.payment_method.as_str()).bind(o.payment_status.as_str())
            .bind(Json(&o.order_tracking)).bind(o.created_at).bind(o.updated_at)
            .fetch_one(&self.pool).await.map_err(|e| conflict_or(e, format!("order {}", o.id)))?.try_into()
    }

    async fn order_by_id(&self, id: Uuid) -> Result<Option<Order>> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(&self.pool).await?.map(Order::try_from).transpose()
    }

    async fn transition_order(&self, id: Uuid, change: &StatusChange) -> Result<Option<Order>> {
        sqlx::query_as::<_, OrderRow>("UPDATE orders SET status = $3, payment_status = $4, order_tracking = order_tracking || $5, updated_at = $6 WHERE id = $1 AND status = $2 RETURNING *")
            .bind(id).bind(change.from.as_str()).bind(change.to.as_str()).bind(change.payment_status.as_str())
            .bind(Json(vec![&change.entry])).bind(change.entry.updated_at)
            .fetch_optional(&self.pool).await?.map(Order::try_from).transpose()
    }

    async fn all_users(&self) -> Result<Vec<User>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users").fetch_all(&self.pool).await?.into_iter().map(User::try_from).collect()
    }

    async fn all_carts(&self) -> Result<Vec<Cart>> {
        Ok(sqlx::query_as::<_, CartRow>("SELECT * FROM carts").fetch_all(&self.pool).await?.into_iter().map(Cart::from).collect())
    }

    async fn all_variants(&self) -> Result<Vec<ProductVariant>> {
        Ok(sqlx::query_as::<_, VariantRow>("SELECT * FROM product_variants").fetch_all(&self.pool).await?.into_iter().map(ProductVariant::from).collect())
    }

    async fn all_coupons(&self) -> Result<Vec<Coupon>> {
        Ok(sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons").fetch_all(&self.pool).await?.into_iter().map(Coupon::from).collect())
    }

    async fn all_orders(&self) -> Result<Vec<Order>> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders ORDER BY created_at").fetch_all(&self.pool).await?.into_iter().map(Order::try_from).collect()
    }
}
