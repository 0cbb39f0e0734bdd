//! Record store: the authoritative copy of every document.
//!
//! Contended counters (variant stock, coupon usage, loyalty balance) are only ever changed
//! through guarded updates, never by read-modify-write.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartLine, Coupon, Order, ProductVariant, StatusChange, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryRecordStore;
pub use postgres::PgRecordStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0} already exists")]
    Conflict(String),
    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn user_by_email(&self, email: &str) -> Result<Option<User>>;
    /// Fails with [`StoreError::Conflict`] when the email is taken.
    async fn insert_user(&self, user: &User) -> Result<User>;
    /// `points = points - spend + earn`, only while `points >= spend`. `None` when the guard fails.
    async fn adjust_loyalty_points(&self, id: Uuid, spend: i64, earn: i64) -> Result<Option<User>>;

    async fn cart_by_user(&self, user_id: Uuid) -> Result<Option<Cart>>;
    /// Returns the user's single cart, creating an empty one if none exists.
    async fn find_or_create_cart(&self, user_id: Uuid) -> Result<Cart>;
    async fn save_cart_items(&self, cart_id: Uuid, items: &[CartLine]) -> Result<Option<Cart>>;
    async fn delete_cart(&self, cart_id: Uuid) -> Result<bool>;

    async fn variant_by_id(&self, id: Uuid) -> Result<Option<ProductVariant>>;
    async fn upsert_variant(&self, variant: &ProductVariant) -> Result<ProductVariant>;
    /// `quantity -= n` while the variant is active and `quantity >= n`. `None` when the guard fails.
    async fn decrement_stock(&self, id: Uuid, n: i32) -> Result<Option<ProductVariant>>;
    async fn increment_stock(&self, id: Uuid, n: i32) -> Result<Option<ProductVariant>>;

    async fn coupon_by_code(&self, code: &str) -> Result<Option<Coupon>>;
    async fn insert_coupon(&self, coupon: &Coupon) -> Result<Coupon>;
    /// Counts one use for `order_id` while the coupon is active and below its limit.
    async fn claim_coupon(&self, code: &str, order_id: Uuid) -> Result<Option<Coupon>>;
    /// Undoes a claim made for `order_id`; a no-op when that order holds no claim.
    async fn release_coupon(&self, code: &str, order_id: Uuid) -> Result<Option<Coupon>>;

    async fn insert_order(&self, order: &Order) -> Result<Order>;
    async fn order_by_id(&self, id: Uuid) -> Result<Option<Order>>;
    /// Applies `change` only if the order is still in `change.from`. `None` when it is not.
    async fn transition_order(&self, id: Uuid, change: &StatusChange) -> Result<Option<Order>>;

    async fn all_users(&self) -> Result<Vec<User>>;
    async fn all_carts(&self) -> Result<Vec<Cart>>;
    async fn all_variants(&self) -> Result<Vec<ProductVariant>>;
    async fn all_coupons(&self) -> Result<Vec<Coupon>>;
    async fn all_orders(&self) -> Result<Vec<Order>>;
}
