//! In-memory record store with the same guarded semantics as Postgres.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RecordStore, Result, StoreError};
use crate::domain::aggregates::{next_revision, Cart, CartLine, Coupon, Order, ProductVariant, StatusChange, User};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    carts: HashMap<Uuid, Cart>,
    variants: HashMap<Uuid, ProductVariant>,
    coupons: HashMap<String, Coupon>,
    orders: HashMap<Uuid, Order>,
}

#[derive(Default)]
pub struct MemoryRecordStore {
    tables: RwLock<Tables>,
    fail_order_inserts: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `insert_order` fail, to exercise compensation paths.
    pub fn set_fail_order_inserts(&self, fail: bool) {
        self.fail_order_inserts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.values().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<User> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!("user with email {}", user.email)));
        }
        t.users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn adjust_loyalty_points(&self, id: Uuid, spend: i64, earn: i64) -> Result<Option<User>> {
        let mut t = self.tables.write().await;
        Ok(t.users.get_mut(&id).filter(|u| u.loyalty_points >= spend).map(|u| {
            u.loyalty_points = u.loyalty_points - spend + earn;
            u.updated_at = next_revision(u.updated_at);
            u.clone()
        }))
    }

    async fn cart_by_user(&self, user_id: Uuid) -> Result<Option<Cart>> {
        Ok(self.tables.read().await.carts.values().find(|c| c.user_id == user_id).cloned())
    }

    async fn find_or_create_cart(&self, user_id: Uuid) -> Result<Cart> {
        let mut t = self.tables.write().await;
        if let Some(cart) = t.carts.values().find(|c| c.user_id == user_id) {
            return Ok(cart.clone());
        }
        let cart = Cart::for_customer(user_id);
        t.carts.insert(cart.id, cart.clone());
        Ok(cart)
    }

    async fn save_cart_items(&self, cart_id: Uuid, items: &[CartLine]) -> Result<Option<Cart>> {
        let mut t = self.tables.write().await;
        Ok(t.carts.get_mut(&cart_id).map(|c| {
            c.items = items.to_vec();
            c.updated_at = next_revision(c.updated_at);
            c.clone()
        }))
    }

    async fn delete_cart(&self, cart_id: Uuid) -> Result<bool> {
        Ok(self.tables.write().await.carts.remove(&cart_id).is_some())
    }

    async fn variant_by_id(&self, id: Uuid) -> Result<Option<ProductVariant>> {
        Ok(self.tables.read().await.variants.get(&id).cloned())
    }

    async fn upsert_variant(&self, variant: &ProductVariant) -> Result<ProductVariant> {
        let mut t = self.tables.write().await;
        let mut variant = variant.clone();
        if let Some(existing) = t.variants.get(&variant.id) {
            variant.created_at = existing.created_at;
            variant.updated_at = next_revision(existing.updated_at);
        }
        t.variants.insert(variant.id, variant.clone());
        Ok(variant)
    }

    async fn decrement_stock(&self, id: Uuid, n: i32) -> Result<Option<ProductVariant>> {
        let mut t = self.tables.write().await;
        Ok(t.variants.get_mut(&id).filter(|v| v.is_active && v.quantity >= n).map(|v| {
            v.quantity -= n;
            v.updated_at = next_revision(v.updated_at);
            v.clone()
        }))
    }

    async fn increment_stock(&self, id: Uuid, n: i32) -> Result<Option<ProductVariant>> {
        let mut t = self.tables.write().await;
        Ok(t.variants.get_mut(&id).map(|v| {
            v.quantity += n;
            v.updated_at = next_revision(v.updated_at);
            v.clone()
        }))
    }

    async fn coupon_by_code(&self, code: &str) -> Result<Option<Coupon>> {
        Ok(self.tables.read().await.coupons.get(code).cloned())
    }

    async fn insert_coupon(&self, coupon: &Coupon) -> Result<Coupon> {
        let mut t = self.tables.write().await;
        if t.coupons.contains_key(&coupon.code) {
            return Err(StoreError::Conflict(format!("coupon {}", coupon.code)));
        }
        t.coupons.insert(coupon.code.clone(), coupon.clone());
        Ok(coupon.clone())
    }

    async fn claim_coupon(&self, code: &str, order_id: Uuid) -> Result<Option<Coupon>> {
        let mut t = self.tables.write().await;
        Ok(t.coupons.get_mut(code).filter(|c| c.is_redeemable()).map(|c| {
            c.usage_count += 1;
            c.orders_used.push(order_id);
            c.updated_at = next_revision(c.updated_at);
            c.clone()
        }))
    }

    async fn release_coupon(&self, code: &str, order_id: Uuid) -> Result<Option<Coupon>> {
        let mut t = self.tables.write().await;
        Ok(t.coupons.get_mut(code).filter(|c| c.orders_used.contains(&order_id)).map(|c| {
            c.usage_count -= 1;
            c.orders_used.retain(|id| *id != order_id);
            c.updated_at = next_revision(c.updated_at);
            c.clone()
        }))
    }

    async fn insert_order(&self, order: &Order) -> Result<Order> {
        if self.fail_order_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("order inserts disabled".into()));
        }
        let mut t = self.tables.write().await;
        if t.orders.contains_key(&order.id) {
            return Err(StoreError::Conflict(format!("order {}", order.id)));
        }
        t.orders.insert(order.id, order.clone());
        Ok(order.clone())
    }

    async fn order_by_id(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn transition_order(&self, id: Uuid, change: &StatusChange) -> Result<Option<Order>> {
        let mut t = self.tables.write().await;
        Ok(t.orders.get_mut(&id).filter(|o| o.status == change.from).map(|o| {
            o.apply(change);
            o.clone()
        }))
    }

    async fn all_users(&self) -> Result<Vec<User>> {
        Ok(self.tables.read().await.users.values().cloned().collect())
    }

    async fn all_carts(&self) -> Result<Vec<Cart>> {
        Ok(self.tables.read().await.carts.values().cloned().collect())
    }

    async fn all_variants(&self) -> Result<Vec<ProductVariant>> {
        Ok(self.tables.read().await.variants.values().cloned().collect())
    }

    async fn all_coupons(&self) -> Result<Vec<Coupon>> {
        Ok(self.tables.read().await.coupons.values().cloned().collect())
    }

    async fn all_orders(&self) -> Result<Vec<Order>> {
        Ok(self.tables.read().await.orders.values().cloned().collect())
    }
}
