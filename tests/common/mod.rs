#![allow(dead_code)]

use std::sync::Arc;

use opensase_checkout::domain::aggregates::{Cart, CartLine, Coupon, ProductVariant, User};
use opensase_checkout::domain::value_objects::{CouponCode, Role};
use opensase_checkout::queue::MemoryQueue;
use opensase_checkout::search::MemorySearchIndex;
use opensase_checkout::services::{CheckoutRequest, CheckoutService, OrderService};
use opensase_checkout::store::MemoryRecordStore;
use opensase_checkout::Repositories;
use rust_decimal::Decimal;
use uuid::Uuid;

pub const ADDRESS: &str = "1 Le Loi, District 1";

pub struct Harness {
    pub repos: Repositories,
    pub store: Arc<MemoryRecordStore>,
    pub index: Arc<MemorySearchIndex>,
    pub queue: Arc<MemoryQueue>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryRecordStore::new());
        let index = Arc::new(MemorySearchIndex::new());
        let queue = Arc::new(MemoryQueue::new());
        let repos = Repositories::new(store.clone(), index.clone(), 2);
        Self {
            checkout: Arc::new(CheckoutService::new(repos.clone(), queue.clone())),
            orders: Arc::new(OrderService::new(repos.clone())),
            repos, store, index, queue,
        }
    }

    pub async fn variant(&self, name: &str, price: i64, stock: i32) -> ProductVariant {
        let v = ProductVariant::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), name, Decimal::from(price), stock);
        self.repos.upsert_variant(&v).await.unwrap()
    }

    pub async fn save_variant(&self, v: &ProductVariant) -> ProductVariant {
        self.repos.upsert_variant(v).await.unwrap()
    }

    pub async fn customer(&self, email: &str, points: i64) -> User {
        let mut user = User::customer(email, "Lan Nguyen", "$argon2id$test");
        user.loyalty_points = points;
        self.repos.insert_user(&user).await.unwrap()
    }

    pub async fn admin(&self, email: &str) -> User {
        let mut user = User::customer(email, "Admin", "$argon2id$test");
        user.role = Role::Admin;
        self.repos.insert_user(&user).await.unwrap()
    }

    pub async fn fill_cart(&self, user: &User, lines: &[(&ProductVariant, i32)]) -> Cart {
        let cart = self.repos.find_or_create_cart(user.id).await.unwrap();
        let items: Vec<CartLine> = lines.iter().map(|(v, q)| CartLine::for_variant(v, *q)).collect();
        self.repos.save_cart_items(cart.id, &items).await.unwrap().unwrap()
    }

    pub async fn coupon(&self, code: &str, amount: i64, limit: i32) -> Coupon {
        let coupon = Coupon::create(CouponCode::new(code).unwrap(), Decimal::from(amount), limit).unwrap();
        self.repos.insert_coupon(&coupon).await.unwrap()
    }

    pub async fn balance(&self, user: &User) -> i64 {
        self.store_user(user.id).await.loyalty_points
    }

    pub async fn store_user(&self, id: Uuid) -> User {
        use opensase_checkout::store::RecordStore;
        self.store.user_by_id(id).await.unwrap().unwrap()
    }

    pub async fn stock(&self, v: &ProductVariant) -> i32 {
        use opensase_checkout::store::RecordStore;
        self.store.variant_by_id(v.id).await.unwrap().unwrap().quantity
    }
}

pub fn customer_request(user: &User) -> CheckoutRequest {
    CheckoutRequest { user_id: Some(user.id), address: ADDRESS.into(), payment_method: "CASH".into(), ..Default::default() }
}

pub fn guest_request(email: &str, lines: Vec<CartLine>) -> CheckoutRequest {
    CheckoutRequest {
        user_name: Some("Guest Buyer".into()),
        email: Some(email.into()),
        address: ADDRESS.into(),
        items: Some(lines),
        payment_method: "BANK_TRANSFER".into(),
        ..Default::default()
    }
}
