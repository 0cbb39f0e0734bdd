//! Checkout workflow
//!
//! Order creation runs in two phases. Validation reads the search index and touches nothing:
//! resolve lines, revalidate them against the live catalog, resolve the coupon and balance,
//! price, validate the payment method and resolve the customer. The commit phase is a saga
//! over the record store's guarded updates:
//!
//! | step | action | compensation |
//! |------|--------|--------------|
//! | 1 | `decrement_stock` per line | `increment_stock` |
//! | 2 | `claim_coupon` | `release_coupon` |
//! | 3 | `adjust_loyalty_points(used, earned)` | `adjust_loyalty_points(earned, used)` |
//! | 4 | `insert_order` (pivot) | none |
//!
//! A failure before the pivot undoes the completed steps in reverse order. After the pivot
//! the order stands; mirroring it, clearing the cart and enqueueing the confirmation are
//! best-effort and only logged when they fail.

use std::collections::HashMap;
use std::sync::Arc;

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHasher};
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartLine, Coupon, Order, OrderLine, ProductVariant, User};
use crate::domain::events::NotificationJob;
use crate::domain::value_objects::{OrderStatus, PaymentMethod};
use crate::pricing::{self, PriceLine, PricingError, Quote};
use crate::queue::NotificationQueue;
use crate::repository::{RepoError, Repositories};
use crate::search;
use crate::store::StoreError;

pub const GUEST_PASSWORD_LENGTH: usize = 12;

#[derive(Clone, Debug, Default)]
pub struct CheckoutRequest {
    /// Authenticated customer. `None` is a guest checkout.
    pub user_id: Option<Uuid>,
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub coupon_code: Option<String>,
    pub address: String,
    /// Lines of a guest checkout. Authenticated checkouts use the stored cart.
    pub items: Option<Vec<CartLine>>,
    pub payment_method: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("at least one item is required")]
    NoItems,
    #[error("unknown customer {0}")]
    UnknownCustomer(Uuid),
    #[error("product '{name}' ({variant_id}) is no longer available")]
    VariantUnavailable { name: String, variant_id: Uuid },
    #[error("prices changed for {}; please review your cart", .lines.join(", "))]
    PriceChanged { lines: Vec<String> },
    #[error("not enough stock for '{name}': requested {requested}, available {available}")]
    InsufficientStock { name: String, requested: i32, available: i32 },
    #[error("coupon {0} does not exist")]
    CouponNotFound(String),
    #[error("coupon {0} is not active")]
    CouponInactive(String),
    #[error("coupon {0} usage limit has been reached")]
    CouponExhausted(String),
    #[error("loyalty balance changed during checkout; please retry")]
    LoyaltyBalanceChanged,
    #[error("invalid payment method '{0}', expected CASH or BANK_TRANSFER")]
    InvalidPaymentMethod(String),
    #[error("{0} is required for guest checkout")]
    MissingGuestField(&'static str),
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error("cannot hash guest password: {0}")]
    Credentials(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl CheckoutError {
    /// Business-rule rejections the caller can fix and resubmit.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, CheckoutError::Repo(_) | CheckoutError::Credentials(_) | CheckoutError::Pricing(PricingError::Overflow))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Completed saga steps, undone in reverse on failure.
#[derive(Debug)]
enum Compensation {
    Restock { variant_id: Uuid, quantity: i32 },
    ReleaseCoupon { code: String },
    ReverseLoyalty { user_id: Uuid, used: i64, earned: i64 },
}

struct Customer { user: User, is_new: bool }

pub struct CheckoutService {
    repos: Repositories,
    queue: Arc<dyn NotificationQueue>,
}

impl CheckoutService {
    pub fn new(repos: Repositories, queue: Arc<dyn NotificationQueue>) -> Self { Self { repos, queue } }

    pub async fn create_order(&self, req: CheckoutRequest) -> Result<Order, CheckoutError> {
        // Lines
        let (mut lines, stored_cart) = self.resolve_lines(&req).await?;

        // Live catalog
        let variants = self.revalidate(&mut lines, stored_cart.as_ref()).await?;

        // Coupon
        let coupon = match non_empty(req.coupon_code.clone()) {
            Some(code) => Some(self.resolve_coupon(&code).await?),
            None => None,
        };

        // Balance
        let account = match req.user_id {
            Some(id) => Some(self.repos.store().user_by_id(id).await.map_err(RepoError::from)?.ok_or(CheckoutError::UnknownCustomer(id))?),
            None => None,
        };
        let balance = account.as_ref().map_or(0, |u| u.loyalty_points);

        // Price
        let price_lines: Vec<PriceLine> = lines.iter().map(|l| PriceLine { quantity: l.quantity, unit_price: l.unit_price, discount: l.discount }).collect();
        let quote = pricing::quote(&price_lines, coupon.as_ref().map_or(Decimal::ZERO, |c| c.discount_amount), balance)?;

        // Payment method; checked before any account is created.
        let payment_method: PaymentMethod = req.payment_method.trim().parse()
            .map_err(|_| CheckoutError::InvalidPaymentMethod(req.payment_method.clone()))?;

        // Customer
        let customer = match account {
            Some(user) => Customer { user, is_new: false },
            None => self.resolve_guest(&req).await?,
        };

        // Commit
        let order = self.build_order(&req, &customer, &lines, &variants, coupon.as_ref(), &quote, payment_method);
        let mut done = Vec::new();
        let order = match self.commit(&order, &lines, &customer, &mut done).await {
            Ok(order) => order,
            Err(e) => {
                warn!(order_id = %order.id, error = %e, steps = done.len(), "checkout failed before commit, compensating");
                self.compensate(order.id, done).await;
                return Err(e);
            }
        };
        info!(order_id = %order.id, total = order.total_amount, points_used = order.loyalty_points_used, points_earned = order.loyalty_points_earned, "order created");

        self.after_commit(&order, stored_cart.as_ref(), customer.is_new).await;
        Ok(order.for_customer())
    }

    async fn resolve_lines(&self, req: &CheckoutRequest) -> Result<(Vec<CartLine>, Option<Cart>), CheckoutError> {
        match req.user_id {
            Some(user_id) => {
                let cart = self.repos.cart_for_user(user_id).await?.filter(|c| !c.is_empty()).ok_or(CheckoutError::EmptyCart)?;
                Ok((cart.items.clone(), Some(cart)))
            }
            None => {
                let items = req.items.clone().unwrap_or_default();
                if items.is_empty() { return Err(CheckoutError::NoItems); }
                Ok((items, None))
            }
        }
    }

    /// Checks every line against the variant it names. A stale price or discount is corrected
    /// in the stored cart and rejects the checkout.
    async fn revalidate(&self, lines: &mut [CartLine], stored_cart: Option<&Cart>) -> Result<HashMap<Uuid, ProductVariant>, CheckoutError> {
        for (index, line) in lines.iter().enumerate() {
            if line.quantity < 1 { return Err(PricingError::InvalidLine { index, reason: "quantity must be at least 1" }.into()); }
        }
        let mut ids: Vec<Uuid> = lines.iter().map(|l| l.product_variant_id).collect();
        ids.sort();
        ids.dedup();
        let variants: HashMap<Uuid, ProductVariant> = self.repos.variants_by_ids(&ids).await?.into_iter().map(|v| (v.id, v)).collect();

        for line in lines.iter() {
            if !variants.get(&line.product_variant_id).is_some_and(|v| v.is_active) {
                return Err(CheckoutError::VariantUnavailable { name: line.product_variant_name.clone(), variant_id: line.product_variant_id });
            }
        }

        let mut changed = Vec::new();
        for line in lines.iter_mut() {
            if let Some(variant) = variants.get(&line.product_variant_id) {
                if line.reprice(variant) { changed.push(line.product_variant_name.clone()); }
            }
        }
        if !changed.is_empty() {
            if let Some(cart) = stored_cart {
                self.repos.save_cart_items(cart.id, lines).await?;
                info!(cart_id = %cart.id, lines = ?changed, "cart repriced to current catalog values");
            }
            return Err(CheckoutError::PriceChanged { lines: changed });
        }

        let mut requested: HashMap<Uuid, i32> = HashMap::new();
        for line in lines.iter() {
            let total = requested.entry(line.product_variant_id).or_default();
            let available = variants.get(&line.product_variant_id).map_or(0, |v| v.quantity);
            match total.checked_add(line.quantity) {
                Some(sum) if sum <= available => *total = sum,
                sum => {
                    let requested = sum.unwrap_or(i32::MAX);
                    return Err(CheckoutError::InsufficientStock { name: line.product_variant_name.clone(), requested, available });
                }
            }
        }
        Ok(variants)
    }

    async fn resolve_coupon(&self, code: &str) -> Result<Coupon, CheckoutError> {
        let coupon = self.repos.coupon(code).await?.ok_or_else(|| CheckoutError::CouponNotFound(code.to_string()))?;
        if !coupon.is_active { return Err(CheckoutError::CouponInactive(code.to_string())); }
        if !coupon.is_redeemable() { return Err(CheckoutError::CouponExhausted(code.to_string())); }
        Ok(coupon)
    }

    /// Reuses the account registered under the guest's email, or opens one with a random
    /// password and queues the credentials email.
    async fn resolve_guest(&self, req: &CheckoutRequest) -> Result<Customer, CheckoutError> {
        let name = non_empty(req.user_name.clone()).ok_or(CheckoutError::MissingGuestField("name"))?;
        let email = non_empty(req.email.clone()).ok_or(CheckoutError::MissingGuestField("email"))?.to_lowercase();
        if let Some(user) = self.repos.store().user_by_email(&email).await.map_err(RepoError::from)? {
            return Ok(Customer { user, is_new: false });
        }

        let password: String = rand::thread_rng().sample_iter(&Alphanumeric).take(GUEST_PASSWORD_LENGTH).map(char::from).collect();
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default().hash_password(password.as_bytes(), &salt).map_err(|e| CheckoutError::Credentials(e.to_string()))?.to_string();
        let mut user = User::customer(email.clone(), name.clone(), hash);
        user.address = Some(req.address.clone());

        let user = match self.repos.insert_user(&user).await {
            Ok(user) => user,
            // Registered concurrently under the same email.
            Err(RepoError::Store(StoreError::Conflict(what))) => {
                return match self.repos.store().user_by_email(&email).await.map_err(RepoError::from)? {
                    Some(user) => Ok(Customer { user, is_new: false }),
                    None => Err(RepoError::Store(StoreError::Conflict(what)).into()),
                };
            }
            Err(e) => return Err(e.into()),
        };
        info!(user_id = %user.id, "guest account created at checkout");
        if let Err(e) = self.queue.enqueue(&NotificationJob::CreateAccount { email, name, password }).await {
            error!(user_id = %user.id, error = %e, "cannot enqueue account credentials email");
        }
        Ok(Customer { user, is_new: true })
    }

    #[allow(clippy::too_many_arguments)]
    fn build_order(
        &self, req: &CheckoutRequest, customer: &Customer, lines: &[CartLine], variants: &HashMap<Uuid, ProductVariant>,
        coupon: Option<&Coupon>, quote: &Quote, payment_method: PaymentMethod,
    ) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::now_v7(),
            user_id: Some(customer.user.id),
            user_name: non_empty(req.user_name.clone()).or_else(|| Some(customer.user.full_name.clone())),
            email: customer.user.email.clone(),
            coupon_code: coupon.map(|c| c.code.clone()),
            address: req.address.trim().to_string(),
            items: lines.iter().map(|l| OrderLine::freeze(l, variants.get(&l.product_variant_id).and_then(|v| v.original_price))).collect(),
            subtotal: quote.subtotal,
            shipping_fee: quote.shipping_fee,
            tax: quote.tax,
            total_amount: quote.total,
            discount_amount: quote.coupon_discount,
            loyalty_points_used: quote.points_used,
            loyalty_points_earned: quote.points_earned,
            status: OrderStatus::Pending,
            payment_method,
            payment_status: payment_method.initial_payment_status(),
            order_tracking: Order::initial_tracking(now),
            created_at: now,
            updated_at: now,
        }
    }

    async fn commit(&self, order: &Order, lines: &[CartLine], customer: &Customer, done: &mut Vec<Compensation>) -> Result<Order, CheckoutError> {
        for line in lines {
            if self.repos.decrement_stock(line.product_variant_id, line.quantity).await?.is_none() {
                let current = self.repos.store().variant_by_id(line.product_variant_id).await.map_err(RepoError::from)?;
                return Err(match current {
                    Some(v) if v.is_active => CheckoutError::InsufficientStock { name: line.product_variant_name.clone(), requested: line.quantity, available: v.quantity },
                    _ => CheckoutError::VariantUnavailable { name: line.product_variant_name.clone(), variant_id: line.product_variant_id },
                });
            }
            done.push(Compensation::Restock { variant_id: line.product_variant_id, quantity: line.quantity });
        }

        if let Some(code) = &order.coupon_code {
            if self.repos.claim_coupon(code, order.id).await?.is_none() { return Err(CheckoutError::CouponExhausted(code.clone())); }
            done.push(Compensation::ReleaseCoupon { code: code.clone() });
        }

        let (used, earned) = (order.loyalty_points_used, order.loyalty_points_earned);
        if used > 0 || earned > 0 {
            if self.repos.adjust_loyalty_points(customer.user.id, used, earned).await?.is_none() { return Err(CheckoutError::LoyaltyBalanceChanged); }
            done.push(Compensation::ReverseLoyalty { user_id: customer.user.id, used, earned });
        }

        Ok(self.repos.insert_order(order).await?)
    }

    async fn compensate(&self, order_id: Uuid, done: Vec<Compensation>) {
        for step in done.into_iter().rev() {
            let result = match &step {
                Compensation::Restock { variant_id, quantity } => self.repos.increment_stock(*variant_id, *quantity).await.map(|v| v.is_some()),
                Compensation::ReleaseCoupon { code } => self.repos.release_coupon(code, order_id).await.map(|c| c.is_some()),
                Compensation::ReverseLoyalty { user_id, used, earned } => self.repos.adjust_loyalty_points(*user_id, *earned, *used).await.map(|u| u.is_some()),
            };
            match result {
                Ok(true) => {}
                Ok(false) => error!(%order_id, ?step, "compensation found nothing to undo"),
                Err(e) => error!(%order_id, ?step, error = %e, "compensation failed; manual correction needed"),
            }
        }
    }

    async fn after_commit(&self, order: &Order, stored_cart: Option<&Cart>, is_new_user: bool) {
        self.repos.mirror(search::ORDERS, &order.id.to_string(), order).await;

        if let (Some(cart), false) = (stored_cart, is_new_user) {
            if let Err(e) = self.repos.delete_cart(cart.id).await {
                warn!(order_id = %order.id, cart_id = %cart.id, error = %e, "order created but cart not cleared");
            }
        }

        if let Err(e) = self.queue.enqueue(&NotificationJob::order_confirmation(order)).await {
            warn!(order_id = %order.id, error = %e, "order created but confirmation email not queued");
        }
    }
}
