//! HTTP API

use std::sync::Arc;

use axum::{routing::{delete, get, patch, post}, Json, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::queue::NotificationQueue;
use crate::repository::Repositories;
use crate::services::{CartService, CheckoutService, CouponService, OrderService};

pub mod auth;
pub mod cart;
pub mod coupons;
pub mod orders;

#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub carts: Arc<CartService>,
    pub coupons: Arc<CouponService>,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(repos: Repositories, queue: Arc<dyn NotificationQueue>, jwt_secret: &str) -> Self {
        Self {
            checkout: Arc::new(CheckoutService::new(repos.clone(), queue)),
            orders: Arc::new(OrderService::new(repos.clone())),
            carts: Arc::new(CartService::new(repos.clone())),
            coupons: Arc::new(CouponService::new(repos.clone())),
            repos,
            jwt_secret: Arc::from(jwt_secret),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "opensase-checkout"})) }))
        .route("/order", get(orders::list_orders).post(orders::create_order))
        .route("/order/search", get(orders::search_orders))
        .route("/order/me", get(orders::my_orders))
        .route("/order/:id", get(orders::get_order))
        .route("/order/:id/status", patch(orders::update_status))
        .route("/cart", get(cart::get_cart).post(cart::add_to_cart))
        .route("/cart/clear", delete(cart::clear_cart))
        .route("/coupon", post(coupons::create_coupon))
        .route("/coupon/:code", get(coupons::get_coupon))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state)
}
