//! OpenSASE Checkout
//!
//! Order creation and fulfilment service of the OpenSASE e-commerce platform.
//!
//! ## Features
//! - Cart revalidation against the live catalog
//! - Coupon and loyalty-point pricing
//! - Compensating checkout over guarded stock, coupon and loyalty updates
//! - Order status state machine with payment settlement
//! - Postgres record store mirrored to an Elasticsearch read index
//! - Durable email notifications over NATS JetStream

// =============================================================================
// Modules
// =============================================================================

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod mailer;
pub mod pricing;
pub mod queue;
pub mod repository;
pub mod search;
pub mod services;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use api::{router, AppState};
pub use config::{Config, ConfigError, WorkerConfig};
pub use domain::aggregates::{Cart, CartLine, Coupon, Order, OrderLine, ProductVariant, User};
pub use domain::events::NotificationJob;
pub use domain::value_objects::{CouponCode, OrderStatus, PaymentMethod, PaymentStatus, Role};
pub use error::{AppError, AppResult};
pub use pricing::{quote, Quote};
pub use repository::Repositories;
pub use services::{CheckoutError, CheckoutRequest, CheckoutService, OrderService};
