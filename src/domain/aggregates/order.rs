//! Order Aggregate

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::cart::CartLine;
use crate::domain::aggregates::product::ProductImage;
use crate::domain::value_objects::{OrderStatus, PaymentMethod, PaymentStatus};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_name: Option<String>,
    pub email: String,
    pub coupon_code: Option<String>,
    pub address: String,
    pub items: Vec<OrderLine>,
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub tax: Decimal,
    pub total_amount: i64,
    pub discount_amount: Decimal,
    pub loyalty_points_used: i64,
    pub loyalty_points_earned: i64,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub order_tracking: Vec<TrackingEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Frozen copy of a cart line at order time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_variant_id: Uuid,
    pub product_variant_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Decimal>,
    pub images: ProductImage,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackingEntry { pub status: OrderStatus, pub updated_at: DateTime<Utc> }

impl OrderLine {
    pub fn freeze(line: &CartLine, original_price: Option<Decimal>) -> Self {
        Self {
            product_variant_id: line.product_variant_id, product_variant_name: line.product_variant_name.clone(),
            quantity: line.quantity, unit_price: line.unit_price, discount: line.discount, original_price,
            images: line.images.clone(),
        }
    }
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool { matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled) }

    /// Transition table: PENDING -> SHIPPING -> DELIVERED, and any non-terminal state -> CANCELLED.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!((self, next), (Pending, Shipping) | (Shipping, Delivered) | (Pending, Cancelled) | (Shipping, Cancelled))
    }
}

/// The writes a legal status transition produces.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub payment_status: PaymentStatus,
    pub entry: TrackingEntry,
}

impl Order {
    pub fn initial_tracking(at: DateTime<Utc>) -> Vec<TrackingEntry> { vec![TrackingEntry { status: OrderStatus::Pending, updated_at: at }] }

    /// Plans a move to `to`, stamped no earlier than a microsecond after the last write.
    /// Delivering a cash order settles its payment.
    pub fn plan_transition(&self, to: OrderStatus, at: DateTime<Utc>) -> Result<StatusChange, TransitionError> {
        if !self.status.can_transition_to(to) { return Err(TransitionError { from: self.status, to }); }
        let payment_status = if to == OrderStatus::Delivered && self.payment_method == PaymentMethod::Cash { PaymentStatus::Paid } else { self.payment_status };
        let at = at.max(self.updated_at + Duration::microseconds(1));
        Ok(StatusChange { from: self.status, to, payment_status, entry: TrackingEntry { status: to, updated_at: at } })
    }

    pub fn apply(&mut self, change: &StatusChange) {
        self.status = change.to;
        self.payment_status = change.payment_status;
        self.order_tracking.push(change.entry.clone());
        self.updated_at = change.entry.updated_at;
    }

    /// Copy safe to hand to customers: purchase costs are removed from every line.
    pub fn for_customer(mut self) -> Self {
        for line in &mut self.items { line.original_price = None; }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot move order from {from} to {to}")]
pub struct TransitionError { pub from: OrderStatus, pub to: OrderStatus }
