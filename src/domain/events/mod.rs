//! Notification jobs handed to the mail queue
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::{Order, OrderLine};
use crate::domain::value_objects::PaymentMethod;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationJob {
    OrderConfirmation {
        email: String,
        #[serde(rename = "orderDetails")]
        order_details: OrderDetails,
    },
    CreateAccount { email: String, name: String, password: String },
}

/// Snapshot of an order as shown in the confirmation email.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order_id: Uuid,
    pub user_name: Option<String>,
    pub address: String,
    pub items: Vec<OrderLine>,
    pub total_amount: i64,
    pub discount_amount: Decimal,
    pub loyalty_points_used: i64,
    pub loyalty_points_earned: i64,
    pub payment_method: PaymentMethod,
}

impl NotificationJob {
    pub fn order_confirmation(order: &Order) -> Self {
        let customer_copy = order.clone().for_customer();
        NotificationJob::OrderConfirmation {
            email: order.email.clone(),
            order_details: OrderDetails {
                order_id: order.id, user_name: order.user_name.clone(), address: order.address.clone(), items: customer_copy.items,
                total_amount: order.total_amount, discount_amount: order.discount_amount,
                loyalty_points_used: order.loyalty_points_used, loyalty_points_earned: order.loyalty_points_earned,
                payment_method: order.payment_method,
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self { NotificationJob::OrderConfirmation { .. } => "order_confirmation", NotificationJob::CreateAccount { .. } => "create_account" }
    }
}
