//! Email rendering and delivery for notification jobs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::domain::events::{NotificationJob, OrderDetails};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Email { pub to: String, pub from: String, pub subject: String, pub body: String }

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail relay request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("mail relay rejected the message with {0}")]
    Rejected(u16),
}

/// Renders the plain-text email for a job. The same job always renders the same message.
pub fn render(job: &NotificationJob, from: &str) -> Email {
    match job {
        NotificationJob::OrderConfirmation { email, order_details } => Email {
            to: email.clone(),
            from: from.to_string(),
            subject: format!("Order {} confirmed", order_details.order_id),
            body: order_body(order_details),
        },
        NotificationJob::CreateAccount { email, name, password } => Email {
            to: email.clone(),
            from: from.to_string(),
            subject: "Your new account".to_string(),
            body: format!(
                "Hello {name},\n\nAn account was created for you when you placed your order.\n\nEmail: {email}\nPassword: {password}\n\nPlease change the password after signing in.\n"
            ),
        },
    }
}

fn order_body(d: &OrderDetails) -> String {
    let mut body = format!("Hello {},\n\nThank you for your order {}.\n\n", d.user_name.as_deref().unwrap_or("customer"), d.order_id);
    for line in &d.items {
        body.push_str(&format!("- {} x{} at {}", line.product_variant_name, line.quantity, line.unit_price.normalize()));
        if !line.discount.is_zero() { body.push_str(&format!(" (-{}%)", (line.discount * rust_decimal::Decimal::ONE_HUNDRED).normalize())); }
        body.push('\n');
    }
    body.push_str(&format!("\nShipping to: {}\nPayment: {}\n", d.address, d.payment_method));
    if !d.discount_amount.is_zero() { body.push_str(&format!("Coupon discount: {}\n", d.discount_amount.normalize())); }
    if d.loyalty_points_used > 0 { body.push_str(&format!("Loyalty points used: {}\n", d.loyalty_points_used)); }
    body.push_str(&format!("Total: {}\nLoyalty points earned: {}\n", d.total_amount, d.loyalty_points_earned));
    body
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Posts `{to, from, subject, body}` as JSON to an HTTP mail relay.
pub struct HttpMailer { client: Client, relay_url: String }

impl HttpMailer {
    pub fn new(relay_url: impl Into<String>) -> Result<Self, MailError> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self { client, relay_url: relay_url.into() })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let response = self.client.post(&self.relay_url).json(email).send().await?;
        if !response.status().is_success() { return Err(MailError::Rejected(response.status().as_u16())); }
        Ok(())
    }
}
