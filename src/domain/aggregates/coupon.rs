//! Coupon Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::CouponCode;

pub const MAX_USAGE_LIMIT: i32 = 10;

/// Shared flat-amount discount code with a global usage ceiling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub discount_amount: Decimal,
    pub usage_count: i32,
    pub usage_limit: i32,
    #[serde(default)]
    pub orders_used: Vec<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    pub fn create(code: CouponCode, discount_amount: Decimal, usage_limit: i32) -> Result<Self, CouponError> {
        if discount_amount < Decimal::ZERO { return Err(CouponError::NegativeDiscount); }
        if !(1..=MAX_USAGE_LIMIT).contains(&usage_limit) { return Err(CouponError::UsageLimitOutOfRange(usage_limit)); }
        let now = Utc::now();
        Ok(Self { code: code.into(), discount_amount, usage_count: 0, usage_limit, orders_used: vec![], is_active: true, created_at: now, updated_at: now })
    }

    pub fn remaining_uses(&self) -> i32 { (self.usage_limit - self.usage_count).max(0) }
    pub fn is_redeemable(&self) -> bool { self.is_active && self.usage_count < self.usage_limit }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CouponError {
    #[error("discount amount must not be negative")]
    NegativeDiscount,
    #[error("usage limit must be between 1 and 10, got {0}")]
    UsageLimitOutOfRange(i32),
}
