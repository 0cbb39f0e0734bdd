//! Checkout pricing
//!
//! Pure computation from line items, a flat coupon amount and a loyalty balance to the
//! payable total and the loyalty point movements. No store access happens here.

use rust_decimal::prelude::*;
use thiserror::Error;
use crate::domain::value_objects::is_valid_discount;

/// Flat shipping fee per order.
pub const SHIPPING_FEE: Decimal = Decimal::from_parts(49_000, 0, 0, false, 0);
/// Tax applied to the merchandise subtotal (10%).
pub const TAX_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);
/// Currency units one loyalty point is worth.
pub const POINT_VALUE: i64 = 1_000;
/// Share of the gross amount that points may pay for.
pub const MAX_POINT_DISCOUNT_RATIO: Decimal = Decimal::from_parts(5, 0, 0, false, 1);
/// Points earned per currency unit of subtotal (1 point per 10,000).
pub const POINTS_EARN_RATE: Decimal = Decimal::from_parts(1, 0, 0, false, 4);

/// The price-relevant part of a line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PriceLine { pub quantity: i32, pub unit_price: Decimal, pub discount: Decimal }

#[derive(Clone, Debug, PartialEq)]
pub struct Quote {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping_fee: Decimal,
    pub gross: Decimal,
    pub coupon_discount: Decimal,
    pub point_spend: i64,
    pub total: i64,
    pub points_used: i64,
    pub points_earned: i64,
    pub points_remaining: i64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PricingError {
    #[error("line {index} is invalid: {reason}")]
    InvalidLine { index: usize, reason: &'static str },
    #[error("coupon discount {coupon} exceeds the order value {gross}")]
    CouponExceedsOrderValue { coupon: Decimal, gross: Decimal },
    #[error("amount out of range")]
    Overflow,
}

fn to_i64(value: Decimal) -> Result<i64, PricingError> { value.to_i64().ok_or(PricingError::Overflow) }

/// Prices a checkout.
///
/// The point spend is the smaller of the balance value, half the gross amount and what is
/// left after the coupon, in whole points. A coupon larger than the gross amount is rejected.
pub fn quote(lines: &[PriceLine], coupon_discount: Decimal, balance: i64) -> Result<Quote, PricingError> {
    let mut subtotal = Decimal::ZERO;
    for (index, line) in lines.iter().enumerate() {
        if line.quantity < 1 { return Err(PricingError::InvalidLine { index, reason: "quantity must be at least 1" }); }
        if line.unit_price < Decimal::ZERO { return Err(PricingError::InvalidLine { index, reason: "unit price must not be negative" }); }
        if !is_valid_discount(line.discount) { return Err(PricingError::InvalidLine { index, reason: "discount must be between 0 and 0.5" }); }
        subtotal += Decimal::from(line.quantity) * line.unit_price * (Decimal::ONE - line.discount);
    }
    let coupon_discount = coupon_discount.max(Decimal::ZERO);
    let tax = subtotal * TAX_RATE;
    let gross = subtotal + SHIPPING_FEE + tax;
    let after_coupon = gross - coupon_discount;
    if after_coupon < Decimal::ZERO { return Err(PricingError::CouponExceedsOrderValue { coupon: coupon_discount, gross }); }

    let balance = balance.max(0);
    let point_value = Decimal::from(POINT_VALUE);
    let max_point_spend = (Decimal::from(balance) * point_value)
        .min((gross * MAX_POINT_DISCOUNT_RATIO).floor())
        .min(after_coupon.floor());
    let points_used = to_i64((max_point_spend / point_value).floor())?;
    let point_spend = points_used * POINT_VALUE;
    let total = to_i64((after_coupon - Decimal::from(point_spend)).floor())?;
    let points_earned = to_i64((subtotal * POINTS_EARN_RATE).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))?;

    Ok(Quote {
        subtotal, tax, shipping_fee: SHIPPING_FEE, gross, coupon_discount, point_spend, total,
        points_used, points_earned, points_remaining: balance - points_used,
    })
}
