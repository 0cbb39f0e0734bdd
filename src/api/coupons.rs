use axum::{extract::{Path, State}, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::auth::AdminIdentity;
use super::AppState;
use crate::domain::aggregates::Coupon;
use crate::domain::value_objects::CouponCode;
use crate::error::{AppError, AppResult};
use crate::services::CouponView;

/// Limits and amounts are checked by `Coupon::create`.
#[derive(Debug, Deserialize)]
pub struct CreateCouponRequest {
    pub code: String,
    pub discount_amount: Decimal,
    pub usage_limit: i32,
}

pub async fn create_coupon(State(s): State<AppState>, AdminIdentity(_): AdminIdentity, Json(r): Json<CreateCouponRequest>) -> AppResult<(StatusCode, Json<Coupon>)> {
    let code = CouponCode::new(r.code).map_err(|e| AppError::Validation(e.to_string()))?;
    let coupon = s.coupons.create(code, r.discount_amount, r.usage_limit).await?;
    Ok((StatusCode::CREATED, Json(coupon)))
}

pub async fn get_coupon(State(s): State<AppState>, Path(code): Path<String>) -> AppResult<Json<CouponView>> {
    s.coupons.check(&code).await?.map(Json).ok_or_else(|| AppError::NotFound(format!("coupon {code} not found")))
}
