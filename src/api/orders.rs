use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::auth::{AdminIdentity, Identity, OptionalIdentity};
use super::AppState;
use crate::domain::aggregates::{CartLine, Order, ProductImage};
use crate::domain::value_objects::{is_valid_discount, CouponCode, OrderStatus, UnknownVariant};
use crate::error::{AppError, AppResult};
use crate::services::{CheckoutRequest, OrderFilter, PaginatedResponse};

fn validate_price(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() { return Err(ValidationError::new("negative_price")); }
    Ok(())
}

fn validate_discount(value: &Decimal) -> Result<(), ValidationError> {
    if !is_valid_discount(*value) { return Err(ValidationError::new("discount_out_of_range")); }
    Ok(())
}

fn validate_coupon_code(value: &str) -> Result<(), ValidationError> {
    CouponCode::new(value).map(|_| ()).map_err(|_| ValidationError::new("coupon_code_format"))
}

#[derive(Debug, Deserialize, Validate)]
pub struct LineInput {
    pub product_variant_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub product_variant_name: String,
    #[validate(range(min = 1, max = 1000))]
    pub quantity: i32,
    #[validate(custom = "validate_price")]
    pub unit_price: Decimal,
    #[serde(default)]
    #[validate(custom = "validate_discount")]
    pub discount: Decimal,
    #[serde(default)]
    pub images: ProductImage,
}

impl From<LineInput> for CartLine {
    fn from(l: LineInput) -> Self {
        CartLine { product_variant_id: l.product_variant_id, product_variant_name: l.product_variant_name, quantity: l.quantity, unit_price: l.unit_price, discount: l.discount, images: l.images }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(custom = "validate_coupon_code")]
    pub coupon_code: Option<String>,
    #[validate(length(min = 1, max = 500))]
    pub address: String,
    pub items: Option<Vec<LineInput>>,
    #[validate(length(min = 1))]
    pub payment_method: String,
}

pub async fn create_order(State(s): State<AppState>, OptionalIdentity(user): OptionalIdentity, Json(r): Json<CreateOrderRequest>) -> AppResult<(StatusCode, Json<Order>)> {
    r.validate()?;
    for item in r.items.iter().flatten() { item.validate()?; }
    let req = CheckoutRequest {
        user_id: user.as_ref().map(|u| u.id),
        user_name: r.name.or_else(|| user.as_ref().map(|u| u.full_name.clone())),
        email: r.email.or_else(|| user.as_ref().map(|u| u.email.clone())),
        coupon_code: r.coupon_code,
        address: r.address,
        items: r.items.map(|items| items.into_iter().map(CartLine::from).collect()),
        payment_method: r.payment_method,
    };
    let order = s.checkout.create_order(req).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest { pub status: String }

pub async fn update_status(State(s): State<AppState>, AdminIdentity(_): AdminIdentity, Path(id): Path<Uuid>, Json(r): Json<UpdateStatusRequest>) -> AppResult<Json<Order>> {
    let status: OrderStatus = r.status.parse().map_err(|e: UnknownVariant| AppError::Validation(e.to_string()))?;
    Ok(Json(s.orders.update_status(id, status).await?))
}

#[derive(Debug, Deserialize)]
pub struct ListParams { pub page: Option<u32>, pub limit: Option<u32> }

pub async fn list_orders(State(s): State<AppState>, AdminIdentity(_): AdminIdentity, Query(p): Query<ListParams>) -> Json<PaginatedResponse<Order>> {
    Json(s.orders.list(p.page, p.limit).await)
}

pub async fn search_orders(State(s): State<AppState>, AdminIdentity(_): AdminIdentity, Query(f): Query<OrderFilter>) -> Json<PaginatedResponse<Order>> {
    Json(s.orders.search(&f).await)
}

pub async fn my_orders(State(s): State<AppState>, Identity(user): Identity, Query(p): Query<ListParams>) -> Json<PaginatedResponse<Order>> {
    Json(s.orders.orders_of(user.id, p.page, p.limit).await)
}

/// Admins see the full document; customers only their own, without purchase costs.
pub async fn get_order(State(s): State<AppState>, Identity(user): Identity, Path(id): Path<Uuid>) -> AppResult<Json<Order>> {
    let order = s.orders.get(id).await?;
    if user.is_admin() { return Ok(Json(order)); }
    if order.user_id != Some(user.id) { return Err(AppError::NotFound(format!("order {id} not found"))); }
    Ok(Json(order.for_customer()))
}
