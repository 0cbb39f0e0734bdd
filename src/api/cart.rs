use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::auth::Identity;
use super::AppState;
use crate::error::AppResult;
use crate::services::CartView;

pub async fn get_cart(State(s): State<AppState>, Identity(user): Identity) -> AppResult<Json<CartView>> {
    Ok(Json(s.carts.view(user.id).await?))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddToCartRequest {
    pub product_variant_id: Uuid,
    #[validate(range(min = 1, max = 1000))]
    pub quantity: i32,
}

pub async fn add_to_cart(State(s): State<AppState>, Identity(user): Identity, Json(r): Json<AddToCartRequest>) -> AppResult<(StatusCode, Json<CartView>)> {
    r.validate()?;
    let cart = s.carts.add_item(user.id, r.product_variant_id, r.quantity).await?;
    Ok((StatusCode::CREATED, Json(cart)))
}

pub async fn clear_cart(State(s): State<AppState>, Identity(user): Identity) -> AppResult<StatusCode> {
    s.carts.clear(user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
