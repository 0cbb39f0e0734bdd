//! Product Variant Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A purchasable SKU of a product, carrying its own price, discount and stock.
///
/// The catalog owns these records; checkout only reads them and moves `quantity`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub brand_id: Uuid,
    pub category_id: Uuid,
    pub variant_name: String,
    pub price: Decimal,
    /// Purchase cost, kept for profit statistics and never shown to customers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Decimal>,
    pub discount: Decimal,
    pub quantity: i32,
    pub is_active: bool,
    #[serde(default)]
    pub average_rating: f64,
    #[serde(default)]
    pub review_count: i32,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_id: Option<String>,
}

impl ProductVariant {
    pub fn new(product_id: Uuid, brand_id: Uuid, category_id: Uuid, name: impl Into<String>, price: Decimal, quantity: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), product_id, brand_id, category_id, variant_name: name.into(),
            price, original_price: None, discount: Decimal::ZERO, quantity, is_active: true,
            average_rating: 0.0, review_count: 0, images: vec![], created_at: now, updated_at: now,
        }
    }

    pub fn with_discount(mut self, discount: Decimal) -> Self { self.discount = discount; self }
    pub fn with_original_price(mut self, cost: Decimal) -> Self { self.original_price = Some(cost); self }
    pub fn with_image(mut self, url: impl Into<String>) -> Self { self.images.push(ProductImage { url: url.into(), public_id: None }); self }

    pub fn primary_image(&self) -> ProductImage { self.images.first().cloned().unwrap_or_default() }
    pub fn has_stock_for(&self, quantity: i32) -> bool { self.is_active && quantity <= self.quantity }
}
