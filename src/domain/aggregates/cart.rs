//! Cart Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::product::{ProductImage, ProductVariant};

/// A user's cart. The lines are a cache of catalog prices and are re-checked at checkout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<CartLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_variant_id: Uuid,
    pub product_variant_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub images: ProductImage,
}

impl CartLine {
    pub fn for_variant(variant: &ProductVariant, quantity: i32) -> Self {
        Self {
            product_variant_id: variant.id, product_variant_name: variant.variant_name.clone(), quantity,
            unit_price: variant.price, discount: variant.discount, images: variant.primary_image(),
        }
    }

    pub fn line_total(&self) -> Decimal { Decimal::from(self.quantity) * self.unit_price * (Decimal::ONE - self.discount) }

    /// Aligns the cached price and discount with the variant. Returns true when anything changed.
    pub fn reprice(&mut self, variant: &ProductVariant) -> bool {
        if self.unit_price == variant.price && self.discount == variant.discount { return false; }
        self.unit_price = variant.price;
        self.discount = variant.discount;
        true
    }
}

impl Cart {
    pub fn for_customer(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self { id: Uuid::now_v7(), user_id, items: vec![], created_at: now, updated_at: now }
    }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn subtotal(&self) -> Decimal { self.items.iter().map(CartLine::line_total).sum() }

    pub fn add_item(&mut self, item: CartLine) {
        if let Some(existing) = self.items.iter_mut().find(|i| i.product_variant_id == item.product_variant_id) {
            existing.quantity += item.quantity;
        } else {
            self.items.push(item);
        }
        self.updated_at = Utc::now();
    }

    pub fn clear(&mut self) { self.items.clear(); self.updated_at = Utc::now(); }
}
