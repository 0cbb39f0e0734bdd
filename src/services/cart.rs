use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartLine};
use crate::repository::{RepoError, Repositories};

#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error("quantity must be at least 1")]
    InvalidQuantity,
    #[error("product variant {0} is not available")]
    VariantUnavailable(Uuid),
    #[error("not enough stock for '{name}': requested {requested}, available {available}")]
    InsufficientStock { name: String, requested: i32, available: i32 },
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView { pub cart_id: Option<Uuid>, pub items: Vec<CartLine>, pub subtotal: Decimal }

impl From<Option<Cart>> for CartView {
    fn from(cart: Option<Cart>) -> Self {
        match cart {
            Some(cart) => CartView { cart_id: Some(cart.id), subtotal: cart.subtotal(), items: cart.items },
            None => CartView { cart_id: None, items: vec![], subtotal: Decimal::ZERO },
        }
    }
}

/// Customer cart. Each user owns at most one, created on the first add.
pub struct CartService { repos: Repositories }

impl CartService {
    pub fn new(repos: Repositories) -> Self { Self { repos } }

    pub async fn view(&self, user_id: Uuid) -> Result<CartView, CartError> {
        Ok(self.repos.cart_for_user(user_id).await?.into())
    }

    /// Adds `quantity` of a variant, merging with an existing line.
    pub async fn add_item(&self, user_id: Uuid, variant_id: Uuid, quantity: i32) -> Result<CartView, CartError> {
        if quantity < 1 { return Err(CartError::InvalidQuantity); }
        let variant = self.repos.variants_by_ids(&[variant_id]).await?.into_iter().next()
            .filter(|v| v.is_active)
            .ok_or(CartError::VariantUnavailable(variant_id))?;

        let mut cart = self.repos.find_or_create_cart(user_id).await?;
        cart.add_item(CartLine::for_variant(&variant, quantity));
        let requested = cart.items.iter().filter(|l| l.product_variant_id == variant_id).map(|l| l.quantity).sum::<i32>();
        if !variant.has_stock_for(requested) {
            return Err(CartError::InsufficientStock { name: variant.variant_name, requested, available: variant.quantity });
        }
        let saved = self.repos.save_cart_items(cart.id, &cart.items).await?;
        debug!(user_id = %user_id, variant_id = %variant_id, quantity, "cart line added");
        Ok(saved.into())
    }

    /// Returns whether a cart existed.
    pub async fn clear(&self, user_id: Uuid) -> Result<bool, CartError> {
        match self.repos.store().cart_by_user(user_id).await.map_err(RepoError::from)? {
            Some(cart) => Ok(self.repos.delete_cart(cart.id).await?),
            None => Ok(false),
        }
    }
}
