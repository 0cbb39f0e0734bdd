//! Application services: checkout, order lifecycle, cart and coupons.

use serde::Serialize;

pub mod cart;
pub mod checkout;
pub mod coupons;
pub mod orders;

pub use cart::{CartError, CartService, CartView};
pub use checkout::{CheckoutError, CheckoutRequest, CheckoutService};
pub use coupons::{CouponService, CouponServiceError, CouponView};
pub use orders::{OrderError, OrderFilter, OrderService};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> { pub data: Vec<T>, pub total: u64, pub page: u32, pub limit: u32 }

impl<T> PaginatedResponse<T> {
    pub fn empty(page: u32, limit: u32) -> Self { Self { data: vec![], total: 0, page, limit } }
}

/// Clamps raw paging input and returns `(page, limit, offset)`.
pub fn paging(page: Option<u32>, limit: Option<u32>) -> (u32, u32, usize) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, limit, ((page - 1) as usize) * limit as usize)
}
