use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::domain::aggregates::{Coupon, CouponError};
use crate::domain::value_objects::CouponCode;
use crate::repository::{RepoError, Repositories};
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum CouponServiceError {
    #[error(transparent)]
    Invalid(#[from] CouponError),
    #[error("coupon {0} already exists")]
    Duplicate(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// What a customer may learn about a coupon.
#[derive(Debug, Clone, Serialize)]
pub struct CouponView { pub code: String, pub discount_amount: Decimal, pub remaining_uses: i32, pub is_active: bool }

impl From<Coupon> for CouponView {
    fn from(c: Coupon) -> Self {
        CouponView { remaining_uses: c.remaining_uses(), code: c.code, discount_amount: c.discount_amount, is_active: c.is_active }
    }
}

pub struct CouponService { repos: Repositories }

impl CouponService {
    pub fn new(repos: Repositories) -> Self { Self { repos } }

    pub async fn create(&self, code: CouponCode, discount_amount: Decimal, usage_limit: i32) -> Result<Coupon, CouponServiceError> {
        let coupon = Coupon::create(code, discount_amount, usage_limit)?;
        match self.repos.insert_coupon(&coupon).await {
            Ok(coupon) => {
                info!(code = %coupon.code, limit = coupon.usage_limit, "coupon created");
                Ok(coupon)
            }
            Err(RepoError::Store(StoreError::Conflict(_))) => Err(CouponServiceError::Duplicate(coupon.code)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn check(&self, code: &str) -> Result<Option<CouponView>, CouponServiceError> {
        Ok(self.repos.coupon(code).await?.map(CouponView::from))
    }
}
