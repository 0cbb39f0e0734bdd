//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod coupon;
pub mod user;

pub use product::{ProductImage, ProductVariant};
pub use order::{Order, OrderLine, StatusChange, TrackingEntry, TransitionError};
pub use cart::{Cart, CartLine};
pub use coupon::{Coupon, CouponError};
pub use user::User;

use chrono::{DateTime, Duration, Utc};

/// Timestamp for the next write of a record last written at `previous`. Strictly later by at
/// least a microsecond, so successive revisions never share a mirror version.
pub fn next_revision(previous: DateTime<Utc>) -> DateTime<Utc> {
    Utc::now().max(previous + Duration::microseconds(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_revisions_only_move_forward() {
        let ahead = Utc::now() + Duration::seconds(5);
        assert_eq!(next_revision(ahead), ahead + Duration::microseconds(1));
        let past = Utc::now() - Duration::seconds(5);
        assert!(next_revision(past) > past + Duration::seconds(4));
    }
}
