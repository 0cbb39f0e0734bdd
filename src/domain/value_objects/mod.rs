//! Value Objects for Checkout

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Highest per-line discount a variant may carry.
pub const MAX_LINE_DISCOUNT: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// Coupon code value object: exactly five upper-case letters or digits.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CouponCode(String);

impl CouponCode {
    pub const LENGTH: usize = 5;

    pub fn new(value: impl Into<String>) -> Result<Self, CouponCodeError> {
        let value = value.into().trim().to_string();
        if value.chars().count() != Self::LENGTH { return Err(CouponCodeError::WrongLength); }
        if !value.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) { return Err(CouponCodeError::InvalidCharacter); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for CouponCode {
    type Error = CouponCodeError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<CouponCode> for String {
    fn from(code: CouponCode) -> Self { code.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CouponCodeError {
    #[error("coupon code must be exactly 5 characters")]
    WrongLength,
    #[error("coupon code may only contain A-Z and 0-9")]
    InvalidCharacter,
}

/// A discount ratio is valid when it lies in `[0, 0.5]`.
pub fn is_valid_discount(discount: Decimal) -> bool {
    discount >= Decimal::ZERO && discount <= MAX_LINE_DISCOUNT
}

/// Declares a closed string enum that is stored and serialized in SCREAMING_SNAKE_CASE.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name { $(#[serde(rename = $text)] $variant),+ }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
            pub fn as_str(&self) -> &'static str { match self { $($name::$variant => $text),+ } }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s { $($text => Ok($name::$variant),)+ other => Err(UnknownVariant { kind: stringify!($name), value: other.to_string() }) }
            }
        }
    };
}

string_enum!(
    /// Order lifecycle state.
    OrderStatus { Pending => "PENDING", Shipping => "SHIPPING", Delivered => "DELIVERED", Cancelled => "CANCELLED" }
);

string_enum!(PaymentMethod { Cash => "CASH", BankTransfer => "BANK_TRANSFER" });

string_enum!(PaymentStatus { Pending => "PENDING", Paid => "PAID", Failed => "FAILED" });

string_enum!(Role { Customer => "CUSTOMER", Admin => "ADMIN" });

impl PaymentMethod {
    /// Payment state an order starts in for this method.
    pub fn initial_payment_status(&self) -> PaymentStatus {
        match self { PaymentMethod::BankTransfer => PaymentStatus::Paid, PaymentMethod::Cash => PaymentStatus::Pending }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant { pub kind: &'static str, pub value: String }
