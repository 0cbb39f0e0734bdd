//! HTTP-facing error type

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;

use crate::repository::RepoError;
use crate::services::{CartError, CheckoutError, CouponServiceError, OrderError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// Detail is logged, never sent.
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody { code: &'static str, message: String }

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        let message = match self {
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorBody { code, message })).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self { AppError::Validation(e.to_string()) }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self { AppError::Internal(e.to_string()) }
}

impl From<CheckoutError> for AppError {
    fn from(e: CheckoutError) -> Self {
        if e.is_rejection() { AppError::BadRequest(e.to_string()) } else { AppError::Internal(e.to_string()) }
    }
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::NotFound(_) => AppError::NotFound(e.to_string()),
            OrderError::Transition(_) => AppError::BadRequest(e.to_string()),
            OrderError::Conflict(_) => AppError::Conflict(e.to_string()),
            OrderError::Repo(e) => e.into(),
        }
    }
}

impl From<CartError> for AppError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::Repo(e) => e.into(),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl From<CouponServiceError> for AppError {
    fn from(e: CouponServiceError) -> Self {
        match e {
            CouponServiceError::Invalid(_) => AppError::Validation(e.to_string()),
            CouponServiceError::Duplicate(_) => AppError::Conflict(e.to_string()),
            CouponServiceError::Repo(e) => e.into(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
