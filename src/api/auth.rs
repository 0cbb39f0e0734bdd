//! Bearer-token identity extractors.
//!
//! Tokens are HS256 JWTs carrying `{sub, role, exp}`. The user record is always re-read from
//! the record store so a deactivated account loses access immediately.

use axum::{extract::FromRequestParts, http::{header::AUTHORIZATION, request::Parts}};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppState;
use crate::domain::aggregates::User;
use crate::domain::value_objects::Role;
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims { pub sub: Uuid, pub role: Role, pub exp: usize }

pub fn issue_token(secret: &str, user: &User, ttl: Duration) -> Result<String, jsonwebtoken::errors::Error> {
    let exp = (Utc::now() + ttl).timestamp().max(0) as usize;
    encode(&Header::default(), &Claims { sub: user.id, role: user.role, exp }, &EncodingKey::from_secret(secret.as_bytes()))
}

fn bearer(parts: &Parts) -> Option<&str> {
    parts.headers.get(AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ").map(str::trim)
}

async fn resolve(token: &str, state: &AppState) -> Result<User, AppError> {
    let claims = decode::<Claims>(token, &DecodingKey::from_secret(state.jwt_secret.as_bytes()), &Validation::default())
        .map_err(|e| {
            tracing::warn!(error = %e, "rejected bearer token");
            AppError::Forbidden("invalid or expired token".into())
        })?
        .claims;
    let user = state.repos.store().user_by_id(claims.sub).await.map_err(|e| AppError::Internal(e.to_string()))?;
    match user {
        Some(user) if user.is_active => Ok(user),
        _ => Err(AppError::Forbidden("account is missing or disabled".into())),
    }
}

/// Authenticated, active user.
pub struct Identity(pub User);

/// Identity when a token is sent. A bad token is still rejected.
pub struct OptionalIdentity(pub Option<User>);

/// Authenticated user with the ADMIN role.
pub struct AdminIdentity(pub User);

#[axum::async_trait]
impl FromRequestParts<AppState> for OptionalIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer(parts) {
            Some(token) => Ok(OptionalIdentity(Some(resolve(token, state).await?))),
            None => Ok(OptionalIdentity(None)),
        }
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer(parts).ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;
        Ok(Identity(resolve(token, state).await?))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Identity(user) = Identity::from_request_parts(parts, state).await?;
        if !user.is_admin() { return Err(AppError::Forbidden("admin role required".into())); }
        Ok(AdminIdentity(user))
    }
}
