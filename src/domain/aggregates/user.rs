//! User Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::Role;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    /// Never mirrored to the search index.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub address: Option<String>,
    pub role: Role,
    pub loyalty_points: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn customer(email: impl Into<String>, full_name: impl Into<String>, password_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(), email: email.into(), full_name: full_name.into(), password_hash: password_hash.into(),
            address: None, role: Role::Customer, loyalty_points: 0, is_active: true, created_at: now, updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool { self.role == Role::Admin }
}
