//! Database models for identities.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::{IdentityId, Role};

/// Database entity model
#[derive(Debug, Clone, FromRow)]
pub struct Identity {
    pub id: IdentityId,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Identity {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Database request for creating a new identity
#[derive(Debug, Clone)]
pub struct IdentityCreateDBRequest {
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub role: Role,
}
