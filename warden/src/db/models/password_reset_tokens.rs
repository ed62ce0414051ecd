//! Database models for password reset tokens.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::types::IdentityId;

/// Database entity model
#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetToken {
    pub id: Uuid,
    pub identity_id: IdentityId,
    pub token_hash: Vec<u8>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl PasswordResetToken {
    /// Unused and not yet expired.
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && self.expires_at > now
    }
}

/// Request for creating a password reset token
#[derive(Debug, Clone)]
pub struct PasswordResetTokenCreateRequest {
    pub identity_id: IdentityId,
    pub token_hash: Vec<u8>,
    pub expires_at: DateTime<Utc>,
}
