//! Password reset tokens.
//!
//! Reset tokens are independent of sessions: they are single use, expire after a bounded
//! duration, and are stored only as SHA-256 digests. Redeeming one replaces the credential
//! hash and revokes every session of the identity in the same store operation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument};

use crate::auth::token::{generate_token, hash_token};
use crate::config::PasswordResetConfig;
use crate::db::handlers::Store;
use crate::db::models::{identities::Identity, password_reset_tokens::PasswordResetTokenCreateRequest};
use crate::errors::{Error, Result};
use crate::types::{IdentityId, abbrev_uuid};

/// Delivers a freshly issued reset token to the identity it belongs to.
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn send_reset(&self, identity: &Identity, token: &str) -> Result<()>;
}

pub struct ResetTokens {
    store: Arc<dyn Store>,
    token_bytes: usize,
    token_duration: Duration,
}

impl ResetTokens {
    pub fn new(store: Arc<dyn Store>, config: &PasswordResetConfig) -> Self {
        Self {
            store,
            token_bytes: config.token_bytes,
            token_duration: config.token_duration,
        }
    }

    /// Issue a reset token for the active identity with this username.
    ///
    /// Returns `None` when no such identity exists. Callers facing the outside world must
    /// not let that difference show.
    #[instrument(skip_all, err)]
    pub async fn issue(&self, username: &str) -> Result<Option<(Identity, String)>> {
        let Some(identity) = self.store.get_identity_by_username(username).await? else {
            debug!("Reset requested for unknown username");
            return Ok(None);
        };

        let token = generate_token(self.token_bytes)?;
        let lifetime = chrono::Duration::from_std(self.token_duration).map_err(|e| Error::Internal {
            operation: format!("compute reset token expiry: {e}"),
        })?;

        self.store
            .create_reset_token(&PasswordResetTokenCreateRequest {
                identity_id: identity.id,
                token_hash: hash_token(&token),
                expires_at: Utc::now() + lifetime,
            })
            .await?;

        debug!(identity_id = %abbrev_uuid(&identity.id), "Issued reset token");
        Ok(Some((identity, token)))
    }

    /// Redeem a token, installing `password_hash` as the identity's new credential.
    #[instrument(skip_all, err)]
    pub async fn redeem(&self, token: &str, password_hash: &str) -> Result<IdentityId> {
        let identity_id = self
            .store
            .complete_password_reset(&hash_token(token), password_hash, Utc::now())
            .await?
            .ok_or(Error::InvalidOrExpiredToken)?;

        debug!(identity_id = %abbrev_uuid(&identity_id), "Reset token redeemed");
        Ok(identity_id)
    }
}
