//! Opaque bearer sessions.
//!
//! A session token is 32 (configurable) random bytes, base64url encoded, handed to the
//! client once at login. The store only keeps its SHA-256 digest. An identity has at most
//! one session: issuing a new one deletes the previous one. Logged-out and expired sessions
//! are deleted by [`AuthService::prune_stale`](crate::auth::service::AuthService::prune_stale).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::auth::token::{generate_token, hash_token};
use crate::config::SessionConfig;
use crate::db::handlers::Store;
use crate::db::models::{identities::Identity, sessions::SessionCreateDBRequest};
use crate::errors::{Error, Result};
use crate::types::{IdentityId, abbrev_uuid};

/// A freshly created session. `token` is the only copy of the raw bearer token.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub identity_id: IdentityId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct SessionManager {
    store: Arc<dyn Store>,
    token_bytes: usize,
    timeout: Option<Duration>,
    /// Per-identity locks serializing supersession within this process
    locks: DashMap<IdentityId, Arc<Mutex<()>>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn Store>, config: &SessionConfig) -> Self {
        Self {
            store,
            token_bytes: config.token_bytes,
            timeout: config.timeout,
            locks: DashMap::new(),
        }
    }

    /// Issue a new session for the identity, superseding any previous one.
    #[instrument(skip(self), fields(identity_id = %abbrev_uuid(&identity_id)), err)]
    pub async fn create(&self, identity_id: IdentityId) -> Result<IssuedSession> {
        let token = generate_token(self.token_bytes)?;
        let lifetime = self
            .timeout
            .map(chrono::Duration::from_std)
            .transpose()
            .map_err(|e| Error::Internal {
                operation: format!("compute session expiry: {e}"),
            })?;

        let lock = self.locks.entry(identity_id).or_default().clone();
        let created = {
            let _guard = lock.lock().await;

            let issued_at = Utc::now();
            let request = SessionCreateDBRequest {
                identity_id,
                token_hash: hash_token(&token),
                expires_at: lifetime.map(|lifetime| issued_at + lifetime),
            };
            self.store.replace_session(&request, issued_at).await
        };

        // Drop the lock entry once nobody else is queued on it
        drop(lock);
        self.locks.remove_if(&identity_id, |_, lock| Arc::strong_count(lock) == 1);

        let session = created?;
        debug!("Issued session");
        Ok(IssuedSession {
            token,
            identity_id,
            issued_at: session.created_at,
            expires_at: session.expires_at,
        })
    }

    /// Resolve a bearer token to its identity.
    ///
    /// Unknown, revoked and expired tokens all yield `None`, as does a session whose
    /// identity has since been soft-deleted. The identity is read fresh so role changes
    /// apply immediately.
    #[instrument(skip_all, err)]
    pub async fn resolve(&self, token: &str) -> Result<Option<Identity>> {
        let token_hash = hash_token(token);
        let Some(session) = self.store.get_session_by_token_hash(&token_hash).await? else {
            return Ok(None);
        };
        if !session.is_active(Utc::now()) {
            return Ok(None);
        }

        Ok(self.store.get_identity(session.identity_id).await?)
    }

    /// Revoke the session behind a token. Revoking an unknown or already revoked token is not an error.
    #[instrument(skip_all, err)]
    pub async fn revoke(&self, token: &str) -> Result<()> {
        let revoked = self.store.revoke_session(&hash_token(token), Utc::now()).await?;
        debug!(revoked, "Session revocation");
        Ok(())
    }

    /// Revoke every session of an identity.
    #[instrument(skip(self), fields(identity_id = %abbrev_uuid(&identity_id)), err)]
    pub async fn revoke_all(&self, identity_id: IdentityId) -> Result<u64> {
        Ok(self.store.revoke_sessions_for_identity(identity_id, Utc::now()).await?)
    }
}
