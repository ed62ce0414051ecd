//! Login, registration, logout and the password reset flow.
//!
//! [`AuthService`] ties the credential hasher, the session manager and the reset tokens
//! together behind the operations the HTTP layer exposes. Argon2 work always runs on the
//! blocking pool so it never stalls the async runtime or holds a store lock.

use std::sync::Arc;

use chrono::Utc;
use tracing::{Instrument, debug, info, instrument, warn};

use crate::auth::password::{self, Argon2Params};
use crate::auth::reset::{ResetNotifier, ResetTokens};
use crate::auth::session::{IssuedSession, SessionManager};
use crate::config::{AuthConfig, PasswordConfig};
use crate::db::handlers::Store;
use crate::db::models::identities::{Identity, IdentityCreateDBRequest};
use crate::errors::{Error, Result};
use crate::types::{IdentityId, Role, abbrev_uuid};

const MAX_USERNAME_LENGTH: usize = 64;

pub struct AuthService {
    store: Arc<dyn Store>,
    sessions: SessionManager,
    resets: ResetTokens,
    notifier: Option<Arc<dyn ResetNotifier>>,
    password: PasswordConfig,
    argon2: Argon2Params,
    allow_registration: bool,
    /// Verified against on unknown usernames so both login failures cost the same
    decoy_hash: String,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, config: &AuthConfig, notifier: Option<Arc<dyn ResetNotifier>>) -> Result<Self> {
        let argon2 = Argon2Params::from(&config.password);
        let decoy_hash = password::hash_password("decoy-password-never-matches", argon2)?;

        Ok(Self {
            sessions: SessionManager::new(store.clone(), &config.session),
            resets: ResetTokens::new(store.clone(), &config.password_reset),
            store,
            notifier,
            password: config.password.clone(),
            argon2,
            allow_registration: config.allow_registration,
            decoy_hash,
        })
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Register a `standard` identity.
    #[instrument(skip(self, email, plaintext), err)]
    pub async fn register(&self, username: &str, email: Option<String>, plaintext: &str) -> Result<Identity> {
        if !self.allow_registration {
            return Err(Error::BadRequest {
                message: "Registration is disabled".to_string(),
            });
        }

        let username = validate_username(username)?;
        password::check_policy(plaintext, &self.password)?;
        let password_hash = self.hash(plaintext).await?;

        let identity = self
            .store
            .create_identity(&IdentityCreateDBRequest {
                username: username.to_string(),
                email,
                password_hash,
                role: Role::Standard,
            })
            .await?;

        info!(identity_id = %abbrev_uuid(&identity.id), "Registered identity");
        Ok(identity)
    }

    /// Check credentials and issue a session, superseding the identity's previous one.
    ///
    /// Unknown usernames and wrong passwords fail identically.
    #[instrument(skip(self, plaintext), err)]
    pub async fn login(&self, username: &str, plaintext: &str) -> Result<(Identity, IssuedSession)> {
        let identity = self.store.get_identity_by_username(username).await?;

        let hash = identity
            .as_ref()
            .map_or_else(|| self.decoy_hash.clone(), |identity| identity.password_hash.clone());
        let matches = self.verify(plaintext, hash).await?;

        let identity = match identity {
            Some(identity) if matches => identity,
            _ => {
                return Err(Error::Unauthenticated {
                    message: Some("Invalid username or password".to_string()),
                });
            }
        };

        let session = self.sessions.create(identity.id).await?;
        Ok((identity, session))
    }

    /// Revoke the session behind `token`. Idempotent.
    pub async fn logout(&self, token: &str) -> Result<()> {
        self.sessions.revoke(token).await
    }

    /// Start a password reset for `username`.
    ///
    /// Always succeeds from the caller's point of view, whether or not the username exists
    /// and whether or not delivery worked, so the response cannot be used to enumerate
    /// accounts. Delivery runs in a background task and never delays the response.
    /// Failures are logged.
    #[instrument(skip(self), err)]
    pub async fn initiate_password_reset(&self, username: &str) -> Result<()> {
        let issued = match self.resets.issue(username).await {
            Ok(issued) => issued,
            Err(e) => {
                warn!("Failed to issue password reset token: {e:#}");
                return Ok(());
            }
        };

        if let Some((identity, token)) = issued {
            match self.notifier.clone() {
                Some(notifier) => {
                    tokio::spawn(
                        async move {
                            if let Err(e) = notifier.send_reset(&identity, &token).await {
                                warn!(identity_id = %abbrev_uuid(&identity.id), "Failed to deliver password reset: {e:#}");
                            }
                        }
                        .in_current_span(),
                    );
                }
                None => {
                    warn!(identity_id = %abbrev_uuid(&identity.id), "No reset delivery configured; token was issued but not sent")
                }
            }
        }

        Ok(())
    }

    /// Finish a password reset. Every session of the identity is revoked.
    #[instrument(skip_all, err)]
    pub async fn complete_password_reset(&self, token: &str, new_plaintext: &str) -> Result<IdentityId> {
        password::check_policy(new_plaintext, &self.password)?;
        let password_hash = self.hash(new_plaintext).await?;

        let identity_id = self.resets.redeem(token, &password_hash).await?;
        info!(identity_id = %abbrev_uuid(&identity_id), "Password reset completed");
        Ok(identity_id)
    }

    /// Create the admin identity, or refresh its password and role if it already exists.
    #[instrument(skip(self, plaintext), err)]
    pub async fn ensure_admin(&self, username: &str, plaintext: &str) -> Result<IdentityId> {
        let username = validate_username(username)?;
        let password_hash = self.hash(plaintext).await?;
        let now = Utc::now();

        if let Some(existing) = self.store.get_identity_by_username(username).await? {
            self.store.update_password_hash(existing.id, &password_hash, now).await?;
            self.sessions.revoke_all(existing.id).await?;
            if existing.role != Role::Admin {
                self.store.update_identity_role(existing.id, Role::Admin, now).await?;
            }
            return Ok(existing.id);
        }

        let identity = self
            .store
            .create_identity(&IdentityCreateDBRequest {
                username: username.to_string(),
                email: None,
                password_hash,
                role: Role::Admin,
            })
            .await?;
        Ok(identity.id)
    }

    /// Delete revoked or expired sessions and used or expired reset tokens.
    #[instrument(skip(self), err)]
    pub async fn prune_stale(&self) -> Result<(u64, u64)> {
        let now = Utc::now();
        let sessions = self.store.delete_stale_sessions(now).await?;
        let reset_tokens = self.store.delete_stale_reset_tokens(now).await?;
        if sessions + reset_tokens > 0 {
            debug!(sessions, reset_tokens, "Pruned stale credentials");
        }
        Ok((sessions, reset_tokens))
    }

    async fn hash(&self, plaintext: &str) -> Result<String> {
        let plaintext = plaintext.to_string();
        let params = self.argon2;
        tokio::task::spawn_blocking(move || password::hash_password(&plaintext, params))
            .await
            .map_err(|e| Error::Internal {
                operation: format!("spawn password hashing task: {e}"),
            })?
    }

    async fn verify(&self, plaintext: &str, hash: String) -> Result<bool> {
        let plaintext = plaintext.to_string();
        tokio::task::spawn_blocking(move || password::verify_password(&plaintext, &hash))
            .await
            .map_err(|e| Error::Internal {
                operation: format!("spawn password verification task: {e}"),
            })?
    }
}

fn validate_username(username: &str) -> Result<&str> {
    let username = username.trim();
    if username.is_empty() {
        return Err(Error::BadRequest {
            message: "Username must not be empty".to_string(),
        });
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(Error::BadRequest {
            message: format!("Username must be no more than {MAX_USERNAME_LENGTH} characters long"),
        });
    }
    Ok(username)
}
