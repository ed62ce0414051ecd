//! Store traits implemented by every persistence backend.
//!
//! The traits are object safe so the application can hold a single `Arc<dyn Store>`
//! built at startup and hand clones of it to every component that needs persistence.
//! Each method is a single atomic unit: backends must never let a concurrent caller
//! observe a half-applied multi-row change.
//!
//! All "active" reads skip soft-deleted rows (`deleted_at IS NULL`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::errors::Result;
use crate::db::models::{
    identities::{Identity, IdentityCreateDBRequest},
    password_reset_tokens::{PasswordResetToken, PasswordResetTokenCreateRequest},
    questions::{Answer, AnswerCreateDBRequest, Question, QuestionCreateDBRequest, QuestionFilter, QuestionUpdateDBRequest},
    sessions::{Session, SessionCreateDBRequest},
};
use crate::types::{AnswerId, IdentityId, QuestionId, Role};

#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// Create an identity.
    ///
    /// # Errors
    /// - `UniqueViolation` if an active identity already has the username or email
    async fn create_identity(&self, request: &IdentityCreateDBRequest) -> Result<Identity>;

    /// Get an active identity by id.
    async fn get_identity(&self, id: IdentityId) -> Result<Option<Identity>>;

    /// Get an active identity by its public lookup key.
    async fn get_identity_by_username(&self, username: &str) -> Result<Option<Identity>>;

    /// Change the role of an active identity.
    async fn update_identity_role(&self, id: IdentityId, role: Role, now: DateTime<Utc>) -> Result<Option<Identity>>;

    /// Replace the credential hash of an active identity.
    async fn update_password_hash(&self, id: IdentityId, password_hash: &str, now: DateTime<Utc>) -> Result<bool>;

    /// Soft-delete an identity and revoke all of its sessions in one step.
    async fn soft_delete_identity(&self, id: IdentityId, now: DateTime<Utc>) -> Result<bool>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Delete every existing session of the identity and insert the new one, atomically.
    ///
    /// After this returns, the inserted session is the only session row of the identity.
    async fn replace_session(&self, request: &SessionCreateDBRequest, now: DateTime<Utc>) -> Result<Session>;

    /// Look a session up by token digest, whatever its state.
    async fn get_session_by_token_hash(&self, token_hash: &[u8]) -> Result<Option<Session>>;

    /// Revoke the session with this digest. Returns false when there was nothing to revoke.
    async fn revoke_session(&self, token_hash: &[u8], now: DateTime<Utc>) -> Result<bool>;

    /// Revoke every unrevoked session of the identity, returning how many were revoked.
    async fn revoke_sessions_for_identity(&self, identity_id: IdentityId, now: DateTime<Utc>) -> Result<u64>;

    /// Delete revoked sessions and sessions expired at `now`, returning how many were removed.
    async fn delete_stale_sessions(&self, now: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait ResetTokenRepository: Send + Sync {
    async fn create_reset_token(&self, request: &PasswordResetTokenCreateRequest) -> Result<PasswordResetToken>;

    /// Redeem a reset token and apply the new credential hash.
    ///
    /// In one atomic step: marks the token used, replaces the identity's credential hash,
    /// revokes every session of the identity and invalidates its other outstanding reset
    /// tokens. Returns `None` (changing nothing) if the token is unknown, used, expired, or
    /// belongs to an identity that is no longer active.
    async fn complete_password_reset(
        &self,
        token_hash: &[u8],
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IdentityId>>;

    /// Delete used reset tokens and tokens expired at `now`, returning how many were removed.
    async fn delete_stale_reset_tokens(&self, now: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait QuestionRepository: Send + Sync {
    async fn create_question(&self, request: &QuestionCreateDBRequest, now: DateTime<Utc>) -> Result<Question>;

    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>>;

    async fn list_questions(&self, filter: &QuestionFilter) -> Result<Vec<Question>>;

    async fn update_question(&self, id: QuestionId, request: &QuestionUpdateDBRequest, now: DateTime<Utc>) -> Result<Option<Question>>;

    async fn delete_question(&self, id: QuestionId, now: DateTime<Utc>) -> Result<bool>;

    /// Mark a question as promoted. Promoting twice keeps the first promotion time.
    async fn promote_question(&self, id: QuestionId, now: DateTime<Utc>) -> Result<Option<Question>>;
}

#[async_trait]
pub trait AnswerRepository: Send + Sync {
    async fn create_answer(&self, request: &AnswerCreateDBRequest, now: DateTime<Utc>) -> Result<Answer>;

    async fn get_answer(&self, id: AnswerId) -> Result<Option<Answer>>;

    /// Active answers of a question, oldest first.
    async fn list_answers(&self, question_id: QuestionId) -> Result<Vec<Answer>>;

    async fn update_answer(&self, id: AnswerId, body: &str, now: DateTime<Utc>) -> Result<Option<Answer>>;

    async fn delete_answer(&self, id: AnswerId, now: DateTime<Utc>) -> Result<bool>;
}

/// Everything the service persists, behind one handle.
pub trait Store: IdentityRepository + SessionRepository + ResetTokenRepository + QuestionRepository + AnswerRepository {}

impl<T> Store for T where T: IdentityRepository + SessionRepository + ResetTokenRepository + QuestionRepository + AnswerRepository {}
