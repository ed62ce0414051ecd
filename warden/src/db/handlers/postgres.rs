//! PostgreSQL store.
//!
//! Queries are checked at runtime (`sqlx::query_as`) so the crate builds without a live
//! database. Multi-row operations run inside a single transaction; one active session
//! per identity is additionally enforced by a partial unique index.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::db::errors::Result;
use crate::db::handlers::repository::{AnswerRepository, IdentityRepository, QuestionRepository, ResetTokenRepository, SessionRepository};
use crate::db::models::{
    identities::{Identity, IdentityCreateDBRequest},
    password_reset_tokens::{PasswordResetToken, PasswordResetTokenCreateRequest},
    questions::{Answer, AnswerCreateDBRequest, Question, QuestionCreateDBRequest, QuestionFilter, QuestionUpdateDBRequest},
    sessions::{Session, SessionCreateDBRequest},
};
use crate::types::{AnswerId, IdentityId, QuestionId, Role, abbrev_uuid};

const IDENTITY_COLUMNS: &str = "id, username, email, password_hash, role, created_at, updated_at, deleted_at";
const SESSION_COLUMNS: &str = "id, identity_id, token_hash, created_at, expires_at, revoked_at";
const QUESTION_COLUMNS: &str = "id, owner_id, title, body, promoted_at, created_at, updated_at, deleted_at";
const ANSWER_COLUMNS: &str = "id, question_id, owner_id, body, created_at, updated_at, deleted_at";

/// PostgreSQL implementation of [`crate::db::handlers::Store`].
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl IdentityRepository for PostgresStore {
    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create_identity(&self, request: &IdentityCreateDBRequest) -> Result<Identity> {
        let identity = sqlx::query_as::<_, Identity>(&format!(
            "INSERT INTO identities (id, username, email, password_hash, role)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {IDENTITY_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&request.username)
        .bind(&request.email)
        .bind(&request.password_hash)
        .bind(request.role)
        .fetch_one(&self.pool)
        .await?;

        Ok(identity)
    }

    #[instrument(skip(self), fields(identity_id = %abbrev_uuid(&id)), err)]
    async fn get_identity(&self, id: IdentityId) -> Result<Option<Identity>> {
        let identity = sqlx::query_as::<_, Identity>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(identity)
    }

    #[instrument(skip(self), err)]
    async fn get_identity_by_username(&self, username: &str) -> Result<Option<Identity>> {
        let identity = sqlx::query_as::<_, Identity>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities WHERE username = $1 AND deleted_at IS NULL"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(identity)
    }

    #[instrument(skip(self), fields(identity_id = %abbrev_uuid(&id)), err)]
    async fn update_identity_role(&self, id: IdentityId, role: Role, now: DateTime<Utc>) -> Result<Option<Identity>> {
        let identity = sqlx::query_as::<_, Identity>(&format!(
            "UPDATE identities SET role = $2, updated_at = $3
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {IDENTITY_COLUMNS}"
        ))
        .bind(id)
        .bind(role)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(identity)
    }

    #[instrument(skip(self, password_hash), fields(identity_id = %abbrev_uuid(&id)), err)]
    async fn update_password_hash(&self, id: IdentityId, password_hash: &str, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE identities SET password_hash = $2, updated_at = $3 WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .bind(password_hash)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(identity_id = %abbrev_uuid(&id)), err)]
    async fn soft_delete_identity(&self, id: IdentityId, now: DateTime<Utc>) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE identities SET deleted_at = $2, updated_at = $2 WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("UPDATE sessions SET revoked_at = $2 WHERE identity_id = $1 AND revoked_at IS NULL")
            .bind(id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}

#[async_trait]
impl SessionRepository for PostgresStore {
    #[instrument(skip(self, request), fields(identity_id = %abbrev_uuid(&request.identity_id)), err)]
    async fn replace_session(&self, request: &SessionCreateDBRequest, now: DateTime<Utc>) -> Result<Session> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the identity serializes supersession across service instances
        sqlx::query("SELECT id FROM identities WHERE id = $1 FOR UPDATE")
            .bind(request.identity_id)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM sessions WHERE identity_id = $1")
            .bind(request.identity_id)
            .execute(&mut *tx)
            .await?;

        let session = sqlx::query_as::<_, Session>(&format!(
            "INSERT INTO sessions (id, identity_id, token_hash, created_at, expires_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(request.identity_id)
        .bind(&request.token_hash)
        .bind(now)
        .bind(request.expires_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(session)
    }

    #[instrument(skip_all, err)]
    async fn get_session_by_token_hash(&self, token_hash: &[u8]) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(&format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE token_hash = $1"))
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;

        Ok(session)
    }

    #[instrument(skip_all, err)]
    async fn revoke_session(&self, token_hash: &[u8], now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE sessions SET revoked_at = $2 WHERE token_hash = $1 AND revoked_at IS NULL")
            .bind(token_hash)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(identity_id = %abbrev_uuid(&identity_id)), err)]
    async fn revoke_sessions_for_identity(&self, identity_id: IdentityId, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("UPDATE sessions SET revoked_at = $2 WHERE identity_id = $1 AND revoked_at IS NULL")
            .bind(identity_id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self), err)]
    async fn delete_stale_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE revoked_at IS NOT NULL OR expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ResetTokenRepository for PostgresStore {
    #[instrument(skip(self, request), fields(identity_id = %abbrev_uuid(&request.identity_id)), err)]
    async fn create_reset_token(&self, request: &PasswordResetTokenCreateRequest) -> Result<PasswordResetToken> {
        let token = sqlx::query_as::<_, PasswordResetToken>(
            "INSERT INTO password_reset_tokens (id, identity_id, token_hash, expires_at)
             VALUES ($1, $2, $3, $4)
             RETURNING id, identity_id, token_hash, expires_at, created_at, used_at",
        )
        .bind(Uuid::new_v4())
        .bind(request.identity_id)
        .bind(&request.token_hash)
        .bind(request.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(token)
    }

    #[instrument(skip_all, err)]
    async fn complete_password_reset(
        &self,
        token_hash: &[u8],
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IdentityId>> {
        let mut tx = self.pool.begin().await?;

        // Conditional update: of two concurrent redemptions only one sees used_at IS NULL
        let identity_id: Option<IdentityId> = sqlx::query_scalar(
            "UPDATE password_reset_tokens SET used_at = $2
             WHERE token_hash = $1 AND used_at IS NULL AND expires_at > $2
             RETURNING identity_id",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(identity_id) = identity_id else {
            return Ok(None);
        };

        let updated = sqlx::query("UPDATE identities SET password_hash = $2, updated_at = $3 WHERE id = $1 AND deleted_at IS NULL")
            .bind(identity_id)
            .bind(password_hash)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            // Dropping the transaction rolls the token back to unused
            return Ok(None);
        }

        sqlx::query("UPDATE password_reset_tokens SET used_at = $2 WHERE identity_id = $1 AND used_at IS NULL")
            .bind(identity_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE sessions SET revoked_at = $2 WHERE identity_id = $1 AND revoked_at IS NULL")
            .bind(identity_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(identity_id))
    }

    #[instrument(skip(self), err)]
    async fn delete_stale_reset_tokens(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE used_at IS NOT NULL OR expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl QuestionRepository for PostgresStore {
    #[instrument(skip(self, request), fields(owner_id = %abbrev_uuid(&request.owner_id)), err)]
    async fn create_question(&self, request: &QuestionCreateDBRequest, now: DateTime<Utc>) -> Result<Question> {
        let question = sqlx::query_as::<_, Question>(&format!(
            "INSERT INTO questions (id, owner_id, title, body, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $5)
             RETURNING {QUESTION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(request.owner_id)
        .bind(&request.title)
        .bind(&request.body)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(question)
    }

    #[instrument(skip(self), fields(question_id = %abbrev_uuid(&id)), err)]
    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>> {
        let question = sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(question)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list_questions(&self, filter: &QuestionFilter) -> Result<Vec<Question>> {
        let questions = sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions
             WHERE deleted_at IS NULL AND ($1::uuid IS NULL OR owner_id = $1)
             ORDER BY (promoted_at IS NOT NULL) DESC, created_at DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(filter.owner_id)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&self.pool)
        .await?;

        Ok(questions)
    }

    #[instrument(skip(self, request), fields(question_id = %abbrev_uuid(&id)), err)]
    async fn update_question(&self, id: QuestionId, request: &QuestionUpdateDBRequest, now: DateTime<Utc>) -> Result<Option<Question>> {
        let question = sqlx::query_as::<_, Question>(&format!(
            "UPDATE questions
             SET title = COALESCE($2, title), body = COALESCE($3, body), updated_at = $4
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {QUESTION_COLUMNS}"
        ))
        .bind(id)
        .bind(&request.title)
        .bind(&request.body)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(question)
    }

    #[instrument(skip(self), fields(question_id = %abbrev_uuid(&id)), err)]
    async fn delete_question(&self, id: QuestionId, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE questions SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(question_id = %abbrev_uuid(&id)), err)]
    async fn promote_question(&self, id: QuestionId, now: DateTime<Utc>) -> Result<Option<Question>> {
        let question = sqlx::query_as::<_, Question>(&format!(
            "UPDATE questions
             SET promoted_at = COALESCE(promoted_at, $2), updated_at = $2
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {QUESTION_COLUMNS}"
        ))
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(question)
    }
}

#[async_trait]
impl AnswerRepository for PostgresStore {
    #[instrument(skip(self, request), fields(question_id = %abbrev_uuid(&request.question_id)), err)]
    async fn create_answer(&self, request: &AnswerCreateDBRequest, now: DateTime<Utc>) -> Result<Answer> {
        let answer = sqlx::query_as::<_, Answer>(&format!(
            "INSERT INTO answers (id, question_id, owner_id, body, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $5)
             RETURNING {ANSWER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(request.question_id)
        .bind(request.owner_id)
        .bind(&request.body)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(answer)
    }

    #[instrument(skip(self), fields(answer_id = %abbrev_uuid(&id)), err)]
    async fn get_answer(&self, id: AnswerId) -> Result<Option<Answer>> {
        let answer = sqlx::query_as::<_, Answer>(&format!("SELECT {ANSWER_COLUMNS} FROM answers WHERE id = $1 AND deleted_at IS NULL"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(answer)
    }

    #[instrument(skip(self), fields(question_id = %abbrev_uuid(&question_id)), err)]
    async fn list_answers(&self, question_id: QuestionId) -> Result<Vec<Answer>> {
        let answers = sqlx::query_as::<_, Answer>(&format!(
            "SELECT {ANSWER_COLUMNS} FROM answers
             WHERE question_id = $1 AND deleted_at IS NULL
             ORDER BY created_at ASC"
        ))
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(answers)
    }

    #[instrument(skip(self, body), fields(answer_id = %abbrev_uuid(&id)), err)]
    async fn update_answer(&self, id: AnswerId, body: &str, now: DateTime<Utc>) -> Result<Option<Answer>> {
        let answer = sqlx::query_as::<_, Answer>(&format!(
            "UPDATE answers SET body = $2, updated_at = $3
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {ANSWER_COLUMNS}"
        ))
        .bind(id)
        .bind(body)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(answer)
    }

    #[instrument(skip(self), fields(answer_id = %abbrev_uuid(&id)), err)]
    async fn delete_answer(&self, id: AnswerId, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE answers SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
