//! In-memory store.
//!
//! All tables live behind a single `RwLock`, so every trait method runs as one critical
//! section and multi-row changes are atomic. Suitable for tests and single-process
//! development; everything is lost on restart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::instrument;
use uuid::Uuid;

use crate::db::errors::{DbError, Result};
use crate::db::handlers::repository::{AnswerRepository, IdentityRepository, QuestionRepository, ResetTokenRepository, SessionRepository};
use crate::db::models::{
    identities::{Identity, IdentityCreateDBRequest},
    password_reset_tokens::{PasswordResetToken, PasswordResetTokenCreateRequest},
    questions::{Answer, AnswerCreateDBRequest, Question, QuestionCreateDBRequest, QuestionFilter, QuestionUpdateDBRequest},
    sessions::{Session, SessionCreateDBRequest},
};
use crate::types::{AnswerId, IdentityId, QuestionId, Role, abbrev_uuid};

#[derive(Default)]
struct Tables {
    identities: HashMap<IdentityId, Identity>,
    /// Keyed by token digest
    sessions: HashMap<Vec<u8>, Session>,
    /// Keyed by token digest
    reset_tokens: HashMap<Vec<u8>, PasswordResetToken>,
    questions: HashMap<QuestionId, Question>,
    answers: HashMap<AnswerId, Answer>,
}

impl Tables {
    fn active_identity_mut(&mut self, id: IdentityId) -> Option<&mut Identity> {
        self.identities.get_mut(&id).filter(|identity| identity.is_active())
    }

    fn revoke_sessions(&mut self, identity_id: IdentityId, now: DateTime<Utc>) -> u64 {
        let mut revoked = 0;
        for session in self.sessions.values_mut() {
            if session.identity_id == identity_id && session.revoked_at.is_none() {
                session.revoked_at = Some(now);
                revoked += 1;
            }
        }
        revoked
    }
}

fn unique_violation(constraint: &str) -> DbError {
    DbError::UniqueViolation {
        constraint: Some(constraint.to_string()),
        table: Some("identities".to_string()),
        message: format!("duplicate key value violates unique constraint \"{constraint}\""),
    }
}

/// In-memory implementation of [`crate::db::handlers::Store`].
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of session rows and reset token rows currently held, whatever their state.
    #[cfg(test)]
    pub(crate) fn row_counts(&self) -> (usize, usize) {
        let tables = self.tables.read();
        (tables.sessions.len(), tables.reset_tokens.len())
    }
}

#[async_trait]
impl IdentityRepository for InMemoryStore {
    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create_identity(&self, request: &IdentityCreateDBRequest) -> Result<Identity> {
        let mut tables = self.tables.write();

        for existing in tables.identities.values().filter(|identity| identity.is_active()) {
            if existing.username == request.username {
                return Err(unique_violation("identities_username_active_idx"));
            }
            if request.email.is_some() && existing.email == request.email {
                return Err(unique_violation("identities_email_active_idx"));
            }
        }

        let now = Utc::now();
        let identity = Identity {
            id: Uuid::new_v4(),
            username: request.username.clone(),
            email: request.email.clone(),
            password_hash: request.password_hash.clone(),
            role: request.role,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        tables.identities.insert(identity.id, identity.clone());
        Ok(identity)
    }

    #[instrument(skip(self), fields(identity_id = %abbrev_uuid(&id)), err)]
    async fn get_identity(&self, id: IdentityId) -> Result<Option<Identity>> {
        let tables = self.tables.read();
        Ok(tables.identities.get(&id).filter(|identity| identity.is_active()).cloned())
    }

    #[instrument(skip(self), err)]
    async fn get_identity_by_username(&self, username: &str) -> Result<Option<Identity>> {
        let tables = self.tables.read();
        Ok(tables
            .identities
            .values()
            .find(|identity| identity.is_active() && identity.username == username)
            .cloned())
    }

    #[instrument(skip(self), fields(identity_id = %abbrev_uuid(&id)), err)]
    async fn update_identity_role(&self, id: IdentityId, role: Role, now: DateTime<Utc>) -> Result<Option<Identity>> {
        let mut tables = self.tables.write();
        Ok(tables.active_identity_mut(id).map(|identity| {
            identity.role = role;
            identity.updated_at = now;
            identity.clone()
        }))
    }

    #[instrument(skip(self, password_hash), fields(identity_id = %abbrev_uuid(&id)), err)]
    async fn update_password_hash(&self, id: IdentityId, password_hash: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.tables.write();
        Ok(tables
            .active_identity_mut(id)
            .map(|identity| {
                identity.password_hash = password_hash.to_string();
                identity.updated_at = now;
            })
            .is_some())
    }

    #[instrument(skip(self), fields(identity_id = %abbrev_uuid(&id)), err)]
    async fn soft_delete_identity(&self, id: IdentityId, now: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.tables.write();
        let Some(identity) = tables.active_identity_mut(id) else {
            return Ok(false);
        };
        identity.deleted_at = Some(now);
        identity.updated_at = now;
        tables.revoke_sessions(id, now);
        Ok(true)
    }
}

#[async_trait]
impl SessionRepository for InMemoryStore {
    #[instrument(skip(self, request), fields(identity_id = %abbrev_uuid(&request.identity_id)), err)]
    async fn replace_session(&self, request: &SessionCreateDBRequest, now: DateTime<Utc>) -> Result<Session> {
        let mut tables = self.tables.write();

        if tables.sessions.contains_key(&request.token_hash) {
            return Err(DbError::UniqueViolation {
                constraint: Some("sessions_token_hash_key".to_string()),
                table: Some("sessions".to_string()),
                message: "duplicate session token".to_string(),
            });
        }

        tables.sessions.retain(|_, session| session.identity_id != request.identity_id);

        let session = Session {
            id: Uuid::new_v4(),
            identity_id: request.identity_id,
            token_hash: request.token_hash.clone(),
            created_at: now,
            expires_at: request.expires_at,
            revoked_at: None,
        };
        tables.sessions.insert(session.token_hash.clone(), session.clone());
        Ok(session)
    }

    #[instrument(skip_all, err)]
    async fn get_session_by_token_hash(&self, token_hash: &[u8]) -> Result<Option<Session>> {
        let tables = self.tables.read();
        Ok(tables.sessions.get(token_hash).cloned())
    }

    #[instrument(skip_all, err)]
    async fn revoke_session(&self, token_hash: &[u8], now: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.tables.write();
        Ok(tables
            .sessions
            .get_mut(token_hash)
            .filter(|session| session.revoked_at.is_none())
            .map(|session| session.revoked_at = Some(now))
            .is_some())
    }

    #[instrument(skip(self), fields(identity_id = %abbrev_uuid(&identity_id)), err)]
    async fn revoke_sessions_for_identity(&self, identity_id: IdentityId, now: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.write();
        Ok(tables.revoke_sessions(identity_id, now))
    }

    #[instrument(skip(self), err)]
    async fn delete_stale_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.write();
        let before = tables.sessions.len();
        tables.sessions.retain(|_, session| session.is_active(now));
        Ok((before - tables.sessions.len()) as u64)
    }
}

#[async_trait]
impl ResetTokenRepository for InMemoryStore {
    #[instrument(skip(self, request), fields(identity_id = %abbrev_uuid(&request.identity_id)), err)]
    async fn create_reset_token(&self, request: &PasswordResetTokenCreateRequest) -> Result<PasswordResetToken> {
        let mut tables = self.tables.write();
        let token = PasswordResetToken {
            id: Uuid::new_v4(),
            identity_id: request.identity_id,
            token_hash: request.token_hash.clone(),
            expires_at: request.expires_at,
            created_at: Utc::now(),
            used_at: None,
        };
        tables.reset_tokens.insert(token.token_hash.clone(), token.clone());
        Ok(token)
    }

    #[instrument(skip_all, err)]
    async fn complete_password_reset(
        &self,
        token_hash: &[u8],
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IdentityId>> {
        let mut tables = self.tables.write();

        let Some(identity_id) = tables
            .reset_tokens
            .get(token_hash)
            .filter(|token| token.is_redeemable(now))
            .map(|token| token.identity_id)
        else {
            return Ok(None);
        };

        let Some(identity) = tables.active_identity_mut(identity_id) else {
            return Ok(None);
        };
        identity.password_hash = password_hash.to_string();
        identity.updated_at = now;

        // The redeemed token and every other outstanding token of the identity
        for token in tables.reset_tokens.values_mut() {
            if token.identity_id == identity_id && token.used_at.is_none() {
                token.used_at = Some(now);
            }
        }
        tables.revoke_sessions(identity_id, now);

        Ok(Some(identity_id))
    }

    #[instrument(skip(self), err)]
    async fn delete_stale_reset_tokens(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.write();
        let before = tables.reset_tokens.len();
        tables.reset_tokens.retain(|_, token| token.is_redeemable(now));
        Ok((before - tables.reset_tokens.len()) as u64)
    }
}

#[async_trait]
impl QuestionRepository for InMemoryStore {
    #[instrument(skip(self, request), fields(owner_id = %abbrev_uuid(&request.owner_id)), err)]
    async fn create_question(&self, request: &QuestionCreateDBRequest, now: DateTime<Utc>) -> Result<Question> {
        let mut tables = self.tables.write();
        let question = Question {
            id: Uuid::new_v4(),
            owner_id: request.owner_id,
            title: request.title.clone(),
            body: request.body.clone(),
            promoted_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        tables.questions.insert(question.id, question.clone());
        Ok(question)
    }

    #[instrument(skip(self), fields(question_id = %abbrev_uuid(&id)), err)]
    async fn get_question(&self, id: QuestionId) -> Result<Option<Question>> {
        let tables = self.tables.read();
        Ok(tables.questions.get(&id).filter(|q| q.deleted_at.is_none()).cloned())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list_questions(&self, filter: &QuestionFilter) -> Result<Vec<Question>> {
        let tables = self.tables.read();
        let mut questions: Vec<Question> = tables
            .questions
            .values()
            .filter(|q| q.deleted_at.is_none())
            .filter(|q| filter.owner_id.is_none_or(|owner_id| q.owner_id == owner_id))
            .cloned()
            .collect();

        questions.sort_by(|a, b| {
            b.promoted_at
                .is_some()
                .cmp(&a.promoted_at.is_some())
                .then_with(|| b.created_at.cmp(&a.created_at))
        });

        Ok(questions
            .into_iter()
            .skip(filter.skip.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }

    #[instrument(skip(self, request), fields(question_id = %abbrev_uuid(&id)), err)]
    async fn update_question(&self, id: QuestionId, request: &QuestionUpdateDBRequest, now: DateTime<Utc>) -> Result<Option<Question>> {
        let mut tables = self.tables.write();
        Ok(tables.questions.get_mut(&id).filter(|q| q.deleted_at.is_none()).map(|question| {
            if let Some(title) = &request.title {
                question.title = title.clone();
            }
            if let Some(body) = &request.body {
                question.body = body.clone();
            }
            question.updated_at = now;
            question.clone()
        }))
    }

    #[instrument(skip(self), fields(question_id = %abbrev_uuid(&id)), err)]
    async fn delete_question(&self, id: QuestionId, now: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.tables.write();
        Ok(tables
            .questions
            .get_mut(&id)
            .filter(|q| q.deleted_at.is_none())
            .map(|question| question.deleted_at = Some(now))
            .is_some())
    }

    #[instrument(skip(self), fields(question_id = %abbrev_uuid(&id)), err)]
    async fn promote_question(&self, id: QuestionId, now: DateTime<Utc>) -> Result<Option<Question>> {
        let mut tables = self.tables.write();
        Ok(tables.questions.get_mut(&id).filter(|q| q.deleted_at.is_none()).map(|question| {
            question.promoted_at.get_or_insert(now);
            question.updated_at = now;
            question.clone()
        }))
    }
}

#[async_trait]
impl AnswerRepository for InMemoryStore {
    #[instrument(skip(self, request), fields(question_id = %abbrev_uuid(&request.question_id)), err)]
    async fn create_answer(&self, request: &AnswerCreateDBRequest, now: DateTime<Utc>) -> Result<Answer> {
        let mut tables = self.tables.write();
        if !tables.questions.get(&request.question_id).is_some_and(|q| q.deleted_at.is_none()) {
            return Err(DbError::ForeignKeyViolation {
                constraint: Some("answers_question_id_fkey".to_string()),
                table: Some("answers".to_string()),
                message: "question does not exist".to_string(),
            });
        }

        let answer = Answer {
            id: Uuid::new_v4(),
            question_id: request.question_id,
            owner_id: request.owner_id,
            body: request.body.clone(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        tables.answers.insert(answer.id, answer.clone());
        Ok(answer)
    }

    #[instrument(skip(self), fields(answer_id = %abbrev_uuid(&id)), err)]
    async fn get_answer(&self, id: AnswerId) -> Result<Option<Answer>> {
        let tables = self.tables.read();
        Ok(tables.answers.get(&id).filter(|a| a.deleted_at.is_none()).cloned())
    }

    #[instrument(skip(self), fields(question_id = %abbrev_uuid(&question_id)), err)]
    async fn list_answers(&self, question_id: QuestionId) -> Result<Vec<Answer>> {
        let tables = self.tables.read();
        let mut answers: Vec<Answer> = tables
            .answers
            .values()
            .filter(|a| a.question_id == question_id && a.deleted_at.is_none())
            .cloned()
            .collect();
        answers.sort_by_key(|a| a.created_at);
        Ok(answers)
    }

    #[instrument(skip(self, body), fields(answer_id = %abbrev_uuid(&id)), err)]
    async fn update_answer(&self, id: AnswerId, body: &str, now: DateTime<Utc>) -> Result<Option<Answer>> {
        let mut tables = self.tables.write();
        Ok(tables.answers.get_mut(&id).filter(|a| a.deleted_at.is_none()).map(|answer| {
            answer.body = body.to_string();
            answer.updated_at = now;
            answer.clone()
        }))
    }

    #[instrument(skip(self), fields(answer_id = %abbrev_uuid(&id)), err)]
    async fn delete_answer(&self, id: AnswerId, now: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.tables.write();
        Ok(tables
            .answers
            .get_mut(&id)
            .filter(|a| a.deleted_at.is_none())
            .map(|answer| answer.deleted_at = Some(now))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn identity_request(username: &str) -> IdentityCreateDBRequest {
        IdentityCreateDBRequest {
            username: username.to_string(),
            email: None,
            password_hash: "$argon2id$placeholder".to_string(),
            role: Role::Standard,
        }
    }

    #[tokio::test]
    async fn test_username_unique_among_active_identities() {
        let store = InMemoryStore::new();
        let alice = store.create_identity(&identity_request("alice")).await.unwrap();

        let err = store.create_identity(&identity_request("alice")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        // Freed up once the holder is soft-deleted
        assert!(store.soft_delete_identity(alice.id, Utc::now()).await.unwrap());
        assert!(store.get_identity(alice.id).await.unwrap().is_none());
        store.create_identity(&identity_request("alice")).await.unwrap();
    }

    #[tokio::test]
    async fn test_replace_session_deletes_previous() {
        let store = InMemoryStore::new();
        let alice = store.create_identity(&identity_request("alice")).await.unwrap();
        let now = Utc::now();

        let first = store
            .replace_session(
                &SessionCreateDBRequest {
                    identity_id: alice.id,
                    token_hash: vec![1; 32],
                    expires_at: None,
                },
                now,
            )
            .await
            .unwrap();
        store
            .replace_session(
                &SessionCreateDBRequest {
                    identity_id: alice.id,
                    token_hash: vec![2; 32],
                    expires_at: None,
                },
                now,
            )
            .await
            .unwrap();

        assert!(store.get_session_by_token_hash(&first.token_hash).await.unwrap().is_none());
        let second = store.get_session_by_token_hash(&[2; 32]).await.unwrap().unwrap();
        assert!(second.is_active(now));
        assert_eq!(store.row_counts().0, 1);
    }

    #[tokio::test]
    async fn test_delete_stale_sessions_removes_revoked_and_expired() {
        let store = InMemoryStore::new();
        let alice = store.create_identity(&identity_request("alice")).await.unwrap();
        let bob = store.create_identity(&identity_request("bob")).await.unwrap();
        let carol = store.create_identity(&identity_request("carol")).await.unwrap();
        let now = Utc::now();

        for (identity, token, expires_at) in [
            (alice.id, 1u8, None),
            (bob.id, 2, Some(now - Duration::seconds(1))),
            (carol.id, 3, Some(now + Duration::minutes(5))),
        ] {
            store
                .replace_session(
                    &SessionCreateDBRequest {
                        identity_id: identity,
                        token_hash: vec![token; 32],
                        expires_at,
                    },
                    now,
                )
                .await
                .unwrap();
        }
        assert!(store.revoke_session(&[1; 32], now).await.unwrap());

        assert_eq!(store.delete_stale_sessions(now).await.unwrap(), 2);
        assert_eq!(store.row_counts().0, 1);
        assert!(store.get_session_by_token_hash(&[1; 32]).await.unwrap().is_none());
        assert!(store.get_session_by_token_hash(&[2; 32]).await.unwrap().is_none());
        assert!(store.get_session_by_token_hash(&[3; 32]).await.unwrap().is_some());

        assert_eq!(store.delete_stale_sessions(now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_stale_reset_tokens_removes_used_and_expired() {
        let store = InMemoryStore::new();
        let alice = store.create_identity(&identity_request("alice")).await.unwrap();
        let bob = store.create_identity(&identity_request("bob")).await.unwrap();
        let now = Utc::now();

        for (identity, token, expires_at) in [
            (alice.id, 1u8, now + Duration::minutes(30)),
            (bob.id, 2, now - Duration::seconds(1)),
            (bob.id, 3, now + Duration::minutes(30)),
        ] {
            store
                .create_reset_token(&PasswordResetTokenCreateRequest {
                    identity_id: identity,
                    token_hash: vec![token; 32],
                    expires_at,
                })
                .await
                .unwrap();
        }
        store.complete_password_reset(&[1; 32], "new-hash", now).await.unwrap();

        assert_eq!(store.delete_stale_reset_tokens(now).await.unwrap(), 2);
        assert_eq!(store.row_counts().1, 1);
        assert_eq!(store.complete_password_reset(&[3; 32], "bob-hash", now).await.unwrap(), Some(bob.id));
    }

    #[tokio::test]
    async fn test_complete_password_reset_is_single_use() {
        let store = InMemoryStore::new();
        let alice = store.create_identity(&identity_request("alice")).await.unwrap();
        let now = Utc::now();

        store
            .create_reset_token(&PasswordResetTokenCreateRequest {
                identity_id: alice.id,
                token_hash: vec![7; 32],
                expires_at: now + Duration::minutes(30),
            })
            .await
            .unwrap();

        let redeemed = store.complete_password_reset(&[7; 32], "new-hash", now).await.unwrap();
        assert_eq!(redeemed, Some(alice.id));
        assert_eq!(store.get_identity(alice.id).await.unwrap().unwrap().password_hash, "new-hash");

        assert_eq!(store.complete_password_reset(&[7; 32], "other-hash", now).await.unwrap(), None);
        assert_eq!(store.get_identity(alice.id).await.unwrap().unwrap().password_hash, "new-hash");
    }

    #[tokio::test]
    async fn test_expired_reset_token_is_not_redeemable() {
        let store = InMemoryStore::new();
        let alice = store.create_identity(&identity_request("alice")).await.unwrap();
        let now = Utc::now();

        store
            .create_reset_token(&PasswordResetTokenCreateRequest {
                identity_id: alice.id,
                token_hash: vec![9; 32],
                expires_at: now - Duration::seconds(1),
            })
            .await
            .unwrap();

        assert_eq!(store.complete_password_reset(&[9; 32], "new-hash", now).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_questions_list_promoted_first_then_newest() {
        let store = InMemoryStore::new();
        let owner = Uuid::new_v4();
        let t0 = Utc::now();

        let mut ids = Vec::new();
        for (i, title) in ["old", "middle", "new"].iter().enumerate() {
            let q = store
                .create_question(
                    &QuestionCreateDBRequest {
                        owner_id: owner,
                        title: title.to_string(),
                        body: String::new(),
                    },
                    t0 + Duration::seconds(i as i64),
                )
                .await
                .unwrap();
            ids.push(q.id);
        }
        store.promote_question(ids[0], t0).await.unwrap();

        let filter = QuestionFilter {
            owner_id: None,
            skip: 0,
            limit: 10,
        };
        let titles: Vec<String> = store.list_questions(&filter).await.unwrap().into_iter().map(|q| q.title).collect();
        assert_eq!(titles, vec!["old", "new", "middle"]);
    }

    #[tokio::test]
    async fn test_answer_requires_active_question() {
        let store = InMemoryStore::new();
        let err = store
            .create_answer(
                &AnswerCreateDBRequest {
                    question_id: Uuid::new_v4(),
                    owner_id: Uuid::new_v4(),
                    body: "hi".to_string(),
                },
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }
}
