//! Database models for questions and answers.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::{AnswerId, IdentityId, QuestionId};

/// Database entity model
#[derive(Debug, Clone, FromRow)]
pub struct Question {
    pub id: QuestionId,
    pub owner_id: IdentityId,
    pub title: String,
    pub body: String,
    pub promoted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct QuestionCreateDBRequest {
    pub owner_id: IdentityId,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Default)]
pub struct QuestionUpdateDBRequest {
    pub title: Option<String>,
    pub body: Option<String>,
}

/// Filter for listing questions. Results are ordered promoted first, then newest first.
#[derive(Debug, Clone)]
pub struct QuestionFilter {
    pub owner_id: Option<IdentityId>,
    pub skip: i64,
    pub limit: i64,
}

/// Database entity model
#[derive(Debug, Clone, FromRow)]
pub struct Answer {
    pub id: AnswerId,
    pub question_id: QuestionId,
    pub owner_id: IdentityId,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct AnswerCreateDBRequest {
    pub question_id: QuestionId,
    pub owner_id: IdentityId,
    pub body: String,
}
