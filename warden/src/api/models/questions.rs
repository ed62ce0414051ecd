//! API request/response models for questions and their answers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::questions::{Answer, Question};
use crate::types::{AnswerId, IdentityId, QuestionId};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct QuestionCreate {
    pub title: String,
    pub body: String,
}

/// Partial update; omitted fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct QuestionUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuestionResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: QuestionId,
    #[schema(value_type = String, format = "uuid")]
    pub owner_id: IdentityId,
    pub title: String,
    pub body: String,
    pub promoted: bool,
    pub promoted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Question> for QuestionResponse {
    fn from(question: Question) -> Self {
        Self {
            id: question.id,
            owner_id: question.owner_id,
            title: question.title,
            body: question.body,
            promoted: question.promoted_at.is_some(),
            promoted_at: question.promoted_at,
            created_at: question.created_at,
            updated_at: question.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AnswerCreate {
    pub body: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AnswerUpdate {
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnswerResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: AnswerId,
    #[schema(value_type = String, format = "uuid")]
    pub question_id: QuestionId,
    #[schema(value_type = String, format = "uuid")]
    pub owner_id: IdentityId,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Answer> for AnswerResponse {
    fn from(answer: Answer) -> Self {
        Self {
            id: answer.id,
            question_id: answer.question_id,
            owner_id: answer.owner_id,
            body: answer.body,
            created_at: answer.created_at,
            updated_at: answer.updated_at,
        }
    }
}
