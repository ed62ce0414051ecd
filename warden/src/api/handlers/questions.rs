//! Question endpoints.
//!
//! Reads are public. Mutations sit behind the ownership gate, and promotion additionally
//! behind the `premium` role gate, so by the time these handlers run the caller is known
//! to be allowed.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;

use crate::{
    AppState,
    api::models::{
        pagination::Pagination,
        questions::{QuestionCreate, QuestionResponse, QuestionUpdate},
    },
    auth::current_user::CurrentIdentity,
    db::models::questions::{QuestionCreateDBRequest, QuestionFilter, QuestionUpdateDBRequest},
    errors::{Error, Result},
    types::QuestionId,
};

const MAX_TITLE_LENGTH: usize = 200;
const MAX_BODY_LENGTH: usize = 20_000;

pub(super) fn question_not_found(id: QuestionId) -> Error {
    Error::NotFound {
        resource: "Question".to_string(),
        id: id.to_string(),
    }
}

/// Trimmed `value`, or 400 if it is empty or longer than `max` characters.
pub(super) fn required_text(field: &str, value: &str, max: usize) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::BadRequest {
            message: format!("{field} must not be empty"),
        });
    }
    if value.chars().count() > max {
        return Err(Error::BadRequest {
            message: format!("{field} must be no more than {max} characters long"),
        });
    }
    Ok(value.to_string())
}

/// List questions, promoted first, then newest first
#[utoipa::path(
    get,
    path = "/questions",
    tag = "questions",
    params(Pagination),
    responses(
        (status = 200, description = "Questions", body = Vec<QuestionResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_questions(State(state): State<AppState>, Query(pagination): Query<Pagination>) -> Result<Json<Vec<QuestionResponse>>> {
    let questions = state
        .store
        .list_questions(&QuestionFilter {
            owner_id: None,
            skip: pagination.skip(),
            limit: pagination.limit(),
        })
        .await?;
    Ok(Json(questions.into_iter().map(QuestionResponse::from).collect()))
}

/// List the authenticated identity's questions
#[utoipa::path(
    get,
    path = "/questions/my",
    tag = "questions",
    params(Pagination),
    responses(
        (status = 200, description = "Questions owned by the caller", body = Vec<QuestionResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_my_questions(
    State(state): State<AppState>,
    current: CurrentIdentity,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<QuestionResponse>>> {
    let questions = state
        .store
        .list_questions(&QuestionFilter {
            owner_id: Some(current.id),
            skip: pagination.skip(),
            limit: pagination.limit(),
        })
        .await?;
    Ok(Json(questions.into_iter().map(QuestionResponse::from).collect()))
}

/// Ask a question
#[utoipa::path(
    post,
    path = "/questions",
    tag = "questions",
    request_body = QuestionCreate,
    responses(
        (status = 201, description = "Question created", body = QuestionResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_question(
    State(state): State<AppState>,
    current: CurrentIdentity,
    Json(create): Json<QuestionCreate>,
) -> Result<(StatusCode, Json<QuestionResponse>)> {
    let request = QuestionCreateDBRequest {
        owner_id: current.id,
        title: required_text("Title", &create.title, MAX_TITLE_LENGTH)?,
        body: required_text("Body", &create.body, MAX_BODY_LENGTH)?,
    };

    let question = state.store.create_question(&request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(QuestionResponse::from(question))))
}

/// Get a question
#[utoipa::path(
    get,
    path = "/questions/{id}",
    tag = "questions",
    params(("id" = uuid::Uuid, Path, description = "Question ID")),
    responses(
        (status = 200, description = "Question", body = QuestionResponse),
        (status = 404, description = "Question not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_question(State(state): State<AppState>, Path(id): Path<QuestionId>) -> Result<Json<QuestionResponse>> {
    let question = state.store.get_question(id).await?.ok_or_else(|| question_not_found(id))?;
    Ok(Json(QuestionResponse::from(question)))
}

/// Edit a question you own
#[utoipa::path(
    put,
    path = "/questions/{id}",
    tag = "questions",
    request_body = QuestionUpdate,
    params(("id" = uuid::Uuid, Path, description = "Question ID")),
    responses(
        (status = 200, description = "Question updated", body = QuestionResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Question not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_question(
    State(state): State<AppState>,
    Path(id): Path<QuestionId>,
    Json(update): Json<QuestionUpdate>,
) -> Result<Json<QuestionResponse>> {
    let request = QuestionUpdateDBRequest {
        title: update
            .title
            .as_deref()
            .map(|title| required_text("Title", title, MAX_TITLE_LENGTH))
            .transpose()?,
        body: update
            .body
            .as_deref()
            .map(|body| required_text("Body", body, MAX_BODY_LENGTH))
            .transpose()?,
    };

    let question = state
        .store
        .update_question(id, &request, Utc::now())
        .await?
        .ok_or_else(|| question_not_found(id))?;
    Ok(Json(QuestionResponse::from(question)))
}

/// Delete a question you own
#[utoipa::path(
    delete,
    path = "/questions/{id}",
    tag = "questions",
    params(("id" = uuid::Uuid, Path, description = "Question ID")),
    responses(
        (status = 204, description = "Question deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Question not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_question(State(state): State<AppState>, Path(id): Path<QuestionId>) -> Result<StatusCode> {
    if !state.store.delete_question(id, Utc::now()).await? {
        return Err(question_not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Promote a question you own to the top of the listing
///
/// Requires the `premium` role. Promoting twice keeps the original promotion time.
#[utoipa::path(
    post,
    path = "/premium/questions/{id}/promote",
    tag = "questions",
    params(("id" = uuid::Uuid, Path, description = "Question ID")),
    responses(
        (status = 200, description = "Question promoted", body = QuestionResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Requires the premium role and ownership"),
        (status = 404, description = "Question not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn promote_question(State(state): State<AppState>, Path(id): Path<QuestionId>) -> Result<Json<QuestionResponse>> {
    let question = state
        .store
        .promote_question(id, Utc::now())
        .await?
        .ok_or_else(|| question_not_found(id))?;
    Ok(Json(QuestionResponse::from(question)))
}
