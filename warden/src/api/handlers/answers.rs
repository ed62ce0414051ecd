//! Answer endpoints, nested under their question.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;

use super::questions::{question_not_found, required_text};
use crate::{
    AppState,
    api::models::questions::{AnswerCreate, AnswerResponse, AnswerUpdate},
    auth::current_user::CurrentIdentity,
    db::models::questions::{Answer, AnswerCreateDBRequest},
    errors::{Error, Result},
    types::{AnswerId, QuestionId},
};

const MAX_ANSWER_LENGTH: usize = 20_000;

fn answer_not_found(id: AnswerId) -> Error {
    Error::NotFound {
        resource: "Answer".to_string(),
        id: id.to_string(),
    }
}

/// The answer, provided it is active and belongs to `question_id`.
async fn answer_of_question(state: &AppState, question_id: QuestionId, answer_id: AnswerId) -> Result<Answer> {
    state
        .store
        .get_answer(answer_id)
        .await?
        .filter(|answer| answer.question_id == question_id)
        .ok_or_else(|| answer_not_found(answer_id))
}

/// List the answers to a question, oldest first
#[utoipa::path(
    get,
    path = "/questions/{id}/answers",
    tag = "answers",
    params(("id" = uuid::Uuid, Path, description = "Question ID")),
    responses(
        (status = 200, description = "Answers", body = Vec<AnswerResponse>),
        (status = 404, description = "Question not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_answers(State(state): State<AppState>, Path(question_id): Path<QuestionId>) -> Result<Json<Vec<AnswerResponse>>> {
    if state.store.get_question(question_id).await?.is_none() {
        return Err(question_not_found(question_id));
    }

    let answers = state.store.list_answers(question_id).await?;
    Ok(Json(answers.into_iter().map(AnswerResponse::from).collect()))
}

/// Answer a question
#[utoipa::path(
    post,
    path = "/questions/{id}/answers",
    tag = "answers",
    request_body = AnswerCreate,
    params(("id" = uuid::Uuid, Path, description = "Question ID")),
    responses(
        (status = 201, description = "Answer created", body = AnswerResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Question not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_answer(
    State(state): State<AppState>,
    current: CurrentIdentity,
    Path(question_id): Path<QuestionId>,
    Json(create): Json<AnswerCreate>,
) -> Result<(StatusCode, Json<AnswerResponse>)> {
    let body = required_text("Body", &create.body, MAX_ANSWER_LENGTH)?;
    if state.store.get_question(question_id).await?.is_none() {
        return Err(question_not_found(question_id));
    }

    let answer = state
        .store
        .create_answer(
            &AnswerCreateDBRequest {
                question_id,
                owner_id: current.id,
                body,
            },
            Utc::now(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(AnswerResponse::from(answer))))
}

/// Edit an answer you own
#[utoipa::path(
    put,
    path = "/questions/{id}/answers/{answer_id}",
    tag = "answers",
    request_body = AnswerUpdate,
    params(
        ("id" = uuid::Uuid, Path, description = "Question ID"),
        ("answer_id" = uuid::Uuid, Path, description = "Answer ID"),
    ),
    responses(
        (status = 200, description = "Answer updated", body = AnswerResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Answer not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_answer(
    State(state): State<AppState>,
    Path((question_id, answer_id)): Path<(QuestionId, AnswerId)>,
    Json(update): Json<AnswerUpdate>,
) -> Result<Json<AnswerResponse>> {
    let body = required_text("Body", &update.body, MAX_ANSWER_LENGTH)?;
    answer_of_question(&state, question_id, answer_id).await?;

    let answer = state
        .store
        .update_answer(answer_id, &body, Utc::now())
        .await?
        .ok_or_else(|| answer_not_found(answer_id))?;
    Ok(Json(AnswerResponse::from(answer)))
}

/// Delete an answer you own
#[utoipa::path(
    delete,
    path = "/questions/{id}/answers/{answer_id}",
    tag = "answers",
    params(
        ("id" = uuid::Uuid, Path, description = "Question ID"),
        ("answer_id" = uuid::Uuid, Path, description = "Answer ID"),
    ),
    responses(
        (status = 204, description = "Answer deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Answer not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_answer(State(state): State<AppState>, Path((question_id, answer_id)): Path<(QuestionId, AnswerId)>) -> Result<StatusCode> {
    answer_of_question(&state, question_id, answer_id).await?;

    if !state.store.delete_answer(answer_id, Utc::now()).await? {
        return Err(answer_not_found(answer_id));
    }
    Ok(StatusCode::NO_CONTENT)
}
