//! Registration, login, logout and password reset endpoints.

use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    api::models::{
        auth::{LoginRequest, LoginResponse, MessageResponse, PasswordResetConfirmRequest, PasswordResetRequest, RegisterRequest},
        identities::IdentityResponse,
    },
    auth::current_user::BearerToken,
    errors::Result,
};

/// Register a new identity with the `standard` role
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    tag = "authentication",
    responses(
        (status = 201, description = "Identity registered", body = IdentityResponse),
        (status = 400, description = "Invalid input, weak password, or registration disabled"),
        (status = 409, description = "Username already taken"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(State(state): State<AppState>, Json(request): Json<RegisterRequest>) -> Result<(StatusCode, Json<IdentityResponse>)> {
    let email = request.email.map(|email| email.trim().to_string()).filter(|email| !email.is_empty());
    let identity = state.auth.register(&request.username, email, &request.password).await?;
    Ok((StatusCode::CREATED, Json(IdentityResponse::from(identity))))
}

/// Log in and receive a bearer token. Any previous session of the identity is revoked.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid username or password"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Json<LoginResponse>> {
    let (_identity, session) = state.auth.login(&request.username, &request.password).await?;
    Ok(Json(LoginResponse {
        token: session.token,
        expires_at: session.expires_at,
    }))
}

/// Revoke the session the request was made with
#[utoipa::path(
    post,
    path = "/logout",
    tag = "authentication",
    responses(
        (status = 204, description = "Logged out"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, BearerToken(token): BearerToken) -> Result<StatusCode> {
    state.auth.logout(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Request a password reset link
///
/// The response is the same whether or not the username exists.
#[utoipa::path(
    post,
    path = "/forgot-password/initiate",
    request_body = PasswordResetRequest,
    tag = "authentication",
    responses(
        (status = 202, description = "Request accepted", body = MessageResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn initiate_password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetRequest>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    state.auth.initiate_password_reset(request.username.trim()).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse::new(
            "If an account with that username exists, a password reset link has been sent",
        )),
    ))
}

/// Set a new password with a reset token. Every session of the identity is revoked.
#[utoipa::path(
    post,
    path = "/forgot-password/reset",
    request_body = PasswordResetConfirmRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid or expired token, or weak password"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn complete_password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetConfirmRequest>,
) -> Result<Json<MessageResponse>> {
    state.auth.complete_password_reset(&request.token, &request.new_password).await?;
    Ok(Json(MessageResponse::new("Password has been reset, please log in again")))
}
