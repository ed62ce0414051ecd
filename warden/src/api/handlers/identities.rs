//! Identity profile endpoints and privileged identity management.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use tracing::info;

use crate::{
    AppState,
    api::models::identities::{IdentityResponse, RoleUpdate},
    auth::current_user::CurrentIdentity,
    errors::{Error, Result},
    types::{IdentityId, abbrev_uuid},
};

fn identity_not_found(id: IdentityId) -> Error {
    Error::NotFound {
        resource: "Identity".to_string(),
        id: id.to_string(),
    }
}

/// Get the authenticated identity
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "identities",
    responses(
        (status = 200, description = "Current identity", body = IdentityResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_current_identity(State(state): State<AppState>, current: CurrentIdentity) -> Result<Json<IdentityResponse>> {
    let identity = state
        .store
        .get_identity(current.id)
        .await?
        .ok_or_else(|| identity_not_found(current.id))?;
    Ok(Json(IdentityResponse::from(identity)))
}

/// Get an active identity by id
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "identities",
    params(("id" = uuid::Uuid, Path, description = "Identity ID")),
    responses(
        (status = 200, description = "Identity", body = IdentityResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Identity not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_identity(State(state): State<AppState>, Path(id): Path<IdentityId>) -> Result<Json<IdentityResponse>> {
    let identity = state.store.get_identity(id).await?.ok_or_else(|| identity_not_found(id))?;
    Ok(Json(IdentityResponse::from(identity)))
}

/// Change an identity's role
///
/// Takes effect on the identity's next request; existing sessions stay valid.
#[utoipa::path(
    patch,
    path = "/admin/identities/{id}",
    tag = "admin",
    request_body = RoleUpdate,
    params(("id" = uuid::Uuid, Path, description = "Identity ID")),
    responses(
        (status = 200, description = "Role updated", body = IdentityResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Requires the admin role"),
        (status = 404, description = "Identity not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_identity_role(
    State(state): State<AppState>,
    Path(id): Path<IdentityId>,
    Json(update): Json<RoleUpdate>,
) -> Result<Json<IdentityResponse>> {
    let identity = state
        .store
        .update_identity_role(id, update.role, Utc::now())
        .await?
        .ok_or_else(|| identity_not_found(id))?;

    info!(identity_id = %abbrev_uuid(&id), role = %identity.role, "Identity role changed");
    Ok(Json(IdentityResponse::from(identity)))
}

/// Soft-delete an identity and revoke its sessions
#[utoipa::path(
    delete,
    path = "/admin/identities/{id}",
    tag = "admin",
    params(("id" = uuid::Uuid, Path, description = "Identity ID")),
    responses(
        (status = 204, description = "Identity deleted"),
        (status = 400, description = "Cannot delete your own identity"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Requires the admin role"),
        (status = 404, description = "Identity not found"),
    ),
    security(("BearerAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_identity(
    State(state): State<AppState>,
    current: CurrentIdentity,
    Path(id): Path<IdentityId>,
) -> Result<StatusCode> {
    if current.id == id {
        return Err(Error::BadRequest {
            message: "Cannot delete your own identity".to_string(),
        });
    }

    if !state.store.soft_delete_identity(id, Utc::now()).await? {
        return Err(identity_not_found(id));
    }

    info!(identity_id = %abbrev_uuid(&id), "Identity deleted");
    Ok(StatusCode::NO_CONTENT)
}
