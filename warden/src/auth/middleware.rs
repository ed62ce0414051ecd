//! Request gates: authentication, role authorization and resource ownership.
//!
//! Gates are plain axum middleware functions, composed per route group with
//! `route_layer(from_fn_with_state(..))`. The authentication gate must be the outermost
//! one; the inner gates read the [`CurrentIdentity`] it injects and answer 401 if it is
//! missing.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{RawPathParams, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::{
    AppState,
    auth::current_user::{BearerToken, CurrentIdentity, extract_bearer_token},
    db::{errors::DbError, handlers::Store},
    errors::Error,
    types::{IdentityId, Operation, Permission, Role, abbrev_uuid},
};

/// Implementation for [`authenticate`]: resolve the bearer token and attach the identity.
pub(crate) async fn admit(state: &AppState, mut request: Request) -> Result<Request, Error> {
    let token = extract_bearer_token(request.headers())?.to_string();

    let identity = state
        .auth
        .sessions()
        .resolve(&token)
        .await?
        .ok_or_else(|| Error::Unauthenticated {
            message: Some("Invalid or expired session".to_string()),
        })?;

    trace!(identity_id = %abbrev_uuid(&identity.id), role = %identity.role, "Request admitted");
    let extensions = request.extensions_mut();
    extensions.insert(CurrentIdentity {
        id: identity.id,
        role: identity.role,
    });
    extensions.insert(BearerToken(token));
    Ok(request)
}

/// Authentication gate. Rejects with 401 unless the request carries a bearer token that
/// resolves to an active session of an active identity.
pub async fn authenticate(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, Error> {
    let request = admit(&state, request).await?;
    Ok(next.run(request).await)
}

/// Authorization gate. Admits only identities whose role is exactly `required`.
///
/// ```ignore
/// router.route_layer(from_fn_with_state(Role::Premium, require_role))
/// ```
pub async fn require_role(State(required): State<Role>, request: Request, next: Next) -> Result<Response, Error> {
    let identity = request
        .extensions()
        .get::<CurrentIdentity>()
        .copied()
        .ok_or(Error::Unauthenticated { message: None })?;

    if identity.role != required {
        debug!(identity_id = %abbrev_uuid(&identity.id), role = %identity.role, %required, "Role check failed");
        return Err(Error::InsufficientPermissions {
            required: Permission::HasRole(required),
            action: Operation::Access,
            resource: format!("routes restricted to the {required} role"),
        });
    }

    Ok(next.run(request).await)
}

/// A kind of resource that records which identity owns it.
#[async_trait]
pub trait OwnedResource: Send + Sync {
    /// Name used in error messages, e.g. `"Question"`
    fn resource_type(&self) -> &'static str;

    /// Owner of the active resource with this id, or `None` if there is no such resource.
    async fn lookup_owner(&self, id: Uuid) -> Result<Option<IdentityId>, DbError>;
}

pub struct QuestionOwnership(pub Arc<dyn Store>);

#[async_trait]
impl OwnedResource for QuestionOwnership {
    fn resource_type(&self) -> &'static str {
        "Question"
    }

    async fn lookup_owner(&self, id: Uuid) -> Result<Option<IdentityId>, DbError> {
        Ok(self.0.get_question(id).await?.map(|question| question.owner_id))
    }
}

pub struct AnswerOwnership(pub Arc<dyn Store>);

#[async_trait]
impl OwnedResource for AnswerOwnership {
    fn resource_type(&self) -> &'static str {
        "Answer"
    }

    async fn lookup_owner(&self, id: Uuid) -> Result<Option<IdentityId>, DbError> {
        Ok(self.0.get_answer(id).await?.map(|answer| answer.owner_id))
    }
}

/// Configuration for one instance of the ownership gate: which resource kind to look up
/// and which path parameter holds its id.
#[derive(Clone)]
pub struct OwnershipGate {
    resource: Arc<dyn OwnedResource>,
    param: &'static str,
    action: Option<Operation>,
}

impl OwnershipGate {
    pub fn new(resource: Arc<dyn OwnedResource>, param: &'static str) -> Self {
        Self {
            resource,
            param,
            action: None,
        }
    }

    /// Report this operation in 403 responses instead of deriving it from the method.
    pub fn with_action(mut self, action: Operation) -> Self {
        self.action = Some(action);
        self
    }

    fn action_for(&self, method: &Method) -> Operation {
        self.action.unwrap_or(match *method {
            Method::GET | Method::HEAD => Operation::Read,
            Method::DELETE => Operation::Delete,
            _ => Operation::Update,
        })
    }
}

/// Ownership gate. Admits the request only if the authenticated identity owns the
/// resource named by the gate's path parameter.
pub async fn require_owner(
    State(gate): State<OwnershipGate>,
    params: RawPathParams,
    request: Request,
    next: Next,
) -> Result<Response, Error> {
    let identity = request
        .extensions()
        .get::<CurrentIdentity>()
        .copied()
        .ok_or(Error::Unauthenticated { message: None })?;

    let resource_type = gate.resource.resource_type();
    let raw_id = params
        .iter()
        .find(|(name, _)| *name == gate.param)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| Error::BadRequest {
            message: format!("Missing {resource_type} identifier"),
        })?;

    let id = Uuid::parse_str(raw_id).map_err(|_| Error::BadRequest {
        message: format!("Invalid {resource_type} identifier"),
    })?;

    let owner = gate
        .resource
        .lookup_owner(id)
        .await
        .map_err(|e| Error::Internal {
            operation: format!("look up owner of {resource_type} {id}: {e:#}"),
        })?
        .ok_or_else(|| Error::NotFound {
            resource: resource_type.to_string(),
            id: id.to_string(),
        })?;

    if owner != identity.id {
        debug!(identity_id = %abbrev_uuid(&identity.id), resource_id = %abbrev_uuid(&id), "Ownership check failed");
        return Err(Error::InsufficientPermissions {
            required: Permission::Owns,
            action: gate.action_for(request.method()),
            resource: format!("{} {id}", resource_type.to_lowercase()),
        });
    }

    Ok(next.run(request).await)
}
