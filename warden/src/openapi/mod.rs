//! OpenAPI documentation for the `/api` surface.
//!
//! The document is served as JSON at `/api/openapi.json` and rendered with Scalar at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::api;
use crate::types::Role;

/// Bearer session token security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("Session token")
                        .description(Some(
                            "Session token from `POST /api/login`. Include it in the `Authorization` header:\n\n\
                            ```\nAuthorization: Bearer YOUR_TOKEN\n```\n\n\
                            Logging in again, logging out or resetting the password invalidates it.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "warden", description = "Bearer session authentication, role gating and ownership checks"),
    servers((url = "/api", description = "API server")),
    modifiers(&SecurityAddon),
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::logout,
        api::handlers::auth::initiate_password_reset,
        api::handlers::auth::complete_password_reset,
        api::handlers::identities::get_current_identity,
        api::handlers::identities::get_identity,
        api::handlers::identities::update_identity_role,
        api::handlers::identities::delete_identity,
        api::handlers::questions::list_questions,
        api::handlers::questions::list_my_questions,
        api::handlers::questions::create_question,
        api::handlers::questions::get_question,
        api::handlers::questions::update_question,
        api::handlers::questions::delete_question,
        api::handlers::questions::promote_question,
        api::handlers::answers::list_answers,
        api::handlers::answers::create_answer,
        api::handlers::answers::update_answer,
        api::handlers::answers::delete_answer,
    ),
    components(
        schemas(
            Role,
            api::models::auth::RegisterRequest,
            api::models::auth::LoginRequest,
            api::models::auth::LoginResponse,
            api::models::auth::PasswordResetRequest,
            api::models::auth::PasswordResetConfirmRequest,
            api::models::auth::MessageResponse,
            api::models::identities::IdentityResponse,
            api::models::identities::RoleUpdate,
            api::models::questions::QuestionCreate,
            api::models::questions::QuestionUpdate,
            api::models::questions::QuestionResponse,
            api::models::questions::AnswerCreate,
            api::models::questions::AnswerUpdate,
            api::models::questions::AnswerResponse,
        )
    ),
    tags(
        (name = "authentication", description = "Registration, login and password reset"),
        (name = "identities", description = "Identity profiles"),
        (name = "admin", description = "Identity management, admin role only"),
        (name = "questions", description = "Questions"),
        (name = "answers", description = "Answers to questions"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_gated_paths_with_security() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;

        assert!(paths.contains_key("/login"));
        assert!(paths.contains_key("/premium/questions/{id}/promote"));
        assert!(paths.contains_key("/questions/{id}/answers/{answer_id}"));

        let schemes = &doc.components.as_ref().unwrap().security_schemes;
        assert!(schemes.contains_key("BearerAuth"));
    }
}
