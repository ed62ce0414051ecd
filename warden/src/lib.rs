//! # warden: bearer sessions, role gates and ownership checks
//!
//! `warden` is an HTTP service built around a request authentication pipeline: it issues opaque
//! bearer session tokens, resolves them on every request, gates routes on the caller's role, and
//! verifies that the caller owns the resource a request targets. The password lifecycle that
//! session issuance depends on (hashing, verification, single-use reset tokens delivered by email)
//! is part of the same core. A small questions-and-answers API exercises the gates.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer.
//! Persistence goes through the object-safe [`db::handlers::Store`] trait, implemented by an
//! in-memory store (development and tests) and a PostgreSQL store. The store is constructed once
//! at startup and handed to every component that needs it.
//!
//! ### Request Flow
//!
//! ```text
//! request ─▶ authenticate ─▶ require_role / require_owner ─▶ handler
//!               │ 401              │ 401 / 400 / 403 / 404 / 500
//! ```
//!
//! Each gate either admits the request to the next stage or short-circuits with an error; there
//! is no partial admission. The authentication gate resolves the bearer token through
//! [`auth::session::SessionManager`] and injects a typed [`auth::current_user::CurrentIdentity`]
//! into the request. Role and ownership gates read it back.
//!
//! ### Core Components
//!
//! - [`auth`]: password hashing, token generation, sessions, reset tokens and the gates
//! - [`api`]: HTTP handlers and request/response models
//! - [`db`]: store traits, models and the two backends
//! - [`config`]: layered configuration (YAML, `WARDEN_` environment variables, `DATABASE_URL`)
//! - [`telemetry`]: tracing with optional OTLP export
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use warden::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = warden::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     warden::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! }
//! ```
//!
//! ## Database Setup
//!
//! With a PostgreSQL backend, migrations run on startup. They can also be run directly:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::migrate::MigrateError> {
//! warden::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod errors;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod test;
#[cfg(test)]
pub mod test_utils;

use crate::{
    auth::{
        middleware::{AnswerOwnership, OwnershipGate, QuestionOwnership, authenticate, require_owner, require_role},
        reset::ResetNotifier,
        service::AuthService,
    },
    config::{CorsOrigin, DatabaseConfig},
    db::handlers::{InMemoryStore, PostgresStore, Store},
    email::EmailService,
    openapi::ApiDoc,
    types::{Operation, Role},
};
use axum::{
    Json, Router,
    http::{self, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, patch, post, put},
};
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, task::JoinHandle, time::MissedTickBehavior};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .store(store)
///     .config(config)
///     .auth(Arc::new(auth_service))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Config,
    pub auth: Arc<AuthService>,
}

/// Get the warden database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Open the configured store. For PostgreSQL this connects and runs migrations.
async fn setup_store(config: &Config) -> anyhow::Result<(Arc<dyn Store>, Option<PgPool>)> {
    match &config.database {
        DatabaseConfig::Memory => {
            warn!("Using the in-memory store; all data is lost on shutdown");
            Ok((Arc::new(InMemoryStore::new()), None))
        }
        DatabaseConfig::Postgres { url, max_connections } => {
            let pool = PgPoolOptions::new().max_connections(*max_connections).connect(url).await?;
            migrator().run(&pool).await?;
            info!("Connected to PostgreSQL and applied migrations");
            Ok((Arc::new(PostgresStore::new(pool.clone())), Some(pool)))
        }
    }
}

/// Build the reset delivery channel, if email is configured.
fn setup_notifier(config: &Config) -> anyhow::Result<Option<Arc<dyn ResetNotifier>>> {
    let Some(email) = &config.auth.email else {
        warn!("auth.email is not configured; password reset links will not be delivered");
        return Ok(None);
    };
    let service = EmailService::new(email, config.auth.password_reset.token_duration)?;
    Ok(Some(Arc::new(service)))
}

/// Periodically delete revoked and expired sessions and spent reset tokens.
fn spawn_pruner(auth: Arc<AuthService>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = auth.prune_stale().await {
                warn!("Failed to prune stale sessions and reset tokens: {e:#}");
            }
        }
    })
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.auth.security.cors;

    let allow_origin = if cors_config.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &cors_config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                // Origins never carry a path; Url always renders one
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(cors_config.allow_credentials);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the main application router.
///
/// Routes are grouped by the gates they need. Within the authenticated group, gates are added
/// with `route_layer`, and the last layer added runs first, so every group ends with the
/// authentication gate outermost:
///
/// - public: registration, login, password reset, question and answer reads
/// - authenticated: logout, profiles, asking and answering
/// - authenticated + owner(question): editing and deleting questions
/// - authenticated + role `premium` + owner(question): promotion
/// - authenticated + owner(answer): editing and deleting answers
/// - authenticated + role `admin`: identity management
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    use api::handlers::{answers, auth as auth_handlers, identities, questions};

    let question_owner = OwnershipGate::new(Arc::new(QuestionOwnership(state.store.clone())), "id");
    let promote_owner = question_owner.clone().with_action(Operation::Promote);
    let answer_owner = OwnershipGate::new(Arc::new(AnswerOwnership(state.store.clone())), "answer_id");

    let public_routes = Router::new()
        .route("/register", post(auth_handlers::register))
        .route("/login", post(auth_handlers::login))
        .route("/forgot-password/initiate", post(auth_handlers::initiate_password_reset))
        .route("/forgot-password/reset", post(auth_handlers::complete_password_reset))
        .route("/questions", get(questions::list_questions))
        .route("/questions/{id}", get(questions::get_question))
        .route("/questions/{id}/answers", get(answers::list_answers))
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }));

    let authenticated_routes = Router::new()
        .route("/logout", post(auth_handlers::logout))
        .route("/users/me", get(identities::get_current_identity))
        .route("/users/{id}", get(identities::get_identity))
        .route("/questions", post(questions::create_question))
        .route("/questions/my", get(questions::list_my_questions))
        .route("/questions/{id}/answers", post(answers::create_answer));

    let question_owner_routes = Router::new()
        .route("/questions/{id}", put(questions::update_question).delete(questions::delete_question))
        .route_layer(from_fn_with_state(question_owner, require_owner));

    let premium_routes = Router::new()
        .route("/premium/questions/{id}/promote", post(questions::promote_question))
        .route_layer(from_fn_with_state(promote_owner, require_owner))
        .route_layer(from_fn_with_state(Role::Premium, require_role));

    let answer_owner_routes = Router::new()
        .route(
            "/questions/{id}/answers/{answer_id}",
            put(answers::update_answer).delete(answers::delete_answer),
        )
        .route_layer(from_fn_with_state(answer_owner, require_owner));

    let admin_routes = Router::new()
        .route(
            "/admin/identities/{id}",
            patch(identities::update_identity_role).delete(identities::delete_identity),
        )
        .route_layer(from_fn_with_state(Role::Admin, require_role));

    let protected_routes = authenticated_routes
        .merge(question_owner_routes)
        .merge(premium_routes)
        .merge(answer_owner_routes)
        .merge(admin_routes)
        .route_layer(from_fn_with_state(state.clone(), authenticate));

    let api_routes = public_routes.merge(protected_routes).with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(create_cors_layer(&state.config)?)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// Main application struct that owns all resources and lifecycle.
///
/// 1. **Create**: [`Application::new`] opens the store (running migrations for PostgreSQL),
///    sets up reset delivery, ensures the configured admin identity exists and starts the
///    pruning task
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and handles requests until the
///    shutdown future resolves
/// 3. **Close**: pruning stops, the connection pool is closed and pending spans are flushed
pub struct Application {
    router: Router,
    config: Config,
    pool: Option<PgPool>,
    pruner: JoinHandle<()>,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let (store, pool) = setup_store(&config).await?;
        let notifier = setup_notifier(&config)?;
        let auth = AuthService::new(store.clone(), &config.auth, notifier)?;

        if let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) {
            auth.ensure_admin(username, password).await?;
            info!(username = %username, "Admin identity ready");
        }

        let auth = Arc::new(auth);
        let pruner = spawn_pruner(auth.clone(), config.auth.session.prune_interval);

        let state = AppState::builder().store(store).config(config.clone()).auth(auth).build();
        let router = build_router(state)?;

        Ok(Self {
            router,
            config,
            pool,
            pruner,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("warden listening on http://{bind_addr}, docs at http://localhost:{}/docs", self.config.port);

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        self.pruner.abort();

        if let Some(pool) = self.pool {
            info!("Closing database connections...");
            pool.close().await;
        }

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
