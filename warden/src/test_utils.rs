//! Test utilities: cheap configs, in-memory services and a recording reset notifier.

use std::sync::Arc;

use async_trait::async_trait;
use axum_test::TestServer;
use parking_lot::Mutex;
use serde_json::json;

use crate::{
    AppState,
    auth::{reset::ResetNotifier, service::AuthService},
    config::{AuthConfig, Config, PasswordConfig},
    db::{
        handlers::{InMemoryStore, Store},
        models::identities::Identity,
    },
    errors::{Error, Result},
    types::Role,
};

/// Auth config with a short minimum password length and the cheapest Argon2 parameters, so
/// tests stay fast.
pub fn create_test_auth_config() -> AuthConfig {
    AuthConfig {
        password: PasswordConfig {
            min_length: 4,
            max_length: 64,
            argon2_memory_kib: 64,
            argon2_iterations: 1,
            argon2_parallelism: 1,
        },
        ..AuthConfig::default()
    }
}

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        auth: create_test_auth_config(),
        ..Config::default()
    }
}

/// Reset notifier that keeps every delivered token in memory.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every delivery fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn last_token_for(&self, username: &str) -> Option<String> {
        self.sent
            .lock()
            .iter()
            .rev()
            .find(|(recipient, _)| recipient == username)
            .map(|(_, token)| token.clone())
    }

    /// Latest token delivered to `username`, waiting briefly since delivery runs in a
    /// background task.
    pub async fn wait_for_token(&self, username: &str) -> Option<String> {
        for _ in 0..200 {
            if let Some(token) = self.last_token_for(username) {
                return Some(token);
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }
}

#[async_trait]
impl ResetNotifier for RecordingNotifier {
    async fn send_reset(&self, identity: &Identity, token: &str) -> Result<()> {
        if self.fail {
            return Err(Error::Internal {
                operation: "send reset email: transport unavailable".to_string(),
            });
        }
        self.sent.lock().push((identity.username.clone(), token.to_string()));
        Ok(())
    }
}

pub fn create_test_service() -> (AuthService, Arc<dyn Store>, Arc<RecordingNotifier>) {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let service = AuthService::new(store.clone(), &create_test_auth_config(), Some(notifier.clone()))
        .expect("Failed to create auth service");
    (service, store, notifier)
}

pub fn create_test_app_state(config: Config) -> (AppState, Arc<RecordingNotifier>) {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let auth = AuthService::new(store.clone(), &config.auth, Some(notifier.clone())).expect("Failed to create auth service");
    let state = AppState::builder().store(store).config(config).auth(Arc::new(auth)).build();
    (state, notifier)
}

/// Full router plus the state behind it, for tests that need to reach into the store.
pub fn create_test_harness(config: Config) -> (TestServer, AppState, Arc<RecordingNotifier>) {
    let (state, notifier) = create_test_app_state(config);
    let router = crate::build_router(state.clone()).expect("Failed to build router");
    (TestServer::new(router).expect("Failed to create test server"), state, notifier)
}

pub fn create_test_app_with_config(config: Config) -> (TestServer, Arc<RecordingNotifier>) {
    let (server, _state, notifier) = create_test_harness(config);
    (server, notifier)
}

/// Full router over an in-memory store.
pub fn create_test_app() -> (TestServer, Arc<RecordingNotifier>) {
    create_test_app_with_config(create_test_config())
}

/// Register `username` with `password` and log in, returning the bearer token.
pub async fn register_and_login(server: &TestServer, username: &str, password: &str) -> String {
    server
        .post("/api/register")
        .json(&json!({"username": username, "email": format!("{username}@example.com"), "password": password}))
        .await
        .assert_status(axum::http::StatusCode::CREATED);
    login(server, username, password).await
}

pub async fn login(server: &TestServer, username: &str, password: &str) -> String {
    let response = server
        .post("/api/login")
        .json(&json!({"username": username, "password": password}))
        .await;
    response.assert_status_ok();
    response.json::<serde_json::Value>()["token"]
        .as_str()
        .expect("login response has a token")
        .to_string()
}

/// Set an identity's role directly in the store, bypassing the admin API.
pub async fn set_role(state: &AppState, username: &str, role: Role) {
    let identity = state
        .store
        .get_identity_by_username(username)
        .await
        .unwrap()
        .expect("identity exists");
    state
        .store
        .update_identity_role(identity.id, role, chrono::Utc::now())
        .await
        .unwrap();
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}
