//! End-to-end tests against the full router over an in-memory store.

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};

use crate::test_utils::{bearer, create_test_app, create_test_config, create_test_harness, login, register_and_login, set_role};
use crate::config::PasswordConfig;
use crate::types::Role;

async fn create_question(server: &TestServer, token: &str, title: &str) -> String {
    let response = server
        .post("/api/questions")
        .add_header("authorization", bearer(token))
        .json(&json!({"title": title, "body": "How does this work?"}))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["id"].as_str().unwrap().to_string()
}

#[test_log::test(tokio::test)]
async fn test_register_login_and_access_protected_route() {
    let (server, _notifier) = create_test_app();

    server
        .post("/api/register")
        .json(&json!({"username": "alice", "password": "pw123"}))
        .await
        .assert_status(StatusCode::CREATED);

    server
        .post("/api/login")
        .json(&json!({"username": "alice", "password": "wrong"}))
        .await
        .assert_status_unauthorized();

    let token = login(&server, "alice", "pw123").await;

    let me = server.get("/api/users/me").add_header("authorization", bearer(&token)).await;
    me.assert_status_ok();
    let body: Value = me.json();
    assert_eq!(body["username"], "alice");
    assert_eq!(body["role"], "standard");
    assert!(body.get("password_hash").is_none());

    let reversed: String = token.chars().rev().collect();
    server
        .get("/api/users/me")
        .add_header("authorization", bearer(&reversed))
        .await
        .assert_status_unauthorized();

    let mut corrupted = token.clone();
    corrupted.pop();
    corrupted.push(if token.ends_with('A') { 'B' } else { 'A' });
    server
        .get("/api/users/me")
        .add_header("authorization", bearer(&corrupted))
        .await
        .assert_status_unauthorized();

    server.get("/api/users/me").await.assert_status_unauthorized();
    server
        .get("/api/users/me")
        .add_header("authorization", format!("bearer {token}"))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_default_password_policy_accepts_short_example_password() {
    let mut config = create_test_config();
    config.auth.password = PasswordConfig {
        argon2_memory_kib: 64,
        argon2_iterations: 1,
        ..PasswordConfig::default()
    };
    let (server, _state, _notifier) = create_test_harness(config);

    server
        .post("/api/register")
        .json(&json!({"username": "alice", "password": "pw123"}))
        .await
        .assert_status(StatusCode::CREATED);
    login(&server, "alice", "pw123").await;

    server
        .post("/api/register")
        .json(&json!({"username": "bob", "password": "pw12"}))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn test_login_failures_look_the_same() {
    let (server, _notifier) = create_test_app();
    register_and_login(&server, "alice", "pw123").await;

    let wrong_password = server
        .post("/api/login")
        .json(&json!({"username": "alice", "password": "nope"}))
        .await;
    let unknown_user = server
        .post("/api/login")
        .json(&json!({"username": "nobody", "password": "pw123"}))
        .await;

    wrong_password.assert_status_unauthorized();
    unknown_user.assert_status_unauthorized();
    assert_eq!(wrong_password.text(), unknown_user.text());
}

#[tokio::test]
async fn test_register_validation_and_duplicates() {
    let (server, _notifier) = create_test_app();
    register_and_login(&server, "alice", "pw123").await;

    let duplicate = server
        .post("/api/register")
        .json(&json!({"username": "alice", "password": "other1"}))
        .await;
    duplicate.assert_status(StatusCode::CONFLICT);
    assert_eq!(duplicate.json::<Value>()["message"], "This username is already taken");

    server
        .post("/api/register")
        .json(&json!({"username": "bob", "password": ""}))
        .await
        .assert_status_bad_request();
    server
        .post("/api/register")
        .json(&json!({"username": "", "password": "pw123"}))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn test_registration_disabled() {
    let mut config = create_test_config();
    config.auth.allow_registration = false;
    let (server, _state, _notifier) = create_test_harness(config);

    server
        .post("/api/register")
        .json(&json!({"username": "alice", "password": "pw123"}))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn test_second_login_supersedes_first() {
    let (server, _notifier) = create_test_app();
    let first = register_and_login(&server, "alice", "pw123").await;
    let second = login(&server, "alice", "pw123").await;

    server
        .get("/api/users/me")
        .add_header("authorization", bearer(&first))
        .await
        .assert_status_unauthorized();
    server
        .get("/api/users/me")
        .add_header("authorization", bearer(&second))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_logout_revokes_session() {
    let (server, _notifier) = create_test_app();
    let token = register_and_login(&server, "alice", "pw123").await;

    server
        .post("/api/logout")
        .add_header("authorization", bearer(&token))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    server
        .get("/api/users/me")
        .add_header("authorization", bearer(&token))
        .await
        .assert_status_unauthorized();
    server
        .post("/api/logout")
        .add_header("authorization", bearer(&token))
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn test_only_owner_can_modify_question() {
    let (server, _notifier) = create_test_app();
    let alice = register_and_login(&server, "alice", "pw123").await;
    let bob = register_and_login(&server, "bob", "pw456").await;
    let question_id = create_question(&server, &alice, "Alice's question").await;
    let path = format!("/api/questions/{question_id}");

    server
        .put(&path)
        .add_header("authorization", bearer(&bob))
        .json(&json!({"title": "Hijacked"}))
        .await
        .assert_status_forbidden();
    server
        .delete(&path)
        .add_header("authorization", bearer(&bob))
        .await
        .assert_status_forbidden();
    server.put(&path).json(&json!({"title": "Anonymous"})).await.assert_status_unauthorized();

    let updated = server
        .put(&path)
        .add_header("authorization", bearer(&alice))
        .json(&json!({"title": "Edited"}))
        .await;
    updated.assert_status_ok();
    assert_eq!(updated.json::<Value>()["title"], "Edited");
    assert_eq!(updated.json::<Value>()["body"], "How does this work?");

    server
        .delete(&path)
        .add_header("authorization", bearer(&alice))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server.get(&path).await.assert_status_not_found();
    server
        .put(&path)
        .add_header("authorization", bearer(&alice))
        .json(&json!({"title": "Again"}))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_question_reads_are_public() {
    let (server, _notifier) = create_test_app();
    let alice = register_and_login(&server, "alice", "pw123").await;
    let question_id = create_question(&server, &alice, "Public").await;

    server.get(&format!("/api/questions/{question_id}")).await.assert_status_ok();
    let list: Vec<Value> = server.get("/api/questions").await.json();
    assert_eq!(list.len(), 1);

    server.get("/api/questions/my").await.assert_status_unauthorized();
    let mine: Vec<Value> = server
        .get("/api/questions/my")
        .add_header("authorization", bearer(&alice))
        .await
        .json();
    assert_eq!(mine.len(), 1);

    server.get("/api/questions/not-a-uuid").await.assert_status_bad_request();
}

#[tokio::test]
async fn test_promotion_requires_premium_role_and_ownership() {
    let (server, state, _notifier) = create_test_harness(create_test_config());
    let alice = register_and_login(&server, "alice", "pw123").await;
    let bob = register_and_login(&server, "bob", "pw456").await;
    let older = create_question(&server, &alice, "Older").await;
    let _newer = create_question(&server, &alice, "Newer").await;
    let promote = format!("/api/premium/questions/{older}/promote");

    server
        .post(&promote)
        .add_header("authorization", bearer(&alice))
        .await
        .assert_status_forbidden();

    // Role changes apply to existing sessions
    set_role(&state, "alice", Role::Premium).await;
    set_role(&state, "bob", Role::Premium).await;

    server
        .post(&promote)
        .add_header("authorization", bearer(&bob))
        .await
        .assert_status_forbidden();

    let promoted = server.post(&promote).add_header("authorization", bearer(&alice)).await;
    promoted.assert_status_ok();
    assert_eq!(promoted.json::<Value>()["promoted"], true);

    let list: Vec<Value> = server.get("/api/questions").await.json();
    assert_eq!(list[0]["id"], older.as_str());
    assert_eq!(list[1]["title"], "Newer");

    // Admins are not premium
    set_role(&state, "alice", Role::Admin).await;
    server
        .post(&promote)
        .add_header("authorization", bearer(&alice))
        .await
        .assert_status_forbidden();
}

#[tokio::test]
async fn test_password_reset_flow() {
    let (server, notifier) = create_test_app();
    let old_session = register_and_login(&server, "alice", "pw123").await;

    let accepted = server
        .post("/api/forgot-password/initiate")
        .json(&json!({"username": "alice"}))
        .await;
    accepted.assert_status(StatusCode::ACCEPTED);

    let unknown = server
        .post("/api/forgot-password/initiate")
        .json(&json!({"username": "nobody"}))
        .await;
    unknown.assert_status(StatusCode::ACCEPTED);
    assert_eq!(accepted.text(), unknown.text());

    let token = notifier.wait_for_token("alice").await.unwrap();

    server
        .post("/api/forgot-password/reset")
        .json(&json!({"token": token, "new_password": ""}))
        .await
        .assert_status_bad_request();

    server
        .post("/api/forgot-password/reset")
        .json(&json!({"token": token, "new_password": "newpw1"}))
        .await
        .assert_status_ok();

    server
        .get("/api/users/me")
        .add_header("authorization", bearer(&old_session))
        .await
        .assert_status_unauthorized();

    let replay = server
        .post("/api/forgot-password/reset")
        .json(&json!({"token": token, "new_password": "newpw2"}))
        .await;
    replay.assert_status_bad_request();
    assert_eq!(replay.text(), "Invalid or expired reset token");

    server
        .post("/api/login")
        .json(&json!({"username": "alice", "password": "pw123"}))
        .await
        .assert_status_unauthorized();
    login(&server, "alice", "newpw1").await;
}

#[tokio::test]
async fn test_admin_identity_management() {
    let (server, state, _notifier) = create_test_harness(create_test_config());
    let admin = register_and_login(&server, "root", "rootpw").await;
    let bob = register_and_login(&server, "bob", "pw456").await;
    set_role(&state, "root", Role::Admin).await;

    let bob_id = server
        .get("/api/users/me")
        .add_header("authorization", bearer(&bob))
        .await
        .json::<Value>()["id"]
        .as_str()
        .unwrap()
        .to_string();
    let admin_path = format!("/api/admin/identities/{bob_id}");

    server
        .patch(&admin_path)
        .add_header("authorization", bearer(&bob))
        .json(&json!({"role": "admin"}))
        .await
        .assert_status_forbidden();

    let updated = server
        .patch(&admin_path)
        .add_header("authorization", bearer(&admin))
        .json(&json!({"role": "premium"}))
        .await;
    updated.assert_status_ok();
    assert_eq!(updated.json::<Value>()["role"], "premium");

    server
        .patch(&admin_path)
        .add_header("authorization", bearer(&admin))
        .json(&json!({"role": "superuser"}))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    server
        .delete(&admin_path)
        .add_header("authorization", bearer(&admin))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    server
        .get("/api/users/me")
        .add_header("authorization", bearer(&bob))
        .await
        .assert_status_unauthorized();
    server
        .post("/api/login")
        .json(&json!({"username": "bob", "password": "pw456"}))
        .await
        .assert_status_unauthorized();
    server
        .get(&format!("/api/users/{bob_id}"))
        .add_header("authorization", bearer(&admin))
        .await
        .assert_status_not_found();
    server
        .delete(&admin_path)
        .add_header("authorization", bearer(&admin))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_answers_are_owned_separately_from_questions() {
    let (server, _notifier) = create_test_app();
    let alice = register_and_login(&server, "alice", "pw123").await;
    let bob = register_and_login(&server, "bob", "pw456").await;
    let question_id = create_question(&server, &alice, "Question").await;
    let answers_path = format!("/api/questions/{question_id}/answers");

    server
        .post(&answers_path)
        .json(&json!({"body": "anonymous"}))
        .await
        .assert_status_unauthorized();

    let created = server
        .post(&answers_path)
        .add_header("authorization", bearer(&bob))
        .json(&json!({"body": "Bob's answer"}))
        .await;
    created.assert_status(StatusCode::CREATED);
    let answer_id = created.json::<Value>()["id"].as_str().unwrap().to_string();
    let answer_path = format!("{answers_path}/{answer_id}");

    let list: Vec<Value> = server.get(&answers_path).await.json();
    assert_eq!(list.len(), 1);

    // Owning the question does not grant the answer
    server
        .put(&answer_path)
        .add_header("authorization", bearer(&alice))
        .json(&json!({"body": "Edited by alice"}))
        .await
        .assert_status_forbidden();

    let edited = server
        .put(&answer_path)
        .add_header("authorization", bearer(&bob))
        .json(&json!({"body": "Edited by bob"}))
        .await;
    edited.assert_status_ok();
    assert_eq!(edited.json::<Value>()["body"], "Edited by bob");

    let other_question = create_question(&server, &bob, "Other").await;
    server
        .delete(&format!("/api/questions/{other_question}/answers/{answer_id}"))
        .add_header("authorization", bearer(&bob))
        .await
        .assert_status_not_found();

    server
        .delete(&answer_path)
        .add_header("authorization", bearer(&bob))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    let list: Vec<Value> = server.get(&answers_path).await.json();
    assert!(list.is_empty());

    server
        .post(&format!("/api/questions/{}/answers", uuid::Uuid::new_v4()))
        .add_header("authorization", bearer(&bob))
        .json(&json!({"body": "orphan"}))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_health_and_docs() {
    let (server, _notifier) = create_test_app();
    server.get("/healthz").await.assert_text("OK");
    server.get("/docs").await.assert_status_ok();
}
