use std::time::Duration;

use forum_client::{ApiError, ClientConfig, ForumClient};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer, dir: &tempfile::TempDir) -> ClientConfig {
    ClientConfig::new(server.uri())
        .with_timeout(Duration::from_secs(2))
        .with_session_dir(dir.path())
}

fn login_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "user": { "id": "u1", "email": "ada@example.com", "username": "ada" },
        "token": "tok-ada"
    }))
}

#[tokio::test]
async fn login_persists_session_for_next_process() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({ "email": "ada@example.com", "password": "secret123" })))
        .respond_with(login_ok())
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let first = ForumClient::new(&config(&server, &dir)).unwrap();
    let user = first.session.sign_in(" ada@example.com ", "secret123").await.unwrap();
    assert_eq!(user.display_name(), "ada");

    let second = ForumClient::new(&config(&server, &dir)).unwrap();
    assert_eq!(second.session.token().as_deref(), Some("tok-ada"));
    assert_eq!(second.session.current_user().unwrap().email, "ada@example.com");
}

#[tokio::test]
async fn bad_credentials_surface_backend_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "message": "Invalid credentials" })))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let client = ForumClient::new(&config(&server, &dir)).unwrap();
    let err = client.session.sign_in("ada@example.com", "wrong").await.unwrap_err();
    assert!(matches!(err, ApiError::Auth(ref m) if m == "Invalid credentials"));
    assert!(!client.session.is_authenticated());
}

#[tokio::test]
async fn logout_failure_still_clears_local_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/auth/login")).respond_with(login_ok()).mount(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .and(header("authorization", "Bearer tok-ada"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "boom" })))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let client = ForumClient::new(&config(&server, &dir)).unwrap();
    client.session.sign_in("ada@example.com", "secret123").await.unwrap();
    client.session.sign_out().await.unwrap();
    assert!(client.session.current_user().is_none());

    let reopened = ForumClient::new(&config(&server, &dir)).unwrap();
    assert!(reopened.session.current_user().is_none());
}

#[tokio::test]
async fn rejected_token_signs_out_after_revalidation() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/auth/login")).respond_with(login_ok()).mount(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(header("authorization", "Bearer tok-ada"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Invalid token" })))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let client = ForumClient::new(&config(&server, &dir)).unwrap();
    client.session.sign_in("ada@example.com", "secret123").await.unwrap();
    let err = client.session.revalidate().await.unwrap_err();
    assert!(matches!(err, ApiError::Auth(ref m) if m == "Invalid token"));
    assert!(client.session.current_user().is_none());

    let reopened = ForumClient::new(&config(&server, &dir)).unwrap();
    assert!(!reopened.session.is_authenticated());
}

#[tokio::test]
async fn revalidation_picks_up_profile_changes() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/auth/login")).respond_with(login_ok()).mount(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(header("authorization", "Bearer tok-ada"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "user": { "id": "u1", "email": "ada@example.com", "username": "ada_l", "role": "moderator" },
            "token": "tok-ada-2"
        })))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let client = ForumClient::new(&config(&server, &dir)).unwrap();
    client.session.sign_in("ada@example.com", "secret123").await.unwrap();
    let fresh = client.session.revalidate().await.unwrap().unwrap();
    assert!(fresh.is_staff());
    assert_eq!(client.session.current_user().unwrap().display_name(), "ada_l");
    assert_eq!(client.session.token().as_deref(), Some("tok-ada-2"));

    let reopened = ForumClient::new(&config(&server, &dir)).unwrap();
    assert_eq!(reopened.session.token().as_deref(), Some("tok-ada-2"));
    assert_eq!(reopened.session.current_user().unwrap().display_name(), "ada_l");
}

#[tokio::test]
async fn password_recovery_requests_are_anonymous() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/forgot-password"))
        .and(body_json(json!({ "email": "ada@example.com" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Check your inbox" })))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let client = ForumClient::new(&config(&server, &dir)).unwrap();
    assert!(matches!(client.auth.reset_password("tok", "123").await, Err(ApiError::Validation(_))));
    let body = client.auth.forgot_password("ada@example.com").await.unwrap();
    assert_eq!(body["message"], "Check your inbox");
}
