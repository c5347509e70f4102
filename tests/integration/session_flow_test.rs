//! End-to-end session behavior over real HTTP

use std::sync::Arc;
use std::time::Duration;

use http::Method;
use mockito::Matcher;
use serde_json::{json, Value};

use erp_client::config::{ApiConfig, Config};
use erp_client::session::{Destination, MemorySessionStore, RecordingNavigator, SessionStore};
use erp_client::{Credentials, ErpClient, ErrorKind, ReqwestHttpClient};

use crate::test_harness::TestBackend;

#[tokio::test]
async fn test_expired_token_is_refreshed_and_request_retried() {
    let mut backend = TestBackend::start().await;
    backend.login().await;

    let expired = backend
        .server
        .mock("GET", "/api/projects/")
        .match_header("authorization", "Bearer t1")
        .with_status(401)
        .with_body(r#"{"detail": "Given token not valid for any token type"}"#)
        .expect(1)
        .create_async()
        .await;
    let refresh = backend
        .server
        .mock("POST", "/api/token/refresh/")
        .match_header("authorization", Matcher::Missing)
        .match_body(Matcher::Json(json!({"refresh": "r1"})))
        .with_status(200)
        .with_body(r#"{"access": "t2", "refresh": "r2"}"#)
        .expect(1)
        .create_async()
        .await;
    let retried = backend
        .server
        .mock("GET", "/api/projects/")
        .match_header("authorization", "Bearer t2")
        .with_status(200)
        .with_body(r#"{"count": 1, "next": null, "previous": null, "results": [{"id": 7}]}"#)
        .expect(1)
        .create_async()
        .await;

    let body: Value = backend
        .client
        .session()
        .request_json(Method::GET, "projects/", None)
        .await
        .unwrap();
    assert_eq!(body["results"][0]["id"], 7);

    expired.assert_async().await;
    refresh.assert_async().await;
    retried.assert_async().await;

    let stored = backend.store.get().await.unwrap().unwrap();
    assert_eq!(stored.access_token.as_deref(), Some("t2"));
    assert_eq!(stored.refresh_token.as_deref(), Some("r2"));
    assert_eq!(stored.user.unwrap().username, "alice");
}

#[tokio::test]
async fn test_refresh_failure_signs_out_and_drops_credentials() {
    let mut backend = TestBackend::start().await;
    backend.login().await;

    backend
        .server
        .mock("GET", "/api/employees/")
        .match_header("authorization", "Bearer t1")
        .with_status(401)
        .create_async()
        .await;
    let refresh = backend
        .mock_json(
            "POST",
            "/api/token/refresh/",
            401,
            json!({"detail": "Token is invalid or expired", "code": "token_not_valid"}),
        )
        .await;
    let anonymous = backend
        .server
        .mock("GET", "/api/employees/")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body("[]")
        .expect(1)
        .create_async()
        .await;

    let session = backend.client.session();
    let err = session
        .request(Method::GET, "employees/", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Auth);
    assert!(backend.store.get().await.unwrap().is_none());
    assert!(!backend.store.path().exists());
    assert_eq!(backend.navigator.destinations(), vec![Destination::Login]);

    session.request(Method::GET, "employees/", None).await.unwrap();
    refresh.assert_async().await;
    anonymous.assert_async().await;
}

#[tokio::test]
async fn test_invalid_login_stores_nothing() {
    let mut backend = TestBackend::start().await;
    backend
        .mock_json(
            "POST",
            "/api/accounts/token/",
            401,
            json!({"detail": "No active account found with the given credentials"}),
        )
        .await;

    let err = backend
        .client
        .session()
        .login(&Credentials::new("a@b.com", "wrong"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Auth);
    assert_eq!(err.status, Some(401));
    assert_eq!(err.message, "No active account found with the given credentials");
    assert!(backend.store.get().await.unwrap().is_none());
}

#[tokio::test]
async fn test_session_survives_restart() {
    let mut backend = TestBackend::start().await;
    backend.login().await;

    let me = backend
        .server
        .mock("GET", "/api/accounts/users/me/")
        .match_header("authorization", "Bearer t1")
        .with_status(200)
        .with_body(r#"{"id": 1, "username": "alice", "email": "a@b.com", "role": "admin"}"#)
        .expect(1)
        .create_async()
        .await;

    // A second client over the same session file picks up the stored tokens
    let config = Config {
        api: ApiConfig::with_base_url(format!("{}/api", backend.server.url())),
        session: erp_client::config::SessionConfig {
            store_path: backend.store.path().to_path_buf(),
        },
    };
    let restarted = ErpClient::from_config(&config).await.unwrap();
    assert!(restarted.session().is_authenticated().await);

    let user = restarted.session().current_user().await.unwrap();
    assert_eq!(user.email, "a@b.com");
    me.assert_async().await;
}

#[tokio::test]
async fn test_logout_clears_the_session_file() {
    let mut backend = TestBackend::start().await;
    backend.login().await;
    assert!(backend.store.path().exists());

    backend.client.session().logout().await.unwrap();
    assert!(!backend.store.path().exists());
    assert!(!backend.client.session().is_authenticated().await);
}

#[tokio::test]
async fn test_unreachable_backend_is_a_network_error() {
    let config = Config {
        api: ApiConfig::with_base_url("http://127.0.0.1:1/api/"),
        ..Config::default()
    };
    let navigator = RecordingNavigator::new();
    let client = ErpClient::with_parts(
        &config,
        Arc::new(ReqwestHttpClient::new(Duration::from_secs(2)).unwrap()),
        Arc::new(MemorySessionStore::new()),
        Arc::new(navigator.clone()),
    )
    .unwrap();

    let err = client
        .session()
        .request(Method::GET, "projects/", None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Network);
    assert_eq!(err.status, None);
    assert!(err.message.starts_with("Network error:"));
    assert!(navigator.calls().is_empty());
}
