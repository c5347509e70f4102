//! Test harness wiring a client to a mockito server

use std::sync::Arc;
use std::time::Duration;

use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};
use tempfile::TempDir;

use erp_client::config::{ApiConfig, Config, SessionConfig};
use erp_client::session::{FileSessionStore, RecordingNavigator};
use erp_client::{ErpClient, ReqwestHttpClient};

pub struct TestBackend {
    pub server: ServerGuard,
    pub client: ErpClient,
    pub store: Arc<FileSessionStore>,
    pub navigator: RecordingNavigator,
    /// Keeps the session file alive for the test
    _dir: TempDir,
}

impl TestBackend {
    pub async fn start() -> Self {
        let server = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();

        let config = Config {
            api: ApiConfig::with_base_url(format!("{}/api/", server.url())),
            session: SessionConfig {
                store_path: dir.path().join("session.json"),
            },
        };
        let store = Arc::new(FileSessionStore::new(config.session.store_path.clone()));
        let navigator = RecordingNavigator::new();
        let http = ReqwestHttpClient::new(Duration::from_secs(5)).unwrap();

        let client = ErpClient::with_parts(
            &config,
            Arc::new(http),
            store.clone(),
            Arc::new(navigator.clone()),
        )
        .unwrap();

        Self {
            server,
            client,
            store,
            navigator,
            _dir: dir,
        }
    }

    /// Mock a JSON reply for one method and path
    pub async fn mock_json(&mut self, method: &str, path: &str, status: usize, body: Value) -> Mock {
        self.server
            .mock(method, path)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await
    }

    /// Mock the token endpoint to accept `a@b.com` / `good` and hand out t1/r1
    pub async fn mock_login(&mut self) -> Mock {
        self.server
            .mock("POST", "/api/accounts/token/")
            .match_header("authorization", Matcher::Missing)
            .match_body(Matcher::Json(json!({"email": "a@b.com", "password": "good"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "access": "t1",
                    "refresh": "r1",
                    "user": {"id": 1, "username": "alice", "email": "a@b.com", "role": "admin"}
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await
    }

    pub async fn login(&mut self) {
        let mock = self.mock_login().await;
        self.client
            .session()
            .login(&erp_client::Credentials::new("a@b.com", "good"))
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
