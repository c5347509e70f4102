pub mod api;
pub mod config;
pub mod error;
pub mod http_client;
pub mod session;

use std::sync::Arc;

use tracing::info;

// Re-export the main entry points
pub use crate::api::{dashboard_stats, DashboardStats, Listing, Resource, ResourceClient};
pub use crate::config::Config;
pub use crate::error::{ApiError, ApiResult, ErrorKind};
pub use crate::http_client::{HttpClient, ReqwestHttpClient, SimpleHttpResponse};
pub use crate::session::{
    AuthState, Credentials, Destination, FileSessionStore, Navigator, Session, SessionEvent,
    SessionManager, SessionStore, TracingNavigator, User,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Client for the ERP backend: a session manager plus typed collection access
#[derive(Debug, Clone)]
pub struct ErpClient {
    session: Arc<SessionManager>,
}

impl ErpClient {
    /// Build a client from configuration using the reqwest transport, a file
    /// session store and a logging navigator. The stored session is restored.
    pub async fn from_config(config: &Config) -> ApiResult<Self> {
        let http = ReqwestHttpClient::new(config.api.timeout())
            .map_err(|e| ApiError::config(e.to_string()))?;
        let store = FileSessionStore::new(config.session.store_path.clone());

        let client = Self::with_parts(
            config,
            Arc::new(http),
            Arc::new(store),
            Arc::new(TracingNavigator),
        )?;
        let state = client.session.restore().await;
        info!(
            base_url = %config.api.base_url,
            store = %config.session.store_path.display(),
            authenticated = state.is_authenticated(),
            "ERP client ready"
        );
        Ok(client)
    }

    /// Build a client from explicit collaborators. Call
    /// [`SessionManager::restore`] to load a stored session.
    pub fn with_parts(
        config: &Config,
        http: Arc<dyn HttpClient>,
        store: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> ApiResult<Self> {
        let session = SessionManager::new(config.api.clone(), http, store, navigator)?;
        Ok(Self {
            session: Arc::new(session),
        })
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn resource(&self, resource: Resource) -> ResourceClient {
        ResourceClient::new(self.session.clone(), resource)
    }

    pub async fn dashboard(&self) -> DashboardStats {
        dashboard_stats(
            &self.resource(Resource::Projects),
            &self.resource(Resource::Employees),
            &self.resource(Resource::Equipment),
        )
        .await
    }
}
