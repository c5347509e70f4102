//! Session manager: owns the tokens and mediates every API call.
//!
//! Each request carries the current access token. A 401 triggers at most one
//! refresh and one retry for that request; a second 401 is returned to the
//! caller. Refreshes from concurrent requests are funneled through a single
//! gate so only one refresh call is in flight at a time.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use http::header::HeaderValue;
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::ApiConfig;
use crate::error::{extract_message, ApiError, ApiResult};
use crate::http_client::{HttpClient, SimpleHttpResponse};
use crate::session::model::{
    Account, AuthState, Credentials, RefreshResponse, Registration, Session, SessionEvent,
    TokenPairResponse, User,
};
use crate::session::navigator::{Destination, Navigator};
use crate::session::store::{SessionStore, StoreError};

const SESSION_EVENT_CAPACITY: usize = 64;
const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Owner of the session record and gateway for authenticated requests
#[derive(Debug)]
pub struct SessionManager {
    http: Arc<dyn HttpClient>,
    store: Arc<dyn SessionStore>,
    navigator: Arc<dyn Navigator>,
    api: ApiConfig,
    base_url: Url,
    /// In-memory copy of the persisted session
    session: RwLock<Session>,
    state: RwLock<AuthState>,
    /// Held for the duration of every refresh
    refresh_gate: Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    /// Create a manager; call [`SessionManager::restore`] to load a stored session
    pub fn new(
        api: ApiConfig,
        http: Arc<dyn HttpClient>,
        store: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> ApiResult<Self> {
        let base_url = api
            .parsed_base_url()
            .map_err(|e| ApiError::config(e.to_string()))?;
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);

        Ok(Self {
            http,
            store,
            navigator,
            api,
            base_url,
            session: RwLock::new(Session::default()),
            state: RwLock::new(AuthState::Unauthenticated),
            refresh_gate: Mutex::new(()),
            events,
        })
    }

    /// Load the persisted session. Corrupt data is cleared and treated as signed out.
    pub async fn restore(&self) -> AuthState {
        let restored = match self.store.get().await {
            Ok(Some(session)) => session,
            Ok(None) => {
                debug!("No stored session to restore");
                Session::default()
            }
            Err(StoreError::Corrupt(reason)) => {
                warn!(reason = %reason, "Stored session is corrupt, clearing it");
                if let Err(e) = self.store.clear().await {
                    error!(error = %e, "Failed to clear corrupt session");
                }
                Session::default()
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored session");
                Session::default()
            }
        };

        let state = if restored.is_authenticated() {
            info!(
                user = ?restored.user.as_ref().map(|u| u.id),
                "Restored stored session"
            );
            AuthState::Authenticated {
                user: restored.user.clone(),
            }
        } else {
            AuthState::Unauthenticated
        };

        *self.session.write().await = restored;
        self.set_state(state.clone()).await;
        state
    }

    /// Exchange credentials for a token pair and persist the new session.
    ///
    /// Nothing is stored unless every step succeeds.
    pub async fn login(&self, credentials: &Credentials) -> ApiResult<Session> {
        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return Err(ApiError::validation("Email and password are required"));
        }

        let url = self.url(&self.api.login_path)?;
        let body = serde_json::to_string(credentials).map_err(ApiError::decode)?;
        let response = self
            .http
            .post(url.as_str(), json_headers(None)?, body)
            .await
            .map_err(ApiError::network)?;

        if !response.is_success() {
            let error = login_error(&response);
            warn!(status = %response.status(), message = %error.message, "Login rejected");
            return Err(error);
        }

        let tokens: TokenPairResponse = response.json().map_err(ApiError::decode)?;
        let user = match tokens.user {
            Some(user) => user,
            None => self.fetch_profile(&tokens.access).await?,
        };

        let session = Session::new(tokens.access, tokens.refresh, user.clone());

        // A refresh started for the previous session must finish before the swap
        let _gate = self.refresh_gate.lock().await;
        self.store.set(&session).await?;
        *self.session.write().await = session.clone();

        info!(user_id = user.id, role = %user.role, "Logged in");
        self.set_state(AuthState::Authenticated {
            user: Some(user.clone()),
        })
        .await;
        self.publish(SessionEvent::LoggedIn { user: Some(user) });

        Ok(session)
    }

    /// Create a new account. Does not sign in.
    pub async fn register(&self, registration: &Registration) -> ApiResult<Account> {
        if registration.username.trim().is_empty()
            || registration.email.trim().is_empty()
            || registration.password.is_empty()
        {
            return Err(ApiError::validation(
                "Username, email and password are required",
            ));
        }

        let url = self.url(&self.api.register_path)?;
        let body = serde_json::to_string(registration).map_err(ApiError::decode)?;
        let response = self
            .http
            .post(url.as_str(), json_headers(None)?, body)
            .await
            .map_err(ApiError::network)?;

        let response = ensure_success(response)?;
        let account: Account = response.json().map_err(ApiError::decode)?;
        info!(username = %account.username, role = %account.role, "Account registered");
        Ok(account)
    }

    /// Send an authenticated request to `path`, relative to the API base URL.
    ///
    /// Non-success statuses come back as normalized errors. Only a 401 is
    /// retried, and only once, after a refresh.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> ApiResult<SimpleHttpResponse> {
        let request_id = Uuid::new_v4();
        let url = self.url(path)?;
        let token = self.access_token().await;

        debug!(
            request_id = %request_id,
            method = %method,
            url = %url,
            authenticated = token.is_some(),
            "Sending request"
        );
        let response = self
            .send(method.clone(), &url, body.as_ref(), token.as_deref())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return ensure_success(response);
        }

        info!(request_id = %request_id, url = %url, "Request unauthorized, refreshing session");
        let fresh = self.refresh_after_unauthorized(token.as_deref()).await?;

        let retry = self.send(method, &url, body.as_ref(), Some(&fresh)).await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            warn!(request_id = %request_id, url = %url, "Request still unauthorized after refresh");
            return Err(ApiError::from_response(&retry));
        }

        debug!(request_id = %request_id, status = %retry.status(), "Retry completed");
        ensure_success(retry)
    }

    /// [`SessionManager::request`] with the success body decoded as JSON
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> ApiResult<T> {
        let response = self.request(method, path, body).await?;
        response.json().map_err(ApiError::decode)
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// On failure the whole session is cleared and the navigator is sent to
    /// the login screen.
    pub async fn refresh(&self) -> ApiResult<String> {
        let _gate = self.refresh_gate.lock().await;
        self.refresh_locked().await
    }

    /// Clear the session; later requests carry no credential
    pub async fn logout(&self) -> ApiResult<()> {
        // Wait out any refresh so it cannot repopulate the session afterwards
        let _gate = self.refresh_gate.lock().await;

        *self.session.write().await = Session::default();
        let cleared = self.store.clear().await;

        self.set_state(AuthState::Unauthenticated).await;
        self.publish(SessionEvent::LoggedOut);
        info!("Logged out");

        cleared.map_err(ApiError::from)
    }

    /// Fetch the signed-in user's profile and store it
    pub async fn current_user(&self) -> ApiResult<User> {
        let path = self.api.profile_path.clone();
        let user: User = self.request_json(Method::GET, &path, None).await?;

        let _gate = self.refresh_gate.lock().await;
        let session = {
            let mut session = self.session.write().await;
            let same_account = session.user.as_ref().map_or(true, |u| u.id == user.id);
            if !session.is_authenticated() || !same_account {
                debug!(user_id = user.id, "Session changed while fetching profile, not storing it");
                return Ok(user);
            }
            session.user = Some(user.clone());
            session.clone()
        };
        self.store.set(&session).await?;

        self.set_state(AuthState::Authenticated {
            user: Some(user.clone()),
        })
        .await;
        Ok(user)
    }

    /// Snapshot of the current session
    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.session
            .read()
            .await
            .access_token
            .clone()
            .filter(|t| !t.is_empty())
    }

    pub async fn state(&self) -> AuthState {
        self.state.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.read().await.is_authenticated()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Resolve a path against the API base URL
    pub fn url(&self, path: &str) -> ApiResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::config(format!("Invalid request path '{}': {}", path, e)))
    }

    async fn send(
        &self,
        method: Method,
        url: &Url,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> ApiResult<SimpleHttpResponse> {
        let body = body.map(Value::to_string);
        self.http
            .request(method, url.as_str(), json_headers(token)?, body)
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "Request failed without a response");
                ApiError::network(e)
            })
    }

    /// Get a usable token after a 401 made with `stale`.
    ///
    /// Waiters queue on the gate. If the token was replaced while waiting,
    /// the new one is reused; if the session was cleared, the waiter fails
    /// without another refresh call.
    async fn refresh_after_unauthorized(&self, stale: Option<&str>) -> ApiResult<String> {
        let _gate = self.refresh_gate.lock().await;

        let current = self.access_token().await;
        match (current, stale) {
            (Some(current), stale) if Some(current.as_str()) != stale => {
                debug!("Access token already replaced, reusing it");
                Ok(current)
            }
            (None, Some(_)) => Err(ApiError::auth(
                "Session expired, please log in again",
            )),
            _ => self.refresh_locked().await,
        }
    }

    /// Perform a refresh. The caller holds the refresh gate.
    async fn refresh_locked(&self) -> ApiResult<String> {
        let refresh_token = self.session.read().await.refresh_token.clone();
        let Some(refresh_token) = refresh_token.filter(|t| !t.is_empty()) else {
            return Err(self.fail_session("No refresh token available").await);
        };

        self.set_state(AuthState::RefreshInFlight).await;

        let exchanged = self.exchange_refresh_token(&refresh_token).await;

        // Only the session that owned `refresh_token` may be updated or cleared
        if self.session.read().await.refresh_token.as_deref() != Some(refresh_token.as_str()) {
            warn!("Session replaced during refresh, discarding the result");
            return Err(ApiError::auth("Session changed while refreshing, please retry"));
        }

        let tokens = match exchanged {
            Ok(tokens) => tokens,
            Err(e) => return Err(self.fail_session(&e.message).await),
        };

        let session = {
            let mut session = self.session.write().await;
            session.access_token = Some(tokens.access.clone());
            if let Some(rotated) = tokens.refresh {
                session.refresh_token = Some(rotated);
            }
            session.clone()
        };

        if let Err(e) = self.store.set(&session).await {
            warn!(error = %e, "Failed to persist refreshed token, keeping it in memory");
        }

        info!("Access token refreshed");
        self.set_state(AuthState::Authenticated { user: session.user }).await;
        self.publish(SessionEvent::TokenRefreshed { at: Utc::now() });

        Ok(tokens.access)
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> ApiResult<RefreshResponse> {
        let url = self.url(&self.api.refresh_path)?;
        let body = json!({ "refresh": refresh_token }).to_string();
        let response = self
            .http
            .post(url.as_str(), json_headers(None)?, body)
            .await
            .map_err(ApiError::network)?;

        let response = ensure_success(response)?;
        response.json().map_err(ApiError::decode)
    }

    async fn fetch_profile(&self, access_token: &str) -> ApiResult<User> {
        let url = self.url(&self.api.profile_path)?;
        let response = self
            .http
            .get(url.as_str(), json_headers(Some(access_token))?)
            .await
            .map_err(ApiError::network)?;

        let response = ensure_success(response)?;
        response.json().map_err(ApiError::decode)
    }

    /// Drop the session after an unrecoverable auth failure and send the
    /// user to the login screen
    async fn fail_session(&self, reason: &str) -> ApiError {
        warn!(reason = %reason, "Session could not be refreshed, signing out");

        *self.session.write().await = Session::default();
        if let Err(e) = self.store.clear().await {
            error!(error = %e, "Failed to clear stored session");
        }

        self.set_state(AuthState::Failed {
            reason: reason.to_string(),
        })
        .await;
        self.publish(SessionEvent::SessionExpired {
            reason: reason.to_string(),
        });
        self.navigator.navigate(Destination::Login, reason);

        ApiError::auth(format!("Session expired, please log in again ({})", reason))
    }

    async fn set_state(&self, state: AuthState) {
        let changed = {
            let mut current = self.state.write().await;
            let changed = *current != state;
            *current = state.clone();
            changed
        };
        if changed {
            debug!(state = ?state, "Auth state changed");
            self.publish(SessionEvent::StateChanged { state });
        }
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Request headers; a token that cannot travel in a header is rejected here
/// rather than surfacing as a transport failure
fn json_headers(token: Option<&str>) -> ApiResult<HashMap<String, String>> {
    let mut headers = HashMap::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    headers.insert("Accept".to_string(), "application/json".to_string());
    if let Some(token) = token {
        let bearer = format!("Bearer {}", token);
        HeaderValue::from_str(&bearer)
            .map_err(|e| ApiError::storage(format!("access token is not a valid header value ({})", e)))?;
        headers.insert("Authorization".to_string(), bearer);
    }
    Ok(headers)
}

fn ensure_success(response: SimpleHttpResponse) -> ApiResult<SimpleHttpResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ApiError::from_response(&response))
    }
}

/// Rejected credentials surface as an auth error carrying the backend's text
fn login_error(response: &SimpleHttpResponse) -> ApiError {
    let normalized = ApiError::from_response(response);
    match response.status().as_u16() {
        400 | 401 => {
            let message = normalized
                .data
                .as_ref()
                .and_then(extract_message)
                .unwrap_or_else(|| INVALID_CREDENTIALS.to_string());
            let mut error = ApiError::auth(message).with_status(response.status().as_u16());
            error.data = normalized.data;
            error
        }
        _ => normalized,
    }
}
