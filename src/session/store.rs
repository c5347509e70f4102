//! Persistence for the session record.
//!
//! The manager is the only writer; everything else reads through it.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::session::model::{Session, User};

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Storage key for the serialized user profile
pub const USER_KEY: &str = "user";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("persisted session is corrupt: {0}")]
    Corrupt(String),

    #[error("session store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        ApiError::storage(error)
    }
}

/// Injected persistence for the session record
#[async_trait]
pub trait SessionStore: Send + Sync + Debug {
    /// Load the persisted session, `None` when nothing is stored
    async fn get(&self) -> Result<Option<Session>, StoreError>;

    /// Replace the persisted session
    async fn set(&self, session: &Session) -> Result<(), StoreError>;

    /// Remove every persisted session field
    async fn clear(&self) -> Result<(), StoreError>;
}

/// In-process store, for tests and embedders that do not persist
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: RwLock<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a session already stored
    pub fn with_session(session: Session) -> Self {
        Self {
            session: RwLock::new(Some(session)),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self) -> Result<Option<Session>, StoreError> {
        Ok(self.session.read().await.clone())
    }

    async fn set(&self, session: &Session) -> Result<(), StoreError> {
        *self.session.write().await = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.session.write().await = None;
        Ok(())
    }
}

/// File-backed store laid out like browser local storage: a flat JSON object
/// of string values, with the user profile kept as a JSON string.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn decode(raw: &str) -> Result<Option<Session>, StoreError> {
        let entries: BTreeMap<String, String> =
            serde_json::from_str(raw).map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let user = match entries.get(USER_KEY) {
            Some(user_json) => Some(
                serde_json::from_str::<User>(user_json)
                    .map_err(|e| StoreError::Corrupt(format!("{}: {}", USER_KEY, e)))?,
            ),
            None => None,
        };

        let session = Session {
            access_token: entries.get(ACCESS_TOKEN_KEY).cloned(),
            refresh_token: entries.get(REFRESH_TOKEN_KEY).cloned(),
            user,
        };

        Ok((!session.is_empty()).then_some(session))
    }

    fn encode(session: &Session) -> Result<String, StoreError> {
        let mut entries = BTreeMap::new();
        if let Some(access) = &session.access_token {
            entries.insert(ACCESS_TOKEN_KEY, access.clone());
        }
        if let Some(refresh) = &session.refresh_token {
            entries.insert(REFRESH_TOKEN_KEY, refresh.clone());
        }
        if let Some(user) = &session.user {
            entries.insert(USER_KEY, serde_json::to_string(user)?);
        }
        Ok(serde_json::to_string_pretty(&entries)?)
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self) -> Result<Option<Session>, StoreError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No persisted session");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if raw.trim().is_empty() {
            return Ok(None);
        }
        Self::decode(&raw)
    }

    async fn set(&self, session: &Session) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write then rename so a crash never leaves a half-written file
        let contents = Self::encode(session)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), "Session persisted");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "Persisted session removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
