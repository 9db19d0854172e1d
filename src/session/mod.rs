//! Session store
//!
//! Holds the bearer token and the user it belongs to, mirrored into durable
//! storage under two keys so a restart does not force a new login.
//! [`SessionStore`] is the only writer; everything else reads through a
//! [`SessionView`].

pub mod redis;
pub mod storage;

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    config::{SessionBackend, SessionConfig},
    error::AppResult,
    models::{EntityId, User},
};

pub use self::redis::RedisStorage;
pub use storage::{FileStorage, MemoryStorage, SessionStorage};

/// Storage key of the bearer token
pub const TOKEN_KEY: &str = "token";
/// Storage key of the JSON-serialized user
pub const USER_KEY: &str = "user";

/// In-memory session state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<User>,
}

/// Open the storage backend named in the configuration
pub async fn open_storage(config: &SessionConfig) -> AppResult<Arc<dyn SessionStorage>> {
    Ok(match config.backend {
        SessionBackend::File => Arc::new(FileStorage::new(&config.path)),
        SessionBackend::Redis => {
            Arc::new(RedisStorage::new(&config.redis_url, &config.redis_prefix).await?)
        }
        SessionBackend::Memory => Arc::new(MemoryStorage::new()),
    })
}

/// Writable session handle
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    state: Arc<RwLock<Session>>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            storage,
            state: Arc::new(RwLock::new(Session::default())),
        }
    }

    /// Read-only handle sharing this store's state
    pub fn view(&self) -> SessionView {
        SessionView {
            state: self.state.clone(),
        }
    }

    pub async fn get_token(&self) -> Option<String> {
        self.state.read().await.token.clone()
    }

    pub async fn get_user(&self) -> Option<User> {
        self.state.read().await.user.clone()
    }

    /// Persist both keys, then publish the session in memory
    pub async fn set_session(&self, token: String, user: User) -> AppResult<()> {
        let serialized = serde_json::to_string(&user)?;
        self.storage.set(TOKEN_KEY, &token).await?;
        self.storage.set(USER_KEY, &serialized).await?;

        *self.state.write().await = Session {
            token: Some(token),
            user: Some(user),
        };
        Ok(())
    }

    /// Reset memory, then remove both keys from storage.
    ///
    /// The in-memory session is gone even when storage fails.
    pub async fn clear(&self) -> AppResult<()> {
        *self.state.write().await = Session::default();

        let token = self.storage.remove(TOKEN_KEY).await;
        let user = self.storage.remove(USER_KEY).await;
        token.and(user)
    }

    /// Token persisted by an earlier run
    pub async fn stored_token(&self) -> AppResult<Option<String>> {
        self.storage.get(TOKEN_KEY).await
    }

    /// User persisted by an earlier run
    pub async fn stored_user(&self) -> AppResult<Option<User>> {
        match self.storage.get(USER_KEY).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Publish an already-persisted session without rewriting storage
    pub(crate) async fn adopt(&self, token: String, user: User) {
        *self.state.write().await = Session {
            token: Some(token),
            user: Some(user),
        };
    }
}

/// Read-only session handle
#[derive(Clone)]
pub struct SessionView {
    state: Arc<RwLock<Session>>,
}

impl SessionView {
    pub async fn token(&self) -> Option<String> {
        self.state.read().await.token.clone()
    }

    pub async fn user(&self) -> Option<User> {
        self.state.read().await.user.clone()
    }

    pub async fn user_id(&self) -> Option<EntityId> {
        self.state.read().await.user.as_ref().map(|u| u.id.clone())
    }

    pub async fn is_authenticated(&self) -> bool {
        let state = self.state.read().await;
        state.token.is_some() && state.user.is_some()
    }

    pub async fn snapshot(&self) -> Session {
        self.state.read().await.clone()
    }
}
