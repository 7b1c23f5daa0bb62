//! Authenticated session state.
//!
//! A [`SessionContext`] owns the bearer credential and current user id for
//! the whole process. It is read lazily from durable storage the first time
//! anyone asks for it, and kept in sync with storage on login and logout.

use std::sync::Arc;

use log::{debug, info};
use tokio::sync::{OnceCell, RwLock};

use crate::backend::ApiError;
use crate::constants::{KEY_SESSION_TOKEN, KEY_SESSION_USER_ID};
use crate::storage::KeyValueStore;

/// Bearer credential plus the user it belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user_id: Option<String>,
}

pub struct SessionContext {
    store: Arc<dyn KeyValueStore>,
    current: RwLock<Option<Session>>,
    initialized: OnceCell<()>,
}

impl SessionContext {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            current: RwLock::new(None),
            initialized: OnceCell::new(),
        }
    }

    /// Load the persisted session once per process. Later calls, including
    /// concurrent ones, return without touching storage. A failed read leaves
    /// the context uninitialized so the next call tries again.
    pub async fn ensure_initialized(&self) -> Result<(), ApiError> {
        self.initialized
            .get_or_try_init(|| async {
                let token = self.store.get(KEY_SESSION_TOKEN).await.map_err(ApiError::storage)?;
                let user_id = self.store.get(KEY_SESSION_USER_ID).await.map_err(ApiError::storage)?;

                let mut current = self.current.write().await;
                // A login that finished before initialization wins over storage
                if current.is_none() {
                    *current = token.map(|token| Session { token, user_id });
                }
                debug!("🔑 Session initialized (authenticated: {})", current.is_some());
                Ok::<(), ApiError>(())
            })
            .await?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }

    /// Current session, if any.
    pub async fn current(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    /// Current bearer token, if any.
    pub async fn token(&self) -> Option<String> {
        self.current.read().await.as_ref().map(|s| s.token.clone())
    }

    pub async fn user_id(&self) -> Option<String> {
        self.current.read().await.as_ref().and_then(|s| s.user_id.clone())
    }

    /// Install a fresh session and persist it.
    pub async fn establish(&self, session: Session) -> Result<(), ApiError> {
        self.store
            .set(KEY_SESSION_TOKEN, &session.token)
            .await
            .map_err(ApiError::storage)?;
        match &session.user_id {
            Some(user_id) => self.store.set(KEY_SESSION_USER_ID, user_id).await,
            None => self.store.remove(KEY_SESSION_USER_ID).await,
        }
        .map_err(ApiError::storage)?;

        info!("🔑 Session established for user {}", session.user_id.as_deref().unwrap_or("<unknown>"));
        *self.current.write().await = Some(session);
        Ok(())
    }

    /// Forget the session in memory and in storage.
    pub async fn clear(&self) -> Result<(), ApiError> {
        *self.current.write().await = None;
        self.store.remove(KEY_SESSION_TOKEN).await.map_err(ApiError::storage)?;
        self.store.remove(KEY_SESSION_USER_ID).await.map_err(ApiError::storage)?;
        info!("🔒 Session cleared");
        Ok(())
    }
}
