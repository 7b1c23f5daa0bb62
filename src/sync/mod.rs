//! Task synchronization service for the todosync client.
//!
//! This module provides [`TaskSyncService`], the façade the front end talks
//! to. It owns the session context, the API client, the image uploader and
//! the local image association cache, and reconciles task images between
//! them:
//! - images the backend drops on create are re-sent once, then cached
//!   locally under the task id
//! - reads fill a missing image from the cache, never overriding one the
//!   backend supplied
//! - image failures degrade a creation to "task without image" with an
//!   advisory instead of failing it

pub mod images;
pub mod tasks;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use serde::Serialize;

use crate::backend::client::Timeouts;
use crate::backend::retry::RetryPolicies;
use crate::backend::{ApiClient, ApiError, HttpTransport, Location, ReqwestTransport, User};
use crate::config::Config;
use crate::constants::{
    ADVISORY_IMAGE_NETWORK, ADVISORY_IMAGE_OTHER, ADVISORY_IMAGE_SERVER, ADVISORY_IMAGE_TOO_LARGE,
    DEFAULT_API_BASE_URL, DEFAULT_TRUSTED_MEDIA_MARKERS,
};
use crate::session::{Session, SessionContext};
use crate::storage::{KeyValueStore, LocalStorage};
use crate::upload::{ImageReducer, ImageSource, ImageUploader, JpegReducer, UploadSettings};
use crate::utils::url::ImageUrlNormalizer;

pub use images::{ImageAssociationCache, ImageOrigin};

/// A task as handed to the front end, with its image resolved and
/// normalized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub image: Option<String>,
    pub image_origin: Option<ImageOrigin>,
    pub location: Option<Location>,
    pub completed: bool,
    pub created_at: Option<String>,
    pub user_id: Option<String>,
}

/// Input of [`TaskSyncService::create_task`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub photo: Option<ImageSource>,
    pub location: Option<Location>,
}

/// Steps a task creation went through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateStage {
    ReducingImage,
    Uploading,
    CreatingRecord,
    ReconcilingRead,
    AssociatingCache,
    Done,
}

/// Why a task was saved without its image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageAdvisory {
    /// Over the size ceiling after reduction, or rejected with HTTP 413
    Oversized,
    /// No response from the server
    Network,
    Server { status: u16 },
    Other,
}

impl ImageAdvisory {
    pub fn from_error(err: &ApiError) -> Self {
        match err {
            ApiError::PayloadTooLarge { .. } => ImageAdvisory::Oversized,
            e if e.is_network() => ImageAdvisory::Network,
            ApiError::Server { status, .. } => ImageAdvisory::Server { status: *status },
            _ => ImageAdvisory::Other,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            ImageAdvisory::Oversized => ADVISORY_IMAGE_TOO_LARGE,
            ImageAdvisory::Network => ADVISORY_IMAGE_NETWORK,
            ImageAdvisory::Server { .. } => ADVISORY_IMAGE_SERVER,
            ImageAdvisory::Other => ADVISORY_IMAGE_OTHER,
        }
    }
}

/// Result of a task creation.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOutcome {
    pub task: Task,
    /// Set when a photo was given but the task was saved without it
    pub advisory: Option<ImageAdvisory>,
    pub stages: Vec<CreateStage>,
}

/// Tunables of a [`TaskSyncService`].
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub base_url: String,
    pub trusted_media_markers: Vec<String>,
    pub timeouts: Timeouts,
    pub retry: RetryPolicies,
    pub upload: UploadSettings,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            trusted_media_markers: DEFAULT_TRUSTED_MEDIA_MARKERS.iter().map(|m| (*m).to_string()).collect(),
            timeouts: Timeouts::default(),
            retry: RetryPolicies::default(),
            upload: UploadSettings::default(),
        }
    }
}

impl ServiceOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.api.base_url.clone(),
            trusted_media_markers: config.api.trusted_media_markers.clone(),
            timeouts: config.api.timeouts(),
            retry: config.retry.policies(),
            upload: config.upload.settings(),
        }
    }
}

/// Façade over session management, task CRUD and image reconciliation.
pub struct TaskSyncService {
    session: Arc<SessionContext>,
    api: Arc<ApiClient>,
    uploader: ImageUploader,
    cache: ImageAssociationCache,
    normalizer: ImageUrlNormalizer,
}

impl TaskSyncService {
    /// Assemble a service from its collaborators.
    ///
    /// The store holds both the session and the image associations.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        store: Arc<dyn KeyValueStore>,
        reducer: Arc<dyn ImageReducer>,
        options: ServiceOptions,
    ) -> Self {
        let session = Arc::new(SessionContext::new(Arc::clone(&store)));
        let api = Arc::new(ApiClient::with_policies(
            transport,
            Arc::clone(&session),
            options.timeouts,
            options.retry,
        ));
        let uploader = ImageUploader::new(Arc::clone(&api), reducer, options.upload);
        let normalizer = ImageUrlNormalizer::with_trusted_markers(&options.base_url, options.trusted_media_markers);

        Self {
            session,
            api,
            uploader,
            cache: ImageAssociationCache::new(store),
            normalizer,
        }
    }

    /// Build the production service: `reqwest` transport, SQLite storage
    /// and JPEG reduction.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.api.base_url).context("Failed to create HTTP transport")?;
        let db_path = config.database_path()?;
        let storage = LocalStorage::open(&db_path).await?;

        Ok(Self::new(
            Arc::new(transport),
            Arc::new(storage),
            Arc::new(JpegReducer),
            ServiceOptions::from_config(config),
        ))
    }

    pub fn api(&self) -> &Arc<ApiClient> {
        &self.api
    }

    pub fn image_cache(&self) -> &ImageAssociationCache {
        &self.cache
    }

    pub fn normalizer(&self) -> &ImageUrlNormalizer {
        &self.normalizer
    }

    /// Load the persisted session once. Safe to call repeatedly.
    pub async fn ensure_initialized(&self) -> Result<(), ApiError> {
        self.session.ensure_initialized().await
    }

    pub async fn current_session(&self) -> Result<Option<Session>, ApiError> {
        self.ensure_initialized().await?;
        Ok(self.session.current().await)
    }

    pub async fn is_authenticated(&self) -> Result<bool, ApiError> {
        Ok(self.current_session().await?.is_some())
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<User, ApiError> {
        self.ensure_initialized().await?;
        Ok(self.api.register(email, password).await?.user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
        self.ensure_initialized().await?;
        Ok(self.api.login(email, password).await?.user)
    }

    /// Drop the session in memory and in durable storage.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.ensure_initialized().await?;
        self.session.clear().await?;
        info!("👋 Logged out");
        Ok(())
    }
}
