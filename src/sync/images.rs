//! Task image resolution and the local image association cache.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::backend::Todo;
use crate::constants::{ATTACHMENT_URL_KEYS, KEY_IMAGE_ASSOCIATIONS, TASK_ATTACHMENT_FIELDS, TASK_IMAGE_FIELDS};
use crate::storage::KeyValueStore;

/// Where a task's displayed image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImageOrigin {
    /// A scalar image field on the record
    Backend,
    /// An entry of an array-shaped attachment field
    Attachment,
    /// The local association cache
    Cache,
}

/// Persisted map from task id to the image URL uploaded for it.
///
/// Only consulted when the backend record carries no image of its own.
pub struct ImageAssociationCache {
    store: Arc<dyn KeyValueStore>,
    // Serializes read-modify-write cycles on the stored map
    write_lock: Mutex<()>,
}

impl ImageAssociationCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// All associations. A corrupt stored map reads as empty.
    pub async fn snapshot(&self) -> Result<BTreeMap<String, String>> {
        let raw = self
            .store
            .get(KEY_IMAGE_ASSOCIATIONS)
            .await
            .context("Failed to read image associations")?;

        let Some(raw) = raw else {
            return Ok(BTreeMap::new());
        };
        match serde_json::from_str(&raw) {
            Ok(map) => Ok(map),
            Err(e) => {
                warn!("⚠️ Ignoring corrupt image association map: {e}");
                Ok(BTreeMap::new())
            }
        }
    }

    pub async fn get(&self, task_id: &str) -> Result<Option<String>> {
        Ok(self.snapshot().await?.remove(task_id))
    }

    /// Remember `url` as the image of `task_id`, replacing any previous entry.
    pub async fn associate(&self, task_id: &str, url: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.snapshot().await?;
        map.insert(task_id.to_string(), url.to_string());
        self.save(&map).await?;
        debug!("🖼️ Cached image for task {task_id}");
        Ok(())
    }

    /// Forget the image of `task_id`. Returns whether an entry existed.
    pub async fn remove(&self, task_id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.snapshot().await?;
        if map.remove(task_id).is_none() {
            return Ok(false);
        }
        self.save(&map).await?;
        debug!("🖼️ Dropped cached image for task {task_id}");
        Ok(true)
    }

    async fn save(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let raw = serde_json::to_string(map).context("Failed to encode image associations")?;
        self.store
            .set(KEY_IMAGE_ASSOCIATIONS, &raw)
            .await
            .context("Failed to write image associations")
    }
}

/// Image the backend itself reports for a record, if any.
///
/// Scalar image fields are checked first, in [`TASK_IMAGE_FIELDS`] order,
/// then array-shaped attachment fields.
pub fn backend_image(todo: &Todo) -> Option<(String, ImageOrigin)> {
    TASK_IMAGE_FIELDS
        .iter()
        .find_map(|name| todo.field(name).and_then(non_blank))
        .map(|url| (url, ImageOrigin::Backend))
        .or_else(|| {
            TASK_ATTACHMENT_FIELDS
                .iter()
                .find_map(|name| todo.field(name).and_then(first_attachment))
                .map(|url| (url, ImageOrigin::Attachment))
        })
}

/// Resolve the image to display: backend fields win, the cached URL only
/// fills a gap.
pub fn resolve_image(todo: &Todo, cached: Option<&str>) -> Option<(String, ImageOrigin)> {
    backend_image(todo).or_else(|| {
        cached
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| (url.to_string(), ImageOrigin::Cache))
    })
}

fn first_attachment(value: &Value) -> Option<String> {
    value.as_array()?.iter().find_map(|item| match item {
        Value::String(_) => non_blank(item),
        Value::Object(map) => ATTACHMENT_URL_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(non_blank)),
        _ => None,
    })
}

fn non_blank(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
