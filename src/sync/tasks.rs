use std::collections::BTreeMap;

use log::{error, info, warn};
use serde_json::{Map, Value};

use super::images::{backend_image, resolve_image};
use super::{CreateOutcome, CreateStage, ImageAdvisory, NewTask, Task, TaskSyncService};
use crate::backend::{ApiError, NewTodo, Todo, TodoPatch};
use crate::constants::TASK_IMAGE_FIELDS;

impl TaskSyncService {
    /// Fetch every task, filling missing images from the association cache.
    ///
    /// A cache that cannot be read only costs the cached images; the
    /// listing itself still succeeds.
    pub async fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        self.ensure_initialized().await?;
        let todos = self.api.list_todos().await?;

        let cached = match self.cache.snapshot().await {
            Ok(map) => map,
            Err(e) => {
                warn!("⚠️ Image association cache unavailable: {e:#}");
                BTreeMap::new()
            }
        };

        Ok(todos
            .into_iter()
            .map(|todo| {
                let hit = cached.get(&todo.id).map(String::as_str);
                self.to_task(todo, hit)
            })
            .collect())
    }

    pub async fn get_task(&self, id: &str) -> Result<Task, ApiError> {
        self.ensure_initialized().await?;
        let todo = self.api.get_todo(id).await?;
        Ok(self.resolve(todo).await)
    }

    /// Create a task, uploading its photo first when one is given.
    ///
    /// Image failures never fail the creation: the task is saved without an
    /// image and the outcome carries an advisory. The exception is a missing
    /// session, which fails with [`ApiError::SessionExpired`] before anything
    /// is sent.
    pub async fn create_task(&self, new_task: NewTask) -> Result<CreateOutcome, ApiError> {
        let title = new_task.title.trim();
        if title.is_empty() {
            return Err(ApiError::InvalidInput("task title cannot be empty".to_string()));
        }
        self.ensure_initialized().await?;

        let mut stages = Vec::new();
        let mut advisory = None;
        let mut uploaded = None;

        if let Some(photo) = &new_task.photo {
            stages.push(CreateStage::ReducingImage);
            stages.push(CreateStage::Uploading);
            match self.uploader.upload(photo).await {
                // Stored absolute so every reader of the record can load it
                Ok(result) => uploaded = self.normalizer.normalize(Some(&result.resolved_url)),
                Err(ApiError::SessionExpired) => return Err(ApiError::SessionExpired),
                Err(e) => {
                    let kind = ImageAdvisory::from_error(&e);
                    warn!("⚠️ Saving task without image ({kind:?}): {e}");
                    advisory = Some(kind);
                }
            }
        }

        stages.push(CreateStage::CreatingRecord);
        let todo = self
            .api
            .create_todo(&NewTodo {
                title: title.to_string(),
                image: uploaded.clone(),
                location: new_task.location,
            })
            .await
            .inspect_err(|e| error!("❌ Failed to create task: {e}"))?;
        info!("✅ Created task {}", todo.id);

        let mut todo = todo;
        let mut cached = None;
        if let Some(url) = uploaded {
            if backend_image(&todo).is_none() {
                stages.push(CreateStage::ReconcilingRead);
                todo = self.reattach_image(todo, &url).await;

                if backend_image(&todo).is_none() {
                    stages.push(CreateStage::AssociatingCache);
                    match self.cache.associate(&todo.id, &url).await {
                        Ok(()) => info!("🖼️ Backend dropped the image of task {}; cached locally", todo.id),
                        Err(e) => warn!("⚠️ Failed to cache image for task {}: {e:#}", todo.id),
                    }
                    cached = Some(url);
                }
            }
        }
        stages.push(CreateStage::Done);

        Ok(CreateOutcome {
            task: self.to_task(todo, cached.as_deref()),
            advisory,
            stages,
        })
    }

    /// Apply a partial update.
    pub async fn update_task(&self, id: &str, patch: &TodoPatch) -> Result<Task, ApiError> {
        self.ensure_initialized().await?;
        let todo = self.api.update_todo(id, patch).await?;
        info!("✅ Updated task {id}");
        Ok(self.resolve(todo).await)
    }

    /// Delete a task and its cached image association.
    pub async fn delete_task(&self, id: &str) -> Result<(), ApiError> {
        self.ensure_initialized().await?;
        self.api.delete_todo(id).await?;
        if let Err(e) = self.cache.remove(id).await {
            warn!("⚠️ Failed to drop cached image for task {id}: {e:#}");
        }
        info!("🗑️ Deleted task {id}");
        Ok(())
    }

    /// Flip the completion state. Read-modify-write: a concurrent toggle
    /// elsewhere can be lost.
    pub async fn toggle_complete(&self, id: &str) -> Result<Task, ApiError> {
        self.ensure_initialized().await?;
        let current = self.api.get_todo(id).await?;
        let todo = self.api.toggle_todo(id, !current.completed).await?;
        info!("✅ Task {id} marked {}", if todo.completed { "done" } else { "open" });
        Ok(self.resolve(todo).await)
    }

    /// Send the image under every known field name, then re-read the record.
    /// Failures are logged and leave the best record seen so far.
    async fn reattach_image(&self, todo: Todo, url: &str) -> Todo {
        let body: Map<String, Value> = TASK_IMAGE_FIELDS
            .iter()
            .map(|name| (name.to_string(), Value::String(url.to_string())))
            .collect();

        let mut best = todo;
        match self.api.update_todo_raw(&best.id, Value::Object(body)).await {
            Ok(updated) => {
                if backend_image(&updated).is_some() {
                    return updated;
                }
            }
            Err(e) => warn!("⚠️ Corrective image update for task {} failed: {e}", best.id),
        }

        match self.api.get_todo(&best.id).await {
            Ok(reread) => best = reread,
            Err(e) => warn!("⚠️ Re-reading task {} failed: {e}", best.id),
        }
        best
    }

    /// Convert a record, consulting the cache for its image.
    async fn resolve(&self, todo: Todo) -> Task {
        let cached = match self.cache.get(&todo.id).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!("⚠️ Image association cache unavailable: {e:#}");
                None
            }
        };
        self.to_task(todo, cached.as_deref())
    }

    fn to_task(&self, todo: Todo, cached: Option<&str>) -> Task {
        let (image, image_origin) = match resolve_image(&todo, cached) {
            Some((url, origin)) => (self.normalizer.normalize(Some(&url)), Some(origin)),
            None => (None, None),
        };

        Task {
            id: todo.id,
            title: todo.title,
            image,
            image_origin,
            location: todo.location,
            completed: todo.completed,
            created_at: todo.created_at,
            user_id: todo.user_id,
        }
    }
}
