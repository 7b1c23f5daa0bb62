//! Constants used throughout the application
//!
//! This module centralizes storage keys, backend field names, defaults and
//! user-facing messages to improve maintainability and consistency.

use std::time::Duration;

// Storage keys
pub const KEY_SESSION_TOKEN: &str = "session.token";
pub const KEY_SESSION_USER_ID: &str = "session.user_id";
pub const KEY_IMAGE_ASSOCIATIONS: &str = "images.associations";

// API defaults
pub const DEFAULT_API_BASE_URL: &str = "https://todo-list.dobleb.cl";
pub const API_URL_ENV: &str = "TODOSYNC_API_URL";
pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_LIST_TIMEOUT_SECS: u64 = 7;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 30;

// Retry defaults
pub const DEFAULT_AUTH_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_AUTH_RETRY_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_LIST_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_LIST_BACKOFF_STEP: Duration = Duration::from_millis(500);

// Upload defaults
/// Hard ceiling for an uploaded image, in bytes
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;
pub const FIRST_PASS_WIDTH: u32 = 800;
pub const FIRST_PASS_QUALITY: f32 = 0.4;
pub const SECOND_PASS_WIDTH: u32 = 640;
pub const SECOND_PASS_QUALITY: f32 = 0.3;
pub const UPLOAD_PRIMARY_FIELD: &str = "image";
pub const UPLOAD_FALLBACK_FIELD: &str = "file";
pub const DEFAULT_UPLOAD_NAME: &str = "photo.jpg";
pub const DEFAULT_UPLOAD_MIME: &str = "image/jpeg";

/// Hosts that serve media directly and must never be re-hosted
pub const DEFAULT_TRUSTED_MEDIA_MARKERS: &[&str] = &[".r2.dev"];

/// Field names under which the backend may echo a task's image, in priority order
pub const TASK_IMAGE_FIELDS: &[&str] = &["image", "imageUrl", "image_url", "photo", "photoUrl", "photoUri"];

/// Array-shaped attachment fields on a task record
pub const TASK_ATTACHMENT_FIELDS: &[&str] = &["images", "attachments", "photos"];

/// Keys checked on each object inside an attachment array
pub const ATTACHMENT_URL_KEYS: &[&str] = &["url", "imageUrl", "path", "location"];

// Logging
pub const LOG_BUFFER_CAPACITY: usize = 500;
pub const LOG_FILE_NAME: &str = "todosync.log";

// Advisory messages
pub const ADVISORY_IMAGE_TOO_LARGE: &str = "⚠️ Image exceeds the allowed size. The task was saved without an image.";
pub const ADVISORY_IMAGE_NETWORK: &str = "⚠️ Network error while uploading the image. The task was saved without an image.";
pub const ADVISORY_IMAGE_SERVER: &str = "⚠️ The server rejected the image. The task was saved without an image.";
pub const ADVISORY_IMAGE_OTHER: &str = "⚠️ The image could not be uploaded. The task was saved without an image.";

// Success Messages
pub const SUCCESS_TASK_CREATED: &str = "✅ Task created";
pub const SUCCESS_TASK_DELETED: &str = "✅ Task deleted";
pub const SUCCESS_TASK_UPDATED: &str = "✅ Task updated";
pub const SUCCESS_LOGGED_IN: &str = "✅ Logged in";
pub const SUCCESS_REGISTERED: &str = "✅ Account created";
pub const SUCCESS_LOGGED_OUT: &str = "✅ Logged out";

// Error Messages
pub const ERROR_SESSION_EXPIRED: &str = "❌ Session expired. Log in again to continue.";
pub const ERROR_TASK_CREATE_FAILED: &str = "❌ Failed to create task";
pub const ERROR_TASK_DELETE_FAILED: &str = "❌ Failed to delete task";
pub const ERROR_TASK_UPDATE_FAILED: &str = "❌ Failed to update task";
pub const ERROR_TASK_LOAD_FAILED: &str = "❌ Failed to load tasks";

// UI Messages
pub const CONFIG_GENERATED: &str = "✅ Generated default configuration file";
