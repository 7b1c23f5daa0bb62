//! Remote task service abstraction layer.
//!
//! This module defines the wire types exchanged with the remote todo service,
//! the error taxonomy shared by every network-facing component, and the
//! [`HttpTransport`] seam the [`client::ApiClient`] talks through.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod client;
pub mod retry;
pub mod transport;

pub use client::ApiClient;
pub use retry::{Backoff, RetryOn, RetryPolicy};
pub use transport::ReqwestTransport;

/// Error types for remote operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// No response was received (DNS, refused connection, broken stream)
    #[error("Network error: {0}")]
    Network(String),

    /// No response was received before the deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Local size ceiling exceeded or HTTP 413
    #[error("Payload too large: {message}")]
    PayloadTooLarge { message: String, status: Option<u16> },

    #[error("Unexpected response: {message}. Raw body: {body}")]
    Parse { message: String, body: String },

    #[error("Session expired, please log in again")]
    SessionExpired,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Image error: {0}")]
    Image(String),
}

impl ApiError {
    /// True when the request never produced an HTTP response.
    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::Timeout(_))
    }

    pub fn is_payload_too_large(&self) -> bool {
        matches!(self, ApiError::PayloadTooLarge { .. })
    }

    /// HTTP status carried by the error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server { status, .. } => Some(*status),
            ApiError::PayloadTooLarge { status, .. } => *status,
            _ => None,
        }
    }

    pub(crate) fn storage(err: anyhow::Error) -> Self {
        ApiError::Storage(format!("{err:#}"))
    }
}

/// Geocoordinate attached to a task.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Account returned by the auth endpoints.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl<'de> Deserialize<'de> for User {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;
        Ok(User {
            id: take_id(&mut fields).ok_or_else(|| <D::Error as de::Error>::missing_field("id"))?,
            email: take_string(&mut fields, &["email"]).ok_or_else(|| <D::Error as de::Error>::missing_field("email"))?,
            created_at: take_string(&mut fields, &["createdAt", "created_at"]),
            updated_at: take_string(&mut fields, &["updatedAt", "updated_at"]),
        })
    }
}

/// Payload of `POST /auth/register` and `POST /auth/login`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

/// A task record as the remote service returns it.
///
/// Image-bearing fields are not contractually named, so everything the
/// service sends beyond the stable fields is kept in `extra`. Decoding is
/// lenient: `id` wins over `_id` when both are present, camelCase wins over
/// snake_case, and `null` reads as the field's default.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: String,
    pub title: String,
    pub completed: bool,
    pub user_id: Option<String>,
    pub location: Option<Location>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl<'de> Deserialize<'de> for Todo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;
        let id = take_id(&mut fields).ok_or_else(|| <D::Error as de::Error>::missing_field("id"))?;
        let location = match take_first(&mut fields, &["location"]) {
            Some(value) => Some(serde_json::from_value(value).map_err(<D::Error as de::Error>::custom)?),
            None => None,
        };

        Ok(Todo {
            id,
            title: take_string(&mut fields, &["title"]).unwrap_or_default(),
            completed: take_first(&mut fields, &["completed"])
                .and_then(|v| v.as_bool())
                .unwrap_or_default(),
            user_id: take_string(&mut fields, &["userId", "user_id"]),
            location,
            created_at: take_string(&mut fields, &["createdAt", "created_at"]),
            updated_at: take_string(&mut fields, &["updatedAt", "updated_at"]),
            extra: fields,
        })
    }
}

/// Remove every spelling of a field and return the first non-null one.
fn take_first(fields: &mut Map<String, Value>, keys: &[&str]) -> Option<Value> {
    let mut found = None;
    for key in keys {
        if let Some(value) = fields.remove(*key) {
            if found.is_none() && !value.is_null() {
                found = Some(value);
            }
        }
    }
    found
}

fn take_string(fields: &mut Map<String, Value>, keys: &[&str]) -> Option<String> {
    match take_first(fields, keys)? {
        Value::String(s) => Some(s),
        _ => None,
    }
}

/// Record ids may arrive as strings or numbers.
fn take_id(fields: &mut Map<String, Value>) -> Option<String> {
    match take_first(fields, &["id", "_id"])? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl Todo {
    /// Look up a field the service sent outside the stable schema.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

/// Body of `POST /todos`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NewTodo {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// Partial body of `PATCH /todos/:id`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TodoPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// A file part plus its companion text fields.
#[derive(Clone, Debug, PartialEq)]
pub struct MultipartUpload {
    pub field_name: String,
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
    pub fields: Vec<(String, String)>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// Encoded by the HTTP library's multipart support
    Multipart(MultipartUpload),
    /// Encoded by hand and sent under a hard cancellation timer
    RawMultipart(MultipartUpload),
}

/// A request addressed relative to the API origin.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub bearer: Option<String>,
    pub body: RequestBody,
    pub timeout: Duration,
}

/// Any HTTP response, successful or not.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport that the client sends every request through.
///
/// Implementations return `Ok` for every response that arrived, whatever its
/// status, and reserve `Err` for network-class failures.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;
}
