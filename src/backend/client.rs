//! Resilient client for the remote todo service.
//!
//! [`ApiClient`] is the single point of contact with the remote service. It
//! attaches the session credential, applies per-operation timeouts and retry
//! policies, accepts payloads with or without a `data` envelope, and turns
//! every non-2xx response into a typed [`ApiError`].

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::retry::RetryPolicies;
use super::{
    ApiError, ApiRequest, ApiResponse, AuthResponse, HttpTransport, MultipartUpload, NewTodo, RequestBody,
    RetryPolicy, Todo, TodoPatch,
};
use crate::constants::{
    DEFAULT_AUTH_TIMEOUT_SECS, DEFAULT_LIST_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_UPLOAD_TIMEOUT_SECS,
};
use crate::session::{Session, SessionContext};

/// Per-operation request deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub auth: Duration,
    pub list: Duration,
    pub request: Duration,
    pub upload: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            auth: Duration::from_secs(DEFAULT_AUTH_TIMEOUT_SECS),
            list: Duration::from_secs(DEFAULT_LIST_TIMEOUT_SECS),
            request: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            upload: Duration::from_secs(DEFAULT_UPLOAD_TIMEOUT_SECS),
        }
    }
}

/// How a multipart upload body is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadEncoding {
    /// Through the HTTP library's multipart support
    Standard,
    /// Hand-built body under an explicit cancellation timer
    Raw,
}

/// Client for the remote todo service.
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    session: Arc<SessionContext>,
    timeouts: Timeouts,
    retry: RetryPolicies,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn HttpTransport>, session: Arc<SessionContext>) -> Self {
        Self::with_policies(transport, session, Timeouts::default(), RetryPolicies::default())
    }

    pub fn with_policies(
        transport: Arc<dyn HttpTransport>,
        session: Arc<SessionContext>,
        timeouts: Timeouts,
        retry: RetryPolicies,
    ) -> Self {
        Self {
            transport,
            session,
            timeouts,
            retry,
        }
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    pub fn auth_policy(&self) -> RetryPolicy {
        self.retry.auth
    }

    pub fn list_policy(&self) -> RetryPolicy {
        self.retry.list
    }

    /// Create an account and store the returned session.
    pub async fn register(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        self.authenticate("/auth/register", email, password).await
    }

    /// Log in and store the returned session.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        self.authenticate("/auth/login", email, password).await
    }

    async fn authenticate(&self, path: &str, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let auth: AuthResponse = self
            .retry
            .auth
            .run(path, |_| {
                let body = body.clone();
                async move {
                    let value = self
                        .call(Method::POST, path, RequestBody::Json(body), self.timeouts.auth, false)
                        .await?;
                    decode(value)
                }
            })
            .await?;

        self.session
            .establish(Session {
                token: auth.token.clone(),
                user_id: Some(auth.user.id.clone()),
            })
            .await?;
        info!("✅ Authenticated as {}", auth.user.email);
        Ok(auth)
    }

    /// Fetch every task of the current user.
    pub async fn list_todos(&self) -> Result<Vec<Todo>, ApiError> {
        let todos: Vec<Todo> = self
            .retry
            .list
            .run("GET /todos", |_| async move {
                let value = self
                    .call(Method::GET, "/todos", RequestBody::Empty, self.timeouts.list, true)
                    .await?;
                decode(value)
            })
            .await?;
        info!("✅ Fetched {} tasks from API", todos.len());
        Ok(todos)
    }

    pub async fn get_todo(&self, id: &str) -> Result<Todo, ApiError> {
        let value = self
            .call(Method::GET, &todo_path(id), RequestBody::Empty, self.timeouts.request, true)
            .await?;
        decode(value)
    }

    pub async fn create_todo(&self, todo: &NewTodo) -> Result<Todo, ApiError> {
        let value = self
            .call(Method::POST, "/todos", json_body(todo)?, self.timeouts.request, true)
            .await?;
        decode(value)
    }

    pub async fn update_todo(&self, id: &str, patch: &TodoPatch) -> Result<Todo, ApiError> {
        self.update_todo_raw(id, serde_json::to_value(patch).map_err(invalid_body)?)
            .await
    }

    /// PATCH with an arbitrary JSON body, for fields outside [`TodoPatch`].
    pub async fn update_todo_raw(&self, id: &str, body: Value) -> Result<Todo, ApiError> {
        let value = self
            .call(Method::PATCH, &todo_path(id), RequestBody::Json(body), self.timeouts.request, true)
            .await?;
        decode(value)
    }

    pub async fn toggle_todo(&self, id: &str, completed: bool) -> Result<Todo, ApiError> {
        let patch = TodoPatch {
            completed: Some(completed),
            ..Default::default()
        };
        self.update_todo(id, &patch).await
    }

    pub async fn delete_todo(&self, id: &str) -> Result<(), ApiError> {
        self.call(Method::DELETE, &todo_path(id), RequestBody::Empty, self.timeouts.request, true)
            .await?;
        Ok(())
    }

    /// Delete a stored image by owner and image id.
    pub async fn delete_image(&self, user_id: &str, image_id: &str) -> Result<(), ApiError> {
        let path = format!("/images/{user_id}/{image_id}");
        self.call(Method::DELETE, &path, RequestBody::Empty, self.timeouts.request, true)
            .await?;
        Ok(())
    }

    /// Post an image to `/images` in one attempt and return the decoded body.
    ///
    /// The body is returned as-is, without envelope unwrapping: the caller
    /// knows which shapes to look for. A non-JSON body decodes to a string.
    pub async fn upload_image(&self, upload: MultipartUpload, encoding: UploadEncoding) -> Result<Value, ApiError> {
        let body = match encoding {
            UploadEncoding::Standard => RequestBody::Multipart(upload),
            UploadEncoding::Raw => RequestBody::RawMultipart(upload),
        };
        let response = self
            .send(Method::POST, "/images", body, self.timeouts.upload, true)
            .await?;
        let text = check_status(response)?;
        Ok(parse_lenient(&text))
    }

    /// Send a request and decode its JSON payload, unwrapping `data`.
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        timeout: Duration,
        authenticated: bool,
    ) -> Result<Value, ApiError> {
        let response = self.send(method, path, body, timeout, authenticated).await?;
        let text = check_status(response)?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        let value: Value = serde_json::from_str(&text).map_err(|e| ApiError::Parse {
            message: format!("invalid JSON from {path}: {e}"),
            body: text.clone(),
        })?;
        Ok(unwrap_envelope(value))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        timeout: Duration,
        authenticated: bool,
    ) -> Result<ApiResponse, ApiError> {
        let bearer = if authenticated {
            self.session.ensure_initialized().await?;
            self.session.token().await
        } else {
            None
        };
        debug!("{method} {path} (auth: {})", bearer.is_some());

        self.transport
            .send(ApiRequest {
                method,
                path: path.to_string(),
                bearer,
                body,
                timeout,
            })
            .await
    }
}

fn todo_path(id: &str) -> String {
    format!("/todos/{id}")
}

fn json_body<T: serde::Serialize>(value: &T) -> Result<RequestBody, ApiError> {
    Ok(RequestBody::Json(serde_json::to_value(value).map_err(invalid_body)?))
}

fn invalid_body(err: serde_json::Error) -> ApiError {
    ApiError::InvalidInput(format!("failed to encode request body: {err}"))
}

/// Accept a payload whether or not it is wrapped under `data`.
pub fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) => match map.remove("data") {
            Some(data) if !data.is_null() => data,
            Some(data) => {
                map.insert("data".to_string(), data);
                Value::Object(map)
            }
            None => Value::Object(map),
        },
        other => other,
    }
}

/// Decode a body as JSON, falling back to a bare string.
pub fn parse_lenient(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value.clone()).map_err(|e| ApiError::Parse {
        message: e.to_string(),
        body: value.to_string(),
    })
}

/// Turn non-2xx responses into errors, keeping the body of successful ones.
fn check_status(response: ApiResponse) -> Result<String, ApiError> {
    if response.is_success() {
        return Ok(response.body);
    }

    let message = error_message(&response.body).unwrap_or_else(|| format!("HTTP {}", response.status));
    warn!("❌ Request failed with status {}: {message}", response.status);
    if response.status == 413 {
        Err(ApiError::PayloadTooLarge {
            message,
            status: Some(413),
        })
    } else {
        Err(ApiError::Server {
            status: response.status,
            message,
        })
    }
}

/// Best human-readable message in an error body.
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        for key in ["message", "error"] {
            if let Some(Value::String(message)) = map.get(key) {
                if !message.trim().is_empty() {
                    return Some(message.clone());
                }
            }
        }
    }
    Some(trimmed.to_string())
}
