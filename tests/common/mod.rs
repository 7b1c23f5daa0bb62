#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use todosync::backend::{ApiError, ApiRequest, ApiResponse, HttpTransport, RequestBody};
use todosync::constants::TASK_IMAGE_FIELDS;
use todosync::upload::{ImageReducer, ReducePass};

type Handler = Box<dyn Fn(&ApiRequest, usize) -> Result<ApiResponse, ApiError> + Send + Sync>;

/// A request as the transport saw it.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub method: String,
    pub path: String,
    pub bearer: Option<String>,
    pub body: RequestBody,
    pub timeout: Duration,
    pub at: tokio::time::Instant,
}

/// In-process transport answering from a closure and recording every call.
pub struct MockTransport {
    handler: Handler,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    /// `handler` receives the request and its zero-based call index.
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&ApiRequest, usize) -> Result<ApiResponse, ApiError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Transport backed by a [`FakeTodoServer`].
    pub fn serving(server: Arc<FakeTodoServer>) -> Arc<Self> {
        Self::new(move |request, _| server.handle(request))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }

    pub fn total(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(RecordedCall {
                method: request.method.to_string(),
                path: request.path.clone(),
                bearer: request.bearer.clone(),
                body: request.body.clone(),
                timeout: request.timeout,
                at: tokio::time::Instant::now(),
            });
            calls.len() - 1
        };
        (self.handler)(&request, index)
    }
}

pub fn respond(status: u16, body: Value) -> Result<ApiResponse, ApiError> {
    Ok(ApiResponse {
        status,
        body: body.to_string(),
    })
}

pub fn respond_text(status: u16, body: &str) -> Result<ApiResponse, ApiError> {
    Ok(ApiResponse {
        status,
        body: body.to_string(),
    })
}

pub fn auth_body() -> Value {
    json!({"token": "tok-123", "user": {"id": "u1", "email": "ana@example.com"}})
}

/// Stateful stand-in for the remote todo service.
pub struct FakeTodoServer {
    todos: Mutex<Vec<Value>>,
    next_id: AtomicUsize,
    forced_id: Mutex<Option<String>>,
    drop_images: bool,
    upload_url: String,
    upload_status: u16,
}

impl FakeTodoServer {
    pub fn new() -> Self {
        Self {
            todos: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            forced_id: Mutex::new(None),
            drop_images: false,
            upload_url: "/uploads/photo-1.jpg".to_string(),
            upload_status: 200,
        }
    }

    /// Accept image fields on create/update but never store them.
    pub fn dropping_images(mut self) -> Self {
        self.drop_images = true;
        self
    }

    pub fn with_upload_url(mut self, url: &str) -> Self {
        self.upload_url = url.to_string();
        self
    }

    /// Answer every upload with this status.
    pub fn failing_uploads(mut self, status: u16) -> Self {
        self.upload_status = status;
        self
    }

    /// Id to assign to the next created record.
    pub fn force_next_id(&self, id: &str) {
        *self.forced_id.lock().unwrap() = Some(id.to_string());
    }

    pub fn stored(&self, id: &str) -> Option<Value> {
        self.todos.lock().unwrap().iter().find(|t| t["id"] == id).cloned()
    }

    pub fn handle(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let method = request.method.as_str();
        let path = request.path.as_str();

        if path.starts_with("/auth/") {
            return respond(201, auth_body());
        }
        if request.bearer.as_deref() != Some("tok-123") {
            return respond(401, json!({"message": "Unauthorized"}));
        }

        match (method, path) {
            ("POST", "/images") => {
                if self.upload_status == 200 {
                    respond(200, json!({"data": {"url": self.upload_url}}))
                } else {
                    respond(self.upload_status, json!({"message": "upload rejected"}))
                }
            }
            ("GET", "/todos") => {
                let todos = self.todos.lock().unwrap().clone();
                respond(200, json!({"data": todos}))
            }
            ("POST", "/todos") => {
                let mut body = self.json_body(request);
                let id = match self.forced_id.lock().unwrap().take() {
                    Some(id) => id,
                    None => format!("t{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
                };
                body.insert("id".to_string(), json!(id));
                body.entry("completed").or_insert(json!(false));
                body.insert("userId".to_string(), json!("u1"));
                body.insert("createdAt".to_string(), json!("2025-01-01T00:00:00Z"));
                self.strip_images(&mut body);
                let todo = Value::Object(body);
                self.todos.lock().unwrap().push(todo.clone());
                respond(201, todo)
            }
            (_, p) if p.starts_with("/todos/") => {
                let id = &p["/todos/".len()..];
                let mut todos = self.todos.lock().unwrap();
                let Some(pos) = todos.iter().position(|t| t["id"] == id) else {
                    return respond(404, json!({"message": "Todo not found"}));
                };
                match method {
                    "GET" => respond(200, todos[pos].clone()),
                    "PATCH" => {
                        let mut patch = self.json_body(request);
                        self.strip_images(&mut patch);
                        if let Value::Object(existing) = &mut todos[pos] {
                            existing.extend(patch);
                        }
                        respond(200, json!({"data": todos[pos].clone()}))
                    }
                    "DELETE" => {
                        todos.remove(pos);
                        respond_text(204, "")
                    }
                    _ => respond(405, json!({"message": "method not allowed"})),
                }
            }
            _ => respond(404, json!({"message": "route not found"})),
        }
    }

    fn json_body(&self, request: &ApiRequest) -> Map<String, Value> {
        match &request.body {
            RequestBody::Json(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }

    fn strip_images(&self, body: &mut Map<String, Value>) {
        if self.drop_images {
            for field in TASK_IMAGE_FIELDS {
                body.remove(*field);
            }
        }
    }
}

/// Returns its input unchanged.
pub struct PassthroughReducer;

impl ImageReducer for PassthroughReducer {
    fn reduce(&self, bytes: &[u8], _pass: ReducePass) -> Result<Vec<u8>, ApiError> {
        Ok(bytes.to_vec())
    }
}

/// Always produces `size` bytes, whatever the input.
pub struct FixedSizeReducer {
    pub size: usize,
}

impl ImageReducer for FixedSizeReducer {
    fn reduce(&self, _bytes: &[u8], _pass: ReducePass) -> Result<Vec<u8>, ApiError> {
        Ok(vec![b'x'; self.size])
    }
}

/// Always fails.
pub struct BrokenReducer;

impl ImageReducer for BrokenReducer {
    fn reduce(&self, _bytes: &[u8], _pass: ReducePass) -> Result<Vec<u8>, ApiError> {
        Err(ApiError::Image("decoder exploded".to_string()))
    }
}

/// Write `bytes` to a temporary file usable as an image source.
pub fn temp_image(bytes: &[u8]) -> tempfile::NamedTempFile {
    use std::io::Write;
    let mut file = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

/// Counts of requests by "METHOD path".
pub fn tally(calls: &[RecordedCall]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for call in calls {
        *counts.entry(format!("{} {}", call.method, call.path)).or_insert(0) += 1;
    }
    counts
}
