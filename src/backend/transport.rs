//! `reqwest`-backed [`HttpTransport`].

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};

use super::{ApiError, ApiRequest, ApiResponse, HttpTransport, MultipartUpload, RequestBody};

/// HTTP transport talking to the configured API origin.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Create a transport for the given API origin.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a hand-assembled multipart body, aborting the whole exchange
    /// (connect, upload, response body) once `timeout` elapses.
    async fn send_raw_multipart(
        &self,
        url: String,
        bearer: Option<String>,
        upload: MultipartUpload,
        timeout: Duration,
    ) -> Result<ApiResponse, ApiError> {
        let boundary = format!("----todosync-{}", uuid::Uuid::new_v4().simple());
        let body = encode_multipart(&boundary, &upload);

        let mut builder = self
            .client
            .post(&url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(body);
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }

        let exchange = async move {
            let response = builder.send().await.map_err(|e| classify(e, timeout))?;
            read_response(response, timeout).await
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                debug!("⏱️ Raw upload to {url} cancelled after {timeout:?}");
                Err(ApiError::Timeout(timeout))
            }
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = self.url(&request.path);
        let timeout = request.timeout;
        debug!("➡️ {} {}", request.method, url);

        let mut builder = match request.body {
            RequestBody::RawMultipart(upload) => {
                return self.send_raw_multipart(url, request.bearer, upload, timeout).await;
            }
            RequestBody::Empty => self.client.request(request.method, &url),
            RequestBody::Json(value) => self.client.request(request.method, &url).json(&value),
            RequestBody::Multipart(upload) => self
                .client
                .request(request.method, &url)
                .multipart(build_form(upload)?),
        };

        builder = builder.header(ACCEPT, "application/json").timeout(timeout);
        if let Some(token) = request.bearer {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| classify(e, timeout))?;
        read_response(response, timeout).await
    }
}

async fn read_response(response: Response, timeout: Duration) -> Result<ApiResponse, ApiError> {
    let status = response.status().as_u16();
    let body = response.text().await.map_err(|e| classify(e, timeout))?;
    debug!("⬅️ {status} ({} bytes)", body.len());
    Ok(ApiResponse { status, body })
}

fn build_form(upload: MultipartUpload) -> Result<Form, ApiError> {
    let part = Part::bytes(upload.bytes)
        .file_name(upload.file_name)
        .mime_str(&upload.mime)
        .map_err(|e| ApiError::InvalidInput(format!("invalid mime type: {e}")))?;

    let mut form = Form::new().part(upload.field_name, part);
    for (name, value) in upload.fields {
        form = form.text(name, value);
    }
    Ok(form)
}

/// Classify a transport failure. Every `reqwest` error raised before a
/// response arrives is network-class.
fn classify(err: reqwest::Error, timeout: Duration) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout(timeout)
    } else {
        ApiError::Network(err.to_string())
    }
}

/// Encode a `multipart/form-data` body by hand.
pub(crate) fn encode_multipart(boundary: &str, upload: &MultipartUpload) -> Vec<u8> {
    let mut body = Vec::with_capacity(upload.bytes.len() + 512);

    for (name, value) in &upload.fields {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", quote_param(name)).as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            quote_param(&upload.field_name),
            quote_param(&upload.file_name)
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", upload.mime).as_bytes());
    body.extend_from_slice(&upload.bytes);
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

/// Percent-encode the characters that would break a quoted header
/// parameter, as browsers do for form submissions.
fn quote_param(value: &str) -> String {
    value.replace('"', "%22").replace('\r', "%0D").replace('\n', "%0A")
}
