//! Upload URL extraction.
//!
//! The `/images` endpoint does not commit to a response shape. Each
//! [`UrlCandidate`] is a pure lookup on the decoded body; they are tried in
//! [`UPLOAD_URL_CANDIDATES`] order and the first non-blank string wins.

use serde_json::Value;

use crate::backend::ApiError;

/// One place where the uploaded URL may live in a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlCandidate {
    /// Top-level string field
    Field(&'static str),
    /// String field one level under `data`
    DataField(&'static str),
    /// First element of a bare array of strings
    FirstArrayString,
    /// The whole body is a string
    BareString,
}

pub const UPLOAD_URL_CANDIDATES: &[UrlCandidate] = &[
    UrlCandidate::Field("imageUrl"),
    UrlCandidate::Field("url"),
    UrlCandidate::Field("image"),
    UrlCandidate::Field("location"),
    UrlCandidate::Field("path"),
    UrlCandidate::DataField("imageUrl"),
    UrlCandidate::DataField("url"),
    UrlCandidate::DataField("image"),
    UrlCandidate::DataField("location"),
    UrlCandidate::DataField("path"),
    UrlCandidate::FirstArrayString,
    UrlCandidate::BareString,
];

impl UrlCandidate {
    pub fn extract(&self, body: &Value) -> Option<String> {
        let found = match self {
            UrlCandidate::Field(name) => body.get(*name),
            UrlCandidate::DataField(name) => body.get("data").and_then(|data| data.get(*name)),
            UrlCandidate::FirstArrayString => body.as_array().and_then(|items| items.first()),
            UrlCandidate::BareString => Some(body),
        };
        found.and_then(non_blank)
    }
}

fn non_blank(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// First URL found by the candidate list, if any.
pub fn find_uploaded_url(body: &Value) -> Option<String> {
    UPLOAD_URL_CANDIDATES.iter().find_map(|candidate| candidate.extract(body))
}

/// Like [`find_uploaded_url`] but fails with the raw body for diagnosis.
pub fn extract_uploaded_url(body: &Value) -> Result<String, ApiError> {
    find_uploaded_url(body).ok_or_else(|| ApiError::Parse {
        message: "no image URL in /images response".to_string(),
        body: body.to_string(),
    })
}
