//! Immutable snapshot of a received HTTP request.
//!
//! The dispatcher reads the full request body up front and freezes the parts
//! that matter for matching and journaling: uppercased method, path plus raw
//! query, header multimap, body bytes and the receipt timestamp. Form fields
//! are parsed lazily on first access and cached on the snapshot, so requests
//! that never meet a `formFields` matcher never pay for parsing.

use std::borrow::Cow;
use std::collections::HashMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{HeaderMap, header, request::Parts};
use once_cell::sync::OnceCell;

/// An immutable, normalized view of one incoming mock request.
#[derive(Debug)]
pub struct ReceivedRequest {
    method: String,
    url: String,
    headers: HeaderMap,
    body: Bytes,
    received_at: DateTime<Utc>,
    form: OnceCell<HashMap<String, String>>,
}

impl ReceivedRequest {
    /// Builds a snapshot from parsed request head and collected body bytes.
    pub fn new(parts: &Parts, body: Bytes) -> Self {
        let url = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());
        Self {
            method: parts.method.as_str().to_uppercase(),
            url,
            headers: parts.headers.clone(),
            body,
            received_at: Utc::now(),
            form: OnceCell::new(),
        }
    }

    /// Uppercased request method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request path, plus `?` and the raw query when one was present.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Header multimap with case-insensitive keys.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body interpreted as UTF-8 for string matching.
    pub fn body_utf8(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Wall-clock timestamp of receipt.
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Parsed form fields of an `application/x-www-form-urlencoded` body.
    ///
    /// Parsed once and cached. Requests with a different content type yield
    /// an empty map, so any `formFields` condition fails against them.
    pub fn form_fields(&self) -> &HashMap<String, String> {
        self.form.get_or_init(|| {
            let is_form = self
                .headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .and_then(|ct| ct.split(';').next())
                .is_some_and(|t| t.trim().eq_ignore_ascii_case("application/x-www-form-urlencoded"));
            if !is_form {
                return HashMap::new();
            }
            url::form_urlencoded::parse(&self.body).into_owned().collect()
        })
    }
}
