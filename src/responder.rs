//! Response generation utilities and trait implementations.
//!
//! This module provides the `Responder` trait that converts handler return
//! values into HTTP responses, plus the helpers for the management envelope
//! format. Every management mutation answers with a JSON envelope of the form
//! `{"result": "OK" | "ERROR", "details": [...]}`, optionally extended with
//! resource-specific fields such as `id` or `count`.

use bytes::Bytes;
use http::{StatusCode, header};
use serde_json::{Value, json};

use crate::{body::MockBody, types::Response};

/// Trait for converting types into HTTP responses.
///
/// Handlers in this crate return different shapes (pre-built responses, JSON
/// payloads, status/body tuples) that are converted uniformly at the dispatch
/// boundary.
pub trait Responder {
    /// Converts the implementing type into an HTTP response.
    fn into_response(self) -> Response;
}

impl Responder for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl Responder for &'static str {
    fn into_response(self) -> Response {
        hyper::Response::new(MockBody::from(Bytes::from_static(self.as_bytes())))
    }
}

impl Responder for String {
    fn into_response(self) -> Response {
        hyper::Response::new(MockBody::from(self))
    }
}

impl Responder for (StatusCode, String) {
    fn into_response(self) -> Response {
        let (status, body) = self;
        let mut res = body.into_response();
        *res.status_mut() = status;
        res
    }
}

impl Responder for (StatusCode, &'static str) {
    fn into_response(self) -> Response {
        let (status, body) = self;
        let mut res = body.into_response();
        *res.status_mut() = status;
        res
    }
}

/// JSON payload wrapper; serializes with an `application/json` content type.
pub struct Json(pub Value);

impl Responder for Json {
    fn into_response(self) -> Response {
        (StatusCode::OK, self).into_response()
    }
}

impl Responder for (StatusCode, Json) {
    fn into_response(self) -> Response {
        let (status, Json(value)) = self;
        let body = serde_json::to_vec(&value).unwrap_or_default();
        let mut res = hyper::Response::new(MockBody::from(body));
        *res.status_mut() = status;
        res.headers_mut().insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        res
    }
}

/// Builds the success envelope response, `{"result":"OK","details":[]}`.
pub fn ok_envelope() -> Response {
    Json(json!({ "result": "OK", "details": [] })).into_response()
}

/// Builds an error envelope response with the given status and detail lines.
pub fn error_envelope<I, S>(status: StatusCode, details: I) -> Response
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let details: Vec<String> = details.into_iter().map(Into::into).collect();
    (status, Json(json!({ "result": "ERROR", "details": details }))).into_response()
}
