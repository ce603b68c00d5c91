//! Realizes a winning expectation into a concrete HTTP response.
//!
//! The pipeline is: honor the declared delay, then produce either the stub
//! response (literal body, or a body file streamed from disk at send time)
//! or the proxied upstream response. When an expectation carries both a stub
//! response and a proxy target, the stub wins. Upstream failures and
//! unreadable body files are converted into 500 diagnostics; they never take
//! the server down.

use std::time::Duration;

use http::{HeaderName, HeaderValue, StatusCode};
use tracing::{error, warn};

use crate::{
    body::MockBody,
    client::ProxyClient,
    expectation::{Expectation, ResponseSpec},
    request::ReceivedRequest,
    responder::error_envelope,
    types::Response,
};

/// Produces the response for a winning expectation.
pub async fn realize(
    expectation: &Expectation,
    request: &ReceivedRequest,
    client: &ProxyClient,
) -> Response {
    if let Some(millis) = expectation.delay_millis() {
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }

    if expectation.has_stub_response() {
        if let Some(spec) = &expectation.response {
            return build_stub(spec).await;
        }
    }

    if let Some(target) = &expectation.proxy_to {
        return match client.forward(target, request).await {
            Ok(response) => response,
            Err(err) => {
                warn!("proxying to {target} failed: {err:#}");
                error_envelope(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    [format!("proxying to {target} failed: {err}")],
                )
            }
        };
    }

    // Unreachable for validated expectations.
    error_envelope(
        StatusCode::INTERNAL_SERVER_ERROR,
        ["expectation has neither a response nor a proxy target"],
    )
}

async fn build_stub(spec: &ResponseSpec) -> Response {
    let status = StatusCode::from_u16(spec.status()).unwrap_or(StatusCode::OK);

    let mut response = match (&spec.body, &spec.body_file_name) {
        (Some(body), _) => hyper::Response::new(MockBody::from(body.clone())),
        (None, Some(path)) => match tokio::fs::File::open(path).await {
            Ok(file) => hyper::Response::new(MockBody::file(file)),
            Err(err) => {
                error!("cannot read body file {path}: {err}");
                return error_envelope(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    [format!("cannot read body file {path}: {err}")],
                );
            }
        },
        (None, None) => hyper::Response::new(MockBody::empty()),
    };
    *response.status_mut() = status;

    if let Some(headers) = &spec.headers {
        for (name, value) in headers {
            // Names and values were validated on insertion.
            if let (Ok(name), Ok(value)) = (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                response.headers_mut().append(name, value);
            }
        }
    }
    response
}
