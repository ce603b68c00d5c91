//! Per-request entry point tying the stores, matcher and builder together.
//!
//! Every parsed request lands here. Management traffic under `/__phiremock`
//! is routed to the management API and never journaled. Everything else is a
//! mock request: it is journaled, matched against a fresh snapshot of the
//! expectation store, and answered by the response builder, or with a 404
//! envelope when nothing matched. A winning scenario transition is applied
//! immediately after selection, before the response is built, so any match
//! started afterwards observes the new state even while a delayed response
//! is still pending.

use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::BodyExt;
use tracing::debug;

use crate::{
    admin::{self, ADMIN_PREFIX},
    client::ProxyClient,
    journal::Journal,
    matching,
    request::ReceivedRequest,
    responder::error_envelope,
    response,
    scenario::ScenarioStore,
    store::ExpectationStore,
    types::Response,
};

/// Shared server state and the request dispatch logic.
#[derive(Debug, Default)]
pub struct Dispatcher {
    /// Registry of active expectations.
    pub expectations: ExpectationStore,
    /// Scenario state variables.
    pub scenarios: ScenarioStore,
    /// Log of received mock requests.
    pub journal: Journal,
    client: ProxyClient,
}

impl Dispatcher {
    /// Creates a dispatcher with empty stores and default proxy settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dispatcher with a custom upstream proxy timeout.
    pub fn with_proxy_timeout(timeout: std::time::Duration) -> Self {
        Self {
            client: ProxyClient::with_timeout(timeout),
            ..Self::default()
        }
    }

    /// Handles one incoming request and produces exactly one response.
    pub async fn dispatch<B>(&self, req: http::Request<B>) -> Response
    where
        B: http_body::Body<Data = Bytes> + Send,
        B::Error: std::fmt::Display,
    {
        let (parts, body) = req.into_parts();
        let bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) => {
                return error_envelope(
                    StatusCode::BAD_REQUEST,
                    [format!("failed to read request body: {err}")],
                );
            }
        };

        if parts.uri.path().starts_with(ADMIN_PREFIX) {
            return admin::handle(self, &parts, bytes).await;
        }

        let received = Arc::new(ReceivedRequest::new(&parts, bytes));
        self.journal.append(received.clone());

        let snapshot = self.expectations.list();
        match matching::select(&received, &snapshot, &self.scenarios) {
            Some(winner) => {
                if let (Some(name), Some(next)) =
                    (&winner.scenario_name, &winner.new_scenario_state)
                {
                    self.scenarios.set(name, next);
                }
                response::realize(&winner, &received, &self.client).await
            }
            None => {
                debug!("no expectation matched {} {}", received.method(), received.url());
                error_envelope(StatusCode::NOT_FOUND, ["No expectation matched"])
            }
        }
    }
}
