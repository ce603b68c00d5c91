//! An HTTP mock server for test suites.
//!
//! Phiremock accepts incoming HTTP(S) requests and answers them from a
//! library of user-defined *expectations*: request patterns paired with stub
//! responses, proxy directives, optional delays and scenario logic. Test
//! suites create expectations, force scenario states and assert on received
//! traffic at runtime through a management API under the reserved
//! `/__phiremock` prefix; everything else the server receives is a mock
//! request that is journaled, matched and answered.
//!
//! # High-level features
//! - Request matching on method, URL, body, headers and form fields, with
//!   equality, case-insensitive, regex and substring matchers
//! - Priorities and named scenarios for multi-step flows
//! - Stub responses from literal bodies or body files, optional delays,
//!   and proxying to an upstream with the original request
//! - A request journal queryable with the same pattern language
//! - One-shot expectation bootstrap from a directory of JSON files
//! - Optional TLS (rustls, feature `tls`, enabled by default)
//!
//! # Quickstart
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use phiremock::Dispatcher;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8086").await?;
//! let dispatcher = Arc::new(Dispatcher::new());
//! let (_shutdown, signal) = tokio::sync::watch::channel(false);
//! phiremock::serve(listener, dispatcher, signal).await?;
//! # Ok(())
//! # }
//! ```

/// Management API under the reserved `/__phiremock` prefix.
pub mod admin;

/// HTTP response body wrapper.
pub mod body;

/// Outbound client for proxied expectations.
pub mod client;

/// CLI flags and config file resolution.
pub mod config;

/// Per-request entry point and shared server state.
pub mod dispatcher;

/// Expectation data model and wire format.
pub mod expectation;

/// Append-only log of received mock requests.
pub mod journal;

/// Boot-time expectation loading.
pub mod loader;

/// String matcher primitives.
pub mod matcher;

/// Expectation selection algorithm.
pub mod matching;

/// Immutable snapshot of a received request.
pub mod request;

/// Response conversion trait and envelope helpers.
pub mod responder;

/// Response realization: stubs, body files, proxying, delays.
pub mod response;

/// Scenario state store.
pub mod scenario;

/// HTTP listener loop.
mod server;

/// TLS listener loop.
#[cfg(feature = "tls")]
mod server_tls;

/// Expectation store.
pub mod store;

/// Structured logging setup.
pub mod tracing;

/// Core type aliases.
pub mod types;

pub use bytes::Bytes;
pub use http::{Method, StatusCode, header};

pub use admin::ADMIN_PREFIX;
pub use dispatcher::Dispatcher;
pub use expectation::{Expectation, SCENARIO_START};

/// Starts the HTTP server on the given listener.
///
/// Serves connections until the shutdown signal flips, then drains in-flight
/// connections for a grace period.
pub use server::serve;

/// Starts the HTTPS server with TLS material loaded from PEM files.
#[cfg(feature = "tls")]
pub use server_tls::serve_tls;
