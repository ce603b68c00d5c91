//! Core type definitions and aliases used throughout the server.
//!
//! This module provides the fundamental type aliases that standardize the types
//! used across the crate for requests, responses and errors. The aliases hide
//! the generic parameters of the underlying `hyper` types so the rest of the
//! code can speak in terms of `Request` and `Response`.

use hyper::body::Incoming;

use crate::body::MockBody;

/// Incoming HTTP request type with streaming body support.
pub type Request = hyper::Request<Incoming>;

/// Outgoing HTTP response type carrying the server's body wrapper.
pub type Response = hyper::Response<MockBody>;

/// Boxed error type for thread-safe error handling.
pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;
