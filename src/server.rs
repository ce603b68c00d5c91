//! HTTP listener loop and request/connection lifecycle.
//!
//! Each accepted connection is served on its own tokio task; requests flow
//! through [`Dispatcher::dispatch`](crate::dispatcher::Dispatcher::dispatch).
//! A panic inside a single request is caught and answered with a 500, so one
//! bad request can never take the server down. Shutdown is cooperative: when
//! the shutdown signal fires the loop stops accepting, in-flight connections
//! get a grace period to finish, and the remaining tasks are abandoned.

use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::FutureExt;
use http::StatusCode;
use hyper::{server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::{dispatcher::Dispatcher, responder::error_envelope, types::Response};

/// How long in-flight connections may keep running after shutdown begins.
pub(crate) const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Runs the plain HTTP accept loop until the shutdown signal fires.
pub async fn serve(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    info!("phiremock listening on http://{}", listener.local_addr()?);

    let tracker = TaskTracker::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, addr) = accepted?;
                let io = TokioIo::new(stream);
                let dispatcher = dispatcher.clone();

                tracker.spawn(async move {
                    let svc = service_fn(move |req| {
                        let dispatcher = dispatcher.clone();
                        async move { Ok::<_, Infallible>(guarded_dispatch(&dispatcher, req).await) }
                    });

                    let mut http = http1::Builder::new();
                    http.keep_alive(true);
                    if let Err(err) = http.serve_connection(io, svc).await {
                        warn!("error serving connection from {addr}: {err}");
                    }
                });
            }
            _ = shutdown.changed() => break,
        }
    }

    drain(tracker).await;
    Ok(())
}

/// Dispatches one request with panic isolation.
pub(crate) async fn guarded_dispatch<B>(dispatcher: &Dispatcher, req: http::Request<B>) -> Response
where
    B: http_body::Body<Data = Bytes> + Send,
    B::Error: Display,
{
    match std::panic::AssertUnwindSafe(dispatcher.dispatch(req))
        .catch_unwind()
        .await
    {
        Ok(response) => response,
        Err(_) => {
            error!("request handler panicked");
            error_envelope(StatusCode::INTERNAL_SERVER_ERROR, ["internal server error"])
        }
    }
}

/// Waits out the grace period for in-flight connections.
pub(crate) async fn drain(tracker: TaskTracker) {
    tracker.close();
    if tokio::time::timeout(SHUTDOWN_GRACE, tracker.wait())
        .await
        .is_err()
    {
        warn!("shutdown grace period expired with connections still open");
    }
}
