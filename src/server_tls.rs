#![cfg(feature = "tls")]

//! TLS-enabled listener loop.
//!
//! Mirrors the plain HTTP loop in [`crate::server`] with a rustls handshake
//! in front of each connection. Certificates and keys are PEM files loaded
//! once at startup; failure to load them is fatal and aborts startup, while
//! a failed handshake on a live connection only drops that connection.

use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use hyper::{server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::{fs::File, io::BufReader};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_rustls::{TlsAcceptor, rustls::ServerConfig};
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::{
    dispatcher::Dispatcher,
    server::{drain, guarded_dispatch},
};

/// Runs the TLS accept loop until the shutdown signal fires.
pub async fn serve_tls(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    certificate: &Path,
    certificate_key: &Path,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let certs = load_certs(certificate)?;
    let key = load_key(certificate_key)?;

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("invalid TLS certificate or key")?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    let acceptor = TlsAcceptor::from(Arc::new(config));
    info!("phiremock listening on https://{}", listener.local_addr()?);

    let tracker = TaskTracker::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, addr) = accepted?;
                let acceptor = acceptor.clone();
                let dispatcher = dispatcher.clone();

                tracker.spawn(async move {
                    let tls_stream = match acceptor.accept(stream).await {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            warn!("TLS handshake with {addr} failed: {err}");
                            return;
                        }
                    };

                    let io = TokioIo::new(tls_stream);
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

/// Loads the X.509 certificate chain from a PEM file.
fn load_certs(path: &Path) -> anyhow::Result<Vec<CertificateDer<'static>>> {
    let mut reader = BufReader::new(
        File::open(path).with_context(|| format!("cannot open certificate {}", path.display()))?,
    );
    let certs: Vec<_> = rustls_pemfile::certs(&mut reader)
        .collect::<Result<_, _>>()
        .with_context(|| format!("malformed certificate {}", path.display()))?;
    if certs.is_empty() {
        bail!("no certificates found in {}", path.display());
    }
    Ok(certs)
}

/// Loads the private key from a PEM file. The key must be unencrypted.
fn load_key(path: &Path) -> anyhow::Result<PrivateKeyDer<'static>> {
    let mut reader = BufReader::new(
        File::open(path).with_context(|| format!("cannot open private key {}", path.display()))?,
    );
    rustls_pemfile::private_key(&mut reader)
        .with_context(|| format!("malformed private key {}", path.display()))?
        .ok_or_else(|| anyhow::anyhow!("no private key found in {}", path.display()))
}
