//! Outbound HTTP client used to proxy matched requests upstream.
//!
//! Each proxied request performs its own HTTP/1.1 handshake over a fresh TCP
//! (or TLS) connection, carries the original request's method, body and
//! headers minus the hop-by-hop set, and mirrors the upstream status, headers
//! and body back verbatim. The whole exchange is bounded by a configurable
//! timeout, 30 seconds by default; a timeout or connection failure surfaces
//! as an error for the response builder to turn into a 500 diagnostic.

use std::time::Duration;

use anyhow::{Context, anyhow};
use bytes::Bytes;
use http::{HeaderName, Uri, header};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use once_cell::sync::Lazy;
use tokio::net::TcpStream;

use crate::{body::MockBody, request::ReceivedRequest, types::Response};

/// Headers that describe the connection rather than the message; never
/// forwarded in either direction.
static HOP_BY_HOP: Lazy<[HeaderName; 8]> = Lazy::new(|| {
    [
        header::CONNECTION,
        HeaderName::from_static("keep-alive"),
        header::PROXY_AUTHENTICATE,
        header::PROXY_AUTHORIZATION,
        header::TE,
        header::TRAILER,
        header::TRANSFER_ENCODING,
        header::UPGRADE,
    ]
});

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.iter().any(|hop| hop == name)
}

/// Forwarder for proxied expectations.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    timeout: Duration,
}

impl Default for ProxyClient {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

impl ProxyClient {
    /// Creates a client with the default 30 second timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client with a custom upstream timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Forwards the original request to `target` and returns the upstream
    /// response. A single attempt; failures are not retried.
    pub async fn forward(&self, target: &str, request: &ReceivedRequest) -> anyhow::Result<Response> {
        match tokio::time::timeout(self.timeout, self.call(target, request)).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!(
                "upstream request to {target} timed out after {} ms",
                self.timeout.as_millis()
            )),
        }
    }

    async fn call(&self, target: &str, request: &ReceivedRequest) -> anyhow::Result<Response> {
        let uri: Uri = target
            .parse()
            .with_context(|| format!("invalid proxy target: {target}"))?;
        let scheme = uri.scheme_str().unwrap_or("http");
        let authority = uri
            .authority()
            .ok_or_else(|| anyhow!("proxy target has no host: {target}"))?
            .clone();
        let host = authority.host().to_string();
        let port = authority
            .port_u16()
            .unwrap_or(if scheme == "https" { 443 } else { 80 });
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        let method = http::Method::from_bytes(request.method().as_bytes())
            .with_context(|| format!("invalid method: {}", request.method()))?;
        let mut builder = http::Request::builder().method(method).uri(path_and_query);
        for (name, value) in request.headers() {
            if !is_hop_by_hop(name) && name != header::HOST {
                builder = builder.header(name, value);
            }
        }
        builder = builder.header(header::HOST, authority.as_str());
        let outbound = builder.body(Full::new(request.body().clone()))?;

        let tcp = TcpStream::connect((host.as_str(), port))
            .await
            .with_context(|| format!("failed to connect to {host}:{port}"))?;

        let upstream = if scheme == "https" {
            self.exchange_tls(tcp, &host, outbound).await?
        } else {
            exchange(TokioIo::new(tcp), outbound).await?
        };

        let (parts, body) = upstream.into_parts();
        let bytes = body
            .collect()
            .await
            .context("failed to read upstream response body")?
            .to_bytes();

        let mut response = hyper::Response::new(MockBody::from(bytes));
        *response.status_mut() = parts.status;
        for (name, value) in parts.headers.iter() {
            if !is_hop_by_hop(name) {
                response.headers_mut().append(name.clone(), value.clone());
            }
        }
        Ok(response)
    }

    #[cfg(feature = "tls")]
    async fn exchange_tls(
        &self,
        tcp: TcpStream,
        host: &str,
        outbound: http::Request<Full<Bytes>>,
    ) -> anyhow::Result<http::Response<hyper::body::Incoming>> {
        use std::sync::Arc;

        use rustls::pki_types::ServerName;
        use rustls::{ClientConfig, RootCertStore};
        use tokio_rustls::TlsConnector;

        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        let connector = TlsConnector::from(Arc::new(config));
        let server_name = ServerName::try_from(host.to_string())
            .with_context(|| format!("invalid TLS server name: {host}"))?;
        let tls = connector.connect(server_name, tcp).await?;
        exchange(TokioIo::new(tls), outbound).await
    }

    #[cfg(not(feature = "tls"))]
    async fn exchange_tls(
        &self,
        _tcp: TcpStream,
        host: &str,
        _outbound: http::Request<Full<Bytes>>,
    ) -> anyhow::Result<http::Response<hyper::body::Incoming>> {
        anyhow::bail!("https proxy target {host} requires the tls feature")
    }
}

async fn exchange<I>(
    io: I,
    outbound: http::Request<Full<Bytes>>,
) -> anyhow::Result<http::Response<hyper::body::Incoming>>
where
    I: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;
    tokio::spawn(async move {
        if let Err(err) = conn.await {
            tracing::debug!("proxy connection terminated: {err}");
        }
    });
    Ok(sender.send_request(outbound).await?)
}
