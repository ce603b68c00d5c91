//! End-to-end tests driving a real server over sockets.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{HeaderMap, Method, Request, StatusCode, header};
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use phiremock::Dispatcher;

async fn spawn_server() -> (SocketAddr, Arc<Dispatcher>, watch::Sender<bool>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let dispatcher = Arc::new(Dispatcher::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let served = dispatcher.clone();
    tokio::spawn(async move {
        phiremock::serve(listener, served, shutdown_rx).await.unwrap();
    });
    (addr, dispatcher, shutdown_tx)
}

async fn send(
    addr: SocketAddr,
    method: Method,
    path: &str,
    body: &str,
) -> (StatusCode, HeaderMap, Bytes) {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .unwrap();
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let request = Request::builder()
        .method(method)
        .uri(path)
        .header(header::HOST, "localhost")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap();
    let response = sender.send_request(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let bytes = body.collect().await.unwrap().to_bytes();
    (parts.status, parts.headers, bytes)
}

async fn insert(addr: SocketAddr, expectation: &str) {
    let (status, _, _) = send(addr, Method::POST, "/__phiremock/expectations", expectation).await;
    assert_eq!(status, StatusCode::CREATED);
}

fn as_json(bytes: &Bytes) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

#[tokio::test]
async fn static_response_and_miss() {
    let (addr, _, _shutdown) = spawn_server().await;
    insert(
        addr,
        r#"{"request":{"method":"get","url":{"isEqualTo":"/hello"}},"response":{"statusCode":200,"body":"hi"}}"#,
    )
    .await;

    let (status, _, body) = send(addr, Method::GET, "/hello", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"hi");

    let (status, _, body) = send(addr, Method::GET, "/other", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        as_json(&body),
        json!({ "result": "ERROR", "details": ["No expectation matched"] })
    );
}

#[tokio::test]
async fn higher_priority_wins() {
    let (addr, _, _shutdown) = spawn_server().await;
    insert(
        addr,
        r#"{"request":{"url":{"isEqualTo":"/x"}},"response":{"statusCode":200,"body":"A"},"priority":1}"#,
    )
    .await;
    insert(
        addr,
        r#"{"request":{"url":{"isEqualTo":"/x"}},"response":{"statusCode":200,"body":"B"},"priority":5}"#,
    )
    .await;

    let (_, _, body) = send(addr, Method::GET, "/x", "").await;
    assert_eq!(&body[..], b"B");
}

#[tokio::test]
async fn scenario_transitions_and_forcing() {
    let (addr, _, _shutdown) = spawn_server().await;
    insert(
        addr,
        r#"{"scenarioName":"S","scenarioStateIs":"Scenario.START","newScenarioState":"second","request":{"url":{"isEqualTo":"/s"}},"response":{"body":"1"}}"#,
    )
    .await;
    insert(
        addr,
        r#"{"scenarioName":"S","scenarioStateIs":"second","request":{"url":{"isEqualTo":"/s"}},"response":{"body":"2"}}"#,
    )
    .await;

    let (_, _, body) = send(addr, Method::GET, "/s", "").await;
    assert_eq!(&body[..], b"1");
    let (_, _, body) = send(addr, Method::GET, "/s", "").await;
    assert_eq!(&body[..], b"2");
    let (status, _, _) = send(addr, Method::GET, "/s", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Forcing the scenario back to the start replays the flow.
    let (status, _, _) = send(
        addr,
        Method::PUT,
        "/__phiremock/scenarios",
        r#"{"scenarioName":"S","scenarioState":"Scenario.START"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, _, body) = send(addr, Method::GET, "/s", "").await;
    assert_eq!(&body[..], b"1");
}

#[tokio::test]
async fn proxy_mirrors_upstream() {
    // Upstream answering 201 with a marker header and a body that proves it
    // saw the original method and payload.
    let upstream_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_addr = upstream_listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (stream, _) = match upstream_listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => return,
            };
            tokio::spawn(async move {
                let service = service_fn(|req: Request<hyper::body::Incoming>| async move {
                    let method = req.method().clone();
                    let path = req.uri().path().to_string();
                    let payload = req.into_body().collect().await.unwrap().to_bytes();
                    let body = json!({
                        "method": method.as_str(),
                        "path": path,
                        "payload": String::from_utf8_lossy(&payload),
                    });
                    let mut response =
                        hyper::Response::new(Full::new(Bytes::from(body.to_string())));
                    *response.status_mut() = StatusCode::CREATED;
                    response
                        .headers_mut()
                        .insert("x-upstream", "yes".parse().unwrap());
                    Ok::<_, Infallible>(response)
                });
                let _ = hyper::server::conn::http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    let (addr, _, _shutdown) = spawn_server().await;
    insert(
        addr,
        &format!(
            r#"{{"request":{{"url":{{"isEqualTo":"/p"}}}},"proxyTo":"http://{upstream_addr}/base/"}}"#
        ),
    )
    .await;

    let (status, headers, body) = send(addr, Method::POST, "/p", "payload").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(headers.get("x-upstream").unwrap(), "yes");
    let seen = as_json(&body);
    assert_eq!(seen["method"], "POST");
    assert_eq!(seen["path"], "/base/");
    assert_eq!(seen["payload"], "payload");

    // The proxied request was journaled like any other mock request.
    let (_, _, body) = send(
        addr,
        Method::POST,
        "/__phiremock/executions/count",
        r#"{"url":{"isEqualTo":"/p"}}"#,
    )
    .await;
    assert_eq!(as_json(&body)["count"], 1);
}

#[tokio::test]
async fn journal_counts_and_resets() {
    let (addr, _, _shutdown) = spawn_server().await;
    send(addr, Method::GET, "/j", "").await;
    send(addr, Method::GET, "/j", "").await;
    send(addr, Method::GET, "/elsewhere", "").await;

    let (status, _, body) = send(
        addr,
        Method::POST,
        "/__phiremock/executions/count",
        r#"{"url":{"isEqualTo":"/j"}}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_json(&body), json!({ "count": 2 }));

    let (_, _, body) = send(
        addr,
        Method::GET,
        "/__phiremock/executions",
        r#"{"url":{"isEqualTo":"/j"}}"#,
    )
    .await;
    let entries = as_json(&body);
    assert_eq!(entries.as_array().unwrap().len(), 2);
    assert_eq!(entries[0]["url"], "/j");
    assert!(entries[0]["receivedAt"].is_string());

    let (status, _, _) = send(addr, Method::DELETE, "/__phiremock/executions", "").await;
    assert_eq!(status, StatusCode::OK);
    let (_, _, body) = send(addr, Method::POST, "/__phiremock/executions/count", "").await;
    assert_eq!(as_json(&body), json!({ "count": 0 }));
}

#[tokio::test]
async fn delay_is_observable_end_to_end() {
    let (addr, _, _shutdown) = spawn_server().await;
    insert(
        addr,
        r#"{"request":{"url":{"isEqualTo":"/slow"}},"response":{"body":"late","delayMillis":200}}"#,
    )
    .await;

    let started = Instant::now();
    let (status, _, body) = send(addr, Method::GET, "/slow", "").await;
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"late");
}

#[tokio::test]
async fn body_file_contents_are_served() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "file body").unwrap();
    let path = file.path().display().to_string();

    let (addr, _, _shutdown) = spawn_server().await;
    insert(
        addr,
        &format!(r#"{{"request":{{"url":{{"isEqualTo":"/f"}}}},"response":{{"bodyFileName":"{path}"}}}}"#),
    )
    .await;

    let (status, _, body) = send(addr, Method::GET, "/f", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"file body");
}

#[tokio::test]
async fn management_round_trip_normalizes() {
    let (addr, _, _shutdown) = spawn_server().await;
    insert(
        addr,
        r#"{"request":{"method":"get","url":{"isEqualTo":"/hello"}},"response":{"statusCode":200,"body":"hi"}}"#,
    )
    .await;

    let (status, _, body) = send(addr, Method::GET, "/__phiremock/expectations", "").await;
    assert_eq!(status, StatusCode::OK);
    let listed = as_json(&body);
    let entry = &listed.as_array().unwrap()[0];
    assert_eq!(entry["priority"], 0);
    assert!(entry["scenarioName"].is_null());
    assert!(entry["proxyTo"].is_null());
    assert!(entry["id"].is_string());
    assert_eq!(entry["request"]["method"], "get");
    assert_eq!(entry["response"]["body"], "hi");
}

#[tokio::test]
async fn full_reset_clears_everything() {
    let (addr, dispatcher, _shutdown) = spawn_server().await;
    insert(addr, r#"{"request":{},"response":{"body":"x"}}"#).await;
    send(addr, Method::GET, "/journaled", "").await;
    send(
        addr,
        Method::PUT,
        "/__phiremock/scenarios",
        r#"{"scenarioName":"S","scenarioState":"x"}"#,
    )
    .await;

    let (status, _, _) = send(addr, Method::POST, "/__phiremock/reset", "").await;
    assert_eq!(status, StatusCode::OK);
    assert!(dispatcher.expectations.is_empty());
    assert!(dispatcher.journal.is_empty());
    assert!(dispatcher.scenarios.snapshot().is_empty());

    let (status, _, _) = send(addr, Method::GET, "/anything", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn shutdown_stops_accepting() {
    let (addr, _, shutdown) = spawn_server().await;
    let (status, _, _) = send(addr, Method::GET, "/__phiremock/expectations", "").await;
    assert_eq!(status, StatusCode::OK);

    shutdown.send(true).unwrap();

    // The accept loop winds down shortly after the signal.
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        if TcpStream::connect(addr).await.is_err() {
            break;
        }
        assert!(Instant::now() < deadline, "listener still accepting");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
