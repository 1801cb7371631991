//! Mock backend behaviour over real sockets.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::{header, StatusCode};
use balance_harness::mock::{
    MockResponse, MockServer, MockServerConfig, RequestInfo, RequestObserver, ServerInfo,
    ServerState, READY_BODY,
};
use balance_harness::polling::{Expect, Outcome, X_REQUEST_ID};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

mod common;

fn ephemeral() -> MockServerConfig {
    MockServerConfig::new("127.0.0.1", 0)
}

#[tokio::test]
async fn answers_ready_and_echoes_path() {
    let server = MockServer::start(ephemeral()).await.unwrap();
    let http = common::fast_client().http().clone();

    let res = http.get(server.ready_url()).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), READY_BODY);

    let res = http
        .get(server.info().url("/weighted/pool?x=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()[header::CONTENT_LENGTH].to_str().unwrap(),
        "/weighted/pool".len().to_string()
    );
    assert_eq!(res.text().await.unwrap(), "/weighted/pool");
    assert_eq!(server.accepted_connections(), 2);
}

#[tokio::test]
async fn observer_sees_requests_but_not_readiness() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let observer: Arc<dyn RequestObserver> =
        Arc::new(move |req: &RequestInfo, srv: &ServerInfo| {
            let has_id = req.headers.contains_key(X_REQUEST_ID);
            log.lock()
                .unwrap()
                .push((req.path().to_string(), srv.name().to_string(), has_id));
            None
        });

    let server = MockServer::start_observed(ephemeral(), observer).await.unwrap();
    let client = common::fast_client();

    assert_eq!(client.get(&server.ready_url()).await, Outcome::Ok);
    assert_eq!(client.get(&server.info().url("/a")).await, Outcome::Ok);
    assert_eq!(client.get(&server.info().url("/b")).await, Outcome::Ok);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], ("/a".to_string(), server.name().to_string(), true));
    assert_eq!(seen[1].0, "/b");
}

#[tokio::test]
async fn observer_can_override_status() {
    let observer: Arc<dyn RequestObserver> = Arc::new(|req: &RequestInfo, _: &ServerInfo| {
        (req.path() == "/fail")
            .then(|| MockResponse::with_status(StatusCode::SERVICE_UNAVAILABLE, "down"))
    });
    let server = MockServer::start_observed(ephemeral(), observer).await.unwrap();
    let client = common::fast_client();

    assert_eq!(client.get(&server.info().url("/fail")).await, Outcome::ServerError);
    assert_eq!(client.get(&server.info().url("/fine")).await, Outcome::Ok);
}

#[tokio::test]
async fn drop_mode_stalls_without_closing_listener() {
    let dropped = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&dropped);
    let observer: Arc<dyn RequestObserver> =
        Arc::new(move |req: &RequestInfo, _: &ServerInfo| {
            if req.path() == "/stall" {
                counter.fetch_add(1, Ordering::SeqCst);
                Some(MockResponse::Drop)
            } else {
                None
            }
        });
    let server = MockServer::start_observed(ephemeral(), observer).await.unwrap();
    let client = common::fast_client();

    // Stalled request gets nothing back before its deadline.
    let stalled = client
        .poll_until_with(
            &server.info().url("/stall"),
            Expect::Is(Outcome::Ok),
            Duration::from_millis(300),
            Duration::from_millis(100),
        )
        .await;
    assert!(stalled.is_err());
    assert!(dropped.load(Ordering::SeqCst) >= 1);

    // The listener still accepts new connections.
    assert_eq!(client.get(&server.ready_url()).await, Outcome::Ok);
    assert_eq!(server.state(), ServerState::Serving);

    // A stall in flight ends once the server stops, without a response.
    let url = server.info().url("/stall");
    let pending = tokio::spawn({
        let client = client.clone();
        async move { client.get(&url).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(server.open_connections() >= 1);

    server.stop();
    let outcome = pending.await.unwrap();
    assert_ne!(outcome, Outcome::Ok);
}

#[tokio::test]
async fn dropped_response_keeps_connection_reusable() {
    let observer: Arc<dyn RequestObserver> = Arc::new(|req: &RequestInfo, _: &ServerInfo| {
        (req.path() == "/stall").then_some(MockResponse::Drop)
    });
    let server = MockServer::start_observed(ephemeral(), observer).await.unwrap();

    let mut stream = TcpStream::connect(server.addr()).await.unwrap();
    stream
        .write_all(
            b"GET /stall HTTP/1.1\r\nHost: mock\r\n\r\n\
              GET /ready HTTP/1.1\r\nHost: mock\r\n\r\n",
        )
        .await
        .unwrap();

    let mut received = Vec::new();
    let mut chunk = [0u8; 1024];
    tokio::time::timeout(Duration::from_secs(2), async {
        while !String::from_utf8_lossy(&received).ends_with(READY_BODY) {
            let n = stream.read(&mut chunk).await.unwrap();
            assert_ne!(n, 0, "connection closed before the second response");
            received.extend_from_slice(&chunk[..n]);
        }
    })
    .await
    .expect("no response to the pipelined request");

    // Exactly one response: the one for /ready.
    let text = String::from_utf8_lossy(&received);
    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"), "{text}");
    assert_eq!(text.matches("HTTP/1.1").count(), 1);
    assert_eq!(server.accepted_connections(), 1);
}

#[tokio::test]
async fn stop_makes_endpoint_unreachable() {
    let server = MockServer::start(ephemeral()).await.unwrap();
    let client = common::fast_client();
    let ready = server.ready_url();
    assert_eq!(client.get(&ready).await, Outcome::Ok);

    server.stop();
    server.stop();
    let outcome = client
        .poll_until(&ready, Expect::Is(Outcome::CouldntConnect))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::CouldntConnect);
    assert_eq!(server.state(), ServerState::Stopped);
}

#[tokio::test]
async fn dropping_the_handle_stops_the_server() {
    let server = MockServer::start(ephemeral()).await.unwrap();
    let ready = server.ready_url();
    drop(server);

    common::fast_client()
        .poll_until(&ready, Expect::Not(Outcome::Ok))
        .await
        .unwrap();
}

#[tokio::test]
async fn siblings_stop_independently() {
    let a = MockServer::start(ephemeral()).await.unwrap();
    let b = MockServer::start(ephemeral()).await.unwrap();
    let client = common::fast_client();

    a.stop();
    client
        .poll_until(&a.ready_url(), Expect::Not(Outcome::Ok))
        .await
        .unwrap();
    assert_eq!(client.get(&b.ready_url()).await, Outcome::Ok);
}
