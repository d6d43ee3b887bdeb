use super::config::{ProxyConfig, ProxyConfigBuilder};
use super::pipeline::{RelayOutcome, RelayPipeline, RelayState};
use crate::common::{FixedOriginConnector, spawn_origin};
use crate::http::{FrameConfig, HttpError, MessageKind, receive_message};
use crate::transform::{BLOCKED_BODY, DescriptorSource, TransformDescriptor};
use crate::ProxyError;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, duplex};

fn test_config() -> ProxyConfig {
    ProxyConfigBuilder::new()
        .buffer_size(16)
        .read_timeout(Duration::from_secs(5))
        .write_timeout(Duration::from_secs(5))
        .build()
}

fn descriptor() -> TransformDescriptor {
    TransformDescriptor::new("X-ElQuePregunta", "ops@example.com")
        .block("/blocked")
        .replace("Hello", "[X]")
        .replace("World", "[Y]")
}

/// An address with nothing listening on it
fn dead_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Runs one pipeline against `request`, returning its result and whatever the client received
async fn run_pipeline(
    config: &ProxyConfig,
    source: &DescriptorSource,
    connector: &FixedOriginConnector,
    request: &[u8],
    close_after_write: bool,
) -> (crate::Result<RelayOutcome>, RelayState, Vec<u8>) {
    let (mut client, mut proxy_side): (DuplexStream, DuplexStream) = duplex(64 * 1024);

    client.write_all(request).await.unwrap();
    if close_after_write {
        client.shutdown().await.unwrap();
    }

    let mut pipeline = RelayPipeline::new(config, source, connector);
    let result = pipeline.run(&mut proxy_side).await;
    let state = pipeline.state();
    drop(proxy_side);

    let mut received = Vec::new();
    client.read_to_end(&mut received).await.unwrap();
    (result, state, received)
}

async fn parse_response(bytes: &[u8]) -> crate::http::HttpMessage {
    let mut reader = bytes;
    receive_message(&mut reader, MessageKind::Response, &FrameConfig::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_blocked_request_never_contacts_origin() {
    let config = test_config();
    let source = DescriptorSource::from(descriptor());
    let connector = FixedOriginConnector::new(dead_addr());

    let (result, state, received) = run_pipeline(
        &config,
        &source,
        &connector,
        b"GET /blocked HTTP/1.0\r\nHost: example.com\r\n\r\n",
        false,
    )
    .await;

    assert_eq!(
        result.unwrap(),
        RelayOutcome::Blocked {
            resource: "/blocked".to_string()
        }
    );
    assert_eq!(state, RelayState::Closed);
    assert_eq!(connector.connects().load(Ordering::SeqCst), 0);

    let response = parse_response(&received).await;
    assert_eq!(response.start_line().http_version(), "HTTP/1.0");
    assert_eq!(response.status_code(), Some("403"));
    assert_eq!(response.start_line().fields()[2].1, "Blocked address");
    assert_eq!(response.content_length().unwrap(), Some(BLOCKED_BODY.len()));
    assert_eq!(&response.body()[..], BLOCKED_BODY.as_bytes());
}

#[tokio::test]
async fn test_relay_injects_header_and_redacts_response() {
    let (origin_addr, origin) = spawn_origin(
        b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 11\r\n\r\nHello World"
            .to_vec(),
    )
    .await
    .unwrap();

    let config = test_config();
    let source = DescriptorSource::from(descriptor());
    let connector = FixedOriginConnector::new(origin_addr);

    let (result, state, received) = run_pipeline(
        &config,
        &source,
        &connector,
        b"POST /form HTTP/1.1\r\nHost: example.com\r\nContent-Length: 9\r\n\r\nname=test",
        false,
    )
    .await;

    assert_eq!(
        result.unwrap(),
        RelayOutcome::Relayed {
            origin: "example.com:80".to_string(),
            status: "200".to_string()
        }
    );
    assert_eq!(state, RelayState::Closed);
    assert_eq!(connector.connects().load(Ordering::SeqCst), 1);

    let forwarded = origin.await.unwrap().unwrap();
    assert_eq!(forwarded.resource(), Some("/form"));
    assert_eq!(
        forwarded.headers().get("X-ElQuePregunta"),
        Some("ops@example.com")
    );
    assert_eq!(&forwarded.body()[..], b"name=test");

    let response = parse_response(&received).await;
    assert_eq!(&response.body()[..], b"[X] [Y]");
    assert_eq!(response.content_length().unwrap(), Some(7));
    assert_eq!(response.headers().get("Content-Type"), Some("text/plain"));
}

#[tokio::test]
async fn test_relay_keeps_non_utf8_header_bytes() {
    const ORIGIN_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\n\
        Content-Disposition: attachment; filename=caf\xe9.txt\r\n\
        Content-Length: 2\r\n\r\nok";
    let (origin_addr, _origin) = spawn_origin(ORIGIN_RESPONSE.to_vec()).await.unwrap();

    let config = test_config();
    let source = DescriptorSource::from(descriptor());
    let connector = FixedOriginConnector::new(origin_addr);

    let (result, _, received) = run_pipeline(
        &config,
        &source,
        &connector,
        b"GET /download HTTP/1.1\r\nHost: example.com\r\n\r\n",
        false,
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(received, ORIGIN_RESPONSE);
}

#[tokio::test]
async fn test_missing_host_aborts_before_connecting() {
    let config = test_config();
    let source = DescriptorSource::from(descriptor());
    let connector = FixedOriginConnector::new(dead_addr());

    let (result, state, received) =
        run_pipeline(&config, &source, &connector, b"GET / HTTP/1.1\r\n\r\n", false).await;

    assert!(matches!(result, Err(ProxyError::MissingHost)));
    assert_eq!(state, RelayState::RequestReceived);
    assert_eq!(connector.connects().load(Ordering::SeqCst), 0);
    assert!(received.is_empty());
}

#[tokio::test]
async fn test_invalid_host_aborts_before_connecting() {
    let config = test_config();
    let source = DescriptorSource::from(descriptor());
    let connector = FixedOriginConnector::new(dead_addr());

    let (result, state, received) = run_pipeline(
        &config,
        &source,
        &connector,
        b"GET / HTTP/1.1\r\nHost: example.com:http\r\n\r\n",
        false,
    )
    .await;

    assert!(matches!(result, Err(ProxyError::InvalidHost(ref h)) if h == "example.com:http"));
    assert_eq!(state, RelayState::RequestReceived);
    assert_eq!(connector.connects().load(Ordering::SeqCst), 0);
    assert!(received.is_empty());
}

#[tokio::test]
async fn test_client_closing_mid_head_is_closed_early() {
    let config = test_config();
    let source = DescriptorSource::from(descriptor());
    let connector = FixedOriginConnector::new(dead_addr());

    let (result, state, _) = run_pipeline(
        &config,
        &source,
        &connector,
        b"GET / HTTP/1.1\r\nHost: exa",
        true,
    )
    .await;

    match result {
        Err(ProxyError::Http(e)) => assert!(e.is_closed_early()),
        other => panic!("Expected ConnectionClosedEarly, got {other:?}"),
    }
    assert_eq!(state, RelayState::AwaitRequest);
}

#[tokio::test]
async fn test_client_closing_mid_body_is_closed_early() {
    let config = test_config();
    let source = DescriptorSource::from(descriptor());
    let connector = FixedOriginConnector::new(dead_addr());

    let (result, _, _) = run_pipeline(
        &config,
        &source,
        &connector,
        b"POST / HTTP/1.1\r\nHost: example.com\r\nContent-Length: 100\r\n\r\nshort",
        true,
    )
    .await;

    assert!(matches!(
        result,
        Err(ProxyError::Http(HttpError::ConnectionClosedEarly { received: 5, .. }))
    ));
}

#[tokio::test]
async fn test_origin_closing_mid_body_aborts() {
    let (origin_addr, _origin) =
        spawn_origin(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nabc".to_vec())
            .await
            .unwrap();

    let config = test_config();
    let source = DescriptorSource::from(descriptor());
    let connector = FixedOriginConnector::new(origin_addr);

    let (result, state, received) = run_pipeline(
        &config,
        &source,
        &connector,
        b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n",
        false,
    )
    .await;

    assert!(matches!(
        result,
        Err(ProxyError::Http(HttpError::ConnectionClosedEarly { .. }))
    ));
    assert_eq!(state, RelayState::Forwarding);
    assert!(received.is_empty());
}

#[tokio::test]
async fn test_unavailable_config_aborts_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config();
    let source = DescriptorSource::File(dir.path().join("absent.json"));
    let connector = FixedOriginConnector::new(dead_addr());

    let (result, _, received) = run_pipeline(
        &config,
        &source,
        &connector,
        b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n",
        false,
    )
    .await;

    assert!(matches!(result, Err(ProxyError::ConfigUnavailable { .. })));
    assert_eq!(connector.connects().load(Ordering::SeqCst), 0);
    assert!(received.is_empty());
}

#[tokio::test]
async fn test_origin_connect_failure_aborts_pipeline() {
    let config = test_config();
    let source = DescriptorSource::from(descriptor());
    let connector = FixedOriginConnector::new(dead_addr());

    let (result, state, _) = run_pipeline(
        &config,
        &source,
        &connector,
        b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n",
        false,
    )
    .await;

    assert!(matches!(result, Err(ProxyError::OriginConnect { .. })));
    assert_eq!(state, RelayState::Forwarding);
    assert_eq!(connector.connects().load(Ordering::SeqCst), 1);
}

#[test]
fn test_config_builder() {
    let config = ProxyConfigBuilder::new()
        .max_connections(5)
        .buffer_size(64)
        .origin_port(8080)
        .max_head_size(1024)
        .max_body_size(2048)
        .connect_timeout(Duration::from_millis(250))
        .build();

    assert_eq!(config.max_connections, 5);
    assert_eq!(config.buffer_size, 64);
    assert_eq!(config.origin_port, 8080);

    let frame = config.frame_config();
    assert_eq!(frame.chunk_size, 64);
    assert_eq!(frame.max_head_size, 1024);
    assert_eq!(frame.max_body_size, 2048);
    assert_eq!(config.connect_timeout, Duration::from_millis(250));
}

#[test]
fn test_config_default() {
    let config = ProxyConfig::default();
    assert_eq!(config.bind_addr, "127.0.0.1:8888".parse::<SocketAddr>().unwrap());
    assert_eq!(config.origin_port, 80);
    assert_eq!(config.read_timeout, Duration::from_secs(30));
}

#[test]
fn test_file_overrides() {
    let file = crate::transform::ConfigFile::from_json(
        r#"{"mail": "m", "listen": "0.0.0.0:9000", "buffer_size": 64}"#,
    )
    .unwrap();
    let config = ProxyConfig::default().with_file_overrides(&file);

    assert_eq!(config.bind_addr, "0.0.0.0:9000".parse::<SocketAddr>().unwrap());
    assert_eq!(config.buffer_size, 64);
}
