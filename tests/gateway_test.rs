//! End-to-end tests
//!
//! Each test runs a real gateway on a loopback port between a WebSocket
//! client and a scripted TCP target.

mod common;

use bytes::BytesMut;
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use std::pin::Pin;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_openssl::SslStream;

use common::{read_frames, read_response, scripted_target, start_gateway, write_combined_pem};
use wsgate::config::ConfigValues;
use wsgate::{FrameCodec, FrameDialect};

const HIXIE_76_REQUEST: &[u8] = b"GET /demo HTTP/1.1\r\n\
Host: example.com\r\n\
Connection: Upgrade\r\n\
Sec-WebSocket-Key2: 12998 5 Y3 1  .P00\r\n\
Upgrade: WebSocket\r\n\
Sec-WebSocket-Key1: 4 @1  46546xW%0l 1 5\r\n\
Origin: http://example.com\r\n\
\r\n\
^n:ds[4U";

fn plain_values(dir: &tempfile::TempDir, target: String) -> ConfigValues {
    ConfigValues {
        target: Some(target),
        cert: Some(dir.path().join("absent.pem")),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_hixie_75_base64_relay() {
    let dir = tempfile::tempdir().unwrap();
    let (target, target_task) = scripted_target(b"hello", b"world").await;
    let (addr, handle) = start_gateway(plain_values(&dir, target.to_string())).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client
        .write_all(b"GET /?b64encode HTTP/1.1\r\nHost: localhost\r\nOrigin: http://localhost\r\n\r\n")
        .await
        .unwrap();

    let response = String::from_utf8(read_response(&mut client, 0).await).unwrap();
    assert!(response.starts_with("HTTP/1.1 101 Web Socket Protocol Handshake\r\n"));
    assert!(response.contains("\r\nWebSocket-Origin: http://localhost\r\n"));
    assert!(response.contains("\r\nWebSocket-Location: ws://localhost/?b64encode\r\n"));
    assert!(!response.contains("Sec-"));

    client.write_all(b"\x00aGVsbG8=\xff").await.unwrap();

    let frames = read_frames(&mut client).await;
    assert_eq!(frames, b"\x00d29ybGQ=\xff");

    target_task.await.unwrap();
    handle.shutdown();
    timeout(Duration::from_secs(5), handle.join()).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_hixie_76_escaped_relay() {
    let dir = tempfile::tempdir().unwrap();
    let (target, target_task) = scripted_target(b"ping", b"pong\x00\xff").await;
    let (addr, handle) = start_gateway(plain_values(&dir, target.to_string())).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(HIXIE_76_REQUEST).await.unwrap();

    let response = read_response(&mut client, 16).await;
    let text = String::from_utf8_lossy(&response);
    assert!(text.contains("\r\nSec-WebSocket-Origin: http://example.com\r\n"));
    assert!(text.contains("\r\nSec-WebSocket-Location: ws://example.com/demo\r\n"));
    assert!(response.ends_with(b"\r\n\r\n8jKS'y:G*Co,Wxa-"));

    client.write_all(b"\x00ping\xff").await.unwrap();

    let frames = read_frames(&mut client).await;
    let codec = FrameCodec::new(FrameDialect::LegacyEscaped, false);
    let mut payload = BytesMut::new();
    codec.decode(&frames, &mut payload).unwrap();
    assert_eq!(&payload[..], b"pong\x00\xff");

    target_task.await.unwrap();
    handle.shutdown();
    timeout(Duration::from_secs(5), handle.join()).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_sequence_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let (target, target_task) = scripted_target(b"hi", b"abc").await;
    let (addr, handle) = start_gateway(plain_values(&dir, target.to_string())).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client
        .write_all(b"GET /?b64encode&seq_num HTTP/1.1\r\nHost: localhost\r\nOrigin: http://localhost\r\n\r\n")
        .await
        .unwrap();
    read_response(&mut client, 0).await;

    client.write_all(b"\x00aGk=\xff").await.unwrap();
    assert_eq!(read_frames(&mut client).await, b"\x000:YWJj\xff");

    target_task.await.unwrap();
    handle.shutdown();
    timeout(Duration::from_secs(5), handle.join()).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_secure_relay() {
    let dir = tempfile::tempdir().unwrap();
    let cert = write_combined_pem(dir.path());
    let (target, target_task) = scripted_target(b"hello", b"world").await;
    let (addr, handle) = start_gateway(ConfigValues {
        target: Some(target.to_string()),
        cert: Some(cert),
        ..Default::default()
    })
    .await;

    let mut connector = SslConnector::builder(SslMethod::tls_client()).unwrap();
    connector.set_verify(SslVerifyMode::NONE);
    let connector = connector.build();
    let ssl = connector.configure().unwrap().into_ssl("localhost").unwrap();

    let tcp = TcpStream::connect(addr).await.unwrap();
    let mut client = SslStream::new(ssl, tcp).unwrap();
    Pin::new(&mut client).connect().await.unwrap();

    client
        .write_all(b"GET /?b64encode HTTP/1.1\r\nHost: localhost\r\nOrigin: https://localhost\r\n\r\n")
        .await
        .unwrap();

    let response = String::from_utf8(read_response(&mut client, 0).await).unwrap();
    assert!(response.contains("\r\nWebSocket-Location: wss://localhost/?b64encode\r\n"));

    client.write_all(b"\x00aGVsbG8=\xff").await.unwrap();
    assert_eq!(read_frames(&mut client).await, b"\x00d29ybGQ=\xff");

    target_task.await.unwrap();
    handle.shutdown();
    timeout(Duration::from_secs(5), handle.join()).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_ssl_only_refuses_plain_client() {
    let dir = tempfile::tempdir().unwrap();
    let cert = write_combined_pem(dir.path());
    let (addr, handle) = start_gateway(ConfigValues {
        target: Some("127.0.0.1:1".to_string()),
        cert: Some(cert),
        ssl_only: Some(true),
        ..Default::default()
    })
    .await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nOrigin: http://localhost\r\n\r\n")
        .await
        .unwrap();

    // Dropped without a response; unread request bytes may turn the close into a reset
    let mut response = Vec::new();
    match timeout(Duration::from_secs(5), client.read_to_end(&mut response)).await.unwrap() {
        Ok(_) => assert!(response.is_empty()),
        Err(e) => assert_eq!(e.kind(), std::io::ErrorKind::ConnectionReset),
    }

    handle.shutdown();
    timeout(Duration::from_secs(5), handle.join()).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_flash_policy_probe() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, handle) = start_gateway(plain_values(&dir, "127.0.0.1:1".to_string())).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"<policy-file-request/>\0").await.unwrap();

    let mut response = Vec::new();
    timeout(Duration::from_secs(5), client.read_to_end(&mut response))
        .await
        .unwrap()
        .unwrap();
    let text = String::from_utf8(response).unwrap();
    assert!(text.contains("<cross-domain-policy>"));
    assert!(text.contains("to-ports=\"*\""));

    handle.shutdown();
    timeout(Duration::from_secs(5), handle.join()).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_ends_active_relay() {
    let dir = tempfile::tempdir().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let target = listener.local_addr().unwrap();
    let target_task = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut rest = Vec::new();
        // Returns once the gateway lets go of the target leg
        let _ = stream.read_to_end(&mut rest).await;
    });

    let (addr, handle) = start_gateway(plain_values(&dir, target.to_string())).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    client
        .write_all(b"GET /?b64encode HTTP/1.1\r\nHost: localhost\r\nOrigin: http://localhost\r\n\r\n")
        .await
        .unwrap();
    read_response(&mut client, 0).await;

    handle.shutdown();
    timeout(Duration::from_secs(5), handle.join()).await.unwrap().unwrap();
    timeout(Duration::from_secs(5), target_task).await.unwrap().unwrap();

    let mut rest = Vec::new();
    let _ = timeout(Duration::from_secs(5), client.read_to_end(&mut rest)).await.unwrap();
}
