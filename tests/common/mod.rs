//! Shared helpers for the integration tests

#![allow(dead_code)]

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::x509::{X509Builder, X509NameBuilder};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use wsgate::config::{ConfigValues, ValueSource};
use wsgate::{Gateway, GatewayConfig, GatewayHandle};

/// Write a self-signed `localhost` certificate and its key into one PEM file
pub fn write_combined_pem(dir: &Path) -> PathBuf {
    let rsa = Rsa::generate(2048).unwrap();
    let pkey = PKey::from_rsa(rsa).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", "localhost").unwrap();
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(7).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&pkey).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(1).unwrap()).unwrap();
    builder.sign(&pkey, MessageDigest::sha256()).unwrap();
    let cert = builder.build();

    let mut pem = cert.to_pem().unwrap();
    pem.extend(pkey.private_key_to_pem_pkcs8().unwrap());

    let path = dir.join("self.pem");
    std::fs::write(&path, pem).unwrap();
    path
}

/// Target that expects `expect` and answers with `reply`, then closes
pub async fn scripted_target(expect: &'static [u8], reply: &'static [u8]) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let task = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut received = vec![0u8; expect.len()];
        stream.read_exact(&mut received).await.unwrap();
        assert_eq!(received, expect);
        stream.write_all(reply).await.unwrap();
        stream.shutdown().await.unwrap();
    });

    (addr, task)
}

/// Start a gateway on an ephemeral loopback port
pub async fn start_gateway(values: ConfigValues) -> (SocketAddr, GatewayHandle) {
    let values = ConfigValues {
        listen: Some("127.0.0.1:0".parse().unwrap()),
        ..values
    };
    let config = GatewayConfig::default().merge(&values, ValueSource::CommandLine);

    let gateway = Gateway::bind(&config).await.unwrap();
    let addr = gateway.local_addr().unwrap();
    (addr, gateway.start())
}

/// Read until the blank line ending the response headers, plus `extra` bytes
pub async fn read_response<S: AsyncRead + Unpin>(stream: &mut S, extra: usize) -> Vec<u8> {
    let mut response = Vec::new();
    let mut byte = [0u8; 1];

    while !response.ends_with(b"\r\n\r\n") {
        let n = stream.read(&mut byte).await.unwrap();
        assert_ne!(n, 0, "connection closed during handshake: {:?}", String::from_utf8_lossy(&response));
        response.push(byte[0]);
    }

    let mut tail = vec![0u8; extra];
    stream.read_exact(&mut tail).await.unwrap();
    response.extend(tail);
    response
}

/// Read until a frame end marker arrives
pub async fn read_frames<S: AsyncRead + Unpin>(stream: &mut S) -> Vec<u8> {
    let mut frames = Vec::new();
    let mut chunk = [0u8; 1024];

    while frames.last() != Some(&0xFF) {
        let n = stream.read(&mut chunk).await.unwrap();
        assert_ne!(n, 0, "connection closed before a full frame arrived");
        frames.extend_from_slice(&chunk[..n]);
    }
    frames
}
