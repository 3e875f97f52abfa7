//! Endpoint tests against real sockets
//!
//! - Bound port appears in the listening record
//! - An endpoint listens once
//! - TLS material switches the protocol label and builds an acceptor

use brokerlog::{Endpoint, LogError, Logging, TlsMaterial};
use brokerlog_core::{Listener, Protocol};
use brokerlog_test_utils::{wait_for_records, CaptureSink, ScriptedBroker};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn self_signed() -> TlsMaterial {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert_pem = cert.serialize_pem().unwrap();
    let key_pem = cert.serialize_private_key_pem();
    TlsMaterial::from_pem(cert_pem.as_bytes(), key_pem.as_bytes()).unwrap()
}

#[tokio::test]
async fn test_listen_logs_bound_port() {
    let capture = CaptureSink::new();
    let endpoint = Arc::new(Endpoint::new("127.0.0.1:0"));

    let _broker = Logging::builder(Arc::new(ScriptedBroker::new()))
        .server(endpoint.clone())
        .sink(capture.sink())
        .attach()
        .unwrap();

    let listener = endpoint.listen().await.unwrap();
    let port = listener.local_addr().unwrap().port();

    assert!(wait_for_records(&capture, 1).await);
    let records = capture.with_msg("listening");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["protocol"], "tcp");
    assert_eq!(records[0]["port"], port);
    assert_eq!(records[0]["address"], "127.0.0.1");
    assert_eq!(endpoint.local_addr().map(|a| a.port()), Some(port));
}

#[tokio::test]
async fn test_listen_twice_rejected() {
    let endpoint = Endpoint::new("127.0.0.1:0");
    let _listener = endpoint.listen().await.unwrap();

    let err = endpoint.listen().await.unwrap_err();
    assert!(matches!(err, LogError::AlreadyListening(_)));
}

#[tokio::test]
async fn test_bind_failure_is_io_error() {
    let first = Endpoint::new("127.0.0.1:0");
    let listener = first.listen().await.unwrap();
    let taken = listener.local_addr().unwrap();

    let second = Endpoint::new(taken.to_string());
    assert!(matches!(second.listen().await, Err(LogError::Io(_))));
    assert!(second.local_addr().is_none());
}

#[tokio::test]
async fn test_tls_endpoints_are_labelled_secure() {
    let capture = CaptureSink::new();
    let tls = Arc::new(Endpoint::new("127.0.0.1:0").with_tls(self_signed()));
    let https = Arc::new(Endpoint::new("127.0.0.1:0").with_tls(self_signed()).http());

    assert_eq!(tls.protocol(), Protocol::Tls);
    assert_eq!(https.protocol(), Protocol::Https);

    let _broker = Logging::builder(Arc::new(ScriptedBroker::new()))
        .servers(vec![
            tls.clone() as Arc<dyn Listener>,
            https.clone() as Arc<dyn Listener>,
        ])
        .sink(capture.sink())
        .attach()
        .unwrap();

    let _a = tls.listen().await.unwrap();
    let _b = https.listen().await.unwrap();

    let protocols: Vec<_> = capture
        .with_msg("listening")
        .iter()
        .map(|r| r["protocol"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(protocols, ["tls", "https"]);
}

#[tokio::test]
async fn test_tls_acceptor_from_generated_material() {
    let endpoint = Endpoint::new("127.0.0.1:0").with_tls(self_signed());
    assert!(endpoint.tls_acceptor().unwrap().is_some());
    assert_eq!(endpoint.tls_material().unwrap().cert_chain().len(), 1);

    let plain = Endpoint::new("127.0.0.1:0");
    assert!(plain.tls_acceptor().unwrap().is_none());
}

#[tokio::test]
async fn test_listener_accepts_connections() {
    let endpoint = Endpoint::new("127.0.0.1:0");
    let listener = endpoint.listen().await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4];
        socket.read_exact(&mut buf).await.unwrap();
        buf
    });

    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"ping").await.unwrap();

    assert_eq!(&server.await.unwrap(), b"ping");
}
