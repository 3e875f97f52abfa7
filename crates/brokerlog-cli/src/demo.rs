//! Demo endpoints
//!
//! There is no MQTT here: every accepted connection is reported as a broker
//! client, its read errors as client errors, and EOF as a disconnect.

use anyhow::{Context, Result};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

use brokerlog::{Endpoint, Logging, TlsMaterial};
use brokerlog_core::{
    BrokerEvent, ClientFault, ClientInfo, EventEmitter, EventSource, Handler, Listener, Protocol,
};

use crate::config::{
    DemoConfig, EndpointConfig, DEFAULT_HTTPS_PORT, DEFAULT_HTTP_PORT, DEFAULT_TCP_PORT,
    DEFAULT_TLS_PORT,
};

/// Pause after a failed accept (e.g. out of file descriptors)
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Stand-in broker that turns raw connections into lifecycle events
#[derive(Default)]
pub struct ConnectionBroker {
    events: EventEmitter<BrokerEvent>,
    next_id: AtomicU64,
}

impl ConnectionBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_client(&self, protocol: Protocol, peer: SocketAddr) -> ClientInfo {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        ClientInfo::new(format!("{}-{}", protocol, n)).with_remote_addr(peer)
    }

    /// Handshake failed before the client counted as connected
    pub fn reject(&self, protocol: Protocol, peer: SocketAddr, error: ClientFault) {
        let client = self.next_client(protocol, peer);
        self.events.emit(&BrokerEvent::ClientError { client, error });
    }

    /// Report a connection from accept to EOF
    pub async fn track<S>(&self, protocol: Protocol, peer: SocketAddr, mut stream: S)
    where
        S: AsyncRead + Unpin,
    {
        let client = self.next_client(protocol, peer);
        self.events.emit(&BrokerEvent::Client(client.clone()));

        let mut buf = [0u8; 4096];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => debug!("{} bytes from {}", n, client.id),
                Err(e) => {
                    self.events.emit(&BrokerEvent::ClientError {
                        client: client.clone(),
                        error: ClientFault::from(e),
                    });
                    break;
                }
            }
        }

        self.events.emit(&BrokerEvent::ClientDisconnect(client));
    }
}

impl EventSource<BrokerEvent> for ConnectionBroker {
    fn on(&self, handler: Handler<BrokerEvent>) {
        self.events.on(handler);
    }
}

/// Bind every endpoint, log through the adapter, and serve until Ctrl+C
pub async fn run(config: DemoConfig) -> Result<()> {
    let endpoints = build_endpoints(&config.endpoints)?;
    let broker = Arc::new(ConnectionBroker::new());

    let broker = Logging::builder(broker)
        .servers(
            endpoints
                .iter()
                .map(|endpoint| endpoint.clone() as Arc<dyn Listener>),
        )
        .config(config.logging.clone())
        .attach()
        .context("Failed to attach logging")?;

    let mut tasks = JoinSet::new();
    for endpoint in &endpoints {
        let listener = endpoint
            .listen()
            .await
            .with_context(|| format!("Failed to bind {:?}", endpoint))?;
        let acceptor = endpoint.tls_acceptor()?;
        tasks.spawn(serve(
            listener,
            acceptor,
            endpoint.protocol(),
            Arc::clone(&*broker),
        ));
    }

    info!("{} endpoints up, press Ctrl+C to stop", endpoints.len());

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for ctrl+c")?;
            info!("Received shutdown signal");
        }
        Some(joined) = tasks.join_next() => {
            warn!("endpoint task exited: {:?}", joined);
        }
    }

    tasks.shutdown().await;
    Ok(())
}

fn build_endpoints(config: &EndpointConfig) -> Result<Vec<Arc<Endpoint>>> {
    let material = match (&config.cert, &config.key) {
        (Some(cert), Some(key)) => TlsMaterial::from_pem_files(cert, key)
            .with_context(|| format!("Failed to load TLS material from {}", cert.display()))?,
        _ => self_signed()?,
    };

    Ok(vec![
        Arc::new(Endpoint::new(config.addr(config.tcp_port.unwrap_or(DEFAULT_TCP_PORT)))),
        Arc::new(
            Endpoint::new(config.addr(config.tls_port.unwrap_or(DEFAULT_TLS_PORT)))
                .with_tls(material.clone()),
        ),
        Arc::new(Endpoint::new(config.addr(config.http_port.unwrap_or(DEFAULT_HTTP_PORT))).http()),
        Arc::new(
            Endpoint::new(config.addr(config.https_port.unwrap_or(DEFAULT_HTTPS_PORT)))
                .with_tls(material)
                .http(),
        ),
    ])
}

/// Self-signed certificate for localhost
fn self_signed() -> Result<TlsMaterial> {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .context("Failed to generate certificate")?;
    let cert_der = cert.serialize_der()?;
    let key_der = cert.serialize_private_key_der();
    Ok(TlsMaterial::from_der(cert_der, key_der)?)
}

async fn serve(
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    protocol: Protocol,
    broker: Arc<ConnectionBroker>,
) -> Result<()> {
    loop {
        let (stream, peer) = accept_retrying(protocol, || listener.accept()).await;

        let broker = Arc::clone(&broker);
        let acceptor = acceptor.clone();
        tokio::spawn(async move {
            match acceptor {
                Some(acceptor) => match acceptor.accept(stream).await {
                    Ok(tls) => broker.track(protocol, peer, tls).await,
                    Err(e) => broker.reject(protocol, peer, ClientFault::from(e)),
                },
                None => broker.track(protocol, peer, stream).await,
            }
        });
    }
}

/// Keep calling `accept` until it succeeds, backing off after each failure
async fn accept_retrying<T, F, Fut>(protocol: Protocol, mut accept: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(accepted) => return accepted,
            Err(e) => {
                warn!("{} accept error: {}", protocol, e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}
