//! Tokio-backed listener endpoints
//!
//! The transport servers themselves live elsewhere; an [`Endpoint`] only
//! binds the socket, remembers what kind of listener it is, and announces
//! `Listening` so the adapter can log it. Attach the adapter first, then call
//! [`Endpoint::listen`].

use parking_lot::RwLock;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;
use tracing::debug;

use brokerlog_core::{
    EventEmitter, EventSource, Handler, Listener, ListenerEvent, ListenerTraits, Protocol,
};

use crate::error::{LogError, Result};

/// Certificate chain and private key attached to a listener
pub struct TlsMaterial {
    cert_chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl TlsMaterial {
    /// From a single DER certificate and a DER private key
    pub fn from_der(cert_der: Vec<u8>, key_der: Vec<u8>) -> Result<Self> {
        let key = PrivateKeyDer::try_from(key_der)
            .map_err(|e| LogError::Tls(format!("invalid private key: {}", e)))?;
        Ok(Self {
            cert_chain: vec![CertificateDer::from(cert_der)],
            key,
        })
    }

    /// From PEM-encoded certificate chain and private key
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self> {
        let cert_chain = rustls_pemfile::certs(&mut &cert_pem[..])
            .collect::<io::Result<Vec<_>>>()?;
        if cert_chain.is_empty() {
            return Err(LogError::Tls("no certificate found".into()));
        }

        let key = rustls_pemfile::private_key(&mut &key_pem[..])?
            .ok_or_else(|| LogError::Tls("no private key found".into()))?;

        Ok(Self { cert_chain, key })
    }

    pub fn from_pem_files(cert_path: impl AsRef<Path>, key_path: impl AsRef<Path>) -> Result<Self> {
        let cert_pem = std::fs::read(cert_path)?;
        let key_pem = std::fs::read(key_path)?;
        Self::from_pem(&cert_pem, &key_pem)
    }

    pub fn cert_chain(&self) -> &[CertificateDer<'static>] {
        &self.cert_chain
    }

    /// Server-side TLS acceptor for this material
    pub fn acceptor(&self) -> Result<TlsAcceptor> {
        let provider = Arc::new(tokio_rustls::rustls::crypto::ring::default_provider());
        let config = ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| LogError::Tls(format!("TLS config failed: {}", e)))?
            .with_no_client_auth()
            .with_single_cert(self.cert_chain.clone(), self.key.clone_key())
            .map_err(|e| LogError::Tls(format!("TLS config failed: {}", e)))?;
        Ok(TlsAcceptor::from(Arc::new(config)))
    }
}

impl Clone for TlsMaterial {
    fn clone(&self) -> Self {
        Self {
            cert_chain: self.cert_chain.clone(),
            key: self.key.clone_key(),
        }
    }
}

impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("certificates", &self.cert_chain.len())
            .finish_non_exhaustive()
    }
}

/// A bindable listener announcing its `Listening` transition
pub struct Endpoint {
    addr: String,
    tls: Option<TlsMaterial>,
    http: bool,
    local_addr: RwLock<Option<SocketAddr>>,
    events: EventEmitter<ListenerEvent>,
}

impl Endpoint {
    /// An endpoint that will bind `addr` (e.g. "0.0.0.0:1883")
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            tls: None,
            http: false,
            local_addr: RwLock::new(None),
            events: EventEmitter::new(),
        }
    }

    pub fn with_tls(mut self, material: TlsMaterial) -> Self {
        self.tls = Some(material);
        self
    }

    /// Mark the endpoint as performing HTTP request framing
    pub fn http(mut self) -> Self {
        self.http = true;
        self
    }

    pub fn tls_material(&self) -> Option<&TlsMaterial> {
        self.tls.as_ref()
    }

    pub fn tls_acceptor(&self) -> Result<Option<TlsAcceptor>> {
        self.tls.as_ref().map(TlsMaterial::acceptor).transpose()
    }

    pub fn protocol(&self) -> Protocol {
        ListenerTraits::of(self).protocol()
    }

    /// Bind the socket and announce `Listening`. An endpoint listens once.
    pub async fn listen(&self) -> Result<TcpListener> {
        if let Some(addr) = *self.local_addr.read() {
            return Err(LogError::AlreadyListening(addr));
        }

        let listener = TcpListener::bind(&self.addr).await?;
        let local = listener.local_addr()?;
        {
            let mut slot = self.local_addr.write();
            if let Some(addr) = *slot {
                return Err(LogError::AlreadyListening(addr));
            }
            *slot = Some(local);
        }

        debug!("{} endpoint bound on {}", self.protocol(), local);
        self.events.emit(&ListenerEvent::Listening);
        Ok(listener)
    }
}

impl EventSource<ListenerEvent> for Endpoint {
    fn on(&self, handler: Handler<ListenerEvent>) {
        self.events.on(handler);
    }
}

impl Listener for Endpoint {
    fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.read()
    }

    fn has_tls_material(&self) -> bool {
        self.tls.is_some()
    }

    fn is_http(&self) -> bool {
        self.http
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("addr", &self.addr)
            .field("protocol", &self.protocol())
            .field("local_addr", &*self.local_addr.read())
            .finish()
    }
}
