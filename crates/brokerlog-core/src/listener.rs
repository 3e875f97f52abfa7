//! Collaborator traits observed by the adapter

use std::net::SocketAddr;

use crate::emitter::EventSource;
use crate::events::{BrokerEvent, ListenerEvent};

/// A message broker instance, observed only through its lifecycle events
pub trait Broker: EventSource<BrokerEvent> + Send + Sync {}

impl<T: EventSource<BrokerEvent> + Send + Sync + ?Sized> Broker for T {}

/// A socket-accepting listener that exposes the broker over some transport
pub trait Listener: EventSource<ListenerEvent> + Send + Sync {
    /// The bound address, once listening
    fn local_addr(&self) -> Option<SocketAddr>;

    /// True when both a private key and a certificate are attached
    fn has_tls_material(&self) -> bool {
        false
    }

    /// True when the listener frames HTTP requests (HTTP servers, WebSocket
    /// upgrade endpoints). Raw TCP and TLS listeners return false.
    fn is_http(&self) -> bool {
        false
    }
}
