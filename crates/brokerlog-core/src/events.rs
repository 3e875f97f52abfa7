//! Broker and listener lifecycle events
//!
//! The broker engine and the transport listeners are external collaborators.
//! These types are the fixed argument shapes they hand to the adapter.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Error;

/// Client identifier as announced in the MQTT CONNECT packet
pub type ClientId = String;

/// Token identifying one connection of a client.
///
/// Client ids are reused across reconnects and session takeovers; the session
/// token is not. Every clone of a [`ClientInfo`] carries the same token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

impl SessionId {
    /// A process-unique token
    pub fn next() -> Self {
        SessionId(NEXT_SESSION.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for SessionId {
    fn from(val: u64) -> Self {
        SessionId(val)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// MQTT quality of service level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum QoS {
    /// Fire and forget
    #[default]
    AtMostOnce = 0,
    /// Acknowledged delivery
    AtLeastOnce = 1,
    /// Four-step handshake delivery
    ExactlyOnce = 2,
}

impl QoS {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0 => Some(QoS::AtMostOnce),
            1 => Some(QoS::AtLeastOnce),
            2 => Some(QoS::ExactlyOnce),
            _ => None,
        }
    }
}

impl From<QoS> for u8 {
    fn from(qos: QoS) -> Self {
        qos as u8
    }
}

impl TryFrom<u8> for QoS {
    type Error = Error;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        QoS::from_u8(val).ok_or(Error::InvalidQos(val))
    }
}

/// A connected (or connecting) client as seen by the broker.
///
/// The broker hands clones of the same value to every event about one
/// connection, so `session` tells two connections with the same `id` apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub id: ClientId,
    #[serde(skip, default = "SessionId::next")]
    pub session: SessionId,
    /// Remote peer, when the broker knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_addr: Option<SocketAddr>,
}

impl ClientInfo {
    /// A client on a fresh session
    pub fn new(id: impl Into<ClientId>) -> Self {
        Self {
            id: id.into(),
            session: SessionId::next(),
            remote_addr: None,
        }
    }

    /// Use the broker's own session token
    pub fn with_session(mut self, session: impl Into<SessionId>) -> Self {
        self.session = session.into();
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }
}

/// One entry of a SUBSCRIBE request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub topic: String,
    pub qos: QoS,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, qos: QoS) -> Self {
        Self {
            topic: topic.into(),
            qos,
        }
    }
}

/// A PUBLISH packet travelling through the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishPacket {
    pub topic: String,
    pub qos: QoS,
    pub retain: bool,
    pub payload: Bytes,
}

impl PublishPacket {
    pub fn new(topic: impl Into<String>, qos: QoS, retain: bool) -> Self {
        Self {
            topic: topic.into(),
            qos,
            retain,
            payload: Bytes::new(),
        }
    }

    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }
}

/// A client-level fault reported by the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFault {
    pub message: String,
}

impl ClientFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ClientFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ClientFault {}

impl From<std::io::Error> for ClientFault {
    fn from(e: std::io::Error) -> Self {
        ClientFault::new(e.to_string())
    }
}

/// Lifecycle events emitted by a broker instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    /// A client completed its connection
    Client(ClientInfo),
    /// A client went away
    ClientDisconnect(ClientInfo),
    /// A client subscribed to one or more topic filters
    Subscribe {
        subscriptions: Vec<Subscription>,
        client: ClientInfo,
    },
    /// A client dropped one or more topic filters
    Unsubscribe {
        topics: Vec<String>,
        client: ClientInfo,
    },
    /// A client-level fault
    ClientError { client: ClientInfo, error: ClientFault },
    /// A message was published, by a client or by the broker itself
    Publish {
        packet: PublishPacket,
        client: Option<ClientInfo>,
    },
}

impl BrokerEvent {
    pub fn kind(&self) -> BrokerEventKind {
        match self {
            BrokerEvent::Client(_) => BrokerEventKind::Client,
            BrokerEvent::ClientDisconnect(_) => BrokerEventKind::ClientDisconnect,
            BrokerEvent::Subscribe { .. } => BrokerEventKind::Subscribe,
            BrokerEvent::Unsubscribe { .. } => BrokerEventKind::Unsubscribe,
            BrokerEvent::ClientError { .. } => BrokerEventKind::ClientError,
            BrokerEvent::Publish { .. } => BrokerEventKind::Publish,
        }
    }

    /// The client this event is about, if any
    pub fn client(&self) -> Option<&ClientInfo> {
        match self {
            BrokerEvent::Client(client) | BrokerEvent::ClientDisconnect(client) => Some(client),
            BrokerEvent::Subscribe { client, .. }
            | BrokerEvent::Unsubscribe { client, .. }
            | BrokerEvent::ClientError { client, .. } => Some(client),
            BrokerEvent::Publish { client, .. } => client.as_ref(),
        }
    }
}

/// Discriminant of [`BrokerEvent`], named after the broker's event names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrokerEventKind {
    Client,
    ClientDisconnect,
    Subscribe,
    Unsubscribe,
    ClientError,
    Publish,
}

impl BrokerEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrokerEventKind::Client => "client",
            BrokerEventKind::ClientDisconnect => "clientDisconnect",
            BrokerEventKind::Subscribe => "subscribe",
            BrokerEventKind::Unsubscribe => "unsubscribe",
            BrokerEventKind::ClientError => "clientError",
            BrokerEventKind::Publish => "publish",
        }
    }
}

impl fmt::Display for BrokerEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle events emitted by a network listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerEvent {
    /// The listener is bound and accepting connections
    Listening,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos_serializes_as_number() {
        let sub = Subscription::new("hello", QoS::AtMostOnce);
        let json = serde_json::to_value(&sub).unwrap();
        assert_eq!(json, serde_json::json!({ "topic": "hello", "qos": 0 }));
    }

    #[test]
    fn test_qos_rejects_out_of_range() {
        assert_eq!(QoS::try_from(3), Err(Error::InvalidQos(3)));
        assert!(serde_json::from_str::<QoS>("7").is_err());
        assert_eq!(serde_json::from_str::<QoS>("2").unwrap(), QoS::ExactlyOnce);
    }

    #[test]
    fn test_event_client_accessor() {
        let anonymous = BrokerEvent::Publish {
            packet: PublishPacket::new("$SYS/uptime", QoS::AtMostOnce, false),
            client: None,
        };
        assert!(anonymous.client().is_none());

        let sub = BrokerEvent::Subscribe {
            subscriptions: vec![Subscription::new("a/#", QoS::AtLeastOnce)],
            client: ClientInfo::new("c1"),
        };
        assert_eq!(sub.client().map(|c| c.id.as_str()), Some("c1"));
        assert_eq!(sub.kind().as_str(), "subscribe");
    }

    #[test]
    fn test_client_info_skips_missing_addr() {
        let json = serde_json::to_value(ClientInfo::new("abc")).unwrap();
        assert_eq!(json, serde_json::json!({ "id": "abc" }));
    }

    #[test]
    fn test_sessions_distinguish_same_id() {
        let first = ClientInfo::new("dup");
        let second = ClientInfo::new("dup");
        assert_ne!(first.session, second.session);
        assert_eq!(first.clone().session, first.session);

        let pinned = ClientInfo::new("dup").with_session(42);
        assert_eq!(pinned.session.as_u64(), 42);
    }
}
