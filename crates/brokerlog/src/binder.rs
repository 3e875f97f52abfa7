//! Event-to-log binder
//!
//! Maps every broker and listener lifecycle event to exactly one record:
//!
//! | event | level | logger | msg |
//! |-------|-------|--------|-----|
//! | listening | info | root | `listening` |
//! | client | info | new child | `connected` |
//! | clientDisconnect | info | child | `disconnected` |
//! | clientDisconnect (unknown client) | warn | root | `disconnect without connect` |
//! | subscribe | info | child | `subscribed` |
//! | unsubscribe | info | child | `unsubscribed` |
//! | clientError | warn | child, else root + raw client | error message |
//! | publish (broker) | debug | root | `published` |
//! | publish (client) | info | child | `published` |
//!
//! Child loggers are tracked per session, not per client id: when a second
//! connection takes over an id, the late disconnect of the first one still
//! logs through the first child and leaves the second in place.
//!
//! Binding is not idempotent: every call registers another set of handlers,
//! so binding twice on the same instance logs every event twice.

use dashmap::DashMap;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

use brokerlog_core::{
    Broker, BrokerEvent, ClientFault, ClientInfo, Handler, Listener, ListenerEvent,
    ListenerTraits, PublishPacket, QoS, SessionId, Subscription,
};

use crate::logger::{ClientLogger, Logger};
use crate::record::Json;

/// The part of a PUBLISH packet that gets logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageSummary<'a> {
    pub topic: &'a str,
    pub qos: QoS,
    pub retain: bool,
}

impl<'a> From<&'a PublishPacket> for MessageSummary<'a> {
    fn from(packet: &'a PublishPacket) -> Self {
        Self {
            topic: &packet.topic,
            qos: packet.qos,
            retain: packet.retain,
        }
    }
}

/// Handler state for one binding of one broker instance
pub struct BrokerBinder {
    logger: Logger,
    /// Child loggers of connected sessions
    clients: DashMap<SessionId, ClientLogger>,
    log_publish: bool,
}

impl BrokerBinder {
    pub fn new(logger: Logger, log_publish: bool) -> Self {
        Self {
            logger,
            clients: DashMap::new(),
            log_publish,
        }
    }

    /// Register the handler on a broker and return the shared binder state
    pub fn bind<B: Broker + ?Sized>(broker: &B, logger: Logger, log_publish: bool) -> Arc<Self> {
        let binder = Arc::new(Self::new(logger, log_publish));
        let state = binder.clone();
        let handler: Handler<BrokerEvent> =
            Arc::new(move |event: &BrokerEvent| state.handle(event));
        broker.on(handler);
        binder
    }

    /// Child logger of a connected client session
    pub fn client_logger(&self, client: &ClientInfo) -> Option<ClientLogger> {
        self.clients
            .get(&client.session)
            .map(|entry| entry.value().clone())
    }

    /// True while any session of `client_id` is connected
    pub fn is_connected(&self, client_id: &str) -> bool {
        self.clients
            .iter()
            .any(|entry| entry.value().client_id() == client_id)
    }

    pub fn connected_clients(&self) -> usize {
        self.clients.len()
    }

    pub fn handle(&self, event: &BrokerEvent) {
        match event {
            BrokerEvent::Client(client) => self.on_connect(client),
            BrokerEvent::ClientDisconnect(client) => self.on_disconnect(client),
            BrokerEvent::Subscribe {
                subscriptions,
                client,
            } => self.on_subscribe(subscriptions, client),
            BrokerEvent::Unsubscribe { topics, client } => self.on_unsubscribe(topics, client),
            BrokerEvent::ClientError { client, error } => self.on_client_error(client, error),
            BrokerEvent::Publish { packet, client } => {
                if self.log_publish {
                    self.on_publish(packet, client.as_ref());
                }
            }
        }
    }

    fn on_connect(&self, client: &ClientInfo) {
        let child = self.logger.child(&client.id);
        child.info("connected");
        self.clients.insert(client.session, child);
    }

    fn on_disconnect(&self, client: &ClientInfo) {
        match self.clients.remove(&client.session) {
            Some((_, child)) => child.info("disconnected"),
            None => self.logger.warn("disconnect without connect"),
        }
    }

    fn on_subscribe(&self, subscriptions: &[Subscription], client: &ClientInfo) {
        self.in_client_scope(client, || {
            info!(subscriptions = ?Json(subscriptions), "subscribed");
        });
    }

    fn on_unsubscribe(&self, topics: &[String], client: &ClientInfo) {
        self.in_client_scope(client, || {
            info!(topics = ?Json(topics), "unsubscribed");
        });
    }

    fn on_client_error(&self, client: &ClientInfo, error: &ClientFault) {
        match self.client_logger(client) {
            Some(child) => child.in_scope(|| {
                warn!(err = error.message.as_str(), "{}", error);
            }),
            None => self.logger.in_scope(|| {
                warn!(client = ?Json(client), err = error.message.as_str(), "{}", error);
            }),
        }
    }

    fn on_publish(&self, packet: &PublishPacket, client: Option<&ClientInfo>) {
        let message = MessageSummary::from(packet);
        match client {
            Some(client) => self.in_client_scope(client, || {
                info!(msg = "published", message = ?Json(&message));
            }),
            None => self.logger.in_scope(|| {
                debug!(msg = "published", message = ?Json(&message));
            }),
        }
    }

    /// Run `f` under the client's child logger. Events naming a client that
    /// never connected fall back to the root logger with the id bound ad hoc.
    fn in_client_scope(&self, client: &ClientInfo, f: impl FnOnce()) {
        match self.client_logger(client) {
            Some(child) => child.in_scope(f),
            None => self.logger.child(&client.id).in_scope(f),
        }
    }
}

impl std::fmt::Debug for BrokerBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerBinder")
            .field("clients", &self.clients.len())
            .field("log_publish", &self.log_publish)
            .finish()
    }
}

/// Register the "listening" handler on a listener.
///
/// The handler keeps only a weak reference, so the listener is released as
/// soon as its owner drops it.
pub fn bind_listener(listener: &Arc<dyn Listener>, logger: Logger) {
    let weak: Weak<dyn Listener> = Arc::downgrade(listener);
    let handler: Handler<ListenerEvent> = Arc::new(move |event: &ListenerEvent| match event {
        ListenerEvent::Listening => {
            if let Some(listener) = weak.upgrade() {
                log_listening(&logger, listener.as_ref());
            }
        }
    });
    listener.on(handler);
}

fn log_listening(logger: &Logger, listener: &dyn Listener) {
    let protocol = ListenerTraits::of(listener).protocol();
    logger.in_scope(|| match listener.local_addr() {
        Some(addr) => info!(
            address = %addr.ip(),
            port = addr.port(),
            family = family(&addr),
            protocol = protocol.as_str(),
            "listening"
        ),
        None => info!(protocol = protocol.as_str(), "listening"),
    });
}

fn family(addr: &SocketAddr) -> &'static str {
    match addr {
        SocketAddr::V4(_) => "IPv4",
        SocketAddr::V6(_) => "IPv6",
    }
}
