//! Common test helpers for brokerlog tests
//!
//! - In-memory capture of emitted records
//! - Scripted broker and listener doubles that emit events on demand
//! - Condition-based waiting for async endpoint tests

use brokerlog::LogSink;
use brokerlog_core::{
    BrokerEvent, ClientFault, ClientInfo, EventEmitter, EventSource, Handler, Listener,
    ListenerEvent, PublishPacket, QoS, Subscription,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Record Capture
// ============================================================================

/// Shared in-memory buffer usable as a [`LogSink`]
#[derive(Clone, Default)]
pub struct CaptureSink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink writing into this buffer
    pub fn sink(&self) -> LogSink {
        LogSink::from_writer(self.clone())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }

    /// Every record written so far, parsed from NDJSON
    pub fn records(&self) -> Vec<Value> {
        self.text()
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line)
                    .unwrap_or_else(|e| panic!("invalid record {:?}: {}", line, e))
            })
            .collect()
    }

    /// Records whose `msg` equals `msg`
    pub fn with_msg(&self, msg: &str) -> Vec<Value> {
        self.records()
            .into_iter()
            .filter(|record| record["msg"] == msg)
            .collect()
    }

    /// The `msg` of every record, in order
    pub fn messages(&self) -> Vec<String> {
        self.records()
            .iter()
            .map(|record| record["msg"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn clear(&self) {
        self.buf.lock().clear();
    }
}

impl Write for CaptureSink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ============================================================================
// Scripted Collaborators
// ============================================================================

/// Broker double: emits whatever lifecycle events the test scripts.
///
/// Each `connect` opens a new session for the id. Later events for the id go
/// to its newest session; `disconnect` closes the oldest one, the way a broker
/// reports a taken-over connection going away. Events for an id with no open
/// session carry a session the adapter has never seen.
#[derive(Default)]
pub struct ScriptedBroker {
    events: EventEmitter<BrokerEvent>,
    sessions: Mutex<HashMap<String, VecDeque<ClientInfo>>>,
}

impl ScriptedBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: BrokerEvent) {
        self.events.emit(&event);
    }

    pub fn handler_count(&self) -> usize {
        self.events.handler_count()
    }

    /// Newest open session of `id`, or an unknown one
    pub fn session(&self, id: &str) -> ClientInfo {
        self.sessions
            .lock()
            .get(id)
            .and_then(|open| open.back().cloned())
            .unwrap_or_else(|| ClientInfo::new(id))
    }

    pub fn connect(&self, id: &str) -> ClientInfo {
        let client = ClientInfo::new(id);
        self.sessions
            .lock()
            .entry(id.to_string())
            .or_default()
            .push_back(client.clone());
        self.emit(BrokerEvent::Client(client.clone()));
        client
    }

    pub fn disconnect(&self, id: &str) {
        let oldest = self
            .sessions
            .lock()
            .get_mut(id)
            .and_then(|open| open.pop_front());
        let client = oldest.unwrap_or_else(|| ClientInfo::new(id));
        self.emit(BrokerEvent::ClientDisconnect(client));
    }

    pub fn subscribe(&self, id: &str, filters: &[(&str, QoS)]) {
        self.emit(BrokerEvent::Subscribe {
            subscriptions: filters
                .iter()
                .map(|(topic, qos)| Subscription::new(*topic, *qos))
                .collect(),
            client: self.session(id),
        });
    }

    pub fn unsubscribe(&self, id: &str, topics: &[&str]) {
        self.emit(BrokerEvent::Unsubscribe {
            topics: topics.iter().map(|t| t.to_string()).collect(),
            client: self.session(id),
        });
    }

    pub fn client_error(&self, id: &str, message: &str) {
        self.emit(BrokerEvent::ClientError {
            client: self.session(id),
            error: ClientFault::new(message),
        });
    }

    /// Publish attributed to `client`, or by the broker itself when `None`
    pub fn publish(&self, topic: &str, qos: QoS, retain: bool, client: Option<&str>) {
        self.emit(BrokerEvent::Publish {
            packet: PublishPacket::new(topic, qos, retain),
            client: client.map(|id| self.session(id)),
        });
    }
}

impl EventSource<BrokerEvent> for ScriptedBroker {
    fn on(&self, handler: Handler<BrokerEvent>) {
        self.events.on(handler);
    }
}

/// Listener double with configurable traits and a scripted bind
pub struct ScriptedListener {
    events: EventEmitter<ListenerEvent>,
    local_addr: Mutex<Option<SocketAddr>>,
    tls: bool,
    http: bool,
}

impl ScriptedListener {
    pub fn new(tls: bool, http: bool) -> Self {
        Self {
            events: EventEmitter::new(),
            local_addr: Mutex::new(None),
            tls,
            http,
        }
    }

    pub fn tcp() -> Self {
        Self::new(false, false)
    }

    pub fn tls() -> Self {
        Self::new(true, false)
    }

    pub fn http() -> Self {
        Self::new(false, true)
    }

    pub fn https() -> Self {
        Self::new(true, true)
    }

    /// Pretend to bind `addr` and announce `Listening`
    pub fn start(&self, addr: &str) {
        let addr: SocketAddr = addr.parse().expect("valid socket address");
        *self.local_addr.lock() = Some(addr);
        self.events.emit(&ListenerEvent::Listening);
    }

    /// Announce `Listening` without ever reporting an address
    pub fn start_unaddressed(&self) {
        self.events.emit(&ListenerEvent::Listening);
    }
}

impl EventSource<ListenerEvent> for ScriptedListener {
    fn on(&self, handler: Handler<ListenerEvent>) {
        self.events.on(handler);
    }
}

impl Listener for ScriptedListener {
    fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    fn has_tls_material(&self) -> bool {
        self.tls
    }

    fn is_http(&self) -> bool {
        self.http
    }
}

// ============================================================================
// Condition-Based Waiting
// ============================================================================

/// Wait for a condition with timeout - condition-based, not time-based
pub async fn wait_for<F>(check: F, interval: Duration, max_wait: Duration) -> bool
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check() {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    check()
}

/// Wait until `sink` holds at least `count` records
pub async fn wait_for_records(sink: &CaptureSink, count: usize) -> bool {
    wait_for(
        || sink.records().len() >= count,
        DEFAULT_CHECK_INTERVAL,
        DEFAULT_TIMEOUT,
    )
    .await
}
