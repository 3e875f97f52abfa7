//! brokerlog core
//!
//! Shared vocabulary for the brokerlog adapter:
//! - Broker and listener lifecycle events ([`BrokerEvent`], [`ListenerEvent`])
//! - Event registration and delivery ([`EventSource`], [`EventEmitter`])
//! - The collaborator traits the adapter observes ([`Broker`], [`Listener`])
//! - Transport protocol inference ([`ListenerTraits`], [`Protocol`], [`classify`])

pub mod emitter;
pub mod error;
pub mod events;
pub mod listener;
pub mod protocol;

pub use emitter::{EventEmitter, EventSource, Handler};
pub use error::{Error, Result};
pub use events::{
    BrokerEvent, BrokerEventKind, ClientFault, ClientId, ClientInfo, ListenerEvent,
    PublishPacket, QoS, SessionId, Subscription,
};
pub use listener::{Broker, Listener};
pub use protocol::{classify, ListenerTraits, Protocol};
