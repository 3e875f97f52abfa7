//! brokerlog
//!
//! Structured lifecycle logging for a message broker and the listeners that
//! expose it. The adapter observes events only; it never touches broker
//! semantics or the wire protocol.
//!
//! - Every listener's `Listening` transition is logged with its address and an
//!   inferred protocol label (`tcp`, `tls`, `http`, `https`)
//! - Each connecting client gets a child logger bound to `client.id`
//! - Subscribe, unsubscribe, client errors and (optionally) every publish are
//!   logged through that child logger
//!
//! # Example
//!
//! ```no_run
//! use brokerlog::{Endpoint, Logging, LogSink};
//! use brokerlog_core::{BrokerEvent, ClientInfo, EventEmitter};
//! use std::sync::Arc;
//!
//! # async fn example() -> brokerlog::Result<()> {
//! let broker = Arc::new(EventEmitter::<BrokerEvent>::new());
//! let endpoint = Arc::new(Endpoint::new("0.0.0.0:1883"));
//!
//! let broker = Logging::builder(broker)
//!     .server(endpoint.clone())
//!     .sink(LogSink::stdout())
//!     .attach()?;
//!
//! let _listener = endpoint.listen().await?;
//! broker.emit(&BrokerEvent::Client(ClientInfo::new("sensor-1")));
//! # Ok(())
//! # }
//! ```

pub mod binder;
pub mod builder;
pub mod config;
#[cfg(feature = "endpoint")]
pub mod endpoint;
pub mod error;
pub mod logger;
pub mod record;
pub mod sink;

#[cfg(test)]
pub(crate) mod test_support;

pub use binder::{bind_listener, BrokerBinder, MessageSummary};
pub use builder::{attach, Instrumented, Logging, LoggingBuilder, LoggingOptions};
pub use config::LoggingConfig;
#[cfg(feature = "endpoint")]
pub use endpoint::{Endpoint, TlsMaterial};
pub use error::{LogError, Result};
pub use logger::{ClientLogger, LogFormat, Logger};
pub use record::{Json, RecordLayer};
pub use sink::LogSink;
