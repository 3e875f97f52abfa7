//! Adapter entry point
//!
//! Two equivalent front doors: the chained [`Logging::builder`] and the
//! one-shot [`attach`] taking a [`LoggingOptions`] bundle.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use brokerlog_core::{Broker, Listener};

use crate::binder::{bind_listener, BrokerBinder};
use crate::config::LoggingConfig;
use crate::error::Result;
use crate::logger::{LogFormat, Logger};
use crate::sink::LogSink;

/// Entry point namespace
pub struct Logging;

impl Logging {
    /// Start configuring logging for a broker instance
    pub fn builder<B: Broker>(instance: B) -> LoggingBuilder<B> {
        LoggingBuilder::new(instance)
    }
}

/// Everything one adapter invocation needs
pub struct LoggingOptions<B> {
    /// The broker to observe
    pub instance: B,
    /// Listeners to observe. Takes precedence over `server`.
    pub servers: Option<Vec<Arc<dyn Listener>>>,
    pub server: Option<Arc<dyn Listener>>,
    /// Output sink (default: stdout)
    pub sink: Option<LogSink>,
    pub config: LoggingConfig,
}

impl<B> LoggingOptions<B> {
    pub fn new(instance: B) -> Self {
        Self {
            instance,
            servers: None,
            server: None,
            sink: None,
            config: LoggingConfig::default(),
        }
    }
}

/// Attach logging to `options.instance` in one call.
///
/// Same constraint as [`LoggingBuilder::attach`]: at most once per instance.
pub fn attach<B: Broker>(options: LoggingOptions<B>) -> Result<Instrumented<B>> {
    LoggingBuilder::from(options).attach()
}

/// Chained configuration for one adapter invocation.
///
/// Call [`attach`](LoggingBuilder::attach) at most once per broker instance:
/// a second attach registers a second set of handlers and duplicates every
/// record.
pub struct LoggingBuilder<B> {
    options: LoggingOptions<B>,
}

impl<B> From<LoggingOptions<B>> for LoggingBuilder<B> {
    fn from(options: LoggingOptions<B>) -> Self {
        Self { options }
    }
}

impl<B: Broker> LoggingBuilder<B> {
    pub fn new(instance: B) -> Self {
        Self::from(LoggingOptions::new(instance))
    }

    /// Listeners to observe. Takes precedence over [`server`](Self::server).
    pub fn servers<I>(mut self, servers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Listener>>,
    {
        self.options.servers = Some(servers.into_iter().collect());
        self
    }

    /// A single listener to observe
    pub fn server<L: Listener + 'static>(mut self, server: Arc<L>) -> Self {
        self.options.server = Some(server as Arc<dyn Listener>);
        self
    }

    /// Output sink (default: stdout)
    pub fn sink(mut self, sink: LogSink) -> Self {
        self.options.sink = Some(sink);
        self
    }

    /// Replace the whole serializable configuration
    pub fn config(mut self, config: LoggingConfig) -> Self {
        self.options.config = config;
        self
    }

    /// Minimum severity or filter directive
    pub fn level(mut self, level: &str) -> Self {
        self.options.config.level = level.to_string();
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.options.config.format = format;
        self
    }

    /// Enable/disable logging of every PUBLISH (default: enabled)
    pub fn messages(mut self, enabled: bool) -> Self {
        self.options.config.messages = enabled;
        self
    }

    /// Build the logger, wire every handler, and hand the instance back
    pub fn attach(self) -> Result<Instrumented<B>> {
        let LoggingOptions {
            instance,
            servers,
            server,
            sink,
            config,
        } = self.options;

        let logger = Logger::new(sink.unwrap_or_default(), &config.level, config.format)?;

        // A listener list wins over a single listener
        let listeners = match (servers, server) {
            (Some(servers), _) => servers,
            (None, Some(server)) => vec![server],
            (None, None) => Vec::new(),
        };
        for listener in &listeners {
            bind_listener(listener, logger.clone());
        }

        let binder = BrokerBinder::bind(&instance, logger.clone(), config.messages);

        Ok(Instrumented {
            instance,
            logger,
            binder,
        })
    }
}

/// A broker instance decorated with the adapter's logger
pub struct Instrumented<B> {
    instance: B,
    logger: Logger,
    binder: Arc<BrokerBinder>,
}

impl<B> Instrumented<B> {
    /// The root logger, for collaborating code that wants to log through it
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Handler state, e.g. to look up a connected client's child logger
    pub fn binder(&self) -> &Arc<BrokerBinder> {
        &self.binder
    }

    pub fn into_inner(self) -> B {
        self.instance
    }
}

impl<B> Deref for Instrumented<B> {
    type Target = B;

    fn deref(&self) -> &B {
        &self.instance
    }
}

impl<B> DerefMut for Instrumented<B> {
    fn deref_mut(&mut self) -> &mut B {
        &mut self.instance
    }
}

impl<B> std::fmt::Debug for Instrumented<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumented")
            .field("logger", &self.logger)
            .field("binder", &self.binder)
            .finish()
    }
}
