//! Logger handle and per-client child loggers
//!
//! A [`Logger`] owns its own `tracing` dispatcher instead of relying on the
//! process-wide default, so every adapter writes to the sink it was given.
//! Records are emitted with the ordinary `tracing` macros inside
//! [`Logger::in_scope`] / [`ClientLogger::in_scope`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{Dispatch, Span};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use brokerlog_core::ClientId;

use crate::error::{LogError, Result};
use crate::record::RecordLayer;
use crate::sink::LogSink;

/// Output formatting mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One flat JSON object per line
    #[default]
    Json,
    /// Human-readable single-line output
    Compact,
}

impl FromStr for LogFormat {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "compact" | "pretty" | "text" => Ok(LogFormat::Compact),
            other => Err(LogError::Config(format!("unknown log format: {}", other))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Json => f.write_str("json"),
            LogFormat::Compact => f.write_str("compact"),
        }
    }
}

/// Build a level filter. Accepts plain levels (`info`), `silent` as an alias
/// for `off`, and full `EnvFilter` directives (`brokerlog=debug,warn`).
pub fn level_filter(level: &str) -> Result<EnvFilter> {
    let directive = match level.trim() {
        "" => "info",
        "silent" => "off",
        "warning" => "warn",
        other => other,
    };
    EnvFilter::try_new(directive).map_err(|e| LogError::InvalidLevel(format!("{}: {}", level, e)))
}

/// Root structured logger, one per adapter invocation
#[derive(Clone)]
pub struct Logger {
    dispatch: Dispatch,
    format: LogFormat,
}

impl Logger {
    pub fn new(sink: LogSink, level: &str, format: LogFormat) -> Result<Self> {
        let filter = level_filter(level)?;
        let dispatch = match format {
            LogFormat::Json => Dispatch::new(
                tracing_subscriber::registry()
                    .with(filter)
                    .with(RecordLayer::new(sink)),
            ),
            LogFormat::Compact => Dispatch::new(
                tracing_subscriber::registry().with(filter).with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(sink)
                        .with_ansi(false)
                        .with_target(false)
                        .compact(),
                ),
            ),
        };
        Ok(Self { dispatch, format })
    }

    /// Run `f` with this logger as the active dispatcher
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Derive a logger permanently bound to one client
    pub fn child(&self, client_id: &str) -> ClientLogger {
        // error level so the binding survives any level filter short of `off`
        let span = self.in_scope(|| tracing::error_span!("client", client.id = client_id));
        ClientLogger {
            root: self.clone(),
            span,
            client_id: client_id.to_string(),
        }
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }

    pub fn info(&self, msg: &str) {
        self.in_scope(|| tracing::info!("{}", msg));
    }

    pub fn warn(&self, msg: &str) {
        self.in_scope(|| tracing::warn!("{}", msg));
    }

    pub fn debug(&self, msg: &str) {
        self.in_scope(|| tracing::debug!("{}", msg));
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("format", &self.format).finish()
    }
}

/// Logger bound to a single client's identity (`client.id`)
#[derive(Clone)]
pub struct ClientLogger {
    root: Logger,
    span: Span,
    client_id: ClientId,
}

impl ClientLogger {
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        self.root.in_scope(|| self.span.in_scope(f))
    }

    pub fn info(&self, msg: &str) {
        self.in_scope(|| tracing::info!("{}", msg));
    }

    pub fn warn(&self, msg: &str) {
        self.in_scope(|| tracing::warn!("{}", msg));
    }
}

impl fmt::Debug for ClientLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientLogger")
            .field("client_id", &self.client_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::SharedBuf;

    fn logger(level: &str) -> (Logger, SharedBuf) {
        let buf = SharedBuf::default();
        let sink = LogSink::from_writer(buf.clone());
        let logger = Logger::new(sink, level, LogFormat::Json).unwrap();
        (logger, buf)
    }

    #[test]
    fn test_child_carries_client_id() {
        let (root, buf) = logger("info");
        let child = root.child("sensor-7");

        child.info("connected");
        root.info("unrelated");

        let lines = buf.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["client"]["id"], "sensor-7");
        assert_eq!(lines[0]["msg"], "connected");
        assert!(lines[1].get("client").is_none());
        assert_eq!(child.client_id(), "sensor-7");
    }

    #[test]
    fn test_level_filter_applies() {
        let (root, buf) = logger("warn");
        root.debug("hidden");
        root.info("hidden");
        root.warn("shown");
        root.child("c").warn("child shown");

        let lines = buf.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["msg"], "shown");
        assert_eq!(lines[1]["client"]["id"], "c");
    }

    #[test]
    fn test_silent_suppresses_everything() {
        let (root, buf) = logger("silent");
        root.warn("nope");
        root.child("c").info("nope");
        assert!(buf.lines().is_empty());
    }

    #[test]
    fn test_invalid_level_rejected() {
        let err = Logger::new(LogSink::stdout(), "brokerlog=shouty", LogFormat::Json).unwrap_err();
        assert!(matches!(err, LogError::InvalidLevel(_)));
    }

    #[test]
    fn test_loggers_do_not_share_sinks() {
        let (a, buf_a) = logger("info");
        let (b, buf_b) = logger("info");

        a.info("to a");
        b.info("to b");

        assert_eq!(buf_a.lines()[0]["msg"], "to a");
        assert_eq!(buf_b.lines()[0]["msg"], "to b");
        assert_eq!(buf_a.lines().len(), 1);
    }

    #[test]
    fn test_compact_format_is_plain_text() {
        let buf = SharedBuf::default();
        let sink = LogSink::from_writer(buf.clone());
        let root = Logger::new(sink, "info", LogFormat::Compact).unwrap();
        root.child("abc").info("connected");

        let text = buf.text();
        assert!(text.contains("connected"));
        assert!(text.contains("abc"));
        assert!(!text.contains('\u{1b}'));
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
