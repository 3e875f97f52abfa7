//! Adapter error types
//!
//! Only construction can fail. Once handlers are bound, every event is a
//! terminal logging operation and nothing propagates back to the broker.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LogError>;

#[derive(Error, Debug)]
pub enum LogError {
    #[error("invalid log level: {0}")]
    InvalidLevel(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TLS material error: {0}")]
    Tls(String),

    #[error("listener already listening on {0}")]
    AlreadyListening(std::net::SocketAddr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("core error: {0}")]
    Core(#[from] brokerlog_core::Error),
}
