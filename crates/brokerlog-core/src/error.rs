//! Error types for brokerlog core

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// QoS outside of 0..=2
    #[error("invalid qos level: {0}")]
    InvalidQos(u8),

    /// Protocol label not one of tcp, tls, http, https
    #[error("unknown protocol label: {0}")]
    UnknownProtocol(String),
}
