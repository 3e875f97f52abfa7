//! Transport protocol inference
//!
//! Listeners from different transport stacks expose no common "protocol"
//! field, so the label is inferred from two observable traits:
//!
//! | TLS material | HTTP framing | label   |
//! |--------------|--------------|---------|
//! | yes          | yes          | `https` |
//! | yes          | no           | `tls`   |
//! | no           | yes          | `http`  |
//! | no           | no           | `tcp`   |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::listener::Listener;

/// Protocol label attached to a "listening" record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Tls,
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Tls => "tls",
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    pub fn is_secure(&self) -> bool {
        matches!(self, Protocol::Tls | Protocol::Https)
    }

    pub fn is_http(&self) -> bool {
        matches!(self, Protocol::Http | Protocol::Https)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Protocol::Tcp),
            "tls" => Ok(Protocol::Tls),
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            other => Err(Error::UnknownProtocol(other.to_string())),
        }
    }
}

/// The two listener capabilities the classifier looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ListenerTraits {
    pub has_tls: bool,
    pub is_http: bool,
}

impl ListenerTraits {
    pub fn new(has_tls: bool, is_http: bool) -> Self {
        Self { has_tls, is_http }
    }

    /// Probe a live listener
    pub fn of<L: Listener + ?Sized>(listener: &L) -> Self {
        Self {
            has_tls: listener.has_tls_material(),
            is_http: listener.is_http(),
        }
    }

    pub fn protocol(&self) -> Protocol {
        classify(*self)
    }
}

/// Map listener traits to a protocol label. HTTPS listeners carry both
/// traits, so the combined case is checked first.
pub fn classify(traits: ListenerTraits) -> Protocol {
    match (traits.has_tls, traits.is_http) {
        (true, true) => Protocol::Https,
        (true, false) => Protocol::Tls,
        (false, true) => Protocol::Http,
        (false, false) => Protocol::Tcp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_round_trip() {
        for protocol in [Protocol::Tcp, Protocol::Tls, Protocol::Http, Protocol::Https] {
            assert_eq!(protocol.as_str().parse::<Protocol>().unwrap(), protocol);
        }
        assert!(matches!(
            "wss".parse::<Protocol>(),
            Err(Error::UnknownProtocol(label)) if label == "wss"
        ));
    }

    #[test]
    fn test_default_traits_are_tcp() {
        assert_eq!(ListenerTraits::default().protocol(), Protocol::Tcp);
    }
}
