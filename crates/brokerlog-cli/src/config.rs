//! Demo configuration file
//!
//! ```toml
//! [logging]
//! level = "debug"
//! messages = false
//!
//! [endpoints]
//! bind = "127.0.0.1"
//! tcp_port = 1883
//! https_port = 8881
//! ```
//!
//! Missing ports fall back to 1883 / 8883 / 8880 / 8881. Port 0 binds an
//! ephemeral port.

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use brokerlog::LoggingConfig;

pub const DEFAULT_TCP_PORT: u16 = 1883;
pub const DEFAULT_TLS_PORT: u16 = 8883;
pub const DEFAULT_HTTP_PORT: u16 = 8880;
pub const DEFAULT_HTTPS_PORT: u16 = 8881;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub logging: LoggingConfig,
    pub endpoints: EndpointConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub bind: String,
    pub tcp_port: Option<u16>,
    pub tls_port: Option<u16>,
    pub http_port: Option<u16>,
    pub https_port: Option<u16>,
    /// PEM certificate chain; a self-signed one is generated when absent
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            tcp_port: None,
            tls_port: None,
            http_port: None,
            https_port: None,
            cert: None,
            key: None,
        }
    }
}

impl EndpointConfig {
    pub fn addr(&self, port: u16) -> String {
        if self.bind.contains(':') && !self.bind.starts_with('[') {
            format!("[{}]:{}", self.bind, port)
        } else {
            format!("{}:{}", self.bind, port)
        }
    }
}

impl DemoConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: DemoConfig = toml::from_str(text)?;
        config.logging.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
