//! Adapter configuration
//!
//! ```toml
//! level = "debug"
//! format = "json"
//! messages = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::logger::{level_filter, LogFormat};

/// Serializable part of the adapter configuration.
///
/// The output sink and the listener set are live objects and are passed to
/// the builder directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum severity, or any `EnvFilter` directive string
    pub level: String,
    /// Output formatting mode
    pub format: LogFormat,
    /// Log every PUBLISH passing through the broker
    pub messages: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            messages: true,
        }
    }
}

impl LoggingConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: LoggingConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check that the level parses as a filter
    pub fn validate(&self) -> Result<()> {
        level_filter(&self.level).map(|_| ())
    }
}
