//! # Configuration Management
//!
//! Centralized configuration for the wire-format library.
//!
//! The codecs themselves are pure functions over byte buffers; what is
//! configurable is how much work a caller lets an untrusted peer cause.
//! Node and wallet processes load these bounds once and hand them to the
//! framing layer.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Environment overrides via `from_env()`
//! - Direct instantiation with defaults
//!
//! ## Security Considerations
//! - `max_packet_body` caps the allocation a single Levin header can demand
//!   before any body bytes arrive

use crate::error::{Result, WireError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default ceiling on a Levin packet body, matching the reference daemons.
pub const DEFAULT_MAX_PACKET_BODY: u64 = 100_000_000;

/// Decode bounds for untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Largest Levin packet body accepted or produced, in bytes.
    #[serde(default = "default_max_packet_body")]
    pub max_packet_body: u64,
}

fn default_max_packet_body() -> u64 {
    DEFAULT_MAX_PACKET_BODY
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolConfig {
            max_packet_body: DEFAULT_MAX_PACKET_BODY,
        }
    }
}

impl ProtocolConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| WireError::Config(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| WireError::Config(format!("failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("CRYPTONOTE_WIRE_MAX_PACKET_BODY") {
            config.max_packet_body = value
                .parse()
                .map_err(|e| WireError::Config(format!("CRYPTONOTE_WIRE_MAX_PACKET_BODY: {e}")))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values the codecs cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_packet_body == 0 {
            return Err(WireError::Config(
                "max_packet_body must be non-zero".to_owned(),
            ));
        }
        Ok(())
    }
}
