//! JSON configuration file.
//!
//! ```json
//! {
//!   "port": "/dev/ttyUSB0",
//!   "bearer": { "apn": "internet" },
//!   "modem": { "http_action_timeout_ms": 60000 }
//! }
//! ```
//!
//! Only `port` is required.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sim800::ModemConfig;

use crate::error::Result;

fn default_baud_rate() -> u32 {
    sim800::BAUD_RATE
}

/// Host configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Serial device, e.g. `/dev/ttyUSB0` or `COM3`
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// GPRS bearer opened before HTTP and location commands
    #[serde(default)]
    pub bearer: Option<BearerConfig>,
    #[serde(default)]
    pub ready: ReadyConfig,
    #[serde(default)]
    pub modem: ModemConfig,
}

/// Access point settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerConfig {
    pub apn: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Retry limits for [`crate::ready::wait_until_ready`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadyConfig {
    /// Attempts to get any answer to `AT`
    pub probe_attempts: u32,
    pub probe_interval_ms: u64,
    /// Attempts for each network stage (functionality, signal, operator)
    pub network_attempts: u32,
    pub network_interval_ms: u64,
}

impl Default for ReadyConfig {
    fn default() -> Self {
        Self {
            probe_attempts: 30,
            probe_interval_ms: 1_000,
            network_attempts: 60,
            network_interval_ms: 2_500,
        }
    }
}

impl HostConfig {
    /// Read and parse a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = HostConfig::from_json(r#"{ "port": "/dev/ttyUSB0" }"#).unwrap();
        assert_eq!(config.port, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 9600);
        assert!(config.bearer.is_none());
        assert_eq!(config.ready, ReadyConfig::default());
        assert_eq!(config.modem, ModemConfig::default());
    }

    #[test]
    fn test_partial_modem_section() {
        let config = HostConfig::from_json(
            r#"{
                "port": "COM3",
                "bearer": { "apn": "internet", "user": "guest" },
                "modem": { "http_action_timeout_ms": 60000, "verbose_errors": true }
            }"#,
        )
        .unwrap();

        let bearer = config.bearer.unwrap();
        assert_eq!(bearer.apn, "internet");
        assert_eq!(bearer.user.as_deref(), Some("guest"));
        assert_eq!(bearer.password, None);
        assert_eq!(config.modem.http_action_timeout_ms, 60_000);
        assert!(config.modem.verbose_errors);
        assert_eq!(config.modem.command_timeout_ms, 500);
    }

    #[test]
    fn test_missing_port_is_rejected() {
        let err = HostConfig::from_json(r#"{ "baud_rate": 115200 }"#).unwrap_err();
        assert!(matches!(err, HostError::Config(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = HostConfig::load("/nonexistent/sim800.json").unwrap_err();
        assert!(matches!(err, HostError::Io(_)));
    }
}
