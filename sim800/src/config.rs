use serde::{Deserialize, Serialize};

/// Timeouts and behaviour switches for one module.
///
/// Every field has a default matching the module's documented response
/// times, so a config file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(default)]
pub struct ModemConfig {
    /// Timeout for ordinary local commands (ms)
    pub command_timeout_ms: u32,
    /// Timeout for `AT+HTTPACTION`, which covers the whole network transfer (ms)
    pub http_action_timeout_ms: u32,
    /// Timeout for the `DOWNLOAD` prompt after `AT+HTTPDATA` (ms)
    pub http_data_timeout_ms: u32,
    /// Capture window announced to the module in `AT+HTTPDATA` (ms)
    pub http_data_window_ms: u32,
    /// Timeout for the `>` prompt after `AT+CMGS` (ms)
    pub sms_prompt_timeout_ms: u32,
    /// Timeout for the final result of an SMS submission (ms)
    pub sms_send_timeout_ms: u32,
    /// Timeout for `AT+CFUN`, `AT+CSCLK` and `AT+CPOWD` (ms)
    pub power_timeout_ms: u32,
    /// Timeout for opening the GPRS bearer (ms)
    pub bearer_open_timeout_ms: u32,
    /// Timeout for a GSM cell location lookup, which needs the network (ms)
    pub location_timeout_ms: u32,
    /// Settling delay after the wake-up bytes before the first command (ms)
    pub wake_delay_ms: u32,
    /// Ask the module for verbose error text (`AT+CMEE=2`)
    pub verbose_errors: bool,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: 500,
            http_action_timeout_ms: 100_000,
            http_data_timeout_ms: 1_500,
            http_data_window_ms: 1_000,
            sms_prompt_timeout_ms: 5_000,
            sms_send_timeout_ms: 10_000,
            power_timeout_ms: 3_000,
            bearer_open_timeout_ms: 1_000,
            location_timeout_ms: 10_000,
            wake_delay_ms: 200,
            verbose_errors: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modem_config_default() {
        let config = ModemConfig::default();
        assert_eq!(config.command_timeout_ms, 500);
        assert_eq!(config.http_action_timeout_ms, 100_000);
        assert!(config.sms_send_timeout_ms > config.command_timeout_ms);
        assert!(!config.verbose_errors);
    }
}
