//! # SIM800 Host Layer
//!
//! Runs the `sim800` driver on a PC through a USB-serial adapter.
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────────────────────┐   ┌──────────┐
//! │  sim800ctl   │──►│ HostModem = Sim800<SerialTransport,│──►│  SIM800  │
//! │  (clap CLI)  │   │            StdClock, LogSink>      │   │  module  │
//! └──────────────┘   └───────────────────────────────────┘   └──────────┘
//!        │                          │
//!        ▼                          ▼
//!   HostConfig (JSON)         log / env_logger
//! ```
//!
//! - [`config`]: port, bearer and timeout settings from a JSON file
//! - [`serial`]: [`sim800::Transport`] over the `serialport` crate
//! - [`clock`]: wall-clock [`sim800::Clock`]
//! - [`sink`]: reply lines mirrored to the `sim800::wire` log target
//! - [`ready`]: retry loop that waits for network registration

pub mod clock;
pub mod config;
pub mod error;
pub mod ready;
pub mod serial;
pub mod sink;

use log::info;
use sim800::Sim800;

pub use clock::StdClock;
pub use config::{BearerConfig, HostConfig, ReadyConfig};
pub use error::{HostError, Result};
pub use ready::{wait_until_ready, ReadyStage, Readiness};
pub use serial::SerialTransport;
pub use sink::LogSink;

/// A module attached to a host serial port
pub type HostModem = Sim800<SerialTransport, StdClock, LogSink>;

/// Open the configured port and apply the modem settings
pub fn open(config: &HostConfig) -> Result<HostModem> {
    let transport = SerialTransport::open(&config.port, config.baud_rate)?;
    let mut modem = Sim800::new(transport, StdClock::new())
        .with_config(config.modem.clone())
        .with_sink(LogSink);

    if config.modem.verbose_errors {
        modem.enable_verbose_errors()?;
    }
    info!("sim800 driver {} on {}", sim800::VERSION, config.port);
    Ok(modem)
}
