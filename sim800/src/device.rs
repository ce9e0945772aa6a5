//! # SIM800 Module Handle
//!
//! [`Sim800`] wraps an [`AtEngine`] with the module's command set: status
//! queries, bearer provisioning, low-power control and (in [`crate::http`]
//! and [`crate::sms`]) the multi-step HTTP and SMS sequences.
//!
//! ## Sequences
//!
//! Every multi-command operation is a straight line of transactions. The
//! first step that does not succeed ends the operation and its error is
//! returned; nothing is retried and nothing is resumed.
//!
//! ```text
//!   setup_bearer:  SAPBR Contype ─► SAPBR APN ─► [USER] ─► [PWD]
//!                  ─► SAPBR=1,1 ─► HTTPINIT ─► HTTPPARA CID
//!                       │ any failure
//!                       ▼
//!                    Err(e)
//! ```
//!
//! Replies borrowed from a handle (operator name aside) point into the
//! response buffer and stay valid until the next call.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};
use log::{debug, info, warn};

use crate::config::ModemConfig;
use crate::engine::{AtEngine, AtResult};
use crate::error::{Error, Result};
use crate::protocol::{
    self, BatteryMillivolts, GsmLocation, OperatorName, SignalLevel, CFUN_READY, ERROR,
    NORMAL_POWER_DOWN, OK,
};
use crate::traits::{CancelSignal, Clock, DiagnosticSink, NeverCancel, NullSink, Transport};

/// Bytes sent to wake the UART from slow-clock mode
const WAKE_BYTES: &[u8] = b"aaaaa";

/// Placeholder for modules wired without a reset/power pin
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPin;

impl ErrorType for NoPin {
    type Error = Infallible;
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }
}

/// Reject text that would break out of a quoted command argument
pub(crate) fn check_quoted(value: &str, what: &'static str) -> Result<()> {
    if value.bytes().any(|b| matches!(b, b'"' | b'\r' | b'\n')) {
        return Err(Error::InvalidArgument(what));
    }
    Ok(())
}

/// A SIM800 module on one transport
pub struct Sim800<T, C, D = NullSink, K = NeverCancel, P = NoPin> {
    pub(crate) engine: AtEngine<T, C, D, K>,
    pub(crate) config: ModemConfig,
    reset_pin: Option<P>,
}

impl<T: Transport, C: Clock> Sim800<T, C> {
    /// Create a handle with default timeouts and no reset pin
    pub fn new(transport: T, clock: C) -> Self {
        Self {
            engine: AtEngine::new(transport, clock),
            config: ModemConfig::default(),
            reset_pin: None,
        }
    }
}

impl<T, C, D, K, P> Sim800<T, C, D, K, P> {
    pub fn with_config(mut self, config: ModemConfig) -> Self {
        self.config = config;
        self
    }

    /// Mirror every reply line to `sink`
    pub fn with_sink<D2: DiagnosticSink>(self, sink: D2) -> Sim800<T, C, D2, K, P> {
        Sim800 {
            engine: self.engine.with_sink(sink),
            config: self.config,
            reset_pin: self.reset_pin,
        }
    }

    /// Abort waits when `cancel` is raised
    pub fn with_cancel<K2: CancelSignal>(self, cancel: K2) -> Sim800<T, C, D, K2, P> {
        Sim800 {
            engine: self.engine.with_cancel(cancel),
            config: self.config,
            reset_pin: self.reset_pin,
        }
    }

    /// Drive the module's power/reset line from `pin`
    pub fn with_reset_pin<P2: OutputPin>(self, pin: P2) -> Sim800<T, C, D, K, P2> {
        Sim800 {
            engine: self.engine,
            config: self.config,
            reset_pin: Some(pin),
        }
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    pub fn engine(&self) -> &AtEngine<T, C, D, K> {
        &self.engine
    }

    /// Direct access to the engine for commands this handle does not wrap
    pub fn engine_mut(&mut self) -> &mut AtEngine<T, C, D, K> {
        &mut self.engine
    }

    /// Raw bytes of the last reply, for diagnostics
    pub fn last_raw_response(&self) -> &[u8] {
        self.engine.response().as_bytes()
    }

    pub fn release(self) -> (T, Option<P>) {
        (self.engine.into_transport(), self.reset_pin)
    }
}

impl<T, C, D, K, P> Sim800<T, C, D, K, P>
where
    T: Transport,
    C: Clock,
    D: DiagnosticSink,
    K: CancelSignal,
{
    /// One transaction with the default error token
    pub(crate) fn run(&mut self, command: &str, timeout_ms: u32, expected: &str) -> Result<()> {
        self.engine
            .send_command(command, timeout_ms, expected, ERROR)
            .into_result()
    }

    /// One transaction for the command assembled from `parts`
    pub(crate) fn run_parts(&mut self, parts: &[&str], timeout_ms: u32) -> Result<()> {
        self.engine.build_command(parts)?;
        self.engine.send_built(timeout_ms, OK, ERROR).into_result()
    }

    /// Send an arbitrary command and wait for `OK`; returns the raw reply
    pub fn command(&mut self, command: &str) -> Result<&[u8]> {
        if command.is_empty() {
            return Err(Error::InvalidArgument("empty command"));
        }
        self.run(command, self.config.command_timeout_ms, OK)?;
        Ok(self.last_raw_response())
    }

    /// `AT`: is anything listening
    pub fn probe(&mut self) -> Result<()> {
        self.run("AT", self.config.command_timeout_ms, OK)
    }

    /// Whether the module reports full functionality (`+CFUN: 1`)
    pub fn is_functional(&mut self) -> Result<bool> {
        self.run("AT+CFUN?", self.config.command_timeout_ms, OK)?;
        Ok(self.engine.response().contains(CFUN_READY))
    }

    /// Select SMS text mode (`AT+CMGF=1`)
    pub fn set_text_mode(&mut self) -> Result<()> {
        self.run("AT+CMGF=1", self.config.command_timeout_ms, OK)
    }

    /// Ask for detailed error text in replies (`AT+CMEE=2`)
    pub fn enable_verbose_errors(&mut self) -> Result<()> {
        self.run("AT+CMEE=2", self.config.command_timeout_ms, OK)
    }

    /// Registered network operator
    pub fn operator_name(&mut self) -> Result<OperatorName> {
        self.run("AT+COPS?", self.config.command_timeout_ms, OK)?;
        Ok(protocol::parse_operator_name(self.last_raw_response())?)
    }

    /// Received signal strength index, 0 to 31
    pub fn signal_level(&mut self) -> Result<SignalLevel> {
        self.run("AT+CSQ", self.config.command_timeout_ms, OK)?;
        Ok(protocol::parse_signal_level(self.last_raw_response())?)
    }

    /// Supply voltage as measured by the module
    pub fn battery_voltage(&mut self) -> Result<BatteryMillivolts> {
        self.run("AT+CBC", self.config.command_timeout_ms, OK)?;
        Ok(protocol::parse_battery_voltage(self.last_raw_response())?)
    }

    /// Approximate position and network time from the serving cells.
    ///
    /// Needs an open bearer.
    pub fn gsm_location(&mut self) -> Result<GsmLocation> {
        self.run("AT+CIPGSMLOC=1,1", self.config.location_timeout_ms, OK)?;
        let reply = protocol::parse_gsm_location(self.last_raw_response())?;
        match reply.fix {
            Some(fix) => Ok(fix),
            None => Err(Error::LocationUnavailable(reply.code)),
        }
    }

    /// Create and open GPRS bearer 1 and bind the HTTP service to it
    pub fn setup_bearer(
        &mut self,
        apn: &str,
        user: Option<&str>,
        password: Option<&str>,
    ) -> Result<()> {
        check_quoted(apn, "APN")?;
        let timeout = self.config.command_timeout_ms;

        self.run("AT+SAPBR=3,1,\"Contype\",\"GPRS\"", timeout, OK)?;
        self.run_parts(&["AT+SAPBR=3,1,\"APN\",\"", apn, "\""], timeout)?;
        if let Some(user) = user {
            check_quoted(user, "bearer user")?;
            self.run_parts(&["AT+SAPBR=3,1,\"USER\",\"", user, "\""], timeout)?;
        }
        if let Some(password) = password {
            check_quoted(password, "bearer password")?;
            self.run_parts(&["AT+SAPBR=3,1,\"PWD\",\"", password, "\""], timeout)?;
        }
        self.run("AT+SAPBR=1,1", self.config.bearer_open_timeout_ms, OK)?;
        self.run("AT+HTTPINIT", timeout, OK)?;
        self.run("AT+HTTPPARA=\"CID\",1", timeout, OK)?;
        info!("bearer open (APN {})", apn);
        Ok(())
    }

    /// Stop the HTTP service and close the bearer
    pub fn close_bearer(&mut self) -> Result<()> {
        let timeout = self.config.command_timeout_ms;
        self.run("AT+HTTPTERM", timeout, OK)?;
        self.run("AT+SAPBR=0,1", timeout, OK)?;
        debug!("bearer closed");
        Ok(())
    }

    /// Minimum functionality plus automatic slow-clock mode
    pub fn sleep(&mut self) -> Result<()> {
        let timeout = self.config.power_timeout_ms;
        self.run("AT+CFUN=0", timeout, OK)?;
        self.run("AT+CSCLK=2", timeout, OK)
    }

    /// Wake the UART, leave slow-clock mode and restore full functionality
    pub fn wake_up(&mut self) -> Result<()> {
        self.engine.write_raw(WAKE_BYTES)?;
        self.engine.pause(self.config.wake_delay_ms).into_result()?;
        let timeout = self.config.power_timeout_ms;
        self.run("AT+CSCLK=0", timeout, OK)?;
        self.run("AT+CFUN=1", timeout, OK)
    }
}

impl<T, C, D, K, P> Sim800<T, C, D, K, P>
where
    T: Transport,
    C: Clock,
    D: DiagnosticSink,
    K: CancelSignal,
    P: OutputPin,
{
    /// Orderly shutdown, then pull the power line low
    pub fn power_off(&mut self) -> Result<()> {
        let result = self
            .engine
            .send_command("AT+CPOWD=1", self.config.power_timeout_ms, NORMAL_POWER_DOWN, ERROR);
        if result != AtResult::Success {
            warn!("module did not confirm power down: {:?}", result);
        }
        result.into_result()?;
        if let Some(pin) = self.reset_pin.as_mut() {
            pin.set_low().map_err(|_| Error::Pin)?;
        }
        Ok(())
    }

    /// Release the power line. The module needs a few seconds before it
    /// answers; see `probe` and `is_functional`.
    pub fn power_on(&mut self) -> Result<()> {
        if let Some(pin) = self.reset_pin.as_mut() {
            info!("powering up");
            pin.set_high().map_err(|_| Error::Pin)?;
        }
        Ok(())
    }
}
