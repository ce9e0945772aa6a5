//! # Readiness After Power-Up
//!
//! A freshly powered module needs a few seconds before it answers and
//! longer before it is registered on a network. [`wait_until_ready`] walks
//! four stages, retrying each with a fixed interval:
//!
//! ```text
//!   Probe (AT) ─► Functionality (+CFUN: 1) ─► Signal (> 0) ─► Operator
//! ```
//!
//! Timeouts, module errors and malformed replies are retried. Transport
//! failures, cancellation and usage errors end the wait immediately.

use std::fmt;
use std::thread;
use std::time::Duration;

use log::{debug, info};
use sim800::{
    CancelSignal, Clock, DiagnosticSink, ErrorKind, OperatorName, SignalLevel, Sim800, Transport,
};

use crate::config::ReadyConfig;
use crate::error::{HostError, Result};

/// Stage of the readiness check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyStage {
    Probe,
    Functionality,
    Signal,
    Operator,
}

impl fmt::Display for ReadyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReadyStage::Probe => "probe",
            ReadyStage::Functionality => "functionality",
            ReadyStage::Signal => "signal",
            ReadyStage::Operator => "operator",
        };
        f.write_str(name)
    }
}

/// Network state once the module is ready
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    pub signal: SignalLevel,
    pub operator: OperatorName,
}

/// `Ok(None)` for failures worth another attempt
fn retriable<T>(result: sim800::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) => match e.kind() {
            ErrorKind::Timeout | ErrorKind::Protocol | ErrorKind::Parse => {
                debug!("not ready yet: {}", e);
                Ok(None)
            }
            _ => Err(e.into()),
        },
    }
}

fn retry<R>(
    stage: ReadyStage,
    attempts: u32,
    interval_ms: u64,
    mut attempt: impl FnMut() -> Result<Option<R>>,
) -> Result<R> {
    for n in 1..=attempts {
        if let Some(value) = attempt()? {
            debug!("{} ok after {} attempt(s)", stage, n);
            return Ok(value);
        }
        if n < attempts {
            thread::sleep(Duration::from_millis(interval_ms));
        }
    }
    Err(HostError::NotReady { stage, attempts })
}

/// Block until the module answers, is fully functional, sees a signal and is
/// registered with an operator.
pub fn wait_until_ready<T, C, D, K, P>(
    modem: &mut Sim800<T, C, D, K, P>,
    config: &ReadyConfig,
) -> Result<Readiness>
where
    T: Transport,
    C: Clock,
    D: DiagnosticSink,
    K: CancelSignal,
{
    retry(
        ReadyStage::Probe,
        config.probe_attempts,
        config.probe_interval_ms,
        || retriable(modem.probe()),
    )?;

    let network = |stage| (stage, config.network_attempts, config.network_interval_ms);

    let (stage, attempts, interval) = network(ReadyStage::Functionality);
    retry(stage, attempts, interval, || {
        Ok(retriable(modem.is_functional())?.filter(|&functional| functional))
    })?;

    let (stage, attempts, interval) = network(ReadyStage::Signal);
    let signal = retry(stage, attempts, interval, || {
        Ok(retriable(modem.signal_level())?.filter(|level| level.0 > 0))
    })?;

    let (stage, attempts, interval) = network(ReadyStage::Operator);
    let operator = retry(stage, attempts, interval, || {
        Ok(retriable(modem.operator_name())?.filter(|name| !name.is_empty()))
    })?;

    info!("module ready: {} (signal {})", operator, signal.0);
    Ok(Readiness { signal, operator })
}
