//! # SIM800 Driver
//!
//! Drives a SIM800 GSM/GPRS module over its serial AT-command interface:
//!
//! - **AT Engine**: one synchronous command/response transaction at a time,
//!   with deadline, cancellation and substring-based success/error detection
//! - **Reply Parsers**: delimiter-based extraction of signal level, battery
//!   voltage, operator name, HTTP status, SMS index and text
//! - **Sequences**: HTTP GET/POST and SMS send/receive as fixed scripts of
//!   engine transactions
//!
//! ## Architecture
//!
//! ```text
//!   Sim800 (device / http / sms)
//!        │  typed operations, Result<T, Error>
//!        ▼
//!   AtEngine ──► CommandBuffer (128 B)      protocol::parse_*
//!        │      ResponseBuffer (512 B) ───────────▲
//!        ▼
//!   Transport ◄─► UART / serial port / ScriptedTransport
//! ```
//!
//! ## Resource Model
//!
//! Everything is busy-polled against a [`Clock`]. Buffers are fixed-size and
//! owned by the engine; nothing is allocated. Every transaction takes
//! `&mut self`, so two transactions can never interleave on one module.
//! Replies are borrowed from the response buffer and live until the next
//! call.
//!
//! ## Example
//!
//! ```
//! use sim800::mock::{ScriptedTransport, StepClock};
//! use sim800::Sim800;
//!
//! let mut transport = ScriptedTransport::new();
//! transport.expect("AT+CSQ\r\n", "+CSQ: 15,99\r\n\r\nOK\r\n");
//!
//! let mut modem = Sim800::new(transport, StepClock::new(1));
//! assert_eq!(modem.signal_level().unwrap().0, 15);
//! ```

#![cfg_attr(not(any(feature = "std", test)), no_std)]

pub mod buffer;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod http;
pub mod io;
pub mod protocol;
pub mod sms;
pub mod traits;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export main types for convenience
pub use buffer::{BufferError, CommandBuffer, ResponseBuffer};
pub use config::ModemConfig;
pub use device::{NoPin, Sim800};
pub use engine::{AtEngine, AtResult};
pub use error::{Error, ErrorKind, ParseError, Result};
pub use http::HttpResponse;
pub use io::IoTransport;
pub use protocol::{
    BatteryMillivolts, GsmLocation, HttpMethod, HttpOutcome, OperatorName, SignalLevel,
    SignalQuality, SmsIndex, SmsText,
};
pub use sms::SmsMessage;
pub use traits::{
    CancelSignal, Clock, DiagnosticSink, NeverCancel, NullSink, Transport, TransportError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fixed UART baud rate of the module's AT interface
pub const BAUD_RATE: u32 = 9600;
