//! # Transport, Clock & Hook Abstractions
//!
//! The engine never touches hardware directly. It is written against four
//! small traits:
//!
//! - [`Transport`]: the duplex byte channel to the module (UART, USB CDC, mock)
//! - [`Clock`]: a monotonic millisecond counter used for every deadline
//! - [`DiagnosticSink`]: receives each completed reply line, for logging/mirroring
//! - [`CancelSignal`]: polled once per loop iteration so a caller can abort a
//!   long transaction (an HTTP action may run for 100 s)
//!
//! ## Polling Model
//!
//! ```text
//!        ┌───────────┐  bytes_available() / read_byte()  ┌─────────┐
//!        │ AtEngine  │◄──────────────────────────────────│Transport│
//!        │           │──────────────────────────────────►│         │
//!        └───────────┘            write()                └─────────┘
//!          │    ▲  ▲
//!   line() │    │  │ is_cancelled()
//!          ▼    │  └──────────── CancelSignal
//!   DiagnosticSink └──────────── Clock::now_ms()
//! ```
//!
//! Everything is synchronous busy-polling: no call here may block waiting for
//! data that is not already there.

use core::sync::atomic::{AtomicBool, Ordering};

/// Errors reported by a [`Transport`] implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// Reading from the link failed
    #[error("read failed")]
    Read,
    /// Writing to the link failed
    #[error("write failed")]
    Write,
    /// The link is closed (EOF or unplugged adapter)
    #[error("link closed")]
    Disconnected,
}

/// Duplex byte channel to the module.
///
/// The baud rate is fixed when the channel is opened; see [`crate::BAUD_RATE`].
pub trait Transport {
    /// Write all of `bytes` to the module
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Number of bytes that can be read without blocking.
    ///
    /// Implementations that can only tell "some" from "none" may return 1.
    fn bytes_available(&mut self) -> Result<usize, TransportError>;

    /// Read one byte. Only called after `bytes_available` reported data.
    fn read_byte(&mut self) -> Result<u8, TransportError>;

    /// Flush any buffered output
    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).write(bytes)
    }

    fn bytes_available(&mut self) -> Result<usize, TransportError> {
        (**self).bytes_available()
    }

    fn read_byte(&mut self) -> Result<u8, TransportError> {
        (**self).read_byte()
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        (**self).flush()
    }
}

/// Monotonic millisecond clock
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin. Must never go backwards.
    fn now_ms(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Receives every completed reply line, in the order the module sent it.
///
/// Called synchronously from the polling loop, so implementations must not
/// block.
pub trait DiagnosticSink {
    /// A completed line, with the trailing `\r\n` stripped
    fn line(&mut self, line: &[u8]);

    /// A transaction ran out of time; `partial` is whatever was received
    fn timeout(&mut self, command: &str, partial: &[u8]) {
        let _ = (command, partial);
    }
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    #[inline]
    fn line(&mut self, _line: &[u8]) {}
}

impl<F: FnMut(&[u8])> DiagnosticSink for F {
    fn line(&mut self, line: &[u8]) {
        self(line)
    }
}

/// Cooperative cancellation flag, polled on every engine loop iteration
pub trait CancelSignal {
    fn is_cancelled(&self) -> bool;
}

/// Signal that is never raised
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverCancel;

impl CancelSignal for NeverCancel {
    #[inline]
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl CancelSignal for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

impl<K: CancelSignal + ?Sized> CancelSignal for &K {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}

#[cfg(feature = "std")]
impl<K: CancelSignal + ?Sized> CancelSignal for std::sync::Arc<K> {
    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}
