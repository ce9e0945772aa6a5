//! # AT Transaction Engine
//!
//! [`AtEngine`] owns the transport, the clock and both buffers, and runs one
//! transaction at a time. Every transaction takes `&mut self`, so a second
//! one cannot start while the first is outstanding.
//!
//! ## Transaction Lifecycle
//!
//! ```text
//!   Idle ──► Sending ──► AwaitingMatch ──┬──► Success
//!    ▲                                   ├──► ProtocolError
//!    │                                   ├──► Timeout
//!    │                                   └──► Cancelled / Transport
//!    └───────────────────────────────────────────┘
//! ```
//!
//! 1. Clear the response buffer and purge stale input (old URCs, echo)
//! 2. Write the command followed by CRLF
//! 3. Poll the transport; append each byte while there is room
//! 4. On every `\n`, hand the line to the diagnostic sink and search the
//!    *whole* buffer for the success token, then the error token
//! 5. Give up when the clock passes the deadline or the cancel signal is raised
//!
//! The buffer keeps its contents until the next transaction starts, so the
//! raw reply stays available to parsers and diagnostics.

use log::{debug, trace, warn};

use crate::buffer::{BufferError, CommandBuffer, ResponseBuffer};
use crate::error::{Error, Result};
use crate::protocol::{CRLF, ERROR};
use crate::traits::{CancelSignal, Clock, DiagnosticSink, NeverCancel, NullSink, Transport, TransportError};

/// Outcome of one AT transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AtResult {
    /// The expected token appeared on a completed line
    Success,
    /// The error token appeared before the expected one
    ProtocolError,
    /// Neither token arrived before the deadline
    Timeout,
    /// The cancel signal was raised while waiting
    Cancelled,
    /// The transport failed to read or write
    Transport(TransportError),
}

impl AtResult {
    #[inline]
    pub fn is_success(self) -> bool {
        self == AtResult::Success
    }

    /// Convert to a `Result`, so sequences can stop at the first failing step
    pub fn into_result(self) -> Result<()> {
        match self {
            AtResult::Success => Ok(()),
            AtResult::ProtocolError => Err(Error::Module),
            AtResult::Timeout => Err(Error::Timeout),
            AtResult::Cancelled => Err(Error::Cancelled),
            AtResult::Transport(e) => Err(Error::Transport(e)),
        }
    }
}

/// Synchronous AT command/response engine for one module
pub struct AtEngine<T, C, D = NullSink, K = NeverCancel> {
    transport: T,
    clock: C,
    sink: D,
    cancel: K,
    command: CommandBuffer,
    response: ResponseBuffer,
    /// Set once bytes had to be dropped during the current transaction
    overflowed: bool,
}

impl<T: Transport, C: Clock> AtEngine<T, C> {
    /// Create an engine with no diagnostic sink and no cancel signal
    pub fn new(transport: T, clock: C) -> Self {
        Self {
            transport,
            clock,
            sink: NullSink,
            cancel: NeverCancel,
            command: CommandBuffer::new(),
            response: ResponseBuffer::new(),
            overflowed: false,
        }
    }
}

impl<T, C, D, K> AtEngine<T, C, D, K> {
    /// Attach a sink that receives every completed reply line
    pub fn with_sink<D2: DiagnosticSink>(self, sink: D2) -> AtEngine<T, C, D2, K> {
        AtEngine {
            transport: self.transport,
            clock: self.clock,
            sink,
            cancel: self.cancel,
            command: self.command,
            response: self.response,
            overflowed: self.overflowed,
        }
    }

    /// Attach a signal that aborts waits when raised
    pub fn with_cancel<K2: CancelSignal>(self, cancel: K2) -> AtEngine<T, C, D, K2> {
        AtEngine {
            transport: self.transport,
            clock: self.clock,
            sink: self.sink,
            cancel,
            command: self.command,
            response: self.response,
            overflowed: self.overflowed,
        }
    }

    /// Reply bytes of the last transaction
    #[inline]
    pub fn response(&self) -> &ResponseBuffer {
        &self.response
    }

    /// The last command built or sent
    #[inline]
    pub fn last_command(&self) -> &str {
        self.command.as_str()
    }

    /// Whether the last transaction received more than the buffer could hold
    #[inline]
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn sink_mut(&mut self) -> &mut D {
        &mut self.sink
    }

    /// Release the transport
    pub fn into_transport(self) -> T {
        self.transport
    }
}

impl<T, C, D, K> AtEngine<T, C, D, K>
where
    T: Transport,
    C: Clock,
    D: DiagnosticSink,
    K: CancelSignal,
{
    /// Assemble the next command from `parts`
    pub fn build_command(&mut self, parts: &[&str]) -> core::result::Result<(), BufferError> {
        self.command.build(parts).map(|_| ())
    }

    /// Assemble the next command from format arguments
    pub fn build_command_fmt(
        &mut self,
        args: core::fmt::Arguments<'_>,
    ) -> core::result::Result<(), BufferError> {
        self.command.build_fmt(args).map(|_| ())
    }

    /// Run one transaction: send `command` and wait for `expected` or `error`.
    ///
    /// Never fails outright; every outcome, including transport faults, is an
    /// [`AtResult`] variant.
    pub fn send_command(
        &mut self,
        command: &str,
        timeout_ms: u32,
        expected: &str,
        error: &str,
    ) -> AtResult {
        debug_assert!(!command.is_empty());
        if timeout_ms == 0 {
            return self.report(command, AtResult::Timeout);
        }
        if self.command.as_str() != command && self.command.build(&[command]).is_err() {
            self.command.clear();
        }
        if let Err(e) = self.write_command(command) {
            return self.report(command, AtResult::Transport(e));
        }
        let result = self.collect(timeout_ms, expected, error);
        self.report(command, result)
    }

    /// Send the command assembled by [`build_command`](Self::build_command)
    pub fn send_built(&mut self, timeout_ms: u32, expected: &str, error: &str) -> AtResult {
        let command = core::mem::take(&mut self.command);
        let result = self.send_command(command.as_str(), timeout_ms, expected, error);
        self.command = command;
        result
    }

    /// Clear the response buffer, purge stale input and write `command` + CRLF
    /// without waiting for a reply.
    pub fn write_command(&mut self, command: &str) -> core::result::Result<(), TransportError> {
        self.reset_response();
        let purged = self.purge()?;
        if purged > 0 {
            debug!("purged {} stale bytes", purged);
        }
        debug!(">> {}", command);
        self.transport.write(command.as_bytes())?;
        self.transport.write(CRLF)?;
        self.transport.flush()
    }

    /// [`write_command`](Self::write_command) for the built command
    pub fn write_built(&mut self) -> core::result::Result<(), TransportError> {
        let command = core::mem::take(&mut self.command);
        let result = self.write_command(command.as_str());
        self.command = command;
        result
    }

    /// Write bytes verbatim, with no terminator (payloads, SMS text)
    pub fn write_raw(&mut self, bytes: &[u8]) -> core::result::Result<(), TransportError> {
        trace!(">> {} raw bytes", bytes.len());
        self.transport.write(bytes)?;
        self.transport.flush()
    }

    /// Discard everything pending on the transport; returns the byte count
    pub fn purge(&mut self) -> core::result::Result<usize, TransportError> {
        let mut purged = 0;
        while self.transport.bytes_available()? > 0 {
            self.transport.read_byte()?;
            purged += 1;
        }
        Ok(purged)
    }

    /// Wait for a fresh reply without sending anything first.
    ///
    /// Used after raw writes, where the module answers once it has consumed
    /// the data.
    pub fn await_response(&mut self, timeout_ms: u32, expected: &str, error: &str) -> AtResult {
        self.reset_response();
        let result = self.collect(timeout_ms, expected, error);
        self.report("<await>", result)
    }

    /// Wait for a single prompt byte rather than a line.
    ///
    /// A completed line containing the error token ends the wait with
    /// `ProtocolError`, since the module rejects a bad command that way
    /// instead of prompting.
    pub fn await_prompt(&mut self, prompt: u8, timeout_ms: u32) -> AtResult {
        self.reset_response();
        let result = self.poll(timeout_ms, |engine, byte| {
            if byte == prompt {
                let _ = engine.response.push(byte);
                return Some(AtResult::Success);
            }
            if engine.accept(byte) && engine.response.contains(ERROR) {
                return Some(AtResult::ProtocolError);
            }
            None
        });
        self.report("<prompt>", result)
    }

    /// Read a single line into the response buffer
    pub fn read_line(&mut self, timeout_ms: u32) -> AtResult {
        self.reset_response();
        let result = self.poll(timeout_ms, |engine, byte| {
            engine.accept(byte).then_some(AtResult::Success)
        });
        self.report("<line>", result)
    }

    /// Read lines until one contains `token`.
    ///
    /// Lines that do not match are discarded, so on success the buffer holds
    /// only the matching line.
    pub fn await_line_containing(&mut self, token: &str, timeout_ms: u32) -> AtResult {
        self.reset_response();
        let result = self.poll(timeout_ms, |engine, byte| {
            if !engine.accept(byte) {
                return None;
            }
            if engine.response.contains(token) {
                return Some(AtResult::Success);
            }
            engine.reset_response();
            None
        });
        self.report(token, result)
    }

    /// Busy-wait for `ms` milliseconds, honouring the cancel signal
    pub fn pause(&mut self, ms: u32) -> AtResult {
        let start = self.clock.now_ms();
        loop {
            if self.cancel.is_cancelled() {
                return AtResult::Cancelled;
            }
            if self.clock.now_ms().saturating_sub(start) >= u64::from(ms) {
                return AtResult::Success;
            }
        }
    }

    fn reset_response(&mut self) {
        self.response.clear();
        self.overflowed = false;
    }

    fn collect(&mut self, timeout_ms: u32, expected: &str, error: &str) -> AtResult {
        self.poll(timeout_ms, |engine, byte| {
            if !engine.accept(byte) {
                return None;
            }
            if engine.response.contains(expected) {
                Some(AtResult::Success)
            } else if engine.response.contains(error) {
                Some(AtResult::ProtocolError)
            } else {
                None
            }
        })
    }

    /// Poll the transport until `on_byte` decides, the deadline passes or the
    /// cancel signal is raised.
    fn poll<F>(&mut self, timeout_ms: u32, mut on_byte: F) -> AtResult
    where
        F: FnMut(&mut Self, u8) -> Option<AtResult>,
    {
        let start = self.clock.now_ms();
        let timeout = u64::from(timeout_ms);
        loop {
            if self.cancel.is_cancelled() {
                return AtResult::Cancelled;
            }
            if self.clock.now_ms().saturating_sub(start) >= timeout {
                return AtResult::Timeout;
            }
            match self.transport.bytes_available() {
                Ok(0) => continue,
                Ok(_) => {}
                Err(e) => return AtResult::Transport(e),
            }
            let byte = match self.transport.read_byte() {
                Ok(byte) => byte,
                Err(e) => return AtResult::Transport(e),
            };
            if let Some(result) = on_byte(self, byte) {
                return result;
            }
        }
    }

    /// Store a received byte if there is room. Returns true if it ended a line.
    fn accept(&mut self, byte: u8) -> bool {
        if self.response.push(byte).is_err() && !self.overflowed {
            self.overflowed = true;
            warn!(
                "response buffer full ({} bytes), dropping further input",
                self.response.capacity()
            );
        }
        if byte != b'\n' {
            return false;
        }

        let line = self.response.current_line();
        trace!("<< {}", core::str::from_utf8(line).unwrap_or("<non-utf8>"));
        self.sink.line(line);
        self.response.end_line();
        true
    }

    fn report(&mut self, command: &str, result: AtResult) -> AtResult {
        match result {
            AtResult::Success => {}
            AtResult::ProtocolError => debug!("{} answered with error", command),
            AtResult::Timeout => {
                warn!("timeout: {}", command);
                self.sink.timeout(command, self.response.as_bytes());
            }
            AtResult::Cancelled => warn!("cancelled: {}", command),
            AtResult::Transport(e) => warn!("transport failure during {}: {}", command, e),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::RESPONSE_BUFFER_SIZE;
    use crate::mock::{ScriptedTransport, StepClock};
    use crate::protocol::OK;
    use core::sync::atomic::{AtomicBool, Ordering};

    fn engine_with(transport: ScriptedTransport) -> AtEngine<ScriptedTransport, StepClock> {
        AtEngine::new(transport, StepClock::new(1))
    }

    #[test]
    fn test_success_keeps_whole_reply() {
        let mut transport = ScriptedTransport::new();
        transport.expect("AT+CSQ\r\n", "AT+CSQ\r\r\n+CSQ: 15,99\r\n\r\nOK\r\n");
        let mut engine = engine_with(transport);

        let result = engine.send_command("AT+CSQ", 500, OK, ERROR);

        assert_eq!(result, AtResult::Success);
        assert_eq!(
            engine.response().as_bytes(),
            b"AT+CSQ\r\r\n+CSQ: 15,99\r\n\r\nOK\r\n"
        );
        assert_eq!(engine.transport().written(), b"AT+CSQ\r\n");
    }

    #[test]
    fn test_success_stops_at_matching_line() {
        let mut transport = ScriptedTransport::new();
        transport.expect("AT\r\n", "OK\r\nRING\r\n");
        let mut engine = engine_with(transport);

        assert_eq!(engine.send_command("AT", 500, OK, ERROR), AtResult::Success);
        assert_eq!(engine.response().as_bytes(), b"OK\r\n");
        assert_eq!(engine.transport().pending(), 6);
    }

    #[test]
    fn test_error_token_before_expected() {
        let mut transport = ScriptedTransport::new();
        transport.expect("AT+CPIN?\r\n", "+CME ERROR: SIM not inserted\r\nOK\r\n");
        let mut engine = engine_with(transport);

        let result = engine.send_command("AT+CPIN?", 500, OK, ERROR);

        assert_eq!(result, AtResult::ProtocolError);
        assert_eq!(result.into_result(), Err(Error::Module));
    }

    #[test]
    fn test_timeout_within_polling_granularity() {
        let clock = StepClock::new(1);
        let mut engine = AtEngine::new(ScriptedTransport::new(), &clock);

        let before = clock.now();
        let result = engine.send_command("AT", 500, OK, ERROR);
        let elapsed = clock.now() - before;

        assert_eq!(result, AtResult::Timeout);
        assert!((500..=505).contains(&elapsed), "elapsed {elapsed}");
    }

    #[test]
    fn test_intermediate_lines_are_kept_for_multiline_match() {
        let mut transport = ScriptedTransport::new();
        transport.expect(
            "AT+HTTPACTION=0\r\n",
            "OK\r\n\r\n+HTTPACTION: 0,200,512\r\n",
        );
        let mut engine = engine_with(transport);

        let result = engine.send_command("AT+HTTPACTION=0", 100_000, "+HTTPACTION:", ERROR);

        assert_eq!(result, AtResult::Success);
        assert!(engine.response().contains("OK\r\n"));
        assert!(engine.response().contains("+HTTPACTION: 0,200,512"));
    }

    #[test]
    fn test_stale_input_is_purged() {
        let mut transport = ScriptedTransport::new();
        transport.push_incoming("ERROR\r\n");
        transport.expect("AT\r\n", "OK\r\n");
        let mut engine = engine_with(transport);

        assert_eq!(engine.send_command("AT", 500, OK, ERROR), AtResult::Success);
        assert_eq!(engine.response().as_bytes(), b"OK\r\n");
    }

    #[test]
    fn test_overflow_never_writes_past_bound() {
        let mut reply = Vec::new();
        reply.extend_from_slice(&[b'A'; 300]);
        reply.extend_from_slice(b"\r\nINFO\r\n");
        reply.extend_from_slice(&[b'B'; 400]);
        reply.extend_from_slice(b"\r\nOK\r\n");

        let mut transport = ScriptedTransport::new();
        transport.expect("AT+DUMP\r\n", &reply);
        let mut engine = engine_with(transport);

        // OK lies past the bound, so it is never seen
        let result = engine.send_command("AT+DUMP", 2_000, OK, ERROR);
        assert_eq!(result, AtResult::Timeout);
        assert_eq!(engine.response().len(), RESPONSE_BUFFER_SIZE);
        assert_eq!(engine.response().as_bytes(), &reply[..RESPONSE_BUFFER_SIZE]);
        assert!(engine.overflowed());
    }

    #[test]
    fn test_overflow_still_matches_retained_prefix() {
        let mut reply = Vec::new();
        reply.extend_from_slice(b"OK");
        reply.extend_from_slice(&[b'A'; 600]);
        reply.push(b'\n');

        let mut transport = ScriptedTransport::new();
        transport.expect("AT+DUMP\r\n", &reply);
        let mut engine = engine_with(transport);

        // The terminator arrives after the bound but still triggers a scan
        let result = engine.send_command("AT+DUMP", 2_000, "OK", ERROR);
        assert_eq!(result, AtResult::Success);
        assert_eq!(engine.response().len(), RESPONSE_BUFFER_SIZE);
    }

    #[test]
    fn test_sink_sees_every_line_in_order() {
        let mut lines: Vec<Vec<u8>> = Vec::new();
        {
            let mut transport = ScriptedTransport::new();
            transport.expect("AT+COPS?\r\n", "AT+COPS?\r\r\n+COPS: 0,0,\"Vodafone\"\r\n\r\nOK\r\n");
            let mut engine = engine_with(transport).with_sink(|line: &[u8]| lines.push(line.to_vec()));
            assert_eq!(engine.send_command("AT+COPS?", 500, OK, ERROR), AtResult::Success);
        }
        assert_eq!(
            lines,
            vec![
                b"AT+COPS?".to_vec(),
                b"+COPS: 0,0,\"Vodafone\"".to_vec(),
                b"".to_vec(),
                b"OK".to_vec(),
            ]
        );
    }

    #[test]
    fn test_cancel_ends_wait() {
        let cancel = AtomicBool::new(true);
        let mut engine = engine_with(ScriptedTransport::new()).with_cancel(&cancel);

        assert_eq!(engine.send_command("AT", 100_000, OK, ERROR), AtResult::Cancelled);
        assert!(engine.clock().now() < 10);

        cancel.store(false, Ordering::Release);
        assert_eq!(engine.send_command("AT", 10, OK, ERROR), AtResult::Timeout);
    }

    #[test]
    fn test_transport_failure_is_reported() {
        let mut transport = ScriptedTransport::new();
        transport.fail_writes(true);
        let mut engine = engine_with(transport);

        assert_eq!(
            engine.send_command("AT", 500, OK, ERROR),
            AtResult::Transport(TransportError::Write)
        );
    }

    #[test]
    fn test_await_prompt() {
        let mut transport = ScriptedTransport::new();
        transport.expect("AT+CMGS=\"+15550100\"\r\n", "\r\n> ");
        let mut engine = engine_with(transport);

        engine.write_command("AT+CMGS=\"+15550100\"").unwrap();
        assert_eq!(engine.await_prompt(b'>', 5_000), AtResult::Success);
        // The trailing space is still pending
        assert_eq!(engine.transport().pending(), 1);
    }

    #[test]
    fn test_await_prompt_rejected() {
        let mut transport = ScriptedTransport::new();
        transport.expect("AT+CMGS=\"bad\"\r\n", "\r\n+CMS ERROR: 304\r\n");
        let mut engine = engine_with(transport);

        engine.write_command("AT+CMGS=\"bad\"").unwrap();
        assert_eq!(engine.await_prompt(b'>', 5_000), AtResult::ProtocolError);
    }

    #[test]
    fn test_await_line_discards_non_matching_lines() {
        let mut transport = ScriptedTransport::new();
        transport.push_incoming("RING\r\n\r\n+CMTI: \"SM\",4\r\n");
        let mut engine = engine_with(transport);

        assert_eq!(engine.await_line_containing("+CMTI:", 1_000), AtResult::Success);
        assert_eq!(engine.response().as_bytes(), b"+CMTI: \"SM\",4\r\n");
    }

    #[test]
    fn test_send_built_keeps_command() {
        let mut transport = ScriptedTransport::new();
        transport.expect("AT+CMGR=3\r\n", "OK\r\n");
        let mut engine = engine_with(transport);

        engine.build_command(&["AT+CMGR=", "3"]).unwrap();
        assert_eq!(engine.send_built(500, OK, ERROR), AtResult::Success);
        assert_eq!(engine.last_command(), "AT+CMGR=3");
    }

    #[test]
    fn test_pause_waits_on_clock() {
        let clock = StepClock::new(1);
        let mut engine = AtEngine::new(ScriptedTransport::new(), &clock);
        let before = clock.now();
        assert_eq!(engine.pause(200), AtResult::Success);
        assert!(clock.now() - before >= 200);
    }

    #[test]
    fn test_zero_timeout_writes_nothing() {
        let mut engine = engine_with(ScriptedTransport::new());
        assert_eq!(engine.send_command("AT", 0, OK, ERROR), AtResult::Timeout);
        assert!(engine.transport().written().is_empty());
    }

    #[test]
    fn test_read_line_returns_one_line() {
        let mut transport = ScriptedTransport::new();
        transport.push_incoming("RING\r\n+CLIP: \"+15550100\"\r\n");
        let mut engine = engine_with(transport);

        assert_eq!(engine.read_line(100), AtResult::Success);
        assert_eq!(engine.response().as_bytes(), b"RING\r\n");
        assert_eq!(engine.read_line(100), AtResult::Success);
        assert!(engine.response().contains("+CLIP:"));
        assert_eq!(engine.read_line(100), AtResult::Timeout);
    }
}
