//! Scripted transport and stepping clock for deterministic tests.
//!
//! [`ScriptedTransport`] replays canned module replies: each expectation is a
//! trigger (bytes the driver must write) and the reply the "module" sends
//! once the trigger has been written. [`StepClock`] advances a fixed step on
//! every read, so timeouts expire after a known number of polls without any
//! real waiting.
//!
//! # Example
//!
//! ```
//! use sim800::mock::{ScriptedTransport, StepClock};
//! use sim800::{AtEngine, AtResult};
//!
//! let mut transport = ScriptedTransport::new();
//! transport.expect("AT\r\n", "OK\r\n");
//!
//! let mut engine = AtEngine::new(transport, StepClock::new(1));
//! assert_eq!(engine.send_command("AT", 500, "OK\r\n", "ERROR"), AtResult::Success);
//! ```

use std::borrow::Cow;
use std::cell::Cell;
use std::collections::VecDeque;

use crate::buffer::find;
use crate::traits::{Clock, Transport, TransportError};

/// A trigger/reply pair
#[derive(Debug, Clone)]
struct Expectation {
    trigger: Vec<u8>,
    reply: Vec<u8>,
}

/// A [`Transport`] that answers writes from a script.
///
/// Expectations are consumed in order. Written bytes accumulate until they
/// contain the next trigger; the matching reply is then queued for reading.
/// Writes that match nothing are only recorded.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: VecDeque<Expectation>,
    /// Bytes the driver can read
    incoming: VecDeque<u8>,
    /// Written bytes not yet consumed by a trigger
    unmatched: Vec<u8>,
    /// Every byte ever written
    written: Vec<u8>,
    fail_writes: bool,
    fail_reads: bool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `reply` to be sent once `trigger` has been written
    pub fn expect(&mut self, trigger: impl AsRef<[u8]>, reply: impl AsRef<[u8]>) {
        self.script.push_back(Expectation {
            trigger: trigger.as_ref().to_vec(),
            reply: reply.as_ref().to_vec(),
        });
    }

    /// Make bytes readable right away, as if the module sent them unprompted
    pub fn push_incoming(&mut self, bytes: impl AsRef<[u8]>) {
        self.incoming.extend(bytes.as_ref());
    }

    /// All bytes written so far
    pub fn written(&self) -> &[u8] {
        &self.written
    }

    pub fn written_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.written)
    }

    /// Readable bytes not yet consumed
    pub fn pending(&self) -> usize {
        self.incoming.len()
    }

    /// Expectations whose trigger has not been written yet
    pub fn remaining_expectations(&self) -> usize {
        self.script.len()
    }

    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    fn run_script(&mut self) {
        while let Some(next) = self.script.front() {
            let Some(pos) = find(&self.unmatched, &next.trigger) else {
                break;
            };
            self.unmatched.drain(..pos + next.trigger.len());
            if let Some(expectation) = self.script.pop_front() {
                self.incoming.extend(expectation.reply);
            }
        }
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.fail_writes {
            return Err(TransportError::Write);
        }
        self.written.extend_from_slice(bytes);
        self.unmatched.extend_from_slice(bytes);
        self.run_script();
        Ok(())
    }

    fn bytes_available(&mut self) -> Result<usize, TransportError> {
        if self.fail_reads {
            return Err(TransportError::Read);
        }
        Ok(self.incoming.len())
    }

    fn read_byte(&mut self) -> Result<u8, TransportError> {
        self.incoming.pop_front().ok_or(TransportError::Read)
    }
}

/// Clock that moves forward `step` milliseconds every time it is read
#[derive(Debug)]
pub struct StepClock {
    now: Cell<u64>,
    step: u64,
}

impl StepClock {
    pub fn new(step_ms: u64) -> Self {
        Self {
            now: Cell::new(0),
            step: step_ms,
        }
    }

    /// Current time, without advancing
    pub fn now(&self) -> u64 {
        self.now.get()
    }

    /// Jump forward
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for StepClock {
    fn now_ms(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now + self.step);
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_follows_trigger() {
        let mut transport = ScriptedTransport::new();
        transport.expect("AT\r\n", "OK\r\n");

        transport.write(b"AT").unwrap();
        assert_eq!(transport.pending(), 0);
        transport.write(b"\r\n").unwrap();
        assert_eq!(transport.pending(), 4);
        assert_eq!(transport.read_byte(), Ok(b'O'));
        assert_eq!(transport.remaining_expectations(), 0);
    }

    #[test]
    fn test_expectations_consumed_in_order() {
        let mut transport = ScriptedTransport::new();
        transport.expect("A", "1");
        transport.expect("B", "2");

        transport.write(b"B").unwrap();
        assert_eq!(transport.pending(), 0);
        transport.write(b"A").unwrap();
        // "B" was written before "A" matched, so it no longer counts
        assert_eq!(transport.pending(), 1);
        assert_eq!(transport.remaining_expectations(), 1);
    }

    #[test]
    fn test_step_clock() {
        let clock = StepClock::new(5);
        assert_eq!(clock.now_ms(), 0);
        assert_eq!(clock.now_ms(), 5);
        clock.advance(100);
        assert_eq!(clock.now(), 110);
    }
}
