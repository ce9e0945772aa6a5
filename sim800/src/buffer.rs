//! # Bounded Command & Response Buffers
//!
//! Both buffers are fixed-capacity and owned by a single [`AtEngine`](crate::engine::AtEngine).
//! Nothing is ever written past capacity: appends past the bound are rejected
//! and the caller decides whether that matters.
//!
//! ## Memory Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 ResponseBuffer (512 bytes)                   │
//! ├──────────────────────────────────────────────────────────────┤
//! │ AT+CSQ\r\n │ +CSQ: 15,99\r\n │ \r\n │ OK\r\n │   free space    │
//! └──────────────────────────────────────────────────────────────┘
//!                                       ▲        ▲
//!                                  line_start   len
//! ```
//!
//! Matching always runs over the whole accumulated contents, the line cursor
//! only exists so completed lines can be handed to a diagnostic sink.

use core::fmt::Write as _;

use heapless::{String, Vec};

/// Capacity of the command buffer
pub const COMMAND_BUFFER_SIZE: usize = 128;

/// Capacity of the response buffer
pub const RESPONSE_BUFFER_SIZE: usize = 512;

/// Errors specific to buffer operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferError {
    /// Attempted to write more data than available space
    #[error("buffer capacity exceeded")]
    Overflow,
}

/// Safe substring search over a byte slice.
///
/// Returns the offset of the first occurrence of `needle`. An empty needle
/// never matches, so an unset token cannot accidentally report success.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Assembles one AT command from up to a few string parts.
///
/// The buffer is cleared on every build, so a command never outlives the
/// transaction it was built for.
#[derive(Debug, Default, Clone)]
pub struct CommandBuffer {
    text: String<COMMAND_BUFFER_SIZE>,
}

impl CommandBuffer {
    /// Create an empty command buffer
    pub const fn new() -> Self {
        Self {
            text: String::new(),
        }
    }

    /// Clear the buffer and concatenate `parts` into it.
    ///
    /// On overflow the buffer is left empty rather than holding a truncated
    /// command that could still be sent by mistake.
    pub fn build(&mut self, parts: &[&str]) -> Result<&str, BufferError> {
        self.text.clear();
        for part in parts {
            if self.text.push_str(part).is_err() {
                self.text.clear();
                return Err(BufferError::Overflow);
            }
        }
        Ok(self.text.as_str())
    }

    /// Clear the buffer and format `args` into it.
    pub fn build_fmt(&mut self, args: core::fmt::Arguments<'_>) -> Result<&str, BufferError> {
        self.text.clear();
        if self.text.write_fmt(args).is_err() {
            self.text.clear();
            return Err(BufferError::Overflow);
        }
        Ok(self.text.as_str())
    }

    /// The most recently built command
    #[inline]
    pub fn as_str(&self) -> &str {
        self.text.as_str()
    }

    /// Check if nothing has been built since the last clear
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Empty the buffer
    pub fn clear(&mut self) {
        self.text.clear();
    }
}

/// Line-aware accumulation buffer for one AT transaction.
#[derive(Debug, Default, Clone)]
pub struct ResponseBuffer {
    data: Vec<u8, RESPONSE_BUFFER_SIZE>,
    /// Offset where the line currently being received starts
    line_start: usize,
}

impl ResponseBuffer {
    /// Create an empty response buffer
    pub const fn new() -> Self {
        Self {
            data: Vec::new(),
            line_start: 0,
        }
    }

    /// Get the total capacity of the buffer
    #[inline]
    pub const fn capacity(&self) -> usize {
        RESPONSE_BUFFER_SIZE
    }

    /// Number of bytes held
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.data.is_full()
    }

    /// Append one byte, rejecting it once the buffer is full.
    pub fn push(&mut self, byte: u8) -> Result<(), BufferError> {
        self.data.push(byte).map_err(|_| BufferError::Overflow)
    }

    /// Append a run of bytes, all or nothing.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> Result<(), BufferError> {
        self.data
            .extend_from_slice(bytes)
            .map_err(|_| BufferError::Overflow)
    }

    /// Check whether `token` occurs anywhere in the accumulated contents
    pub fn contains(&self, token: &str) -> bool {
        find(&self.data, token.as_bytes()).is_some()
    }

    /// Everything received so far
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Contents as text, if the module sent valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.data).ok()
    }

    /// Bytes of the line currently being received, terminators stripped.
    pub fn current_line(&self) -> &[u8] {
        let line = &self.data[self.line_start.min(self.data.len())..];
        trim_line_end(line)
    }

    /// Mark the current line as complete; the next byte starts a new line.
    pub fn end_line(&mut self) {
        self.line_start = self.data.len();
    }

    /// Reset the buffer to empty state
    pub fn clear(&mut self) {
        self.data.clear();
        self.line_start = 0;
    }
}

/// Strip any trailing `\r` / `\n` bytes
pub fn trim_line_end(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|&b| b != b'\r' && b != b'\n')
        .map_or(0, |pos| pos + 1);
    &line[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_substring() {
        assert_eq!(find(b"+CSQ: 15,99\r\nOK\r\n", b"OK"), Some(13));
        assert_eq!(find(b"ERROR\r\n", b"OK"), None);
        assert_eq!(find(b"OK", b""), None);
        assert_eq!(find(b"O", b"OK"), None);
    }

    #[test]
    fn test_command_build_clears_previous() {
        let mut cmd = CommandBuffer::new();
        cmd.build(&["AT+HTTPPARA=\"URL\",\"", "http://example.com", "\""])
            .unwrap();
        assert_eq!(cmd.as_str(), "AT+HTTPPARA=\"URL\",\"http://example.com\"");

        cmd.build(&["AT+CSQ"]).unwrap();
        assert_eq!(cmd.as_str(), "AT+CSQ");
    }

    #[test]
    fn test_command_overflow_leaves_buffer_empty() {
        let mut cmd = CommandBuffer::new();
        let long = [b'x'; COMMAND_BUFFER_SIZE];
        let long = core::str::from_utf8(&long).unwrap();

        assert_eq!(cmd.build(&["AT+", long]), Err(BufferError::Overflow));
        assert!(cmd.is_empty());
    }

    #[test]
    fn test_command_build_fmt() {
        let mut cmd = CommandBuffer::new();
        let built = cmd.build_fmt(format_args!("AT+HTTPDATA={},{}", 14, 1000)).unwrap();
        assert_eq!(built, "AT+HTTPDATA=14,1000");
    }

    #[test]
    fn test_response_push_stops_at_capacity() {
        let mut resp = ResponseBuffer::new();
        for _ in 0..RESPONSE_BUFFER_SIZE {
            resp.push(b'A').unwrap();
        }
        assert!(resp.is_full());
        assert_eq!(resp.push(b'B'), Err(BufferError::Overflow));
        assert_eq!(resp.len(), RESPONSE_BUFFER_SIZE);
        assert!(!resp.as_bytes().contains(&b'B'));
    }

    #[test]
    fn test_current_line_tracks_line_cursor() {
        let mut resp = ResponseBuffer::new();
        resp.extend_from_slice(b"+CSQ: 15,99\r\n").unwrap();
        assert_eq!(resp.current_line(), b"+CSQ: 15,99");

        resp.end_line();
        resp.extend_from_slice(b"OK\r\n").unwrap();
        assert_eq!(resp.current_line(), b"OK");
        assert!(resp.contains("+CSQ:"));
        assert!(resp.contains("OK\r\n"));
    }

    #[test]
    fn test_clear_resets_line_cursor() {
        let mut resp = ResponseBuffer::new();
        resp.extend_from_slice(b"RING\r\n").unwrap();
        resp.end_line();
        resp.clear();
        assert!(resp.is_empty());
        resp.extend_from_slice(b"OK").unwrap();
        assert_eq!(resp.current_line(), b"OK");
    }
}
