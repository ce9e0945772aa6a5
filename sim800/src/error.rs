//! Error types for the driver.
//!
//! Every fallible public operation returns [`Result<T>`]. The variants keep
//! the failure classes apart (timeout, module-reported error, malformed
//! reply, broken link) so a caller can choose between retrying, escalating
//! and power-cycling the module.

use crate::buffer::BufferError;
use crate::traits::TransportError;

/// A reply framed as success lacked the expected shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// A prefix, quote or comma the reply must contain is absent
    #[error("expected delimiter missing")]
    MissingDelimiter,
    /// A numeric field did not parse
    #[error("invalid number")]
    InvalidNumber,
    /// A numeric field parsed but lies outside its documented range
    #[error("value out of range")]
    OutOfRange,
    /// A text field does not fit its bounded destination
    #[error("field too long")]
    TooLong,
    /// A text field is not valid UTF-8
    #[error("invalid UTF-8")]
    InvalidUtf8,
}

/// The error type for all driver operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// No terminal token arrived before the deadline
    #[error("timed out waiting for the module")]
    Timeout,

    /// The cancel signal was raised while waiting
    #[error("cancelled")]
    Cancelled,

    /// The module answered with the error token
    #[error("module reported an error")]
    Module,

    /// An HTTP action completed with a status outside 2xx
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// GSM location lookup answered with a non-zero location code
    #[error("location unavailable (code {0})")]
    LocationUnavailable(u16),

    #[error("malformed reply: {0}")]
    Parse(#[from] ParseError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The assembled command does not fit the command buffer
    #[error("command too long")]
    CommandTooLong,

    /// Driving the reset/power pin failed
    #[error("reset pin error")]
    Pin,

    /// A caller-supplied argument cannot be sent to the module
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

/// Coarse failure classes, for callers that only care about the category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    Timeout,
    Cancelled,
    /// The module or the remote HTTP server refused the request
    Protocol,
    Parse,
    Transport,
    /// The request never reached the module
    Usage,
}

impl Error {
    /// The failure class of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Timeout => ErrorKind::Timeout,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Module | Error::HttpStatus(_) | Error::LocationUnavailable(_) => {
                ErrorKind::Protocol
            }
            Error::Parse(_) => ErrorKind::Parse,
            Error::Transport(_) | Error::Pin => ErrorKind::Transport,
            Error::CommandTooLong | Error::InvalidArgument(_) => ErrorKind::Usage,
        }
    }
}

impl From<BufferError> for Error {
    fn from(e: BufferError) -> Self {
        match e {
            BufferError::Overflow => Error::CommandTooLong,
        }
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_is_protocol_kind() {
        assert_eq!(Error::HttpStatus(404).kind(), ErrorKind::Protocol);
        assert_eq!(Error::Module.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_conversions() {
        let e: Error = ParseError::MissingDelimiter.into();
        assert_eq!(e.kind(), ErrorKind::Parse);

        let e: Error = TransportError::Write.into();
        assert_eq!(e, Error::Transport(TransportError::Write));

        let e: Error = BufferError::Overflow.into();
        assert_eq!(e, Error::CommandTooLong);
    }

    #[test]
    fn test_display() {
        assert_eq!(Error::HttpStatus(404).to_string(), "HTTP status 404");
        assert_eq!(
            Error::Parse(ParseError::InvalidNumber).to_string(),
            "malformed reply: invalid number"
        );
    }
}
