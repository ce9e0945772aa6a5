//! [`Transport`] adapter for `embedded-io` serial drivers.
//!
//! Most HAL UART types implement `embedded_io::{Read, Write, ReadReady}`;
//! wrapping one in [`IoTransport`] is all that is needed to drive the module
//! from a microcontroller.

use embedded_io::{Read, ReadReady, Write};
use log::warn;

use crate::traits::{Transport, TransportError};

/// Wraps an `embedded-io` byte stream
#[derive(Debug)]
pub struct IoTransport<S> {
    inner: S,
}

impl<S> IoTransport<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S> Transport for IoTransport<S>
where
    S: Read + Write + ReadReady,
{
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.inner.write_all(bytes).map_err(|e| {
            warn!("uart write failed: {:?}", e);
            TransportError::Write
        })
    }

    fn bytes_available(&mut self) -> Result<usize, TransportError> {
        // ReadReady only tells "some" from "none"
        match self.inner.read_ready() {
            Ok(true) => Ok(1),
            Ok(false) => Ok(0),
            Err(_) => Err(TransportError::Read),
        }
    }

    fn read_byte(&mut self) -> Result<u8, TransportError> {
        let mut byte = [0u8; 1];
        match self.inner.read(&mut byte) {
            Ok(0) => Err(TransportError::Disconnected),
            Ok(_) => Ok(byte[0]),
            Err(_) => Err(TransportError::Read),
        }
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.inner.flush().map_err(|_| TransportError::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct Loopback {
        rx: VecDeque<u8>,
        tx: Vec<u8>,
        closed: bool,
    }

    impl embedded_io::ErrorType for Loopback {
        type Error = Infallible;
    }

    impl Read for Loopback {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            if self.closed {
                return Ok(0);
            }
            let mut n = 0;
            while n < buf.len() {
                match self.rx.pop_front() {
                    Some(b) => {
                        buf[n] = b;
                        n += 1;
                    }
                    None => break,
                }
            }
            Ok(n)
        }
    }

    impl ReadReady for Loopback {
        fn read_ready(&mut self) -> Result<bool, Self::Error> {
            Ok(self.closed || !self.rx.is_empty())
        }
    }

    impl Write for Loopback {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            self.tx.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[test]
    fn test_io_transport_reads_and_writes() {
        let mut port = Loopback::default();
        port.rx.extend(b"OK");
        let mut transport = IoTransport::new(port);

        transport.write(b"AT\r\n").unwrap();
        assert_eq!(transport.bytes_available(), Ok(1));
        assert_eq!(transport.read_byte(), Ok(b'O'));
        assert_eq!(transport.read_byte(), Ok(b'K'));
        assert_eq!(transport.bytes_available(), Ok(0));
        assert_eq!(transport.into_inner().tx, b"AT\r\n");
    }

    #[test]
    fn test_io_transport_reports_closed_link() {
        let mut transport = IoTransport::new(Loopback::default());
        transport.inner_mut().closed = true;
        assert_eq!(transport.read_byte(), Err(TransportError::Disconnected));
    }
}
