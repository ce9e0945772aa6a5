//! [`Transport`] over a host serial port.

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use log::{info, warn};
use serialport::SerialPort;
use sim800::{Transport, TransportError};

use crate::error::Result;

/// Read timeout; reads only happen once bytes are known to be waiting
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// A serial port driven by the AT engine
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open `path` at `baud_rate` (8N1)
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()?;
        info!("opened {} at {} baud", path, baud_rate);
        Ok(Self { port })
    }

    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> std::result::Result<(), TransportError> {
        self.port.write_all(bytes).map_err(|e| {
            warn!("serial write failed: {}", e);
            TransportError::Write
        })
    }

    fn bytes_available(&mut self) -> std::result::Result<usize, TransportError> {
        match self.port.bytes_to_read() {
            Ok(n) => Ok(n as usize),
            Err(e) => {
                warn!("serial status failed: {}", e);
                Err(TransportError::Read)
            }
        }
    }

    fn read_byte(&mut self) -> std::result::Result<u8, TransportError> {
        let mut byte = [0u8; 1];
        match self.port.read_exact(&mut byte) {
            Ok(()) => Ok(byte[0]),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(TransportError::Disconnected),
            Err(e) => {
                warn!("serial read failed: {}", e);
                Err(TransportError::Read)
            }
        }
    }

    fn flush(&mut self) -> std::result::Result<(), TransportError> {
        self.port.flush().map_err(|_| TransportError::Write)
    }
}
