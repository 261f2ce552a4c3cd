//! serialport-based link to a UART-attached controller.

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::traits::{SerialLink, TransportError};

/// OS-level read timeout for a single byte; readiness is polled first.
const BYTE_TIMEOUT: Duration = Duration::from_millis(50);

/// Bytes the OS may hold in its transmit queue before we report "full".
const TX_HIGH_WATER: u32 = 64;

/// Serial port transport (8N1, no flow control).
pub struct SerialPortLink {
    port: Box<dyn SerialPort>,
    name: String,
}

impl SerialPortLink {
    /// Open `path` at `baud_rate`.
    #[instrument(level = "info")]
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, TransportError> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(BYTE_TIMEOUT)
            .open()
            .map_err(|e| TransportError::OpenFailed {
                port: path.to_string(),
                message: e.to_string(),
            })?;

        info!(port = %path, baud = baud_rate, "Serial link opened");
        Ok(Self {
            port,
            name: path.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl SerialLink for SerialPortLink {
    fn is_read_ready(&mut self) -> Result<bool, TransportError> {
        self.port
            .bytes_to_read()
            .map(|n| n > 0)
            .map_err(|e| TransportError::ReadFailed(e.to_string()))
    }

    fn read_byte(&mut self) -> Result<u8, TransportError> {
        let mut buf = [0u8; 1];
        self.port.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn is_write_ready(&mut self) -> Result<bool, TransportError> {
        self.port
            .bytes_to_write()
            .map(|n| n < TX_HIGH_WATER)
            .map_err(|e| TransportError::WriteFailed(e.to_string()))
    }

    fn write_raw(&mut self, byte: u8) -> Result<(), TransportError> {
        self.port.write_all(&[byte])?;
        Ok(())
    }

    fn flush_receive(&mut self) -> Result<usize, TransportError> {
        let pending = self
            .port
            .bytes_to_read()
            .map_err(|e| TransportError::ReadFailed(e.to_string()))?;
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| TransportError::ReadFailed(e.to_string()))?;
        Ok(pending as usize)
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), TransportError> {
        self.port
            .set_baud_rate(baud_rate)
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;
        debug!(baud = baud_rate, "Host baud rate changed");
        Ok(())
    }
}
