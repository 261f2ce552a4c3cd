//! Serial transport layer abstraction.
//!
//! Defines the `SerialLink` trait for byte-at-a-time polling I/O,
//! allowing different implementations (serial port, mock, etc.).
//!
//! The blocking helpers spin on the readiness flags. Without a deadline they
//! never give up: an unresponsive controller hangs the caller.

use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to open {port}: {message}")]
    OpenFailed { port: String, message: String },

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Deadline expired waiting to {0}")]
    Timeout(Direction),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which side of the link a stall happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Read => write!(f, "read"),
            Direction::Write => write!(f, "write"),
        }
    }
}

/// Polling byte channel to the controller.
///
/// A link has exactly one owner and one byte in flight at a time, so every
/// method takes `&mut self` and implementations carry no locking.
pub trait SerialLink {
    /// Non-blocking poll of the receive-has-data flag.
    fn is_read_ready(&mut self) -> Result<bool, TransportError>;

    /// Read one byte. Only meaningful after `is_read_ready` returned true.
    fn read_byte(&mut self) -> Result<u8, TransportError>;

    /// Non-blocking poll of the transmit-buffer-not-full flag.
    fn is_write_ready(&mut self) -> Result<bool, TransportError>;

    /// Write one byte without checking the transmit flag.
    fn write_raw(&mut self, byte: u8) -> Result<(), TransportError>;

    /// Spin until a byte is available, then read it. Never times out.
    fn wait_read_byte(&mut self) -> Result<u8, TransportError> {
        self.wait_read_byte_until(None)
    }

    /// Like `wait_read_byte`, giving up once `deadline` has passed.
    fn wait_read_byte_until(&mut self, deadline: Option<Instant>) -> Result<u8, TransportError> {
        loop {
            if self.is_read_ready()? {
                return self.read_byte();
            }
            if let Some(deadline) = deadline
                && Instant::now() >= deadline
            {
                return Err(TransportError::Timeout(Direction::Read));
            }
            std::hint::spin_loop();
        }
    }

    /// Spin while the transmit buffer is full, then write.
    fn write_byte(&mut self, byte: u8) -> Result<(), TransportError> {
        self.write_byte_until(byte, None)
    }

    fn write_byte_until(
        &mut self,
        byte: u8,
        deadline: Option<Instant>,
    ) -> Result<(), TransportError> {
        loop {
            if self.is_write_ready()? {
                return self.write_raw(byte);
            }
            if let Some(deadline) = deadline
                && Instant::now() >= deadline
            {
                return Err(TransportError::Timeout(Direction::Write));
            }
            std::hint::spin_loop();
        }
    }

    /// Write `bytes` in order, one at a time.
    fn write_all(&mut self, bytes: &[u8], deadline: Option<Instant>) -> Result<(), TransportError> {
        for &b in bytes {
            self.write_byte_until(b, deadline)?;
        }
        Ok(())
    }

    /// Drain every currently buffered byte. Returns how many were discarded.
    fn flush_receive(&mut self) -> Result<usize, TransportError> {
        let mut drained = 0;
        while self.is_read_ready()? {
            self.read_byte()?;
            drained += 1;
        }
        Ok(drained)
    }

    /// Delay service used for settle times between bring-up steps.
    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }

    /// Retune the host side of the link. Links with a fixed rate ignore it.
    fn set_baud_rate(&mut self, _baud_rate: u32) -> Result<(), TransportError> {
        Ok(())
    }
}

impl<L: SerialLink + ?Sized> SerialLink for &mut L {
    fn is_read_ready(&mut self) -> Result<bool, TransportError> {
        (**self).is_read_ready()
    }

    fn read_byte(&mut self) -> Result<u8, TransportError> {
        (**self).read_byte()
    }

    fn is_write_ready(&mut self) -> Result<bool, TransportError> {
        (**self).is_write_ready()
    }

    fn write_raw(&mut self, byte: u8) -> Result<(), TransportError> {
        (**self).write_raw(byte)
    }

    fn wait_read_byte_until(&mut self, deadline: Option<Instant>) -> Result<u8, TransportError> {
        (**self).wait_read_byte_until(deadline)
    }

    fn write_byte_until(
        &mut self,
        byte: u8,
        deadline: Option<Instant>,
    ) -> Result<(), TransportError> {
        (**self).write_byte_until(byte, deadline)
    }

    fn flush_receive(&mut self) -> Result<usize, TransportError> {
        (**self).flush_receive()
    }

    fn delay(&mut self, duration: Duration) {
        (**self).delay(duration)
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), TransportError> {
        (**self).set_baud_rate(baud_rate)
    }
}
