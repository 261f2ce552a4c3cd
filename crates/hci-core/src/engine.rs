//! HCI command/event engine.
//!
//! Every outbound command goes through [`Hci::send_command`], which writes one
//! command frame and then blocks for exactly one event in response. Only one
//! command is ever outstanding: the next request is not written until the
//! previous response has been fully consumed and validated.
//!
//! Accepted responses, byte by byte:
//!
//! ```text
//! Command Status:   04 0F 04 <status=00> <ncmd!=00> <op lo> <op hi>
//! Command Complete: 04 0E 04 <ncmd!=00> <op lo> <op hi> <status=00>
//! ```
//!
//! Each comparison has its own [`CommandError`] variant.

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::ble::BdAddr;
use crate::protocol::constants::*;
use crate::protocol::{CommandPacket, Opcode};
use crate::transport::{SerialLink, TransportError};

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Expected event packet 0x04, got 0x{found:02X}")]
    UnexpectedPacketType { found: u8 },

    #[error("Command Status: parameter length {found}, expected 4")]
    BadParamLength { found: u8 },

    #[error("Command Status: zero command packet count")]
    BadPacketCount,

    #[error("Command Status: opcode lo echo 0x{found:02X}, expected 0x{expected:02X}")]
    OpcodeEchoMismatchLo { expected: u8, found: u8 },

    #[error("Command Status: opcode hi echo 0x{found:02X}, expected 0x{expected:02X}")]
    OpcodeEchoMismatchHi { expected: u8, found: u8 },

    #[error("Command Complete: parameter length {found}, expected {expected}")]
    CompleteBadParamLength { expected: u8, found: u8 },

    #[error("Command Complete: zero command packet count")]
    ZeroPacketCount,

    #[error("Command Complete: opcode lo echo 0x{found:02X}, expected 0x{expected:02X}")]
    CompleteOpcodeEchoMismatchLo { expected: u8, found: u8 },

    #[error("Command Complete: opcode hi echo 0x{found:02X}, expected 0x{expected:02X}")]
    CompleteOpcodeEchoMismatchHi { expected: u8, found: u8 },

    #[error("Command Complete: status 0x{status:02X}")]
    NonZeroStatus { status: u8 },

    #[error("Unknown event code 0x{code:02X}")]
    UnknownEventCode { code: u8 },

    #[error("Controller reported error status 0x{status:02X}")]
    DeviceReportedError { status: u8 },

    #[error("Command payload too long: {len} bytes, maximum 255")]
    PayloadTooLong { len: usize },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl CommandError {
    /// Number of the response check that failed, in the order the checks
    /// run (1..=12). `None` for errors that are not response-shape checks.
    pub fn check_number(&self) -> Option<u8> {
        let n = match self {
            CommandError::UnexpectedPacketType { .. } => 1,
            CommandError::BadParamLength { .. } => 2,
            CommandError::BadPacketCount => 3,
            CommandError::OpcodeEchoMismatchLo { .. } => 4,
            CommandError::OpcodeEchoMismatchHi { .. } => 5,
            CommandError::CompleteBadParamLength { .. } => 6,
            CommandError::ZeroPacketCount => 7,
            CommandError::CompleteOpcodeEchoMismatchLo { .. } => 8,
            CommandError::CompleteOpcodeEchoMismatchHi { .. } => 9,
            CommandError::NonZeroStatus { .. } => 10,
            CommandError::UnknownEventCode { .. } => 11,
            CommandError::DeviceReportedError { .. } => 12,
            CommandError::PayloadTooLong { .. } | CommandError::Transport(_) => return None,
        };
        Some(n)
    }
}

/// Half-duplex HCI host bound to one serial link.
pub struct Hci<L: SerialLink> {
    link: L,
    response_timeout: Option<Duration>,
}

impl<L: SerialLink> Hci<L> {
    /// Wrap `link`. Responses are awaited without a deadline.
    pub fn new(link: L) -> Self {
        Self {
            link,
            response_timeout: None,
        }
    }

    /// Bound the wait for each full command/response exchange.
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = Some(timeout);
        self
    }

    pub fn set_response_timeout(&mut self, timeout: Option<Duration>) {
        self.response_timeout = timeout;
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }

    /// Discard stale receive bytes (used once at startup).
    pub fn flush_receive(&mut self) -> Result<usize, TransportError> {
        let drained = self.link.flush_receive()?;
        if drained > 0 {
            debug!(bytes = drained, "Discarded stale receive data");
        }
        Ok(drained)
    }

    /// Send `(ogf, ocf)` with `payload` and validate the response.
    pub fn command(&mut self, ogf: u8, ocf: u16, payload: &[u8]) -> Result<(), CommandError> {
        self.send_command(Opcode::new(ogf, ocf), payload)
    }

    /// Write one command frame and validate the single event answering it.
    #[instrument(level = "debug", skip(self, payload), fields(opcode = %opcode, len = payload.len()))]
    pub fn send_command(&mut self, opcode: Opcode, payload: &[u8]) -> Result<(), CommandError> {
        let deadline = self.start_exchange(opcode, payload)?;

        let indicator = self.read(deadline)?;
        if indicator != HCI_EVENT_PKT {
            return Err(CommandError::UnexpectedPacketType { found: indicator });
        }

        match self.read(deadline)? {
            EVENT_COMMAND_STATUS => self.finish_command_status(opcode, deadline),
            EVENT_COMMAND_COMPLETE => {
                self.finish_command_complete(opcode, EVENT_SHORT_PARAM_LEN, deadline)
            }
            code => Err(CommandError::UnknownEventCode { code }),
        }
    }

    /// Host-control Reset.
    pub fn reset(&mut self) -> Result<(), CommandError> {
        self.send_command(Opcode::RESET, &[])
    }

    /// Read the controller's public device address.
    #[instrument(level = "debug", skip(self))]
    pub fn read_bd_addr(&mut self) -> Result<BdAddr, CommandError> {
        let opcode = Opcode::READ_BD_ADDR;
        let deadline = self.start_exchange(opcode, &[])?;

        let indicator = self.read(deadline)?;
        if indicator != HCI_EVENT_PKT {
            return Err(CommandError::UnexpectedPacketType { found: indicator });
        }
        let code = self.read(deadline)?;
        if code != EVENT_COMMAND_COMPLETE {
            return Err(CommandError::UnknownEventCode { code });
        }
        // status + opcode + ncmd + 6 address bytes
        self.finish_command_complete(opcode, 0x0A, deadline)?;

        let mut wire = [0u8; 6];
        for b in wire.iter_mut() {
            *b = self.read(deadline)?;
        }
        let addr = BdAddr::from_wire(wire);
        debug!(addr = %addr, "Read BD_ADDR");
        Ok(addr)
    }

    fn start_exchange(
        &mut self,
        opcode: Opcode,
        payload: &[u8],
    ) -> Result<Option<Instant>, CommandError> {
        let packet = CommandPacket::new(opcode, payload)
            .map_err(|_| CommandError::PayloadTooLong { len: payload.len() })?;
        let deadline = self.response_timeout.map(|t| Instant::now() + t);

        debug!(opcode = %opcode, len = payload.len(), "HCI command");
        self.link.write_all(&packet.encode(), deadline)?;
        Ok(deadline)
    }

    fn finish_command_status(
        &mut self,
        opcode: Opcode,
        deadline: Option<Instant>,
    ) -> Result<(), CommandError> {
        let len = self.read(deadline)?;
        if len != EVENT_SHORT_PARAM_LEN {
            return Err(CommandError::BadParamLength { found: len });
        }

        let status = self.read(deadline)?;
        if status != 0 {
            warn!(opcode = %opcode, status = %format!("0x{:02X}", status), "HCI Command Status error");
            return Err(CommandError::DeviceReportedError { status });
        }

        if self.read(deadline)? == 0 {
            return Err(CommandError::BadPacketCount);
        }

        let lo = self.read(deadline)?;
        if lo != opcode.lo() {
            return Err(CommandError::OpcodeEchoMismatchLo {
                expected: opcode.lo(),
                found: lo,
            });
        }
        let hi = self.read(deadline)?;
        if hi != opcode.hi() {
            return Err(CommandError::OpcodeEchoMismatchHi {
                expected: opcode.hi(),
                found: hi,
            });
        }
        Ok(())
    }

    fn finish_command_complete(
        &mut self,
        opcode: Opcode,
        expected_len: u8,
        deadline: Option<Instant>,
    ) -> Result<(), CommandError> {
        let len = self.read(deadline)?;
        if len != expected_len {
            return Err(CommandError::CompleteBadParamLength {
                expected: expected_len,
                found: len,
            });
        }

        if self.read(deadline)? == 0 {
            return Err(CommandError::ZeroPacketCount);
        }

        let lo = self.read(deadline)?;
        if lo != opcode.lo() {
            return Err(CommandError::CompleteOpcodeEchoMismatchLo {
                expected: opcode.lo(),
                found: lo,
            });
        }
        let hi = self.read(deadline)?;
        if hi != opcode.hi() {
            return Err(CommandError::CompleteOpcodeEchoMismatchHi {
                expected: opcode.hi(),
                found: hi,
            });
        }

        let status = self.read(deadline)?;
        if status != 0 {
            return Err(CommandError::NonZeroStatus { status });
        }
        Ok(())
    }

    fn read(&mut self, deadline: Option<Instant>) -> Result<u8, TransportError> {
        self.link.wait_read_byte_until(deadline)
    }
}
