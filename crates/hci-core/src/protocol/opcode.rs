//! 16-bit HCI opcode composed of an OGF (high 6 bits) and OCF (low 10 bits).

use std::fmt;

use super::constants::*;

/// HCI command opcode.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Opcode(u16);

impl Opcode {
    pub const RESET: Opcode = Opcode::new(OGF_HOST_CONTROL, OCF_RESET);
    pub const READ_BD_ADDR: Opcode = Opcode::new(OGF_INFORMATIONAL, OCF_READ_BD_ADDR);
    pub const LE_SET_EVENT_MASK: Opcode = Opcode::new(OGF_LE_CONTROL, OCF_LE_SET_EVENT_MASK);
    pub const LE_SET_ADVERTISING_PARAMETERS: Opcode =
        Opcode::new(OGF_LE_CONTROL, OCF_LE_SET_ADVERTISING_PARAMETERS);
    pub const LE_SET_ADVERTISING_DATA: Opcode =
        Opcode::new(OGF_LE_CONTROL, OCF_LE_SET_ADVERTISING_DATA);
    pub const LE_SET_ADVERTISING_ENABLE: Opcode =
        Opcode::new(OGF_LE_CONTROL, OCF_LE_SET_ADVERTISING_ENABLE);
    pub const LE_SET_SCAN_PARAMETERS: Opcode =
        Opcode::new(OGF_LE_CONTROL, OCF_LE_SET_SCAN_PARAMETERS);
    pub const LE_SET_SCAN_ENABLE: Opcode = Opcode::new(OGF_LE_CONTROL, OCF_LE_SET_SCAN_ENABLE);
    pub const LE_CREATE_CONNECTION: Opcode = Opcode::new(OGF_LE_CONTROL, OCF_LE_CREATE_CONNECTION);
    pub const VENDOR_SET_BDADDR: Opcode = Opcode::new(OGF_VENDOR, OCF_VENDOR_SET_BDADDR);
    pub const VENDOR_SET_BAUD: Opcode = Opcode::new(OGF_VENDOR, OCF_VENDOR_SET_BAUD);
    pub const VENDOR_LOAD_FIRMWARE: Opcode = Opcode::new(OGF_VENDOR, OCF_VENDOR_LOAD_FIRMWARE);

    /// Compose `(ogf << 10) | ocf`. Out-of-range bits are masked off.
    pub const fn new(ogf: u8, ocf: u16) -> Self {
        Self((((ogf as u16) & 0x3F) << 10) | (ocf & 0x03FF))
    }

    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Recombine from the two bytes as they appear on the wire.
    pub const fn from_le_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_le_bytes(bytes))
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn ogf(self) -> u8 {
        (self.0 >> 10) as u8
    }

    pub const fn ocf(self) -> u16 {
        self.0 & 0x03FF
    }

    /// Low byte, sent first.
    pub const fn lo(self) -> u8 {
        lo(self.0)
    }

    pub const fn hi(self) -> u8 {
        hi(self.0)
    }

    pub const fn to_le_bytes(self) -> [u8; 2] {
        [self.lo(), self.hi()]
    }
}

impl From<u16> for Opcode {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Opcode(0x{:04X} ogf=0x{:02X} ocf=0x{:03X})",
            self.0,
            self.ogf(),
            self.ocf()
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

/// Low byte of a 16-bit value.
#[inline]
pub const fn lo(value: u16) -> u8 {
    (value & 0xFF) as u8
}

/// High byte of a 16-bit value.
#[inline]
pub const fn hi(value: u16) -> u8 {
    ((value >> 8) & 0xFF) as u8
}

/// Inverse of [`lo`]/[`hi`].
#[inline]
pub const fn join(lo: u8, hi: u8) -> u16 {
    (lo as u16) | ((hi as u16) << 8)
}
