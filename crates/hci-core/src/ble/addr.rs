//! Bluetooth device address.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AddrParseError {
    #[error("Expected 6 colon-separated octets, got {0}")]
    WrongLength(usize),
    #[error("Invalid octet '{0}'")]
    InvalidOctet(String),
}

/// 6-byte device address in display order (`C0:FF:EE:C0:FF:EE`).
///
/// HCI parameter fields carry the address least significant byte first, so
/// [`BdAddr::to_wire`] and [`BdAddr::from_wire`] reverse the bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BdAddr(pub [u8; 6]);

impl BdAddr {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 6] {
        self.0
    }

    /// Over-the-wire byte order.
    pub fn to_wire(&self) -> [u8; 6] {
        let mut wire = self.0;
        wire.reverse();
        wire
    }

    pub fn from_wire(mut wire: [u8; 6]) -> Self {
        wire.reverse();
        Self(wire)
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl fmt::Debug for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BdAddr({})", self)
    }
}

impl FromStr for BdAddr {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != 6 {
            return Err(AddrParseError::WrongLength(parts.len()));
        }
        let mut bytes = [0u8; 6];
        for (b, part) in bytes.iter_mut().zip(parts) {
            if part.len() != 2 || !part.bytes().all(|c| c.is_ascii_hexdigit()) {
                return Err(AddrParseError::InvalidOctet(part.to_string()));
            }
            *b = u8::from_str_radix(part, 16)
                .map_err(|_| AddrParseError::InvalidOctet(part.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for BdAddr {
    type Error = AddrParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<BdAddr> for String {
    fn from(addr: BdAddr) -> Self {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let addr: BdAddr = "c0:ff:ee:C0:FF:EE".parse().unwrap();
        assert_eq!(addr.bytes(), [0xC0, 0xFF, 0xEE, 0xC0, 0xFF, 0xEE]);
        assert_eq!(addr.to_string(), "C0:FF:EE:C0:FF:EE");
    }

    #[test]
    fn test_wire_order_is_reversed() {
        let addr = BdAddr::new([0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5]);
        assert_eq!(addr.to_wire(), [0xA5, 0xA4, 0xA3, 0xA2, 0xA1, 0xA0]);
        assert_eq!(BdAddr::from_wire(addr.to_wire()), addr);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "00:11:22".parse::<BdAddr>(),
            Err(AddrParseError::WrongLength(3))
        );
        assert!(matches!(
            "00:11:22:33:44:GG".parse::<BdAddr>(),
            Err(AddrParseError::InvalidOctet(_))
        ));
        assert!(matches!(
            "00:11:22:33:44:555".parse::<BdAddr>(),
            Err(AddrParseError::InvalidOctet(_))
        ));
    }

    #[test]
    fn test_signed_octet_rejected() {
        assert_eq!(
            "00:11:22:33:44:+F".parse::<BdAddr>(),
            Err(AddrParseError::InvalidOctet("+F".to_string()))
        );
        assert!("00:11:22:33:44:-1".parse::<BdAddr>().is_err());
    }
}
