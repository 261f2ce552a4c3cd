//! Host-to-controller packet framing (H4 command and ACL packets).

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use thiserror::Error;

use super::constants::*;
use super::opcode::Opcode;

#[derive(Error, Debug)]
pub enum PacketError {
    #[error("Command payload too long: {len} bytes, maximum 255")]
    PayloadTooLong { len: usize },
    #[error("ACL payload too long: {len} bytes")]
    AclTooLong { len: usize },
    #[error("Unknown packet indicator 0x{0:02X}")]
    UnknownIndicator(u8),
    #[error("Length mismatch: header says {header}, L2CAP says {l2cap}")]
    LengthMismatch { header: usize, l2cap: usize },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One outbound HCI command: opcode plus 0..=255 payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPacket<'a> {
    pub opcode: Opcode,
    pub payload: &'a [u8],
}

impl<'a> CommandPacket<'a> {
    /// Header size: indicator, opcode (2), parameter length.
    pub const HEADER_SIZE: usize = 4;

    pub fn new(opcode: Opcode, payload: &'a [u8]) -> Result<Self, PacketError> {
        if payload.len() > u8::MAX as usize {
            return Err(PacketError::PayloadTooLong { len: payload.len() });
        }
        Ok(Self { opcode, payload })
    }

    /// `[0x01][opcode lo][opcode hi][len][payload...]`
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::HEADER_SIZE + self.payload.len());
        buf.push(HCI_COMMAND_PKT);
        buf.extend_from_slice(&self.opcode.to_le_bytes());
        buf.push(self.payload.len() as u8);
        buf.extend_from_slice(self.payload);
        buf
    }
}

/// ACL data packet carrying a single L2CAP basic frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclPacket {
    /// Connection handle including the packet boundary / broadcast flags.
    pub handle: u16,
    /// L2CAP channel id.
    pub channel: u16,
    /// L2CAP information payload.
    pub data: Vec<u8>,
}

impl AclPacket {
    /// L2CAP basic header: length (2) + channel id (2).
    pub const L2CAP_HEADER_SIZE: usize = 4;

    /// ATT Write Request to `attribute` carrying a 16-bit `value`.
    pub fn att_write_request(handle: u16, attribute: u16, value: u16) -> Self {
        let mut data = Vec::with_capacity(5);
        data.push(ATT_WRITE_REQUEST);
        data.extend_from_slice(&attribute.to_le_bytes());
        data.extend_from_slice(&value.to_le_bytes());
        Self {
            handle,
            channel: L2CAP_CID_ATT,
            data,
        }
    }

    /// `[0x02][handle][total len][l2cap len][cid][data...]`, all fields LE.
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let total = self.data.len() + Self::L2CAP_HEADER_SIZE;
        if total > u16::MAX as usize {
            return Err(PacketError::AclTooLong {
                len: self.data.len(),
            });
        }
        let mut buf = Vec::with_capacity(5 + total);
        buf.push(HCI_ACL_PKT);
        buf.extend_from_slice(&self.handle.to_le_bytes());
        buf.extend_from_slice(&(total as u16).to_le_bytes());
        buf.extend_from_slice(&(self.data.len() as u16).to_le_bytes());
        buf.extend_from_slice(&self.channel.to_le_bytes());
        buf.extend_from_slice(&self.data);
        Ok(buf)
    }
}

/// A decoded host-to-controller packet, as seen by a peer on the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostPacket {
    Command { opcode: Opcode, payload: Vec<u8> },
    Acl(AclPacket),
}

impl HostPacket {
    /// Decode one packet from the front of `data`, returning it and the
    /// number of bytes consumed.
    pub fn decode(data: &[u8]) -> Result<(Self, usize), PacketError> {
        let mut cursor = Cursor::new(data);
        let packet = match cursor.read_u8()? {
            HCI_COMMAND_PKT => {
                let opcode = Opcode::from_raw(cursor.read_u16::<LittleEndian>()?);
                let len = cursor.read_u8()? as usize;
                let mut payload = vec![0u8; len];
                cursor.read_exact(&mut payload)?;
                HostPacket::Command { opcode, payload }
            }
            HCI_ACL_PKT => {
                let handle = cursor.read_u16::<LittleEndian>()?;
                let total = cursor.read_u16::<LittleEndian>()? as usize;
                let l2cap = cursor.read_u16::<LittleEndian>()? as usize;
                let channel = cursor.read_u16::<LittleEndian>()?;
                if total != l2cap + AclPacket::L2CAP_HEADER_SIZE {
                    return Err(PacketError::LengthMismatch {
                        header: total,
                        l2cap,
                    });
                }
                let mut data = vec![0u8; l2cap];
                cursor.read_exact(&mut data)?;
                HostPacket::Acl(AclPacket {
                    handle,
                    channel,
                    data,
                })
            }
            other => return Err(PacketError::UnknownIndicator(other)),
        };
        Ok((packet, cursor.position() as usize))
    }

    /// Decode back-to-back packets until `data` is exhausted.
    pub fn parse_stream(mut data: &[u8]) -> Result<Vec<Self>, PacketError> {
        let mut packets = Vec::new();
        while !data.is_empty() {
            let (packet, used) = Self::decode(data)?;
            packets.push(packet);
            data = &data[used..];
        }
        Ok(packets)
    }
}
