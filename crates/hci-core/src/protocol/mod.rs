//! Protocol module - HCI wire definitions.

pub mod constants;
pub mod opcode;
pub mod packet;

pub use constants::*;
pub use opcode::{Opcode, hi, join, lo};
pub use packet::{AclPacket, CommandPacket, HostPacket, PacketError};
