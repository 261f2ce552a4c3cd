//! Outbound ACL data. Packets are fire-and-forget: nothing is read back.

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::engine::Hci;
use crate::protocol::constants::{CCCD_ENABLE_NOTIFICATIONS, DEFAULT_CCCD_HANDLE};
use crate::protocol::{AclPacket, PacketError};
use crate::transport::{SerialLink, TransportError};

#[derive(Error, Debug)]
pub enum AclError {
    #[error("Packet error: {0}")]
    Packet(#[from] PacketError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl<L: SerialLink> Hci<L> {
    /// Write one ACL frame.
    pub fn send_acl(&mut self, packet: &AclPacket) -> Result<(), AclError> {
        let frame = packet.encode()?;
        debug!(
            handle = packet.handle,
            channel = packet.channel,
            len = frame.len(),
            "ACL data"
        );
        let deadline = self.response_timeout().map(|t| std::time::Instant::now() + t);
        self.link_mut().write_all(&frame, deadline)?;
        Ok(())
    }

    /// Enable notifications on the default CCCD of `connection_handle`.
    pub fn send_subscribe(&mut self, connection_handle: u16) -> Result<(), AclError> {
        self.send_subscribe_to(connection_handle, DEFAULT_CCCD_HANDLE)
    }

    /// ATT Write Request setting `cccd_handle` to "notifications on".
    #[instrument(level = "debug", skip(self))]
    pub fn send_subscribe_to(
        &mut self,
        connection_handle: u16,
        cccd_handle: u16,
    ) -> Result<(), AclError> {
        info!(
            handle = connection_handle,
            cccd = %format!("0x{:04X}", cccd_handle),
            "Subscribing to notifications"
        );
        self.send_acl(&AclPacket::att_write_request(
            connection_handle,
            cccd_handle,
            CCCD_ENABLE_NOTIFICATIONS,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{HostPacket, Opcode};
    use crate::transport::MockLink;

    #[test]
    fn test_subscribe_exact_bytes() {
        let mut hci = Hci::new(MockLink::new());
        hci.send_subscribe(0x0040).unwrap();
        assert_eq!(
            hci.link().tx_bytes(),
            &[
                0x02, 0x40, 0x00, 0x09, 0x00, 0x05, 0x00, 0x04, 0x00, 0x12, 0x2B, 0x00, 0x01,
                0x00
            ]
        );
    }

    #[test]
    fn test_subscribe_reads_nothing() {
        let mut link = MockLink::new();
        link.queue_command_complete(Opcode::RESET);
        let mut hci = Hci::new(link);

        hci.send_subscribe(0x0001).unwrap();
        assert_eq!(hci.link().rx_remaining(), 7);
        hci.reset().unwrap();
    }

    #[test]
    fn test_subscribe_to_custom_cccd() {
        let mut hci = Hci::new(MockLink::new());
        hci.send_subscribe_to(0x0A0B, 0x0100).unwrap();

        let packets = hci.link().sent_packets().unwrap();
        match &packets[..] {
            [HostPacket::Acl(acl)] => {
                assert_eq!(acl.handle, 0x0A0B);
                assert_eq!(acl.data, vec![0x12, 0x00, 0x01, 0x01, 0x00]);
            }
            other => panic!("unexpected packets: {other:?}"),
        }
    }

    #[test]
    fn test_oversized_acl_rejected_before_write() {
        let mut hci = Hci::new(MockLink::new());
        let packet = AclPacket {
            handle: 1,
            channel: 4,
            data: vec![0; u16::MAX as usize],
        };
        assert!(matches!(hci.send_acl(&packet), Err(AclError::Packet(_))));
        assert!(hci.link().tx_bytes().is_empty());
    }
}
