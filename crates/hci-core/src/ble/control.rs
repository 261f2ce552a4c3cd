//! Control-plane commands: controller configuration, scanning, advertising
//! and connection setup. Each call is exactly one engine exchange.

use std::time::Duration;

use thiserror::Error;
use tracing::info;

use super::addr::BdAddr;
use super::advertising::AdvertisingData;
use super::params::{AdvertiseParameters, ConnectionParameters, ScanParameters};
use super::units::ParamError;
use crate::engine::{CommandError, Hci};
use crate::protocol::Opcode;
use crate::transport::SerialLink;

#[derive(Error, Debug)]
pub enum BleError {
    #[error("Invalid parameter: {0}")]
    Param(#[from] ParamError),
    #[error("Command failed: {0}")]
    Command(#[from] CommandError),
}

/// Scan interval and window used by the convenience helpers.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_millis(60);
pub const DEFAULT_SCAN_WINDOW: Duration = Duration::from_millis(60);

/// Advertising interval used by `start_active_advertising`.
pub const DEFAULT_ADVERTISING_INTERVAL: Duration = Duration::from_millis(100);

impl<L: SerialLink> Hci<L> {
    /// Vendor Write BD_ADDR.
    pub fn set_bd_addr(&mut self, addr: BdAddr) -> Result<(), CommandError> {
        self.send_command(Opcode::VENDOR_SET_BDADDR, &addr.to_wire())
    }

    /// Vendor Update UART Baud Rate. Only the controller side changes.
    pub fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), CommandError> {
        let mut payload = [0u8; 6];
        payload[2..].copy_from_slice(&baud_rate.to_le_bytes());
        self.send_command(Opcode::VENDOR_SET_BAUD, &payload)
    }

    pub fn set_le_event_mask(&mut self, mask: u64) -> Result<(), CommandError> {
        self.send_command(Opcode::LE_SET_EVENT_MASK, &mask.to_le_bytes())
    }

    pub fn set_scan_parameters(&mut self, params: &ScanParameters) -> Result<(), BleError> {
        let payload = params.encode()?;
        Ok(self.send_command(Opcode::LE_SET_SCAN_PARAMETERS, &payload)?)
    }

    pub fn set_scan_enable(
        &mut self,
        enabled: bool,
        filter_duplicates: bool,
    ) -> Result<(), CommandError> {
        self.send_command(
            Opcode::LE_SET_SCAN_ENABLE,
            &[enabled as u8, filter_duplicates as u8],
        )
    }

    pub fn set_advertise_parameters(
        &mut self,
        params: &AdvertiseParameters,
    ) -> Result<(), BleError> {
        let payload = params.encode()?;
        Ok(self.send_command(Opcode::LE_SET_ADVERTISING_PARAMETERS, &payload)?)
    }

    pub fn set_advertise_data(&mut self, data: &AdvertisingData) -> Result<(), CommandError> {
        self.send_command(Opcode::LE_SET_ADVERTISING_DATA, &data.encode())
    }

    pub fn set_advertise_enable(&mut self, enabled: bool) -> Result<(), CommandError> {
        self.send_command(Opcode::LE_SET_ADVERTISING_ENABLE, &[enabled as u8])
    }

    /// LE Create Connection. The controller answers with Command Status;
    /// the connection itself completes later as an LE meta event.
    pub fn create_connection(&mut self, params: &ConnectionParameters) -> Result<(), BleError> {
        let payload = params.encode()?;
        Ok(self.send_command(Opcode::LE_CREATE_CONNECTION, &payload)?)
    }

    /// Active scan, 60 ms interval and window, duplicates reported.
    pub fn start_active_scanning(&mut self) -> Result<(), BleError> {
        info!("Starting active scan");
        self.set_scan_parameters(&ScanParameters::active(
            DEFAULT_SCAN_INTERVAL,
            DEFAULT_SCAN_WINDOW,
        ))?;
        Ok(self.set_scan_enable(true, false)?)
    }

    /// Non-connectable undirected advertising every 100 ms with `data`.
    pub fn start_advertising_with(&mut self, data: &AdvertisingData) -> Result<(), BleError> {
        info!(len = data.len(), "Starting advertising");
        self.set_advertise_parameters(&AdvertiseParameters::non_connectable(
            DEFAULT_ADVERTISING_INTERVAL,
            DEFAULT_ADVERTISING_INTERVAL,
        ))?;
        self.set_advertise_data(data)?;
        Ok(self.set_advertise_enable(true)?)
    }

    /// `start_advertising_with` the default Eddystone-URL beacon.
    pub fn start_active_advertising(&mut self) -> Result<(), BleError> {
        self.start_advertising_with(&AdvertisingData::default())
    }

    pub fn stop_scanning(&mut self) -> Result<(), CommandError> {
        self.set_scan_enable(false, false)
    }

    pub fn stop_advertising(&mut self) -> Result<(), CommandError> {
        self.set_advertise_enable(false)
    }

    /// Initiate a connection to `peer` with the default timing.
    pub fn connect(&mut self, peer: BdAddr) -> Result<(), BleError> {
        info!(peer = %peer, "Creating connection");
        self.create_connection(&ConnectionParameters::new(peer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::*;
    use crate::transport::MockLink;

    fn hci_answering(ops: &[Opcode]) -> Hci<MockLink> {
        let mut link = MockLink::new();
        for &op in ops {
            link.queue_command_complete(op);
        }
        Hci::new(link)
    }

    #[test]
    fn test_set_baud_rate_exact_bytes() {
        let mut hci = hci_answering(&[Opcode::VENDOR_SET_BAUD]);
        hci.set_baud_rate(115_200).unwrap();

        let op = Opcode::new(OGF_VENDOR, 0x18);
        assert_eq!(
            hci.link().tx_bytes(),
            &[0x01, op.lo(), op.hi(), 0x06, 0x00, 0x00, 0x00, 0xC2, 0x01, 0x00]
        );
    }

    #[test]
    fn test_set_bd_addr_sends_wire_order() {
        let mut hci = hci_answering(&[Opcode::VENDOR_SET_BDADDR]);
        hci.set_bd_addr("C0:FF:EE:C0:FF:EE".parse().unwrap())
            .unwrap();
        let sent = hci.link().sent_commands().unwrap();
        assert_eq!(
            sent,
            vec![(
                Opcode::VENDOR_SET_BDADDR,
                vec![0xEE, 0xFF, 0xC0, 0xEE, 0xFF, 0xC0]
            )]
        );
    }

    #[test]
    fn test_le_event_mask() {
        let mut hci = hci_answering(&[Opcode::LE_SET_EVENT_MASK]);
        hci.set_le_event_mask(0xFF).unwrap();
        let sent = hci.link().sent_commands().unwrap();
        assert_eq!(sent[0].1, vec![0xFF, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_start_active_scanning() {
        let mut hci = hci_answering(&[Opcode::LE_SET_SCAN_PARAMETERS, Opcode::LE_SET_SCAN_ENABLE]);
        hci.start_active_scanning().unwrap();

        let sent = hci.link().sent_commands().unwrap();
        assert_eq!(
            sent,
            vec![
                (
                    Opcode::LE_SET_SCAN_PARAMETERS,
                    vec![0x01, 0x60, 0x00, 0x60, 0x00, 0x00, 0x00]
                ),
                (Opcode::LE_SET_SCAN_ENABLE, vec![0x01, 0x00]),
            ]
        );
    }

    #[test]
    fn test_start_active_advertising() {
        let mut hci = hci_answering(&[
            Opcode::LE_SET_ADVERTISING_PARAMETERS,
            Opcode::LE_SET_ADVERTISING_DATA,
            Opcode::LE_SET_ADVERTISING_ENABLE,
        ]);
        hci.start_active_advertising().unwrap();

        let sent = hci.link().sent_commands().unwrap();
        assert_eq!(sent.len(), 3);
        assert_eq!(&sent[0].1[..6], &[0xA0, 0x00, 0xA0, 0x00, 0x03, 0x00]);
        assert_eq!(sent[0].1.len(), 15);
        assert_eq!(sent[1].1.len(), 32);
        assert_eq!(sent[1].1[0], 0x19);
        assert_eq!(sent[2], (Opcode::LE_SET_ADVERTISING_ENABLE, vec![0x01]));
    }

    #[test]
    fn test_stop_helpers() {
        let mut hci = hci_answering(&[Opcode::LE_SET_SCAN_ENABLE, Opcode::LE_SET_ADVERTISING_ENABLE]);
        hci.stop_scanning().unwrap();
        hci.stop_advertising().unwrap();
        let sent = hci.link().sent_commands().unwrap();
        assert_eq!(sent[0], (Opcode::LE_SET_SCAN_ENABLE, vec![0x00, 0x00]));
        assert_eq!(sent[1], (Opcode::LE_SET_ADVERTISING_ENABLE, vec![0x00]));
    }

    #[test]
    fn test_connect_reverses_peer_address() {
        let mut link = MockLink::new();
        link.queue_command_status(Opcode::LE_CREATE_CONNECTION, 0x00);
        let mut hci = Hci::new(link);

        hci.connect(BdAddr::new([0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5]))
            .unwrap();

        let sent = hci.link().sent_commands().unwrap();
        let payload = &sent[0].1;
        assert_eq!(payload.len(), 25);
        assert_eq!(&payload[6..12], &[0xA5, 0xA4, 0xA3, 0xA2, 0xA1, 0xA0]);
        assert_eq!(&payload[13..17], &[0x18, 0x00, 0x28, 0x00]);
    }

    #[test]
    fn test_invalid_parameters_send_nothing() {
        let mut hci = hci_answering(&[]);
        let params = ScanParameters::active(Duration::from_secs(120), DEFAULT_SCAN_WINDOW);
        let err = hci.set_scan_parameters(&params).unwrap_err();
        assert!(matches!(err, BleError::Param(_)));
        assert!(hci.link().tx_bytes().is_empty());
    }
}
