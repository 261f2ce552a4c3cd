//! Mock serial link for testing.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::traits::{Direction, SerialLink, TransportError};
use crate::ble::BdAddr;
use crate::protocol::constants::*;
use crate::protocol::{HostPacket, Opcode, PacketError};

/// Scripted controller: replays queued receive bytes and captures writes.
///
/// Stale bytes model data already sitting in the receive buffer: they are
/// read first, and they are the only bytes `flush_receive` discards. Scripted
/// responses stand for replies the controller has not sent yet.
#[derive(Debug, Default)]
pub struct MockLink {
    /// Leftover bytes in the receive buffer.
    stale: VecDeque<u8>,
    /// Bytes the "controller" will hand back, in order.
    rx: VecDeque<u8>,
    /// Everything the host wrote.
    tx: Vec<u8>,
    /// Delays requested through `SerialLink::delay`.
    delays: Vec<Duration>,
    /// Number of upcoming write polls that report a full transmit buffer.
    tx_busy_polls: usize,
    /// Host baud rates requested through `SerialLink::set_baud_rate`.
    baud_rates: Vec<u32>,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw bytes to be returned on subsequent reads.
    pub fn queue_rx(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    /// Place bytes in the receive buffer ahead of any scripted response.
    pub fn queue_stale(&mut self, bytes: &[u8]) {
        self.stale.extend(bytes.iter().copied());
    }

    /// Queue a successful Command Complete for `opcode`.
    pub fn queue_command_complete(&mut self, opcode: Opcode) {
        self.queue_command_complete_with_status(opcode, 0x00);
    }

    /// Queue a Command Complete for `opcode` carrying `status`.
    pub fn queue_command_complete_with_status(&mut self, opcode: Opcode, status: u8) {
        self.queue_rx(&[
            HCI_EVENT_PKT,
            EVENT_COMMAND_COMPLETE,
            EVENT_SHORT_PARAM_LEN,
            0x01,
            opcode.lo(),
            opcode.hi(),
            status,
        ]);
    }

    /// Queue a Command Status for `opcode`.
    pub fn queue_command_status(&mut self, opcode: Opcode, status: u8) {
        self.queue_rx(&[
            HCI_EVENT_PKT,
            EVENT_COMMAND_STATUS,
            EVENT_SHORT_PARAM_LEN,
            status,
            0x01,
            opcode.lo(),
            opcode.hi(),
        ]);
    }

    /// Queue the Command Complete answering Read BD_ADDR.
    pub fn queue_read_bd_addr(&mut self, addr: BdAddr) {
        let op = Opcode::READ_BD_ADDR;
        self.queue_rx(&[
            HCI_EVENT_PKT,
            EVENT_COMMAND_COMPLETE,
            0x0A,
            0x01,
            op.lo(),
            op.hi(),
            0x00,
        ]);
        self.queue_rx(&addr.to_wire());
    }

    /// Report a full transmit buffer for the next `polls` write polls.
    pub fn hold_tx(&mut self, polls: usize) {
        self.tx_busy_polls = polls;
    }

    /// Raw bytes written so far.
    pub fn tx_bytes(&self) -> &[u8] {
        &self.tx
    }

    /// Clear captured writes.
    pub fn clear_tx(&mut self) {
        self.tx.clear();
    }

    /// Decode everything written so far into packets.
    pub fn sent_packets(&self) -> Result<Vec<HostPacket>, PacketError> {
        HostPacket::parse_stream(&self.tx)
    }

    /// Decode written command packets, skipping ACL traffic.
    pub fn sent_commands(&self) -> Result<Vec<(Opcode, Vec<u8>)>, PacketError> {
        Ok(self
            .sent_packets()?
            .into_iter()
            .filter_map(|p| match p {
                HostPacket::Command { opcode, payload } => Some((opcode, payload)),
                HostPacket::Acl(_) => None,
            })
            .collect())
    }

    /// Receive bytes not yet consumed.
    pub fn rx_remaining(&self) -> usize {
        self.stale.len() + self.rx.len()
    }

    fn pop_rx(&mut self) -> Option<u8> {
        self.stale.pop_front().or_else(|| self.rx.pop_front())
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    pub fn baud_rates(&self) -> &[u32] {
        &self.baud_rates
    }
}

impl SerialLink for MockLink {
    fn is_read_ready(&mut self) -> Result<bool, TransportError> {
        Ok(self.rx_remaining() > 0)
    }

    fn read_byte(&mut self) -> Result<u8, TransportError> {
        self.pop_rx()
            .ok_or_else(|| TransportError::ReadFailed("receive queue empty".into()))
    }

    fn is_write_ready(&mut self) -> Result<bool, TransportError> {
        if self.tx_busy_polls > 0 {
            self.tx_busy_polls -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    fn write_raw(&mut self, byte: u8) -> Result<(), TransportError> {
        self.tx.push(byte);
        Ok(())
    }

    // An exhausted script would spin forever on real hardware; report it
    // as an expired deadline instead.
    fn wait_read_byte_until(&mut self, _deadline: Option<Instant>) -> Result<u8, TransportError> {
        self.pop_rx().ok_or(TransportError::Timeout(Direction::Read))
    }

    fn flush_receive(&mut self) -> Result<usize, TransportError> {
        let drained = self.stale.len();
        self.stale.clear();
        Ok(drained)
    }

    fn delay(&mut self, duration: Duration) {
        self.delays.push(duration);
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), TransportError> {
        self.baud_rates.push(baud_rate);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_rx_queue() {
        let mut mock = MockLink::new();
        mock.queue_rx(&[0xAA, 0xBB]);

        assert!(mock.is_read_ready().unwrap());
        assert_eq!(mock.wait_read_byte().unwrap(), 0xAA);
        assert_eq!(mock.read_byte().unwrap(), 0xBB);

        // Queue is empty now
        assert!(!mock.is_read_ready().unwrap());
        assert!(matches!(
            mock.wait_read_byte(),
            Err(TransportError::Timeout(Direction::Read))
        ));
    }

    #[test]
    fn test_mock_write_capture() {
        let mut mock = MockLink::new();
        mock.write_byte(0x01).unwrap();
        mock.write_all(&[0x03, 0x0C, 0x00], None).unwrap();

        assert_eq!(mock.tx_bytes(), &[0x01, 0x03, 0x0C, 0x00]);
        assert_eq!(
            mock.sent_commands().unwrap(),
            vec![(Opcode::RESET, Vec::new())]
        );
    }

    #[test]
    fn test_write_spins_while_tx_full() {
        let mut mock = MockLink::new();
        mock.hold_tx(3);
        mock.write_byte(0x42).unwrap();
        assert_eq!(mock.tx_bytes(), &[0x42]);
    }

    #[test]
    fn test_write_deadline_expires() {
        let mut mock = MockLink::new();
        mock.hold_tx(usize::MAX);
        let result = mock.write_byte_until(0x42, Some(Instant::now()));
        assert!(matches!(
            result,
            Err(TransportError::Timeout(Direction::Write))
        ));
        assert!(mock.tx_bytes().is_empty());
    }

    #[test]
    fn test_flush_receive_drains_only_stale_bytes() {
        let mut mock = MockLink::new();
        mock.queue_rx(&[9]);
        mock.queue_stale(&[1, 2, 3, 4]);
        assert_eq!(mock.flush_receive().unwrap(), 4);
        assert_eq!(mock.rx_remaining(), 1);
        assert_eq!(mock.flush_receive().unwrap(), 0);
        assert_eq!(mock.wait_read_byte().unwrap(), 9);
    }

    #[test]
    fn test_stale_bytes_read_first() {
        let mut mock = MockLink::new();
        mock.queue_rx(&[0x04]);
        mock.queue_stale(&[0xFF]);
        assert_eq!(mock.read_byte().unwrap(), 0xFF);
        assert_eq!(mock.read_byte().unwrap(), 0x04);
    }

    #[test]
    fn test_delay_is_recorded() {
        let mut mock = MockLink::new();
        mock.delay(Duration::from_millis(5));
        assert_eq!(mock.delays(), &[Duration::from_millis(5)]);
    }
}
