//! LE command parameter blocks and their wire layouts.

use std::time::Duration;

use super::addr::BdAddr;
use super::units::{ParamError, TickUnit, to_ticks};
use crate::protocol::constants::*;

/// Address type of the local device or a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressType {
    #[default]
    Public,
    Random,
}

impl AddressType {
    pub const fn as_u8(self) -> u8 {
        match self {
            AddressType::Public => 0x00,
            AddressType::Random => 0x01,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanType {
    Passive,
    Active,
}

impl ScanType {
    pub const fn as_u8(self) -> u8 {
        match self {
            ScanType::Passive => LL_SCAN_PASSIVE,
            ScanType::Active => LL_SCAN_ACTIVE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertisingType {
    ConnectableUndirected,
    ConnectableDirected,
    ScannableUndirected,
    NonConnectableUndirected,
}

impl AdvertisingType {
    pub const fn as_u8(self) -> u8 {
        match self {
            AdvertisingType::ConnectableUndirected => LL_ADV_IND,
            AdvertisingType::ConnectableDirected => LL_ADV_DIRECT_IND,
            AdvertisingType::ScannableUndirected => LL_ADV_SCAN_IND,
            AdvertisingType::NonConnectableUndirected => LL_ADV_NONCONN_IND,
        }
    }
}

/// LE Set Scan Parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanParameters {
    pub scan_type: ScanType,
    pub interval: Duration,
    pub window: Duration,
    pub own_address_type: AddressType,
    pub filter_policy: u8,
}

impl ScanParameters {
    /// Active scan with a public address and no filter policy.
    pub fn active(interval: Duration, window: Duration) -> Self {
        Self {
            scan_type: ScanType::Active,
            interval,
            window,
            own_address_type: AddressType::Public,
            filter_policy: 0,
        }
    }

    /// `[type][interval][window][own addr type][filter policy]`
    pub fn encode(&self) -> Result<[u8; 7], ParamError> {
        let interval = to_ticks("scan interval", self.interval, TickUnit::Scan)?.to_le_bytes();
        let window = to_ticks("scan window", self.window, TickUnit::Scan)?.to_le_bytes();
        Ok([
            self.scan_type.as_u8(),
            interval[0],
            interval[1],
            window[0],
            window[1],
            self.own_address_type.as_u8(),
            self.filter_policy,
        ])
    }
}

/// LE Set Advertising Parameters (undirected: peer address fields zeroed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertiseParameters {
    pub advertising_type: AdvertisingType,
    pub min_interval: Duration,
    pub max_interval: Duration,
    pub own_address_type: AddressType,
    pub filter_policy: u8,
}

impl AdvertiseParameters {
    pub fn non_connectable(min_interval: Duration, max_interval: Duration) -> Self {
        Self {
            advertising_type: AdvertisingType::NonConnectableUndirected,
            min_interval,
            max_interval,
            own_address_type: AddressType::Public,
            filter_policy: 0,
        }
    }

    /// `[min][max][type][own addr type][peer addr type][peer addr x6][channel map][filter]`
    pub fn encode(&self) -> Result<[u8; 15], ParamError> {
        let min = to_ticks("advertising min interval", self.min_interval, TickUnit::Scan)?;
        let max = to_ticks("advertising max interval", self.max_interval, TickUnit::Scan)?;

        let mut out = [0u8; 15];
        out[0..2].copy_from_slice(&min.to_le_bytes());
        out[2..4].copy_from_slice(&max.to_le_bytes());
        out[4] = self.advertising_type.as_u8();
        out[5] = self.own_address_type.as_u8();
        // 6: peer address type, 7..13: peer address, unused when undirected
        out[13] = ADV_CHANNEL_MAP_ALL;
        out[14] = self.filter_policy;
        Ok(out)
    }
}

/// LE Create Connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParameters {
    pub peer_address: BdAddr,
    pub peer_address_type: AddressType,
    pub scan_interval: Duration,
    pub scan_window: Duration,
    pub own_address_type: AddressType,
    pub filter_policy: u8,
    pub interval_min: Duration,
    pub interval_max: Duration,
    pub max_latency: u16,
    pub supervision_timeout: Duration,
}

impl ConnectionParameters {
    /// Scan 60/60 ms, connection interval 30..50 ms, 420 ms supervision timeout.
    pub fn new(peer_address: BdAddr) -> Self {
        Self {
            peer_address,
            peer_address_type: AddressType::Public,
            scan_interval: Duration::from_millis(60),
            scan_window: Duration::from_millis(60),
            own_address_type: AddressType::Public,
            filter_policy: 0,
            interval_min: Duration::from_millis(30),
            interval_max: Duration::from_millis(50),
            max_latency: 0,
            supervision_timeout: Duration::from_millis(420),
        }
    }

    pub fn encode(&self) -> Result<[u8; 25], ParamError> {
        let scan_interval = to_ticks("scan interval", self.scan_interval, TickUnit::Scan)?;
        let scan_window = to_ticks("scan window", self.scan_window, TickUnit::Scan)?;
        let min = to_ticks(
            "connection min interval",
            self.interval_min,
            TickUnit::Connection,
        )?;
        let max = to_ticks(
            "connection max interval",
            self.interval_max,
            TickUnit::Connection,
        )?;
        let timeout = to_ticks(
            "supervision timeout",
            self.supervision_timeout,
            TickUnit::Supervision,
        )?;

        let mut out = [0u8; 25];
        out[0..2].copy_from_slice(&scan_interval.to_le_bytes());
        out[2..4].copy_from_slice(&scan_window.to_le_bytes());
        out[4] = self.filter_policy;
        out[5] = self.peer_address_type.as_u8();
        out[6..12].copy_from_slice(&self.peer_address.to_wire());
        out[12] = self.own_address_type.as_u8();
        out[13..15].copy_from_slice(&min.to_le_bytes());
        out[15..17].copy_from_slice(&max.to_le_bytes());
        out[17..19].copy_from_slice(&self.max_latency.to_le_bytes());
        out[19..21].copy_from_slice(&timeout.to_le_bytes());
        // 21..25: min/max connection event length, left at zero
        Ok(out)
    }
}
