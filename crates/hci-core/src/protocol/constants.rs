//! HCI protocol constants for the UART (H4) transport.
//!
//! Values from the Bluetooth Core specification, Vol 4 Part A (UART transport)
//! and Vol 4 Part E (HCI functional specification), plus the Broadcom vendor
//! commands used to bring up BCM43xx combo chips.

// ============================================================================
// H4 Packet Indicators
// ============================================================================

/// HCI command packet (host -> controller)
pub const HCI_COMMAND_PKT: u8 = 0x01;

/// HCI ACL data packet (host -> controller, one-way in this design)
pub const HCI_ACL_PKT: u8 = 0x02;

/// HCI event packet (controller -> host)
pub const HCI_EVENT_PKT: u8 = 0x04;

// ============================================================================
// Event Codes
// ============================================================================

/// Command Complete event
pub const EVENT_COMMAND_COMPLETE: u8 = 0x0E;

/// Command Status event
pub const EVENT_COMMAND_STATUS: u8 = 0x0F;

/// Parameter length of a Command Complete / Command Status event that carries
/// no return parameters beyond the status byte.
pub const EVENT_SHORT_PARAM_LEN: u8 = 4;

// ============================================================================
// Opcode Group Fields
// ============================================================================

pub const OGF_LINK_CONTROL: u8 = 0x01;
pub const OGF_HOST_CONTROL: u8 = 0x03;
pub const OGF_INFORMATIONAL: u8 = 0x04;
pub const OGF_LE_CONTROL: u8 = 0x08;
pub const OGF_VENDOR: u8 = 0x3F;

// ============================================================================
// Opcode Command Fields
// ============================================================================

/// Host control: Reset
pub const OCF_RESET: u16 = 0x0003;

/// Informational: Read BD_ADDR
pub const OCF_READ_BD_ADDR: u16 = 0x0009;

/// LE: Set Event Mask
pub const OCF_LE_SET_EVENT_MASK: u16 = 0x0001;
/// LE: Set Advertising Parameters
pub const OCF_LE_SET_ADVERTISING_PARAMETERS: u16 = 0x0006;
/// LE: Set Advertising Data
pub const OCF_LE_SET_ADVERTISING_DATA: u16 = 0x0008;
/// LE: Set Advertising Enable
pub const OCF_LE_SET_ADVERTISING_ENABLE: u16 = 0x000A;
/// LE: Set Scan Parameters
pub const OCF_LE_SET_SCAN_PARAMETERS: u16 = 0x000B;
/// LE: Set Scan Enable
pub const OCF_LE_SET_SCAN_ENABLE: u16 = 0x000C;
/// LE: Create Connection
pub const OCF_LE_CREATE_CONNECTION: u16 = 0x000D;

/// Vendor (Broadcom): Write BD_ADDR
pub const OCF_VENDOR_SET_BDADDR: u16 = 0x0001;
/// Vendor (Broadcom): Update UART Baud Rate
pub const OCF_VENDOR_SET_BAUD: u16 = 0x0018;
/// Vendor (Broadcom): Download Minidriver, enters patch RAM mode
pub const OCF_VENDOR_LOAD_FIRMWARE: u16 = 0x002E;

// ============================================================================
// Link Layer Values
// ============================================================================

/// Passive scanning (no scan requests)
pub const LL_SCAN_PASSIVE: u8 = 0x00;
/// Active scanning
pub const LL_SCAN_ACTIVE: u8 = 0x01;

/// Connectable undirected advertising
pub const LL_ADV_IND: u8 = 0x00;
/// Connectable high duty cycle directed advertising
pub const LL_ADV_DIRECT_IND: u8 = 0x01;
/// Scannable undirected advertising
pub const LL_ADV_SCAN_IND: u8 = 0x02;
/// Non-connectable undirected advertising
pub const LL_ADV_NONCONN_IND: u8 = 0x03;

/// All three primary advertising channels (37, 38, 39)
pub const ADV_CHANNEL_MAP_ALL: u8 = 0x07;

/// Maximum advertising data length in legacy advertising
pub const ADV_DATA_MAX_LEN: usize = 31;

// ============================================================================
// L2CAP / ATT
// ============================================================================

/// L2CAP fixed channel of the Attribute Protocol
pub const L2CAP_CID_ATT: u16 = 0x0004;

/// ATT Write Request opcode
pub const ATT_WRITE_REQUEST: u8 = 0x12;

/// CCCD value enabling notifications
pub const CCCD_ENABLE_NOTIFICATIONS: u16 = 0x0001;

/// CCCD attribute handle subscribed to by the ACL helper
pub const DEFAULT_CCCD_HANDLE: u16 = 0x002B;

// ============================================================================
// Timing
// ============================================================================

/// Settle time after a firmware download, in microseconds.
pub const FIRMWARE_SETTLE_US: u64 = 0x100000;

/// Scan interval/window and advertising interval granularity (0.625 ms).
pub const SCAN_TICK_US: u64 = 625;

/// Connection interval granularity (1.25 ms).
pub const CONN_TICK_US: u64 = 1250;

/// Supervision timeout granularity (10 ms).
pub const SUPERVISION_TICK_US: u64 = 10_000;
