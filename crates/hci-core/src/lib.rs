//! HCI-Core: Bluetooth HCI host engine over a raw UART link.
//!
//! This crate brings up a BLE controller attached through an H4 serial
//! link: it frames commands, validates the single event answering each one,
//! downloads vendor firmware and encodes the LE control plane.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: Packet indicators, event codes, opcode tables, frame codec
//! - **Transport**: Polling byte link abstraction (serialport, mock)
//! - **Engine**: Synchronous command/event exchange with response validation
//! - **Payload / Loader**: Vendor firmware image records and their download
//! - **BLE**: Scan, advertise and connect parameter encoding
//! - **ACL**: Outbound ACL data (ATT notification subscribe)
//! - **Events**: Observer pattern for UI decoupling
//! - **Session**: Configurable bring-up orchestrator
//!
//! # Example
//!
//! ```no_run
//! use hci_core::session::{BringUpConfig, BringUpSession, Role};
//! use hci_core::transport::SerialPortLink;
//!
//! let config = BringUpConfig {
//!     firmware_path: Some("BCM4345C0.hcd".to_string()),
//!     role: Role::Scan,
//!     ..Default::default()
//! };
//!
//! let link = SerialPortLink::open("/dev/ttyAMA0", 115_200).expect("open failed");
//! let report = BringUpSession::new(config).run(link).expect("bring-up failed");
//! println!("{report}");
//! ```

pub mod acl;
pub mod ble;
pub mod engine;
pub mod events;
pub mod loader;
pub mod payload;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use acl::AclError;
pub use ble::{AdvertisingData, BdAddr, BleError};
pub use engine::{CommandError, Hci};
pub use events::{BringUpEvent, BringUpObserver, BringUpPhase, LogLevel, TracingObserver};
pub use loader::{DEFAULT_SETTLE, LoadReport, load_firmware, load_firmware_with};
pub use payload::{FirmwareError, FirmwareImage};
pub use protocol::Opcode;
pub use session::{BringUpConfig, BringUpReport, BringUpSession, Role};
pub use transport::{MockLink, SerialLink, SerialPortLink, TransportError};
