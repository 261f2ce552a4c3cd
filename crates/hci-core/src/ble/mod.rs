//! BLE control-plane encoding.
//!
//! Parameter blocks convert millisecond timings into controller ticks and lay
//! fields out little-endian; `control` issues them through the engine.

pub mod addr;
pub mod advertising;
pub mod control;
pub mod params;
pub mod units;

pub use addr::{AddrParseError, BdAddr};
pub use advertising::{AdvertisingData, AdvertisingError};
pub use control::BleError;
pub use params::{
    AddressType, AdvertiseParameters, AdvertisingType, ConnectionParameters, ScanParameters,
    ScanType,
};
pub use units::{ParamError, TickUnit, ms_to_ticks, to_ticks};
