//! Payload handling module.
//!
//! Provides record walking for vendor firmware images.

pub mod firmware;

pub use firmware::{FirmwareError, FirmwareImage, FirmwareRecord, ImageSummary, Records};
