//! Vendor firmware download.
//!
//! The controller is put into download mode with the vendor "begin load"
//! command, then every record of the image is replayed as an ordinary HCI
//! command. The first failure aborts the download. Whatever the outcome, the
//! controller is given time to settle before anything else is sent.

use std::time::Duration;

use tracing::{debug, error, info, instrument};

use crate::engine::Hci;
use crate::payload::{FirmwareError, FirmwareImage};
use crate::protocol::Opcode;
use crate::protocol::constants::FIRMWARE_SETTLE_US;
use crate::transport::SerialLink;

/// Pause after a download, successful or not.
pub const DEFAULT_SETTLE: Duration = Duration::from_micros(FIRMWARE_SETTLE_US);

/// What a completed download sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Records acknowledged by the controller.
    pub records: usize,
    /// Image bytes consumed, record headers included.
    pub bytes: usize,
}

/// Download `image` and wait `settle` afterwards.
///
/// A rejected begin command ends the download with
/// [`FirmwareError::BeginFailed`] before any record is sent; the records are
/// not walked regardless of that failure.
pub fn load_firmware<L: SerialLink>(
    hci: &mut Hci<L>,
    image: &FirmwareImage<'_>,
    settle: Duration,
) -> Result<LoadReport, FirmwareError> {
    load_firmware_with(hci, image, settle, |_, _| {})
}

/// [`load_firmware`], calling `on_record(done, total)` after each record the
/// controller acknowledges. `total` counts the records before any truncation.
#[instrument(skip(hci, image, on_record), fields(image_len = image.len()))]
pub fn load_firmware_with<L: SerialLink>(
    hci: &mut Hci<L>,
    image: &FirmwareImage<'_>,
    settle: Duration,
    mut on_record: impl FnMut(usize, usize),
) -> Result<LoadReport, FirmwareError> {
    let result = download(hci, image, &mut on_record);

    match &result {
        Ok(report) => info!(
            records = report.records,
            bytes = report.bytes,
            "Firmware download complete"
        ),
        Err(e) => error!("Firmware download aborted: {}", e),
    }

    debug!(settle_us = settle.as_micros() as u64, "Waiting for controller");
    hci.link_mut().delay(settle);

    result
}

fn download<L: SerialLink>(
    hci: &mut Hci<L>,
    image: &FirmwareImage<'_>,
    on_record: &mut impl FnMut(usize, usize),
) -> Result<LoadReport, FirmwareError> {
    hci.send_command(Opcode::VENDOR_LOAD_FIRMWARE, &[])
        .map_err(|e| {
            error!(check = ?e.check_number(), "Begin-download rejected");
            FirmwareError::BeginFailed(e)
        })?;

    let total = image.records().take_while(Result::is_ok).count();
    let mut report = LoadReport::default();
    for record in image.records() {
        let record = record?;
        hci.send_command(record.opcode, record.payload)
            .map_err(|source| {
                error!(
                    index = record.index,
                    offset = record.offset,
                    opcode = %record.opcode,
                    check = ?source.check_number(),
                    "Firmware record rejected"
                );
                FirmwareError::RecordFailed {
                    index: record.index,
                    offset: record.offset,
                    opcode: record.opcode,
                    source,
                }
            })?;
        report.records += 1;
        report.bytes += record.encoded_len();
        on_record(report.records, total);
    }
    Ok(report)
}
