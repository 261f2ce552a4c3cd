//! Vendor firmware patch image (HCD) parsing.
//!
//! An HCD image is a series of HCI commands laid out back to back:
//!
//! ```text
//! [opcode lo][opcode hi][len][len bytes] [opcode lo][opcode hi][len]...
//! ```
//!
//! Records are walked lazily so that a damaged tail only surfaces once the
//! loader reaches it.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::engine::CommandError;
use crate::protocol::Opcode;

#[derive(Error, Debug)]
pub enum FirmwareError {
    #[error("Record at offset 0x{offset:X} needs {needed} bytes, {available} left")]
    TruncatedRecord {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("Begin-download command failed: {0}")]
    BeginFailed(#[source] CommandError),
    #[error("Record {index} ({opcode}) at offset 0x{offset:X} failed: {source}")]
    RecordFailed {
        index: usize,
        offset: usize,
        opcode: Opcode,
        #[source]
        source: CommandError,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One command record inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareRecord<'a> {
    /// 0-based position in the image.
    pub index: usize,
    /// Byte offset of the record header.
    pub offset: usize,
    pub opcode: Opcode,
    pub payload: &'a [u8],
}

impl FirmwareRecord<'_> {
    pub const HEADER_SIZE: usize = 3;

    /// Bytes this record occupies, header included.
    pub fn encoded_len(&self) -> usize {
        Self::HEADER_SIZE + self.payload.len()
    }
}

/// Borrowed firmware image; the bytes belong to whoever loaded the file.
#[derive(Debug, Clone, Copy)]
pub struct FirmwareImage<'a> {
    data: &'a [u8],
}

impl<'a> FirmwareImage<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn records(&self) -> Records<'a> {
        Records {
            data: self.data,
            offset: 0,
            index: 0,
            done: false,
        }
    }

    /// Walk the whole image, returning the record count.
    pub fn validate(&self) -> Result<usize, FirmwareError> {
        let mut count = 0;
        for record in self.records() {
            record?;
            count += 1;
        }
        Ok(count)
    }

    /// Record count per opcode, for display.
    pub fn summary(&self) -> Result<ImageSummary, FirmwareError> {
        let mut summary = ImageSummary {
            bytes: self.data.len(),
            ..Default::default()
        };
        for record in self.records() {
            let record = record?;
            summary.records += 1;
            summary.payload_bytes += record.payload.len();
            *summary.by_opcode.entry(record.opcode).or_default() += 1;
        }
        Ok(summary)
    }

    pub fn raw_data(&self) -> &'a [u8] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Offline statistics of an image.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImageSummary {
    pub bytes: usize,
    pub records: usize,
    pub payload_bytes: usize,
    pub by_opcode: BTreeMap<Opcode, usize>,
}

/// Iterator over image records. Stops after the first malformed record.
#[derive(Debug)]
pub struct Records<'a> {
    data: &'a [u8],
    offset: usize,
    index: usize,
    done: bool,
}

impl<'a> Records<'a> {
    /// Cursor position: offset of the next record.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<FirmwareRecord<'a>, FirmwareError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.data.len() {
            return None;
        }

        let rest = &self.data[self.offset..];
        let needed = match rest.get(2) {
            Some(&len) => FirmwareRecord::HEADER_SIZE + len as usize,
            None => FirmwareRecord::HEADER_SIZE,
        };
        if rest.len() < needed {
            self.done = true;
            return Some(Err(FirmwareError::TruncatedRecord {
                offset: self.offset,
                needed,
                available: rest.len(),
            }));
        }

        let record = FirmwareRecord {
            index: self.index,
            offset: self.offset,
            opcode: Opcode::from_le_bytes([rest[0], rest[1]]),
            payload: &rest[FirmwareRecord::HEADER_SIZE..needed],
        };
        self.offset += needed;
        self.index += 1;
        Some(Ok(record))
    }
}
