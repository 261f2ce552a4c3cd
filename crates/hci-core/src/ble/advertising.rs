//! Legacy advertising data (AD structures) and the Eddystone-URL beacon.

use thiserror::Error;

use crate::protocol::constants::ADV_DATA_MAX_LEN;

pub const AD_TYPE_FLAGS: u8 = 0x01;
pub const AD_TYPE_COMPLETE_UUID16: u8 = 0x03;
pub const AD_TYPE_SERVICE_DATA_UUID16: u8 = 0x16;

/// LE General Discoverable, BR/EDR not supported.
pub const FLAGS_GENERAL_DISCOVERABLE: u8 = 0x06;

pub const EDDYSTONE_UUID: u16 = 0xFEAA;
pub const EDDYSTONE_FRAME_URL: u8 = 0x10;

/// Checked longest-first so `https://www.` wins over `https://`.
const URL_SCHEMES: [(&str, u8); 4] = [
    ("https://www.", 0x01),
    ("http://www.", 0x00),
    ("https://", 0x03),
    ("http://", 0x02),
];

/// Eddystone-URL beacon for `https://isometim.es`, calibrated tx power 0 dBm.
const DEFAULT_DATA: [u8; 25] = [
    0x02, 0x01, 0x06, // flags
    0x03, 0x03, 0xAA, 0xFE, // complete 16-bit UUIDs: Eddystone
    0x11, 0x16, 0xAA, 0xFE, 0x10, 0x00, 0x03, // service data: URL frame, https://
    b'i', b's', b'o', b'm', b'e', b't', b'i', b'm', b'.', b'e', b's',
];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AdvertisingError {
    #[error("Advertising data would be {len} bytes, maximum {ADV_DATA_MAX_LEN}")]
    TooLong { len: usize },
    #[error("URL '{0}' has no Eddystone scheme prefix")]
    UnsupportedScheme(String),
}

/// Sequence of AD structures, at most 31 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingData {
    bytes: Vec<u8>,
}

impl Default for AdvertisingData {
    fn default() -> Self {
        Self {
            bytes: DEFAULT_DATA.to_vec(),
        }
    }
}

impl AdvertisingData {
    /// Empty advertising data.
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Append one `[len][type][data]` structure.
    pub fn with_structure(mut self, ad_type: u8, data: &[u8]) -> Result<Self, AdvertisingError> {
        let len = self.bytes.len() + 2 + data.len();
        if len > ADV_DATA_MAX_LEN {
            return Err(AdvertisingError::TooLong { len });
        }
        self.bytes.push((data.len() + 1) as u8);
        self.bytes.push(ad_type);
        self.bytes.extend_from_slice(data);
        Ok(self)
    }

    pub fn with_flags(self, flags: u8) -> Result<Self, AdvertisingError> {
        self.with_structure(AD_TYPE_FLAGS, &[flags])
    }

    pub fn with_service_uuids16(self, uuids: &[u16]) -> Result<Self, AdvertisingError> {
        let data: Vec<u8> = uuids.iter().flat_map(|u| u.to_le_bytes()).collect();
        self.with_structure(AD_TYPE_COMPLETE_UUID16, &data)
    }

    pub fn with_service_data16(self, uuid: u16, data: &[u8]) -> Result<Self, AdvertisingError> {
        let mut body = uuid.to_le_bytes().to_vec();
        body.extend_from_slice(data);
        self.with_structure(AD_TYPE_SERVICE_DATA_UUID16, &body)
    }

    /// Discoverable Eddystone-URL beacon advertising `url`.
    pub fn eddystone_url(url: &str, tx_power: i8) -> Result<Self, AdvertisingError> {
        let (rest, scheme) = URL_SCHEMES
            .iter()
            .find_map(|(prefix, code)| url.strip_prefix(prefix).map(|rest| (rest, *code)))
            .ok_or_else(|| AdvertisingError::UnsupportedScheme(url.to_string()))?;

        let mut frame = vec![EDDYSTONE_FRAME_URL, tx_power as u8, scheme];
        frame.extend_from_slice(rest.as_bytes());

        Self::new()
            .with_flags(FLAGS_GENERAL_DISCOVERABLE)?
            .with_service_uuids16(&[EDDYSTONE_UUID])?
            .with_service_data16(EDDYSTONE_UUID, &frame)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// LE Set Advertising Data parameter block: significant length, then
    /// the data zero-padded to 31 bytes.
    pub fn encode(&self) -> [u8; 1 + ADV_DATA_MAX_LEN] {
        let mut out = [0u8; 1 + ADV_DATA_MAX_LEN];
        out[0] = self.bytes.len() as u8;
        out[1..=self.bytes.len()].copy_from_slice(&self.bytes);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_block() {
        let block = AdvertisingData::default().encode();
        assert_eq!(block.len(), 32);
        assert_eq!(block[0], 0x19);
        assert_eq!(
            &block[1..26],
            &[
                0x02, 0x01, 0x06, 0x03, 0x03, 0xAA, 0xFE, 0x11, 0x16, 0xAA, 0xFE, 0x10, 0x00,
                0x03, 0x69, 0x73, 0x6F, 0x6D, 0x65, 0x74, 0x69, 0x6D, 0x2E, 0x65, 0x73
            ]
        );
        assert!(block[26..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_eddystone_builder_matches_default() {
        let built = AdvertisingData::eddystone_url("https://isometim.es", 0).unwrap();
        assert_eq!(built, AdvertisingData::default());
    }

    #[test]
    fn test_scheme_prefixes() {
        let data = AdvertisingData::eddystone_url("https://www.a.io", -20).unwrap();
        let bytes = data.as_bytes();
        // flags(3) + uuids(4) + [len][0x16][AA FE][0x10][tx][scheme]
        assert_eq!(bytes[12], 0xEC);
        assert_eq!(bytes[13], 0x01);
        assert_eq!(&bytes[14..], b"a.io");

        assert!(matches!(
            AdvertisingData::eddystone_url("ftp://x", 0),
            Err(AdvertisingError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_too_long_rejected() {
        let err = AdvertisingData::eddystone_url("https://a-very-long-host-name.example", 0)
            .unwrap_err();
        assert!(matches!(err, AdvertisingError::TooLong { .. }));
    }
}
