//! Millisecond-to-controller-tick conversion.
//!
//! Integer arithmetic on microseconds; fractional ticks are truncated toward
//! zero, matching what the controller expects from existing hosts.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::constants::{CONN_TICK_US, SCAN_TICK_US, SUPERVISION_TICK_US};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParamError {
    #[error("{field} of {value:?} is {ticks} ticks, maximum 0xFFFF")]
    IntervalOutOfRange {
        field: &'static str,
        value: Duration,
        ticks: u128,
    },
}

/// Tick size of a timing field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickUnit {
    /// 0.625 ms: scan interval/window, advertising interval.
    Scan,
    /// 1.25 ms: connection interval.
    Connection,
    /// 10 ms: supervision timeout.
    Supervision,
}

impl TickUnit {
    pub const fn micros(self) -> u64 {
        match self {
            TickUnit::Scan => SCAN_TICK_US,
            TickUnit::Connection => CONN_TICK_US,
            TickUnit::Supervision => SUPERVISION_TICK_US,
        }
    }
}

/// `floor(duration / unit)`, rejecting counts that do not fit in 16 bits.
pub fn to_ticks(field: &'static str, value: Duration, unit: TickUnit) -> Result<u16, ParamError> {
    let ticks = value.as_micros() / unit.micros() as u128;
    u16::try_from(ticks).map_err(|_| ParamError::IntervalOutOfRange {
        field,
        value,
        ticks,
    })
}

/// Convenience for whole milliseconds.
pub fn ms_to_ticks(field: &'static str, ms: u64, unit: TickUnit) -> Result<u16, ParamError> {
    to_ticks(field, Duration::from_millis(ms), unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_ticks() {
        let ticks = ms_to_ticks("interval", 60, TickUnit::Scan).unwrap();
        assert_eq!(ticks, 96);
        assert_eq!(ticks.to_le_bytes(), [0x60, 0x00]);
        assert_eq!(ms_to_ticks("interval", 100, TickUnit::Scan).unwrap(), 160);
    }

    #[test]
    fn test_connection_ticks() {
        assert_eq!(ms_to_ticks("min", 30, TickUnit::Connection).unwrap(), 24);
        assert_eq!(ms_to_ticks("max", 50, TickUnit::Connection).unwrap(), 40);
    }

    #[test]
    fn test_truncates_toward_zero() {
        // 1 ms = 1.6 ticks, 2 ms = 3.2 ticks
        assert_eq!(ms_to_ticks("x", 1, TickUnit::Scan).unwrap(), 1);
        assert_eq!(ms_to_ticks("x", 2, TickUnit::Scan).unwrap(), 3);
        assert_eq!(
            to_ticks("x", Duration::from_micros(1249), TickUnit::Connection).unwrap(),
            0
        );
    }

    #[test]
    fn test_out_of_range() {
        // 0xFFFF * 0.625 ms = 40959.375 ms
        assert_eq!(ms_to_ticks("x", 40_959, TickUnit::Scan).unwrap(), 0xFFFE);
        assert_eq!(
            to_ticks("x", Duration::from_micros(40_959_375), TickUnit::Scan).unwrap(),
            0xFFFF
        );
        assert!(ms_to_ticks("x", 40_960, TickUnit::Scan).is_err());
        let err = ms_to_ticks("window", 41_000, TickUnit::Scan).unwrap_err();
        assert!(matches!(
            err,
            ParamError::IntervalOutOfRange {
                field: "window",
                ticks: 65_600,
                ..
            }
        ));
    }
}
