//! Event system for UI decoupling.
//!
//! Front ends subscribe to bring-up progress through [`BringUpObserver`]
//! instead of reaching into the session.

use std::fmt;

/// Log level for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
}

/// Bring-up sequence phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BringUpPhase {
    /// Nothing sent yet.
    Idle,
    /// Discarding stale receive data.
    Flush,
    /// Host-control Reset.
    Reset,
    /// Vendor firmware download.
    FirmwareDownload,
    /// Reset after the new firmware is running.
    PostFirmwareReset,
    /// Controller UART speed.
    BaudRate,
    /// Writing the device address.
    DeviceAddress,
    /// Reading the device address back.
    ReadAddress,
    /// LE event mask.
    EventMask,
    /// Scan, advertise or connect.
    Role,
    /// Sequence finished.
    Complete,
}

impl fmt::Display for BringUpPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BringUpPhase::Idle => write!(f, "Idle"),
            BringUpPhase::Flush => write!(f, "Flush"),
            BringUpPhase::Reset => write!(f, "Reset"),
            BringUpPhase::FirmwareDownload => write!(f, "Firmware Download"),
            BringUpPhase::PostFirmwareReset => write!(f, "Post-Firmware Reset"),
            BringUpPhase::BaudRate => write!(f, "Baud Rate"),
            BringUpPhase::DeviceAddress => write!(f, "Device Address"),
            BringUpPhase::ReadAddress => write!(f, "Read Address"),
            BringUpPhase::EventMask => write!(f, "Event Mask"),
            BringUpPhase::Role => write!(f, "Role"),
            BringUpPhase::Complete => write!(f, "Complete"),
        }
    }
}

/// Events emitted by the bring-up session.
#[derive(Debug, Clone)]
pub enum BringUpEvent {
    /// Phase changed.
    PhaseChanged { from: BringUpPhase, to: BringUpPhase },
    /// Firmware download progress, in records.
    Progress {
        phase: BringUpPhase,
        operation: String,
        current: u64,
        total: u64,
    },
    /// A step failed; the sequence carries on.
    StepFailed {
        phase: BringUpPhase,
        check: Option<u8>,
        message: String,
    },
    /// Controller reported its address.
    AddressRead { addr: String },
    /// Log message.
    Log { level: LogLevel, message: String },
    /// Sequence finished, `failures` steps failed along the way.
    Complete { failures: usize },
}

/// Observer trait for receiving bring-up events.
///
/// Implement this trait in your UI layer to receive updates.
pub trait BringUpObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &BringUpEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl BringUpObserver for NullObserver {
    fn on_event(&self, _event: &BringUpEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl BringUpObserver for TracingObserver {
    fn on_event(&self, event: &BringUpEvent) {
        match event {
            BringUpEvent::PhaseChanged { from, to } => {
                tracing::info!(from = %from, to = %to, "Phase changed");
            }
            BringUpEvent::Progress {
                phase,
                operation,
                current,
                total,
            } => {
                let pct = if *total > 0 {
                    (*current * 100) / *total
                } else {
                    0
                };
                tracing::debug!(phase = %phase, operation = %operation, progress = %format!("{}%", pct), "Progress");
            }
            BringUpEvent::StepFailed {
                phase,
                check,
                message,
            } => match check {
                Some(n) => tracing::error!(phase = %phase, check = n, "Step failed: {}", message),
                None => tracing::error!(phase = %phase, "Step failed: {}", message),
            },
            BringUpEvent::AddressRead { addr } => {
                tracing::info!(addr = %addr, "Controller address");
            }
            BringUpEvent::Log { level, message } => match level {
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
            },
            BringUpEvent::Complete { failures: 0 } => {
                tracing::info!("Bring-up complete");
            }
            BringUpEvent::Complete { failures } => {
                tracing::warn!(failures = failures, "Bring-up finished with failures");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Observer that keeps every event for inspection.
    #[derive(Default)]
    pub(crate) struct RecordingObserver {
        pub(crate) events: Mutex<Vec<BringUpEvent>>,
    }

    impl BringUpObserver for RecordingObserver {
        fn on_event(&self, event: &BringUpEvent) {
            if let Ok(mut events) = self.events.lock() {
                events.push(event.clone());
            }
        }
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(BringUpPhase::FirmwareDownload.to_string(), "Firmware Download");
        assert_eq!(BringUpPhase::PostFirmwareReset.to_string(), "Post-Firmware Reset");
    }

    #[test]
    fn test_observers_accept_every_event() {
        let events = [
            BringUpEvent::PhaseChanged {
                from: BringUpPhase::Idle,
                to: BringUpPhase::Flush,
            },
            BringUpEvent::Progress {
                phase: BringUpPhase::FirmwareDownload,
                operation: "records".to_string(),
                current: 0,
                total: 0,
            },
            BringUpEvent::StepFailed {
                phase: BringUpPhase::Reset,
                check: Some(10),
                message: "status".to_string(),
            },
            BringUpEvent::Complete { failures: 1 },
        ];
        let recorder = RecordingObserver::default();
        for event in &events {
            NullObserver.on_event(event);
            TracingObserver.on_event(event);
            recorder.on_event(event);
        }
        assert_eq!(recorder.events.lock().unwrap().len(), events.len());
    }
}
