//! Bring-up Session - High-level orchestrator for controller start-up.
//!
//! Runs the fixed sequence flush, reset, firmware download, reset, baud rate,
//! device address, address read-back, LE event mask and finally the
//! configured role. A failing step is reported and recorded, and the
//! sequence moves on to the next one.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::ble::{AdvertisingData, AdvertisingError, BdAddr, BleError};
use crate::engine::{CommandError, Hci};
use crate::events::{BringUpEvent, BringUpObserver, BringUpPhase, LogLevel, TracingObserver};
use crate::loader::{LoadReport, load_firmware_with};
use crate::payload::{FirmwareError, FirmwareImage};
use crate::protocol::constants::FIRMWARE_SETTLE_US;
use crate::transport::{SerialLink, TransportError};

/// What the controller does once it is configured.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Role {
    /// Stop after the event mask.
    #[default]
    None,
    /// Active scanning.
    Scan,
    /// Non-connectable Eddystone-URL beacon; the built-in URL when unset.
    Advertise { url: Option<String> },
    /// Initiate a connection.
    Connect { peer: BdAddr },
}

/// Configuration for a bring-up session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BringUpConfig {
    /// Path to the vendor firmware patch (HCD). No download when unset.
    pub firmware_path: Option<String>,
    /// Baud rate the controller is switched to.
    pub controller_baud: Option<u32>,
    /// Public address written to the controller.
    pub bd_addr: Option<BdAddr>,
    /// LE event mask.
    pub le_event_mask: u64,
    /// Give up on a response after this long. Waits forever when unset.
    pub response_timeout_ms: Option<u64>,
    /// Pause after the firmware download, in microseconds.
    pub firmware_settle_us: u64,
    pub role: Role,
}

impl Default for BringUpConfig {
    fn default() -> Self {
        Self {
            firmware_path: None,
            controller_baud: Some(115_200),
            bd_addr: None,
            le_event_mask: 0xFF,
            response_timeout_ms: None,
            firmware_settle_us: FIRMWARE_SETTLE_US,
            role: Role::None,
        }
    }
}

impl BringUpConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BringUpConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout_ms.map(Duration::from_millis)
    }

    pub fn firmware_settle(&self) -> Duration {
        Duration::from_micros(self.firmware_settle_us)
    }
}

/// How one step of the sequence ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Ok,
    Skipped,
    Failed { check: Option<u8>, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub phase: BringUpPhase,
    pub status: StepStatus,
}

/// Result of a whole bring-up run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BringUpReport {
    pub steps: Vec<StepOutcome>,
    pub firmware: Option<LoadReport>,
    pub bd_addr: Option<BdAddr>,
}

impl BringUpReport {
    pub fn failures(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Failed { .. }))
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.failures() == 0
    }

    pub fn status_of(&self, phase: BringUpPhase) -> Option<&StepStatus> {
        self.steps.iter().find(|s| s.phase == phase).map(|s| &s.status)
    }
}

impl fmt::Display for BringUpReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            let phase = step.phase.to_string();
            match &step.status {
                StepStatus::Ok => writeln!(f, "  {:<20} ok", phase)?,
                StepStatus::Skipped => writeln!(f, "  {:<20} skipped", phase)?,
                StepStatus::Failed {
                    check: Some(n),
                    message,
                } => writeln!(f, "  {:<20} FAILED (check {}): {}", phase, n, message)?,
                StepStatus::Failed {
                    check: None,
                    message,
                } => writeln!(f, "  {:<20} FAILED: {}", phase, message)?,
            }
        }
        Ok(())
    }
}

/// Errors that can name the response check that tripped.
trait FailedCheck: fmt::Display {
    fn failed_check(&self) -> Option<u8> {
        None
    }
}

impl FailedCheck for CommandError {
    fn failed_check(&self) -> Option<u8> {
        self.check_number()
    }
}

impl FailedCheck for BleError {
    fn failed_check(&self) -> Option<u8> {
        match self {
            BleError::Command(e) => e.check_number(),
            BleError::Param(_) => None,
        }
    }
}

impl FailedCheck for FirmwareError {
    fn failed_check(&self) -> Option<u8> {
        match self {
            FirmwareError::BeginFailed(e) | FirmwareError::RecordFailed { source: e, .. } => {
                e.check_number()
            }
            _ => None,
        }
    }
}

impl FailedCheck for TransportError {}
impl FailedCheck for AdvertisingError {}

/// Bring-up Session - drives one controller through the start-up sequence.
pub struct BringUpSession<O: BringUpObserver> {
    config: BringUpConfig,
    observer: Arc<O>,
    firmware: Option<Vec<u8>>,
    phase: BringUpPhase,
}

impl BringUpSession<TracingObserver> {
    /// Create a new session with default tracing observer.
    pub fn new(config: BringUpConfig) -> Self {
        Self::with_observer(config, Arc::new(TracingObserver))
    }
}

impl<O: BringUpObserver> BringUpSession<O> {
    /// Create a new session with a custom observer.
    pub fn with_observer(config: BringUpConfig, observer: Arc<O>) -> Self {
        Self {
            config,
            observer,
            firmware: None,
            phase: BringUpPhase::Idle,
        }
    }

    /// Use `data` as the firmware image instead of reading `firmware_path`.
    pub fn with_firmware(mut self, data: Vec<u8>) -> Self {
        self.firmware = Some(data);
        self
    }

    pub fn config(&self) -> &BringUpConfig {
        &self.config
    }

    /// Load all required files.
    fn load_files(&mut self) -> Result<()> {
        if self.firmware.is_none()
            && let Some(path) = &self.config.firmware_path
        {
            info!(path = %path, "Loading firmware image");
            let data = std::fs::read(path)
                .with_context(|| format!("Failed to read firmware image {}", path))?;
            self.firmware = Some(data);
        }
        Ok(())
    }

    /// Run the complete bring-up sequence over `link`.
    ///
    /// Only local problems (unreadable firmware file) abort the run; every
    /// controller-side failure is recorded in the report.
    #[instrument(skip_all)]
    pub fn run<L: SerialLink>(&mut self, link: L) -> Result<BringUpReport> {
        self.load_files()?;
        self.phase = BringUpPhase::Idle;

        let mut hci = Hci::new(link);
        hci.set_response_timeout(self.config.response_timeout());
        let mut report = BringUpReport::default();

        self.enter(BringUpPhase::Flush);
        let result = hci.flush_receive();
        if let Some(drained) = self.record(&mut report, result)
            && drained > 0
        {
            self.log(LogLevel::Debug, format!("Discarded {} stale bytes", drained));
        }

        self.enter(BringUpPhase::Reset);
        let result = hci.reset();
        self.record(&mut report, result);

        self.enter(BringUpPhase::FirmwareDownload);
        let downloaded = match self.firmware.take() {
            Some(data) => {
                let image = FirmwareImage::new(&data);
                let observer = &self.observer;
                let result = load_firmware_with(
                    &mut hci,
                    &image,
                    self.config.firmware_settle(),
                    |done, total| {
                        observer.on_event(&BringUpEvent::Progress {
                            phase: BringUpPhase::FirmwareDownload,
                            operation: "records".to_string(),
                            current: done as u64,
                            total: total as u64,
                        })
                    },
                );
                match self.record(&mut report, result) {
                    Some(load) => report.firmware = Some(load),
                    None => self.log(
                        LogLevel::Warn,
                        "Controller left on its ROM firmware".to_string(),
                    ),
                }
                self.firmware = Some(data);
                true
            }
            None => {
                self.skip(&mut report, "No firmware image configured");
                false
            }
        };

        self.enter(BringUpPhase::PostFirmwareReset);
        if downloaded {
            let result = hci.reset();
            self.record(&mut report, result);
        } else {
            self.skip(&mut report, "No firmware downloaded");
        }

        self.enter(BringUpPhase::BaudRate);
        match self.config.controller_baud {
            Some(baud) => {
                let result = hci.set_baud_rate(baud);
                if self.record(&mut report, result).is_some() {
                    let result = hci.link_mut().set_baud_rate(baud);
                    self.record_extra(&mut report, result);
                }
            }
            None => self.skip(&mut report, "Controller baud rate unchanged"),
        }

        self.enter(BringUpPhase::DeviceAddress);
        match self.config.bd_addr {
            Some(addr) => {
                let result = hci.set_bd_addr(addr);
                self.record(&mut report, result);
            }
            None => self.skip(&mut report, "Keeping controller address"),
        }

        self.enter(BringUpPhase::ReadAddress);
        let result = hci.read_bd_addr();
        if let Some(addr) = self.record(&mut report, result) {
            self.observer.on_event(&BringUpEvent::AddressRead {
                addr: addr.to_string(),
            });
            report.bd_addr = Some(addr);
        }

        self.enter(BringUpPhase::EventMask);
        let result = hci.set_le_event_mask(self.config.le_event_mask);
        self.record(&mut report, result);

        self.enter(BringUpPhase::Role);
        self.start_role(&mut hci, &mut report);

        self.enter(BringUpPhase::Complete);
        self.observer.on_event(&BringUpEvent::Complete {
            failures: report.failures(),
        });
        Ok(report)
    }

    fn start_role<L: SerialLink>(&mut self, hci: &mut Hci<L>, report: &mut BringUpReport) {
        match self.config.role.clone() {
            Role::None => self.skip(report, "No role configured"),
            Role::Scan => {
                let result = hci.start_active_scanning();
                self.record(report, result);
            }
            Role::Advertise { url: None } => {
                let result = hci.start_active_advertising();
                self.record(report, result);
            }
            Role::Advertise { url: Some(url) } => match AdvertisingData::eddystone_url(&url, 0) {
                Ok(data) => {
                    let result = hci.start_advertising_with(&data);
                    self.record(report, result);
                }
                Err(e) => {
                    self.record::<(), _>(report, Err(e));
                }
            },
            Role::Connect { peer } => {
                let result = hci.connect(peer);
                self.record(report, result);
            }
        }
    }

    fn enter(&mut self, to: BringUpPhase) {
        self.observer.on_event(&BringUpEvent::PhaseChanged {
            from: self.phase,
            to,
        });
        self.phase = to;
    }

    /// Record the outcome of the current phase, reporting any failure.
    fn record<T, E: FailedCheck>(
        &self,
        report: &mut BringUpReport,
        result: Result<T, E>,
    ) -> Option<T> {
        match result {
            Ok(value) => {
                report.steps.push(StepOutcome {
                    phase: self.phase,
                    status: StepStatus::Ok,
                });
                Some(value)
            }
            Err(e) => {
                let check = e.failed_check();
                let message = e.to_string();
                self.observer.on_event(&BringUpEvent::StepFailed {
                    phase: self.phase,
                    check,
                    message: message.clone(),
                });
                report.steps.push(StepOutcome {
                    phase: self.phase,
                    status: StepStatus::Failed { check, message },
                });
                None
            }
        }
    }

    /// Fold a follow-up failure into the step already recorded for this phase.
    fn record_extra<E: FailedCheck>(&self, report: &mut BringUpReport, result: Result<(), E>) {
        if let Err(e) = result {
            let message = e.to_string();
            self.observer.on_event(&BringUpEvent::StepFailed {
                phase: self.phase,
                check: None,
                message: message.clone(),
            });
            if let Some(step) = report.steps.last_mut() {
                step.status = StepStatus::Failed {
                    check: None,
                    message,
                };
            }
        }
    }

    fn log(&self, level: LogLevel, message: String) {
        self.observer.on_event(&BringUpEvent::Log { level, message });
    }

    fn skip(&self, report: &mut BringUpReport, reason: &str) {
        self.log(LogLevel::Info, format!("{}: {}", self.phase, reason));
        report.steps.push(StepOutcome {
            phase: self.phase,
            status: StepStatus::Skipped,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullObserver;
    use crate::events::tests::RecordingObserver;
    use crate::protocol::Opcode;
    use crate::transport::MockLink;

    fn quiet(config: BringUpConfig) -> BringUpSession<NullObserver> {
        BringUpSession::with_observer(config, Arc::new(NullObserver))
    }

    #[test]
    fn test_config_toml_round_trip() {
        let config = BringUpConfig {
            firmware_path: Some("BCM4345C0.hcd".to_string()),
            bd_addr: Some("C0:FF:EE:C0:FF:EE".parse().unwrap()),
            response_timeout_ms: Some(500),
            role: Role::Connect {
                peer: "A0:A1:A2:A3:A4:A5".parse().unwrap(),
            },
            ..Default::default()
        };

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: BringUpConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let parsed: BringUpConfig = toml::from_str(
            r#"
            le_event_mask = 31

            [role]
            mode = "advertise"
            url = "https://example.com"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.le_event_mask, 31);
        assert_eq!(parsed.controller_baud, Some(115_200));
        assert_eq!(parsed.firmware_settle(), Duration::from_micros(0x100000));
        assert_eq!(parsed.response_timeout(), None);
        assert_eq!(
            parsed.role,
            Role::Advertise {
                url: Some("https://example.com".to_string())
            }
        );
    }

    #[test]
    fn test_config_file_round_trip() {
        let path = std::env::temp_dir().join(format!("hci-bringup-{}.toml", std::process::id()));
        let config = BringUpConfig {
            role: Role::Scan,
            ..Default::default()
        };
        config.save_to_file(&path).unwrap();
        let loaded = BringUpConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_full_sequence_with_firmware() {
        let mut firmware = Vec::new();
        firmware.extend_from_slice(&[0x4C, 0xFC, 0x02, 0xAA, 0xBB]);
        firmware.extend_from_slice(&[0x4E, 0xFC, 0x00]);

        let addr: BdAddr = "C0:FF:EE:C0:FF:EE".parse().unwrap();
        let mut link = MockLink::new();
        link.queue_stale(&[0x04, 0x3E, 0x00]);
        link.queue_command_complete(Opcode::RESET);
        link.queue_command_complete(Opcode::VENDOR_LOAD_FIRMWARE);
        link.queue_command_complete(Opcode::from_raw(0xFC4C));
        link.queue_command_complete(Opcode::from_raw(0xFC4E));
        link.queue_command_complete(Opcode::RESET);
        link.queue_command_complete(Opcode::VENDOR_SET_BAUD);
        link.queue_command_complete(Opcode::VENDOR_SET_BDADDR);
        link.queue_read_bd_addr(addr);
        link.queue_command_complete(Opcode::LE_SET_EVENT_MASK);
        link.queue_command_complete(Opcode::LE_SET_SCAN_PARAMETERS);
        link.queue_command_complete(Opcode::LE_SET_SCAN_ENABLE);

        let config = BringUpConfig {
            bd_addr: Some(addr),
            role: Role::Scan,
            ..Default::default()
        };
        let mut session = quiet(config).with_firmware(firmware);
        let report = session.run(&mut link).unwrap();

        assert!(report.is_success(), "{report}");
        assert_eq!(report.firmware, Some(LoadReport { records: 2, bytes: 8 }));
        assert_eq!(report.bd_addr, Some(addr));
        assert_eq!(report.steps.len(), 9);
        assert_eq!(link.rx_remaining(), 0);
        assert_eq!(link.sent_commands().unwrap().len(), 11);
        assert_eq!(link.baud_rates(), &[115_200]);
        assert_eq!(link.delays(), &[Duration::from_micros(0x100000)]);
    }

    #[test]
    fn test_firmware_progress_per_record() {
        let mut firmware = Vec::new();
        firmware.extend_from_slice(&[0x4C, 0xFC, 0x01, 0xAA]);
        firmware.extend_from_slice(&[0x4E, 0xFC, 0x00]);

        let mut link = MockLink::new();
        link.queue_command_complete(Opcode::RESET);
        link.queue_command_complete(Opcode::VENDOR_LOAD_FIRMWARE);
        link.queue_command_complete(Opcode::from_raw(0xFC4C));
        link.queue_command_complete(Opcode::from_raw(0xFC4E));

        let observer = Arc::new(RecordingObserver::default());
        let mut session = BringUpSession::with_observer(BringUpConfig::default(), observer.clone())
            .with_firmware(firmware);
        let report = session.run(&mut link).unwrap();
        assert_eq!(report.status_of(BringUpPhase::FirmwareDownload), Some(&StepStatus::Ok));

        let events = observer.events.lock().unwrap();
        let progress: Vec<(u64, u64)> = events
            .iter()
            .filter_map(|e| match e {
                BringUpEvent::Progress {
                    phase: BringUpPhase::FirmwareDownload,
                    current,
                    total,
                    ..
                } => Some((*current, *total)),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![(1, 2), (2, 2)]);
    }

    #[test]
    fn test_failed_download_warns_and_continues() {
        let mut link = MockLink::new();
        link.queue_command_complete(Opcode::RESET);
        link.queue_command_complete_with_status(Opcode::VENDOR_LOAD_FIRMWARE, 0x01);

        let observer = Arc::new(RecordingObserver::default());
        let mut session = BringUpSession::with_observer(BringUpConfig::default(), observer.clone())
            .with_firmware(vec![0x4C, 0xFC, 0x00]);
        let report = session.run(&mut link).unwrap();

        assert!(report.firmware.is_none());
        assert!(matches!(
            report.status_of(BringUpPhase::FirmwareDownload),
            Some(StepStatus::Failed { .. })
        ));
        assert_ne!(
            report.status_of(BringUpPhase::PostFirmwareReset),
            Some(&StepStatus::Skipped)
        );

        let events = observer.events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            BringUpEvent::Log {
                level: LogLevel::Warn,
                ..
            }
        )));
        assert!(!events.iter().any(|e| matches!(e, BringUpEvent::Progress { .. })));
    }

    #[test]
    fn test_stale_bytes_logged_at_debug() {
        let mut link = MockLink::new();
        link.queue_stale(&[0xFF, 0xFF]);

        let observer = Arc::new(RecordingObserver::default());
        let mut session = BringUpSession::with_observer(BringUpConfig::default(), observer.clone());
        session.run(&mut link).unwrap();

        let events = observer.events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            BringUpEvent::Log {
                level: LogLevel::Debug,
                message,
            } if message == "Discarded 2 stale bytes"
        )));
    }

    #[test]
    fn test_failed_step_does_not_stop_sequence() {
        let mut link = MockLink::new();
        link.queue_command_complete(Opcode::RESET);
        link.queue_command_complete_with_status(Opcode::VENDOR_SET_BAUD, 0x0C);
        link.queue_read_bd_addr(BdAddr::new([1, 2, 3, 4, 5, 6]));
        link.queue_command_complete(Opcode::LE_SET_EVENT_MASK);

        let observer = Arc::new(RecordingObserver::default());
        let mut session = BringUpSession::with_observer(BringUpConfig::default(), observer.clone());
        let report = session.run(&mut link).unwrap();

        assert_eq!(report.failures(), 1);
        assert_eq!(
            report.status_of(BringUpPhase::BaudRate),
            Some(&StepStatus::Failed {
                check: Some(10),
                message: "Command Complete: status 0x0C".to_string()
            })
        );
        assert_eq!(report.status_of(BringUpPhase::EventMask), Some(&StepStatus::Ok));
        assert_eq!(
            report.status_of(BringUpPhase::FirmwareDownload),
            Some(&StepStatus::Skipped)
        );
        assert!(link.baud_rates().is_empty());

        let events = observer.events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            BringUpEvent::StepFailed {
                phase: BringUpPhase::BaudRate,
                check: Some(10),
                ..
            }
        )));
        assert!(matches!(
            events.last(),
            Some(BringUpEvent::Complete { failures: 1 })
        ));
    }

    #[test]
    fn test_silent_controller_reports_every_step() {
        let mut link = MockLink::new();
        let mut session = quiet(BringUpConfig {
            role: Role::Advertise { url: None },
            ..Default::default()
        });
        let report = session.run(&mut link).unwrap();

        // reset, baud, read address, event mask, advertising
        assert_eq!(report.failures(), 5);
        assert_eq!(report.status_of(BringUpPhase::Flush), Some(&StepStatus::Ok));
        assert_eq!(report.steps.len(), 9);
    }

    #[test]
    fn test_bad_advertising_url_is_a_step_failure() {
        let mut link = MockLink::new();
        link.queue_command_complete(Opcode::RESET);
        link.queue_command_complete(Opcode::VENDOR_SET_BAUD);
        link.queue_read_bd_addr(BdAddr::default());
        link.queue_command_complete(Opcode::LE_SET_EVENT_MASK);

        let mut session = quiet(BringUpConfig {
            role: Role::Advertise {
                url: Some("gopher://x".to_string()),
            },
            ..Default::default()
        });
        let report = session.run(&mut link).unwrap();
        assert_eq!(report.failures(), 1);
        assert!(matches!(
            report.status_of(BringUpPhase::Role),
            Some(StepStatus::Failed { check: None, .. })
        ));
    }

    #[test]
    fn test_missing_firmware_file_aborts_before_io() {
        let mut link = MockLink::new();
        let mut session = quiet(BringUpConfig {
            firmware_path: Some("/nonexistent/firmware.hcd".to_string()),
            ..Default::default()
        });
        assert!(session.run(&mut link).is_err());
        assert!(link.tx_bytes().is_empty());
    }
}
