//! Device state with staleness-gated reads
//!
//! Holds the most recent snapshot, identity and decode timestamp as one
//! frame behind a single lock. `apply` swaps the whole frame, so a reader
//! never sees a snapshot from one report paired with the timestamp or
//! identity of another.
//!
//! # Freshness
//!
//! - **Fresh**: `now - last_updated <= freshness_window` (boundary inclusive)
//! - **Stale**: anything older, or no report decoded yet
//!
//! Fresh becomes stale only by time passing; only `apply` makes it fresh again.

use parking_lot::RwLock;
use std::time::{Duration, Instant};

use crate::constants::timing::FRESHNESS_WINDOW;
use crate::data::{IdentityRecord, SensorSnapshot};
use crate::error::{QuadroError, Result};
use crate::registry::{self, AttributeKind, ChannelDescriptor, SensorKind};
use crate::report::DecodedReport;

/// Everything replaced by one `apply` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceView {
    pub snapshot: SensorSnapshot,
    pub identity: IdentityRecord,
    /// `None` until the first report is decoded, which reads as stale
    pub last_updated: Option<Instant>,
}

/// One channel value taken from a consistent snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelReading {
    pub channel: ChannelDescriptor,
    pub value: i64,
}

impl ChannelReading {
    pub fn to_protocol(&self) -> qm_protocol::ChannelReading {
        qm_protocol::ChannelReading {
            kind: self.channel.kind.hwmon_name().to_string(),
            index: self.channel.index as u32,
            label: self.channel.label.to_string(),
            value: self.value,
        }
    }
}

pub struct DeviceState {
    frame: RwLock<DeviceView>,
    freshness_window: Duration,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceState {
    pub fn new() -> Self {
        Self::with_freshness_window(FRESHNESS_WINDOW)
    }

    pub fn with_freshness_window(freshness_window: Duration) -> Self {
        Self {
            frame: RwLock::new(DeviceView::default()),
            freshness_window,
        }
    }

    pub fn freshness_window(&self) -> Duration {
        self.freshness_window
    }

    /// Atomically replace snapshot, identity and timestamp
    pub fn apply(&self, snapshot: SensorSnapshot, identity: IdentityRecord, timestamp: Instant) {
        *self.frame.write() = DeviceView {
            snapshot,
            identity,
            last_updated: Some(timestamp),
        };
    }

    pub fn apply_report(&self, report: &DecodedReport, timestamp: Instant) {
        self.apply(report.snapshot, report.identity, timestamp);
    }

    /// Staleness-gated value of one channel.
    ///
    /// The channel is validated before freshness, so a bad index is always
    /// `ChannelNotFound` even while the device is stale.
    pub fn read(&self, kind: SensorKind, index: usize, now: Instant) -> Result<i64> {
        registry::validate_channel(kind, index)?;

        let view = self.view();
        self.check_fresh(view.last_updated, now)?;

        view.snapshot
            .value(kind, index)
            .ok_or(QuadroError::ChannelNotFound {
                kind: kind.hwmon_name(),
                index,
            })
    }

    /// Static channel label; never affected by staleness
    pub fn read_label(&self, kind: SensorKind, index: usize) -> Result<&'static str> {
        registry::label_for(kind, index)
    }

    /// Most recent identity, regardless of staleness
    pub fn identity(&self) -> IdentityRecord {
        self.frame.read().identity
    }

    /// Every channel value from one consistent snapshot
    pub fn read_all(&self, now: Instant) -> Result<Vec<ChannelReading>> {
        let view = self.view();
        self.check_fresh(view.last_updated, now)?;

        Ok(registry::channels()
            .filter_map(|channel| {
                view.snapshot
                    .value(channel.kind, channel.index)
                    .map(|value| ChannelReading { channel, value })
            })
            .collect())
    }

    /// hwmon-style attribute read: `_input` is staleness-gated, `_label` is not
    pub fn read_attribute(&self, name: &str, now: Instant) -> Result<String> {
        let (channel, attribute) = registry::parse_attribute(name)?;
        match attribute {
            AttributeKind::Input => self
                .read(channel.kind, channel.index, now)
                .map(|v| v.to_string()),
            AttributeKind::Label => Ok(channel.label.to_string()),
        }
    }

    /// Copy of the whole frame, for diagnostics
    pub fn view(&self) -> DeviceView {
        *self.frame.read()
    }

    pub fn last_updated(&self) -> Option<Instant> {
        self.frame.read().last_updated
    }

    /// Time since the last decoded report; `None` before the first one
    pub fn age(&self, now: Instant) -> Option<Duration> {
        self.last_updated()
            .map(|updated| now.saturating_duration_since(updated))
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        self.check_fresh(self.last_updated(), now).is_ok()
    }

    fn check_fresh(&self, last_updated: Option<Instant>, now: Instant) -> Result<()> {
        match last_updated {
            None => Err(QuadroError::Stale { age_ms: None }),
            Some(updated) => {
                let age = now.saturating_duration_since(updated);
                if age > self.freshness_window {
                    Err(QuadroError::Stale {
                        age_ms: Some(age.as_millis() as u64),
                    })
                } else {
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SerialNumber;

    fn snapshot_with_temp(temp: i32) -> SensorSnapshot {
        SensorSnapshot {
            temperatures: [temp, 0, 0, 0],
            speeds: [12, 1000, 1100, 1200, 1300],
            ..SensorSnapshot::default()
        }
    }

    fn identity(cycles: u32) -> IdentityRecord {
        IdentityRecord {
            serial_number: SerialNumber([1, 2]),
            firmware_version: 1027,
            power_cycles: cycles,
        }
    }

    #[test]
    fn test_new_state_is_stale() {
        let state = DeviceState::new();
        let err = state.read(SensorKind::Temperature, 0, Instant::now()).unwrap_err();
        assert!(matches!(err, QuadroError::Stale { age_ms: None }));
        assert!(!state.is_fresh(Instant::now()));
        assert_eq!(state.age(Instant::now()), None);
    }

    #[test]
    fn test_read_after_apply() {
        let state = DeviceState::new();
        let t = Instant::now();
        state.apply(snapshot_with_temp(2500), identity(1), t);

        assert_eq!(state.read(SensorKind::Temperature, 0, t).unwrap(), 2500);
        assert_eq!(state.read(SensorKind::Speed, 4, t).unwrap(), 1300);
    }

    #[test]
    fn test_freshness_boundary_is_inclusive() {
        let state = DeviceState::new();
        let t = Instant::now();
        state.apply(snapshot_with_temp(2500), identity(1), t);

        let window = state.freshness_window();
        assert_eq!(state.read(SensorKind::Temperature, 0, t + window).unwrap(), 2500);

        let err = state
            .read(SensorKind::Temperature, 0, t + window + Duration::from_nanos(1))
            .unwrap_err();
        assert!(err.is_stale());
    }

    #[test]
    fn test_zero_reading_is_not_stale() {
        let state = DeviceState::new();
        let t = Instant::now();
        state.apply(SensorSnapshot::default(), identity(1), t);
        assert_eq!(state.read(SensorKind::Power, 2, t).unwrap(), 0);
    }

    #[test]
    fn test_channel_not_found_takes_precedence_over_stale() {
        let state = DeviceState::new();
        let err = state.read(SensorKind::Temperature, 4, Instant::now()).unwrap_err();
        assert!(matches!(err, QuadroError::ChannelNotFound { kind: "temp", index: 4 }));
    }

    #[test]
    fn test_labels_and_identity_ignore_staleness() {
        let state = DeviceState::new();
        let t = Instant::now();
        state.apply(snapshot_with_temp(1), identity(77), t);

        let later = t + Duration::from_secs(3600);
        assert!(state.read(SensorKind::Temperature, 0, later).is_err());
        assert_eq!(state.read_label(SensorKind::Voltage, 0).unwrap(), "VCC");
        assert_eq!(state.identity().power_cycles, 77);
    }

    #[test]
    fn test_apply_replaces_wholesale() {
        let state = DeviceState::new();
        let t = Instant::now();
        state.apply(snapshot_with_temp(1000), identity(1), t);
        state.apply(SensorSnapshot::default(), identity(2), t + Duration::from_millis(500));

        let view = state.view();
        assert_eq!(view.snapshot, SensorSnapshot::default());
        assert_eq!(view.identity.power_cycles, 2);
        assert_eq!(view.last_updated, Some(t + Duration::from_millis(500)));
    }

    #[test]
    fn test_reapplying_same_report_only_moves_timestamp() {
        let state = DeviceState::new();
        let t = Instant::now();
        state.apply(snapshot_with_temp(4200), identity(5), t);
        let first = state.view();

        state.apply(snapshot_with_temp(4200), identity(5), t + Duration::from_secs(1));
        let second = state.view();

        assert_eq!(first.snapshot, second.snapshot);
        assert_eq!(first.identity, second.identity);
        assert_ne!(first.last_updated, second.last_updated);
    }

    #[test]
    fn test_read_all_returns_every_channel() {
        let state = DeviceState::new();
        let t = Instant::now();
        state.apply(snapshot_with_temp(3000), identity(1), t);

        let readings = state.read_all(t).unwrap();
        assert_eq!(readings.len(), registry::channels().count());
        assert_eq!(readings[0].channel.label, "Temp1");
        assert_eq!(readings[0].value, 3000);

        assert!(state.read_all(t + Duration::from_secs(10)).unwrap_err().is_stale());
    }

    #[test]
    fn test_read_attribute() {
        let state = DeviceState::new();
        let t = Instant::now();
        state.apply(snapshot_with_temp(2750), identity(1), t);

        assert_eq!(state.read_attribute("temp1_input", t).unwrap(), "2750");
        assert_eq!(state.read_attribute("fan1_label", t).unwrap(), "Flow speed [l/h]");
        assert!(state.read_attribute("temp9_input", t).unwrap_err().is_channel_not_found());

        let later = t + Duration::from_secs(5);
        assert!(state.read_attribute("temp1_input", later).unwrap_err().is_stale());
        assert_eq!(state.read_attribute("temp1_label", later).unwrap(), "Temp1");
    }

    #[test]
    fn test_custom_freshness_window() {
        let state = DeviceState::with_freshness_window(Duration::from_secs(10));
        let t = Instant::now();
        state.apply(snapshot_with_temp(1), identity(1), t);
        assert!(state.is_fresh(t + Duration::from_secs(9)));
        assert_eq!(state.age(t + Duration::from_secs(9)), Some(Duration::from_secs(9)));
    }

    #[test]
    fn test_reader_clock_behind_writer_is_fresh() {
        let state = DeviceState::new();
        let now = Instant::now();
        state.apply(snapshot_with_temp(1), identity(1), now + Duration::from_millis(5));
        assert!(state.read(SensorKind::Temperature, 0, now).is_ok());
    }
}
