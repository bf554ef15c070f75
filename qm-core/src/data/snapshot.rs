//! Decoded sensor values
//!
//! All values are already scaled to the fixed-point units monitoring front
//! ends expect, so reads never convert.

use serde::Serialize;

use crate::constants::channels::{
    CURRENT_COUNT, POWER_COUNT, SPEED_COUNT, TEMPERATURE_COUNT, VOLTAGE_COUNT,
};
use crate::registry::SensorKind;

/// One complete set of readings from a single report.
///
/// Replaced wholesale on every successful decode; never patched in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SensorSnapshot {
    /// milli-degrees Celsius
    pub temperatures: [i32; TEMPERATURE_COUNT],
    /// `[0]` is flow in l/h, `[1..=4]` are fan speeds in RPM
    pub speeds: [u16; SPEED_COUNT],
    /// microwatts
    pub powers: [u32; POWER_COUNT],
    /// millivolts; `[0]` is the supply voltage
    pub voltages: [u32; VOLTAGE_COUNT],
    /// milliamps
    pub currents: [u16; CURRENT_COUNT],
}

impl SensorSnapshot {
    /// Stored value for a channel, widened to `i64`.
    ///
    /// Returns `None` for an index outside the kind's channel count.
    pub fn value(&self, kind: SensorKind, index: usize) -> Option<i64> {
        match kind {
            SensorKind::Temperature => self.temperatures.get(index).map(|&v| i64::from(v)),
            SensorKind::Speed => self.speeds.get(index).map(|&v| i64::from(v)),
            SensorKind::Power => self.powers.get(index).map(|&v| i64::from(v)),
            SensorKind::Voltage => self.voltages.get(index).map(|&v| i64::from(v)),
            SensorKind::Current => self.currents.get(index).map(|&v| i64::from(v)),
        }
    }
}
