//! Display Formatting Helpers
//!
//! Turns stored fixed-point channel values into human-readable strings.
//! These are frontend-agnostic and used by the CLI.

use crate::registry::SensorKind;

/// Unit suffix for a channel. Speed index 0 is the flow sensor.
pub fn unit_suffix(kind: SensorKind, index: usize) -> &'static str {
    match kind {
        SensorKind::Temperature => "°C",
        SensorKind::Speed if index == 0 => "l/h",
        SensorKind::Speed => "RPM",
        SensorKind::Power => "W",
        SensorKind::Voltage => "V",
        SensorKind::Current => "A",
    }
}

/// Format a stored channel value
///
/// # Returns
/// Strings like "25.00 °C", "12 l/h", "1200 RPM", "1.50 W", "12.00 V", "0.250 A"
pub fn format_value(kind: SensorKind, index: usize, value: i64) -> String {
    let unit = unit_suffix(kind, index);
    match kind {
        SensorKind::Temperature => format!("{:.2} {}", milli_to_unit(value), unit),
        SensorKind::Speed => format!("{} {}", value, unit),
        SensorKind::Power => format!("{:.2} {}", micro_to_unit(value), unit),
        SensorKind::Voltage => format!("{:.2} {}", milli_to_unit(value), unit),
        SensorKind::Current => format!("{:.3} {}", milli_to_unit(value), unit),
    }
}

fn milli_to_unit(value: i64) -> f64 {
    value as f64 / 1_000.0
}

fn micro_to_unit(value: i64) -> f64 {
    value as f64 / 1_000_000.0
}
