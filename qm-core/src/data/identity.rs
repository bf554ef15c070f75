//! Device identity decoded alongside every report
//!
//! Identity is not staleness-gated: it changes far less often than sensor
//! data and stays meaningful after readings go stale.

use serde::Serialize;
use std::fmt;

use crate::constants::device::DRIVER_NAME;

/// Serial number as printed on the device: two five digit groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SerialNumber(pub [u16; 2]);

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:05}-{:05}", self.0[0], self.0[1])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IdentityRecord {
    pub serial_number: SerialNumber,
    pub firmware_version: u16,
    /// How many times the device has been powered on
    pub power_cycles: u32,
}

impl IdentityRecord {
    /// Introspection entries as (name, formatted value) pairs
    pub fn entries(&self) -> [(&'static str, String); 3] {
        [
            ("serial_number", self.serial_number.to_string()),
            ("firmware_version", self.firmware_version.to_string()),
            ("power_cycles", self.power_cycles.to_string()),
        ]
    }

    pub fn to_info(&self) -> qm_protocol::IdentityInfo {
        qm_protocol::IdentityInfo {
            serial_number: self.serial_number.to_string(),
            firmware_version: self.firmware_version,
            power_cycles: self.power_cycles,
        }
    }
}

/// Name of the per-device introspection directory, e.g.
/// `aquacomputer-quadro-hidraw3`
pub fn introspection_dir_name(device_name: &str) -> String {
    format!("{}-{}", DRIVER_NAME, device_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_number_is_zero_padded() {
        assert_eq!(SerialNumber([1234, 42]).to_string(), "01234-00042");
        assert_eq!(SerialNumber([0, 0]).to_string(), "00000-00000");
        assert_eq!(SerialNumber([65535, 65535]).to_string(), "65535-65535");
    }

    #[test]
    fn test_entries() {
        let identity = IdentityRecord {
            serial_number: SerialNumber([12, 34567]),
            firmware_version: 1027,
            power_cycles: 305,
        };
        let entries = identity.entries();
        assert_eq!(entries[0], ("serial_number", "00012-34567".to_string()));
        assert_eq!(entries[1], ("firmware_version", "1027".to_string()));
        assert_eq!(entries[2], ("power_cycles", "305".to_string()));
    }

    #[test]
    fn test_to_info() {
        let identity = IdentityRecord {
            serial_number: SerialNumber([1, 2]),
            firmware_version: 9,
            power_cycles: 10,
        };
        let info = identity.to_info();
        assert_eq!(info.serial_number, "00001-00002");
        assert_eq!(info.firmware_version, 9);
        assert_eq!(info.power_cycles, 10);
    }

    #[test]
    fn test_introspection_dir_name() {
        assert_eq!(introspection_dir_name("hidraw3"), "aquacomputer-quadro-hidraw3");
    }
}
