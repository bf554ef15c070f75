//! Constants and configuration values for Quadromon
//!
//! Centralizes all magic numbers, paths, and configuration defaults.
//! The report layout below is the device's fixed wire format; offsets and
//! scale factors are protocol constants and must not be re-derived.

use std::time::Duration;

/// Device identification
pub mod device {
    /// Aquacomputer USB vendor ID
    pub const VENDOR_ID: u16 = 0x0c70;

    /// Quadro fan controller USB product ID
    pub const PRODUCT_ID: u16 = 0xf00d;

    /// HID bus type for USB devices (as it appears in HID_ID)
    pub const HID_BUS_USB: u16 = 0x0003;

    /// Driver name, also used to name the introspection directory
    pub const DRIVER_NAME: &str = "aquacomputer-quadro";
}

/// Byte layout of the periodic status report
pub mod report {
    /// Report ID of the status report the device pushes every second
    pub const STATUS_REPORT_ID: u8 = 0x01;

    /// hidraw delivers numbered reports with the ID as the first byte
    pub const REPORT_ID_OFFSET: usize = 0;

    pub const SERIAL_FIRST_PART: usize = 3;
    pub const SERIAL_SECOND_PART: usize = 5;
    pub const FIRMWARE_VERSION: usize = 13;
    pub const POWER_CYCLES: usize = 24;

    pub const TEMPERATURES: [usize; 4] = [52, 54, 56, 58];

    pub const FLOW_SPEED: usize = 110;
    pub const FAN_SPEEDS: [usize; 4] = [120, 133, 146, 159];

    pub const FAN_POWERS: [usize; 4] = [118, 131, 144, 157];

    pub const SUPPLY_VOLTAGE: usize = 108;
    pub const FAN_VOLTAGES: [usize; 4] = [114, 127, 140, 153];

    pub const FAN_CURRENTS: [usize; 4] = [116, 129, 142, 155];

    /// Every 16-bit field offset in the report
    const U16_FIELDS: [usize; 25] = [
        SERIAL_FIRST_PART,
        SERIAL_SECOND_PART,
        FIRMWARE_VERSION,
        TEMPERATURES[0],
        TEMPERATURES[1],
        TEMPERATURES[2],
        TEMPERATURES[3],
        FLOW_SPEED,
        FAN_SPEEDS[0],
        FAN_SPEEDS[1],
        FAN_SPEEDS[2],
        FAN_SPEEDS[3],
        FAN_POWERS[0],
        FAN_POWERS[1],
        FAN_POWERS[2],
        FAN_POWERS[3],
        SUPPLY_VOLTAGE,
        FAN_VOLTAGES[0],
        FAN_VOLTAGES[1],
        FAN_VOLTAGES[2],
        FAN_VOLTAGES[3],
        FAN_CURRENTS[0],
        FAN_CURRENTS[1],
        FAN_CURRENTS[2],
        FAN_CURRENTS[3],
    ];

    /// Every 32-bit field offset in the report
    const U32_FIELDS: [usize; 1] = [POWER_CYCLES];

    const fn max_field_end() -> usize {
        let mut end = REPORT_ID_OFFSET + 1;
        let mut i = 0;
        while i < U16_FIELDS.len() {
            if U16_FIELDS[i] + 2 > end {
                end = U16_FIELDS[i] + 2;
            }
            i += 1;
        }
        let mut j = 0;
        while j < U32_FIELDS.len() {
            if U32_FIELDS[j] + 4 > end {
                end = U32_FIELDS[j] + 4;
            }
            j += 1;
        }
        end
    }

    /// Shortest buffer that holds every field (fan 4 speed ends at byte 161)
    pub const MIN_REPORT_LEN: usize = max_field_end();

    const _: () = assert!(MIN_REPORT_LEN == 161);
}

/// Unit scaling applied once at decode time
pub mod scale {
    /// centi-degrees Celsius -> milli-degrees Celsius
    pub const TEMPERATURE_MULTIPLIER: i32 = 10;

    /// Device reports flow in tenths of l/h
    pub const FLOW_DIVISOR: u16 = 10;

    /// centiwatts -> microwatts
    pub const POWER_MULTIPLIER: u32 = 10_000;

    /// centivolts -> millivolts
    pub const VOLTAGE_MULTIPLIER: u32 = 10;
}

/// Per-kind channel counts
pub mod channels {
    pub const TEMPERATURE_COUNT: usize = 4;

    /// Index 0 is the flow sensor, 1-4 are fans
    pub const SPEED_COUNT: usize = 5;

    pub const POWER_COUNT: usize = 4;

    /// Index 0 is the supply voltage, 1-4 are fan voltages
    pub const VOLTAGE_COUNT: usize = 5;

    pub const CURRENT_COUNT: usize = 4;

    /// Read-only file mode reported for every exposed attribute
    pub const ATTRIBUTE_MODE: u32 = 0o444;
}

/// Report timing and freshness
pub mod timing {
    use super::Duration;

    /// The device pushes one status report per second
    pub const NOMINAL_REPORT_INTERVAL: Duration = Duration::from_secs(1);

    /// Two report intervals, so one missed report does not flip reads to stale
    pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(2);

    pub const DEFAULT_FRESHNESS_WINDOW_MS: u64 = 2000;
    pub const MIN_FRESHNESS_WINDOW_MS: u64 = 1000;
    pub const MAX_FRESHNESS_WINDOW_MS: u64 = 60_000;

    /// Delay before reopening the hidraw node after a transport error
    pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;
    pub const MIN_RECONNECT_DELAY_MS: u64 = 100;
    pub const MAX_RECONNECT_DELAY_MS: u64 = 60_000;
}

/// Transport tuning
pub mod transport {
    /// Large enough for any report the device sends
    pub const REPORT_BUFFER_SIZE: usize = 512;

    /// Repeated decode/transport failures are logged on the first and every Nth
    pub const ERROR_LOG_EVERY: u64 = 10;
}

/// System paths
pub mod paths {
    use std::path::{Path, PathBuf};

    /// sysfs mount point used for device discovery
    pub const SYSFS_ROOT: &str = "/sys";

    /// Device node directory
    pub const DEV_ROOT: &str = "/dev";

    /// System-wide configuration directory
    pub const CONFIG_DIR: &str = "/etc/quadromon";

    /// Settings file name (both system-wide and per-user)
    pub const SETTINGS_FILE: &str = "settings.json";

    /// Default IPC socket location
    pub fn default_socket_path() -> &'static str {
        if Path::new("/run").exists() {
            "/run/quadromon.sock"
        } else {
            "/var/run/quadromon.sock"
        }
    }

    /// Per-user configuration directory (~/.config/quadromon)
    pub fn user_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("quadromon"))
    }
}
