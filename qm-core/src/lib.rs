//! Quadromon Core Library
//!
//! Telemetry for the Aquacomputer Quadro fan and flow controller.
//!
//! The device pushes one fixed-layout status report per second. This crate
//! decodes those reports, keeps the latest values behind a staleness gate and
//! serves them per channel.
//!
//! # Module Structure
//!
//! - `report/` - byte field reader, status report decoder and builder
//! - `data/` - sensor snapshot and identity record
//! - `registry` - the fixed channel table and hwmon attribute names
//! - `state` - [`DeviceState`], the staleness-gated read API
//! - `driver` - [`UpdateDriver`], feeding reports into the state
//! - `hw/` - hidraw discovery, transport loop, simulated device
//! - `settings`, `display`, `daemon_client` - daemon and CLI support
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Instant;
//! use qm_core::{DeviceState, RawReportBuilder, SensorKind, UpdateDriver};
//!
//! let driver = UpdateDriver::new(Arc::new(DeviceState::new()));
//! driver.on_report(&RawReportBuilder::new().temperature(0, 2500).build());
//!
//! let temp = driver.state().read(SensorKind::Temperature, 0, Instant::now()).unwrap();
//! assert_eq!(temp, 25_000);
//! ```

// Grouped modules
pub mod data;
pub mod hw;
pub mod report;

// Standalone modules
pub mod constants;
pub mod daemon_client;
pub mod display;
pub mod driver;
pub mod error;
pub mod registry;
pub mod settings;
pub mod state;

// Re-export error types
pub use error::{QuadroError, Result};

pub use data::{introspection_dir_name, IdentityRecord, SensorSnapshot, SerialNumber};
pub use report::{decode_report, DecodeOutcome, DecodedReport, RawReportBuilder};
pub use registry::{
    attribute_mode, channel_count, channels, channels_of, label_for, parse_attribute,
    validate_channel, AttributeKind, ChannelDescriptor, SensorKind,
};
pub use state::{ChannelReading, DeviceState, DeviceView};
pub use driver::{DriverCounters, ReportOutcome, UpdateDriver};

pub use hw::{
    find_quadro_device, find_quadro_devices, run_transport, HidrawDevice, HidrawSource,
    ReportSource, SimulatedSource, TransportStatus,
};

pub use settings::Settings;
pub use display::{format_value, unit_suffix};
pub use daemon_client::{is_daemon_available, DaemonClient};
