//! Data types produced by the report decoder
//!
//! Contains the sensor snapshot and the device identity record.

mod identity;
mod snapshot;

pub use identity::{introspection_dir_name, IdentityRecord, SerialNumber};
pub use snapshot::SensorSnapshot;
