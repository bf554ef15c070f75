//! Hardware access
//!
//! - `discovery` - locating the Quadro's hidraw node through sysfs
//! - `transport` - the report read loop and the [`ReportSource`] seam
//! - `simulate` - a hardware-free report source

mod discovery;
mod simulate;
mod transport;

pub use discovery::{find_quadro_device, find_quadro_devices, HidrawDevice};
pub use simulate::SimulatedSource;
pub use transport::{run_transport, HidrawSource, ReportSource, TransportStatus};
