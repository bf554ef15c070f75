//! Status report wire format
//!
//! - `fields` - big-endian field extraction
//! - `decoder` - report ID check, field table, unit scaling
//! - `builder` - encoding synthetic reports

mod builder;
mod decoder;
pub mod fields;

pub use builder::RawReportBuilder;
pub use decoder::{decode_report, DecodeOutcome, DecodedReport};
