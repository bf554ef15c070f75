//! Update driver
//!
//! Glue between the transport and [`DeviceState`]: the transport calls
//! [`UpdateDriver::on_report`] once per inbound report, from a single thread.
//! Nothing is returned to the transport. Malformed reports are logged and
//! dropped, leaving the last good snapshot in place.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

use crate::constants::transport::ERROR_LOG_EVERY;
use crate::error::Result;
use crate::report::{decode_report, DecodeOutcome};
use crate::state::DeviceState;

/// What happened to one report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Decoded and stored
    Applied,
    /// Foreign report ID; state untouched
    Ignored,
}

/// Running totals since the driver was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DriverCounters {
    pub decoded: u64,
    pub ignored: u64,
    pub decode_errors: u64,
}

pub struct UpdateDriver {
    state: Arc<DeviceState>,
    decoded: AtomicU64,
    ignored: AtomicU64,
    decode_errors: AtomicU64,
    consecutive_errors: AtomicU64,
}

impl UpdateDriver {
    pub fn new(state: Arc<DeviceState>) -> Self {
        Self {
            state,
            decoded: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            consecutive_errors: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> &Arc<DeviceState> {
        &self.state
    }

    /// Transport callback. Never fails and never panics.
    pub fn on_report(&self, raw: &[u8]) {
        self.on_report_at(raw, Instant::now());
    }

    /// Same as [`on_report`](Self::on_report) with an explicit receive time
    pub fn on_report_at(&self, raw: &[u8], now: Instant) {
        match self.process(raw, now) {
            Ok(_) => {
                let previous = self.consecutive_errors.swap(0, Ordering::Relaxed);
                if previous > 0 {
                    debug!("Report decoding recovered after {} errors", previous);
                }
            }
            Err(e) => {
                self.decode_errors.fetch_add(1, Ordering::Relaxed);
                let count = self.consecutive_errors.fetch_add(1, Ordering::Relaxed) + 1;
                if count == 1 || count % ERROR_LOG_EVERY == 0 {
                    warn!(len = raw.len(), consecutive = count, "Dropping malformed report: {}", e);
                }
            }
        }
    }

    /// Decode one report and store it if it is ours.
    ///
    /// Decode errors are returned here but never reach the state.
    pub fn process(&self, raw: &[u8], now: Instant) -> Result<ReportOutcome> {
        match decode_report(raw)? {
            DecodeOutcome::Decoded(report) => {
                self.state.apply_report(&report, now);
                self.decoded.fetch_add(1, Ordering::Relaxed);
                trace!(len = raw.len(), "Applied status report");
                Ok(ReportOutcome::Applied)
            }
            DecodeOutcome::NotApplicable { .. } => {
                self.ignored.fetch_add(1, Ordering::Relaxed);
                Ok(ReportOutcome::Ignored)
            }
        }
    }

    pub fn counters(&self) -> DriverCounters {
        DriverCounters {
            decoded: self.decoded.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
        }
    }
}
