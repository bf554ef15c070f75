//! Simulated Quadro
//!
//! Produces status reports without hardware, for running the daemon on a
//! machine with no controller attached. Values drift slowly and
//! deterministically from a sequence counter.

use std::time::Duration;
use tracing::trace;

use super::transport::ReportSource;
use crate::constants::timing::NOMINAL_REPORT_INTERVAL;
use crate::error::{QuadroError, Result};
use crate::report::RawReportBuilder;

const SIMULATED_SERIAL: (u16, u16) = (12345, 42);
const SIMULATED_FIRMWARE: u16 = 1027;

/// Every Nth report carries a foreign report ID
const FOREIGN_REPORT_EVERY: u64 = 5;
const FOREIGN_REPORT_ID: u8 = 0x03;

pub struct SimulatedSource {
    interval: Duration,
    sequence: u64,
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new(NOMINAL_REPORT_INTERVAL)
    }
}

impl SimulatedSource {
    pub fn new(interval: Duration) -> Self {
        Self { interval, sequence: 0 }
    }

    /// Raw report for a given sequence number
    pub fn report(sequence: u64) -> Vec<u8> {
        if sequence % FOREIGN_REPORT_EVERY == FOREIGN_REPORT_EVERY - 1 {
            return RawReportBuilder::new().report_id(FOREIGN_REPORT_ID).build();
        }

        // Triangle wave 0..=20..0, so values rise and fall without overflow
        let phase = (sequence % 40) as u16;
        let drift = if phase > 20 { 40 - phase } else { phase };

        let mut builder = RawReportBuilder::new()
            .serial_number(SIMULATED_SERIAL.0, SIMULATED_SERIAL.1)
            .firmware_version(SIMULATED_FIRMWARE)
            .power_cycles(7 + (sequence / 3600) as u32)
            .flow(1180 + drift * 2)
            .supply_voltage(1210);

        for i in 0..4u16 {
            let fan = i as usize;
            builder = builder
                .temperature(fan, 2600 + i * 150 + drift * 5)
                .fan_speed(fan, 900 + i * 100 + drift * 3)
                .fan_power(fan, 110 + i * 15 + drift)
                .fan_voltage(fan, 1200)
                .fan_current(fan, 90 + i * 12 + drift);
        }

        builder.build()
    }
}

impl ReportSource for SimulatedSource {
    fn next_report(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.interval.is_zero() {
            std::thread::sleep(self.interval);
        }

        let report = Self::report(self.sequence);
        self.sequence = self.sequence.wrapping_add(1);

        let available = buf.len();
        let out = buf
            .get_mut(..report.len())
            .ok_or(QuadroError::ReportTooShort {
                len: available,
                required: report.len(),
            })?;
        out.copy_from_slice(&report);
        trace!(sequence = self.sequence, "Simulated report");
        Ok(report.len())
    }

    fn describe(&self) -> String {
        "simulated device".to_string()
    }
}
