//! Status report decoder
//!
//! Turns one raw report into a [`SensorSnapshot`] and an [`IdentityRecord`].
//! Reports with a different report ID are not ours and are skipped without
//! touching any state, so a shared transport can hand us everything it sees.

use tracing::trace;

use crate::constants::{report, scale};
use crate::data::{IdentityRecord, SensorSnapshot, SerialNumber};
use crate::error::{QuadroError, Result};
use crate::report::fields::{read_u16, read_u32};

/// A fully decoded status report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedReport {
    pub snapshot: SensorSnapshot,
    pub identity: IdentityRecord,
}

/// Result of feeding one buffer to the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    Decoded(DecodedReport),
    /// The report ID belongs to some other report kind
    NotApplicable { report_id: u8 },
}

/// Decode one raw report.
///
/// Returns [`DecodeOutcome::NotApplicable`] when the report ID does not
/// match, and [`QuadroError::ReportTooShort`] when a status report is
/// shorter than the fixed layout requires.
pub fn decode_report(buf: &[u8]) -> Result<DecodeOutcome> {
    let report_id = *buf
        .get(report::REPORT_ID_OFFSET)
        .ok_or(QuadroError::ReportTooShort {
            len: buf.len(),
            required: report::REPORT_ID_OFFSET + 1,
        })?;

    if report_id != report::STATUS_REPORT_ID {
        trace!(report_id, "Ignoring report with foreign report ID");
        return Ok(DecodeOutcome::NotApplicable { report_id });
    }

    if buf.len() < report::MIN_REPORT_LEN {
        return Err(QuadroError::ReportTooShort {
            len: buf.len(),
            required: report::MIN_REPORT_LEN,
        });
    }

    let identity = IdentityRecord {
        serial_number: SerialNumber([
            read_u16(buf, report::SERIAL_FIRST_PART)?,
            read_u16(buf, report::SERIAL_SECOND_PART)?,
        ]),
        firmware_version: read_u16(buf, report::FIRMWARE_VERSION)?,
        power_cycles: read_u32(buf, report::POWER_CYCLES)?,
    };

    let fan_speeds = read_channels(buf, report::FAN_SPEEDS, |raw| raw)?;
    let fan_voltages = read_channels(buf, report::FAN_VOLTAGES, scale_voltage)?;

    let snapshot = SensorSnapshot {
        temperatures: read_channels(buf, report::TEMPERATURES, |raw| {
            i32::from(raw) * scale::TEMPERATURE_MULTIPLIER
        })?,
        speeds: [
            read_u16(buf, report::FLOW_SPEED)? / scale::FLOW_DIVISOR,
            fan_speeds[0],
            fan_speeds[1],
            fan_speeds[2],
            fan_speeds[3],
        ],
        powers: read_channels(buf, report::FAN_POWERS, |raw| {
            u32::from(raw) * scale::POWER_MULTIPLIER
        })?,
        voltages: [
            scale_voltage(read_u16(buf, report::SUPPLY_VOLTAGE)?),
            fan_voltages[0],
            fan_voltages[1],
            fan_voltages[2],
            fan_voltages[3],
        ],
        currents: read_channels(buf, report::FAN_CURRENTS, |raw| raw)?,
    };

    Ok(DecodeOutcome::Decoded(DecodedReport { snapshot, identity }))
}

fn scale_voltage(raw: u16) -> u32 {
    u32::from(raw) * scale::VOLTAGE_MULTIPLIER
}

fn read_channels<T, const N: usize>(
    buf: &[u8],
    offsets: [usize; N],
    scale: impl Fn(u16) -> T,
) -> Result<[T; N]>
where
    T: Copy + Default,
{
    let mut values = [T::default(); N];
    for (slot, offset) in values.iter_mut().zip(offsets) {
        *slot = scale(read_u16(buf, offset)?);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RawReportBuilder;

    fn decoded(buf: &[u8]) -> DecodedReport {
        match decode_report(buf).unwrap() {
            DecodeOutcome::Decoded(report) => report,
            other => panic!("expected decoded report, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_scales_every_field() {
        let buf = RawReportBuilder::new()
            .serial_number(1234, 42)
            .firmware_version(1027)
            .power_cycles(70_000)
            .temperature(0, 250)
            .temperature(3, 315)
            .flow(120)
            .fan_speed(0, 1200)
            .fan_speed(3, 900)
            .fan_power(0, 15)
            .supply_voltage(1210)
            .fan_voltage(2, 1190)
            .fan_current(1, 80)
            .build();

        let report = decoded(&buf);
        let s = report.snapshot;
        assert_eq!(s.temperatures, [2500, 0, 0, 3150]);
        assert_eq!(s.speeds, [12, 1200, 0, 0, 900]);
        assert_eq!(s.powers, [150_000, 0, 0, 0]);
        assert_eq!(s.voltages, [12_100, 0, 0, 11_900, 0]);
        assert_eq!(s.currents, [0, 80, 0, 0]);

        assert_eq!(report.identity.serial_number, SerialNumber([1234, 42]));
        assert_eq!(report.identity.firmware_version, 1027);
        assert_eq!(report.identity.power_cycles, 70_000);
    }

    #[test]
    fn test_flow_division_truncates() {
        let buf = RawReportBuilder::new().flow(129).build();
        assert_eq!(decoded(&buf).snapshot.speeds[0], 12);
    }

    #[test]
    fn test_max_raw_values_do_not_overflow() {
        let mut builder = RawReportBuilder::new().supply_voltage(u16::MAX);
        for i in 0..4 {
            builder = builder.temperature(i, u16::MAX).fan_power(i, u16::MAX);
        }
        let s = decoded(&builder.build()).snapshot;
        assert_eq!(s.temperatures[0], 655_350);
        assert_eq!(s.powers[3], 655_350_000);
        assert_eq!(s.voltages[0], 655_350);
    }

    #[test]
    fn test_foreign_report_id_is_not_applicable() {
        let buf = RawReportBuilder::new().report_id(0x03).build();
        assert_eq!(
            decode_report(&buf).unwrap(),
            DecodeOutcome::NotApplicable { report_id: 0x03 }
        );
    }

    #[test]
    fn test_foreign_short_report_is_still_not_applicable() {
        assert_eq!(
            decode_report(&[0x02, 0x00]).unwrap(),
            DecodeOutcome::NotApplicable { report_id: 0x02 }
        );
    }

    #[test]
    fn test_short_status_report_is_an_error() {
        let buf = RawReportBuilder::new().build();
        match decode_report(&buf[..100]) {
            Err(QuadroError::ReportTooShort { len, required }) => {
                assert_eq!(len, 100);
                assert_eq!(required, report::MIN_REPORT_LEN);
            }
            other => panic!("expected ReportTooShort, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_buffer_is_an_error() {
        assert!(matches!(
            decode_report(&[]),
            Err(QuadroError::ReportTooShort { len: 0, required: 1 })
        ));
    }

    #[test]
    fn test_longer_report_is_accepted() {
        let mut buf = RawReportBuilder::new().temperature(1, 400).build();
        buf.resize(300, 0xff);
        assert_eq!(decoded(&buf).snapshot.temperatures[1], 4000);
    }
}
