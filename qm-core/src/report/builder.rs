//! Raw status report construction
//!
//! Encodes device-native (unscaled) values at their wire offsets. Used by
//! the simulated report source and by tests.

use crate::constants::report;

/// Builds a minimum-length status report, all fields zero by default.
///
/// Fan and sensor indices are zero-based (`fan_speed(0, ..)` is fan 1);
/// out-of-range indices are ignored.
#[derive(Debug, Clone)]
pub struct RawReportBuilder {
    buf: Vec<u8>,
}

impl Default for RawReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RawReportBuilder {
    pub fn new() -> Self {
        let mut buf = vec![0u8; report::MIN_REPORT_LEN];
        buf[report::REPORT_ID_OFFSET] = report::STATUS_REPORT_ID;
        Self { buf }
    }

    pub fn report_id(mut self, id: u8) -> Self {
        self.buf[report::REPORT_ID_OFFSET] = id;
        self
    }

    pub fn serial_number(self, first: u16, second: u16) -> Self {
        self.put_u16(report::SERIAL_FIRST_PART, first)
            .put_u16(report::SERIAL_SECOND_PART, second)
    }

    pub fn firmware_version(self, version: u16) -> Self {
        self.put_u16(report::FIRMWARE_VERSION, version)
    }

    pub fn power_cycles(mut self, cycles: u32) -> Self {
        let at = report::POWER_CYCLES;
        self.buf[at..at + 4].copy_from_slice(&cycles.to_be_bytes());
        self
    }

    /// Centi-degrees Celsius
    pub fn temperature(self, sensor: usize, centi_degrees: u16) -> Self {
        self.put_indexed(&report::TEMPERATURES, sensor, centi_degrees)
    }

    /// Tenths of l/h
    pub fn flow(self, raw: u16) -> Self {
        self.put_u16(report::FLOW_SPEED, raw)
    }

    pub fn fan_speed(self, fan: usize, rpm: u16) -> Self {
        self.put_indexed(&report::FAN_SPEEDS, fan, rpm)
    }

    /// Centiwatts
    pub fn fan_power(self, fan: usize, centi_watts: u16) -> Self {
        self.put_indexed(&report::FAN_POWERS, fan, centi_watts)
    }

    /// Centivolts
    pub fn supply_voltage(self, centi_volts: u16) -> Self {
        self.put_u16(report::SUPPLY_VOLTAGE, centi_volts)
    }

    /// Centivolts
    pub fn fan_voltage(self, fan: usize, centi_volts: u16) -> Self {
        self.put_indexed(&report::FAN_VOLTAGES, fan, centi_volts)
    }

    /// Milliamps
    pub fn fan_current(self, fan: usize, milli_amps: u16) -> Self {
        self.put_indexed(&report::FAN_CURRENTS, fan, milli_amps)
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }

    fn put_indexed(self, offsets: &[usize], index: usize, value: u16) -> Self {
        match offsets.get(index) {
            Some(&offset) => self.put_u16(offset, value),
            None => self,
        }
    }

    fn put_u16(mut self, offset: usize, value: u16) -> Self {
        self.buf[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_report_has_status_id_and_min_length() {
        let buf = RawReportBuilder::new().build();
        assert_eq!(buf.len(), report::MIN_REPORT_LEN);
        assert_eq!(buf[report::REPORT_ID_OFFSET], report::STATUS_REPORT_ID);
        assert!(buf[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_fields_land_big_endian_at_offsets() {
        let buf = RawReportBuilder::new()
            .fan_speed(3, 0x0102)
            .power_cycles(0x0a0b_0c0d)
            .build();
        assert_eq!(&buf[159..161], &[0x01, 0x02]);
        assert_eq!(&buf[24..28], &[0x0a, 0x0b, 0x0c, 0x0d]);
    }

    #[test]
    fn test_out_of_range_index_is_ignored() {
        let plain = RawReportBuilder::new().build();
        let ignored = RawReportBuilder::new().fan_current(4, 999).build();
        assert_eq!(plain, ignored);
    }
}
