//! Sensor channel registry
//!
//! Static table of every channel the Quadro exposes. This is the single gate
//! that keeps an out-of-range (kind, index) pair from ever reaching storage:
//! every read goes through [`label_for`] or [`validate_channel`] first.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::channels::{
    ATTRIBUTE_MODE, CURRENT_COUNT, POWER_COUNT, SPEED_COUNT, TEMPERATURE_COUNT, VOLTAGE_COUNT,
};
use crate::error::{QuadroError, Result};

const TEMPERATURE_LABELS: [&str; TEMPERATURE_COUNT] = ["Temp1", "Temp2", "Temp3", "Temp4"];

const SPEED_LABELS: [&str; SPEED_COUNT] = [
    "Flow speed [l/h]",
    "Fan1 speed",
    "Fan2 speed",
    "Fan3 speed",
    "Fan4 speed",
];

const POWER_LABELS: [&str; POWER_COUNT] = ["Fan1 power", "Fan2 power", "Fan3 power", "Fan4 power"];

const VOLTAGE_LABELS: [&str; VOLTAGE_COUNT] = [
    "VCC",
    "Fan1 voltage",
    "Fan2 voltage",
    "Fan3 voltage",
    "Fan4 voltage",
];

const CURRENT_LABELS: [&str; CURRENT_COUNT] = [
    "Fan1 current",
    "Fan2 current",
    "Fan3 current",
    "Fan4 current",
];

/// The closed set of sensor kinds the device reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Temperature,
    /// Flow (index 0) and fan speeds (1-4)
    Speed,
    Power,
    /// Supply voltage (index 0) and fan voltages (1-4)
    Voltage,
    Current,
}

impl SensorKind {
    pub const ALL: [SensorKind; 5] = [
        SensorKind::Temperature,
        SensorKind::Speed,
        SensorKind::Power,
        SensorKind::Voltage,
        SensorKind::Current,
    ];

    /// hwmon attribute prefix, also the name used on the wire
    pub fn hwmon_name(self) -> &'static str {
        match self {
            SensorKind::Temperature => "temp",
            SensorKind::Speed => "fan",
            SensorKind::Power => "power",
            SensorKind::Voltage => "in",
            SensorKind::Current => "curr",
        }
    }

    /// hwmon numbers voltages from 0 and everything else from 1
    fn attribute_base(self) -> usize {
        match self {
            SensorKind::Voltage => 0,
            _ => 1,
        }
    }

    fn labels(self) -> &'static [&'static str] {
        match self {
            SensorKind::Temperature => &TEMPERATURE_LABELS,
            SensorKind::Speed => &SPEED_LABELS,
            SensorKind::Power => &POWER_LABELS,
            SensorKind::Voltage => &VOLTAGE_LABELS,
            SensorKind::Current => &CURRENT_LABELS,
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.hwmon_name())
    }
}

impl FromStr for SensorKind {
    type Err = QuadroError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "temp" | "temperature" => Ok(SensorKind::Temperature),
            "fan" | "speed" => Ok(SensorKind::Speed),
            "power" => Ok(SensorKind::Power),
            "in" | "voltage" => Ok(SensorKind::Voltage),
            "curr" | "current" => Ok(SensorKind::Current),
            other => Err(QuadroError::UnknownSensorKind(other.to_string())),
        }
    }
}

/// Number of channels the device exposes for `kind`
pub fn channel_count(kind: SensorKind) -> usize {
    kind.labels().len()
}

/// Label for a channel, or `ChannelNotFound` if the index is out of range
pub fn label_for(kind: SensorKind, index: usize) -> Result<&'static str> {
    kind.labels()
        .get(index)
        .copied()
        .ok_or(QuadroError::ChannelNotFound {
            kind: kind.hwmon_name(),
            index,
        })
}

pub fn validate_channel(kind: SensorKind, index: usize) -> Result<()> {
    label_for(kind, index).map(|_| ())
}

/// One addressable sensor channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelDescriptor {
    pub kind: SensorKind,
    pub index: usize,
    pub label: &'static str,
}

impl ChannelDescriptor {
    pub fn new(kind: SensorKind, index: usize) -> Result<Self> {
        let label = label_for(kind, index)?;
        Ok(Self { kind, index, label })
    }

    /// hwmon attribute stem, e.g. `temp1`, `in0`
    pub fn attribute_base(&self) -> String {
        format!("{}{}", self.kind.hwmon_name(), self.index + self.kind.attribute_base())
    }

    pub fn input_attribute(&self) -> String {
        format!("{}_input", self.attribute_base())
    }

    pub fn label_attribute(&self) -> String {
        format!("{}_label", self.attribute_base())
    }

    pub fn to_info(&self) -> qm_protocol::ChannelInfo {
        qm_protocol::ChannelInfo {
            kind: self.kind.hwmon_name().to_string(),
            index: self.index as u32,
            label: self.label.to_string(),
            input_attribute: self.input_attribute(),
            label_attribute: self.label_attribute(),
        }
    }
}

/// Every channel of one kind, in index order
pub fn channels_of(kind: SensorKind) -> impl Iterator<Item = ChannelDescriptor> {
    kind.labels()
        .iter()
        .enumerate()
        .map(move |(index, &label)| ChannelDescriptor { kind, index, label })
}

/// Every channel the device exposes, grouped by kind
pub fn channels() -> impl Iterator<Item = ChannelDescriptor> {
    SensorKind::ALL.into_iter().flat_map(channels_of)
}

/// Which file of a channel an attribute name refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Input,
    Label,
}

/// Resolve an attribute name like `fan2_input` to its channel
pub fn parse_attribute(name: &str) -> Result<(ChannelDescriptor, AttributeKind)> {
    let unknown = || QuadroError::UnknownAttribute(name.to_string());

    let (stem, attribute) = if let Some(stem) = name.strip_suffix("_input") {
        (stem, AttributeKind::Input)
    } else if let Some(stem) = name.strip_suffix("_label") {
        (stem, AttributeKind::Label)
    } else {
        return Err(unknown());
    };

    for kind in SensorKind::ALL {
        let Some(digits) = stem.strip_prefix(kind.hwmon_name()) else {
            continue;
        };
        let number: usize = digits.parse().map_err(|_| unknown())?;
        // Reject "temp01" and "+1"
        if digits != number.to_string() {
            return Err(unknown());
        }
        let index = number
            .checked_sub(kind.attribute_base())
            .ok_or_else(unknown)?;
        return Ok((ChannelDescriptor::new(kind, index)?, attribute));
    }

    Err(unknown())
}

/// File mode for an attribute; every exposed attribute is read-only
pub fn attribute_mode(name: &str) -> Result<u32> {
    parse_attribute(name).map(|_| ATTRIBUTE_MODE)
}
