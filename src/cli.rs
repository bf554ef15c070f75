/*
 * This file is part of Quadromon.
 *
 * Copyright (C) 2025 Quadromon contributors
 *
 * Quadromon is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Quadromon is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Quadromon. If not, see <https://www.gnu.org/licenses/>.
 */

//! Command Line Interface
//!
//! Queries quadromond for live telemetry, and decodes captured reports
//! offline without a daemon.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;

use qm_core::{
    channels, decode_report, format_value, is_daemon_available, DaemonClient, DecodeOutcome,
    DecodedReport, SensorKind, Settings,
};
use qm_protocol::{ChannelInfo, ChannelReading, DeviceStatus, IdentityInfo};

#[derive(Parser, Debug)]
#[command(name = "quadromon")]
#[command(version)]
#[command(about = "Quadromon - Aquacomputer Quadro telemetry")]
#[command(long_about = "Quadromon - Aquacomputer Quadro telemetry

Reads temperatures, flow, fan speeds, power, voltages and currents
from a running quadromond, or decodes a captured status report.

EXAMPLES:
    quadromon sensors                  Show every channel with units
    quadromon read temp 0              Raw value of the first temperature
    quadromon label fan 1              Label of the first fan speed
    quadromon attr in0_input           Read by hwmon attribute name
    quadromon channels                 List the channel table
    quadromon identity                 Serial, firmware, power cycles
    quadromon status                   Daemon and device freshness
    quadromon decode report.bin        Decode a captured report offline
    quadromon --json sensors           Machine-readable output

ENVIRONMENT VARIABLES:
    RUST_LOG=debug         Enable debug logging

FILES:
    /etc/quadromon/settings.json       Daemon settings (socket path)")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Daemon socket (default: from settings)
    #[arg(long, global = true, value_name = "PATH")]
    pub socket: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Show every channel with its current value
    Sensors,

    /// Read one channel's raw fixed-point value
    Read {
        /// Sensor kind: temp, fan, power, in, curr
        kind: String,
        /// Zero-based channel index
        index: u32,
    },

    /// Print one channel's label
    Label {
        kind: String,
        index: u32,
    },

    /// Read a hwmon-style attribute such as fan2_input or temp1_label
    Attr {
        name: String,
    },

    /// List the channel table (no daemon needed)
    Channels,

    /// Show the device identity
    Identity,

    /// Show daemon and device status
    Status,

    /// Decode a captured raw report file (no daemon needed)
    Decode {
        file: PathBuf,
    },
}

// ============================================================================
// CLI Execution
// ============================================================================

pub fn run_cli(cli: &Cli) -> Result<()> {
    let output = execute_command(cli)?;
    print!("{}", output);
    Ok(())
}

fn execute_command(cli: &Cli) -> Result<String> {
    let json = cli.json;
    match &cli.command {
        Commands::Channels => render_channels(&channel_table(), json),
        Commands::Decode { file } => decode_file(file, json),
        Commands::Sensors => render_readings(&connect(cli)?.read_all()?, json),
        Commands::Read { kind, index } => {
            let kind: SensorKind = kind.parse()?;
            render_scalar(&connect(cli)?.read_channel(kind, *index)?, json)
        }
        Commands::Label { kind, index } => {
            let kind: SensorKind = kind.parse()?;
            render_scalar(&connect(cli)?.read_label(kind, *index)?, json)
        }
        Commands::Attr { name } => render_scalar(&connect(cli)?.read_attribute(name)?, json),
        Commands::Identity => render_identity(&connect(cli)?.identity()?, json),
        Commands::Status => {
            let mut client = connect(cli)?;
            let daemon_version = client.version()?;
            render_status(&daemon_version, &client.status()?, json)
        }
    }
}

fn connect(cli: &Cli) -> Result<DaemonClient> {
    let socket = resolve_socket(cli.socket.as_deref())?;
    if !is_daemon_available(&socket) {
        bail!("quadromond is not running (no socket at {})", socket.display());
    }
    debug!("Connecting to {}", socket.display());
    Ok(DaemonClient::connect(&socket)?)
}

fn resolve_socket(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(Settings::load(None)
            .context("Failed to load settings")?
            .socket_path),
    }
}

// ============================================================================
// Offline Decode
// ============================================================================

#[derive(Debug, Serialize)]
struct DecodedOutput {
    readings: Vec<ChannelReading>,
    identity: IdentityInfo,
}

/// Decode a captured report file and render it
pub fn decode_file(path: &Path, json: bool) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    match decode_report(&bytes)? {
        DecodeOutcome::Decoded(report) => render_decoded(&report, json),
        DecodeOutcome::NotApplicable { report_id } => Ok(format!(
            "Report ID 0x{:02x} is not a status report; nothing decoded\n",
            report_id
        )),
    }
}

fn render_decoded(report: &DecodedReport, json: bool) -> Result<String> {
    let readings = channels()
        .filter_map(|channel| {
            report
                .snapshot
                .value(channel.kind, channel.index)
                .map(|value| qm_core::ChannelReading { channel, value }.to_protocol())
        })
        .collect::<Vec<_>>();
    let identity = report.identity.to_info();

    if json {
        return to_json(&DecodedOutput { readings, identity });
    }

    let mut out = render_readings(&readings, false)?;
    out.push('\n');
    out.push_str(&render_identity(&identity, false)?);
    Ok(out)
}

// ============================================================================
// Rendering
// ============================================================================

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(format!("{}\n", serde_json::to_string_pretty(value)?))
}

fn channel_table() -> Vec<ChannelInfo> {
    channels().map(|c| c.to_info()).collect()
}

fn render_scalar<T: Serialize + std::fmt::Display>(value: &T, json: bool) -> Result<String> {
    if json {
        to_json(value)
    } else {
        Ok(format!("{}\n", value))
    }
}

fn render_channels(table: &[ChannelInfo], json: bool) -> Result<String> {
    if json {
        return to_json(&table);
    }

    let mut out = format!("Channels ({}):\n", table.len());
    for info in table {
        writeln!(
            out,
            "  {:<6} {}  {:<14} {:<12} {}",
            info.kind, info.index, info.label, info.input_attribute, info.label_attribute
        )?;
    }
    Ok(out)
}

/// Readings grouped by kind with units; unknown kinds show the raw value
pub fn render_readings(readings: &[ChannelReading], json: bool) -> Result<String> {
    if json {
        return to_json(&readings);
    }

    let mut out = String::from("Sensors:\n");
    for reading in readings {
        let value = match reading.kind.parse::<SensorKind>() {
            Ok(kind) => format_value(kind, reading.index as usize, reading.value),
            Err(_) => reading.value.to_string(),
        };
        writeln!(out, "  {:<14} {}", reading.label, value)?;
    }
    Ok(out)
}

fn render_identity(identity: &IdentityInfo, json: bool) -> Result<String> {
    if json {
        return to_json(identity);
    }

    let mut out = String::from("Identity:\n");
    writeln!(out, "  Serial number:    {}", identity.serial_number)?;
    writeln!(out, "  Firmware version: {}", identity.firmware_version)?;
    writeln!(out, "  Power cycles:     {}", identity.power_cycles)?;
    Ok(out)
}

#[derive(Debug, Serialize)]
struct StatusOutput<'a> {
    daemon_version: &'a str,
    #[serde(flatten)]
    status: &'a DeviceStatus,
}

fn render_status(daemon_version: &str, status: &DeviceStatus, json: bool) -> Result<String> {
    if json {
        return to_json(&StatusOutput { daemon_version, status });
    }

    let age = match status.age_ms {
        Some(ms) => format!("{} ms ago", ms),
        None => "never".to_string(),
    };

    let mut out = String::from("Quadromon Status\n");
    out.push_str("================\n\n");
    writeln!(out, "Daemon version:   {}", daemon_version)?;
    writeln!(out, "Device:           {}", status.device.as_deref().unwrap_or("(not connected)"))?;
    writeln!(out, "Data:             {}", if status.fresh { "fresh" } else { "stale" })?;
    writeln!(out, "Last report:      {}", age)?;
    writeln!(out, "Freshness window: {} ms", status.freshness_window_ms)?;
    writeln!(out, "Reports decoded:  {}", status.reports_decoded)?;
    writeln!(out, "Reports ignored:  {}", status.reports_ignored)?;
    writeln!(out, "Decode errors:    {}", status.decode_errors)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qm_core::RawReportBuilder;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("quadromon").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_read_with_global_flags() {
        let cli = parse(&["read", "fan", "2", "--json", "--socket", "/tmp/q.sock"]);
        assert!(cli.json);
        assert_eq!(cli.socket, Some(PathBuf::from("/tmp/q.sock")));
        assert_eq!(cli.command, Commands::Read { kind: "fan".into(), index: 2 });
    }

    #[test]
    fn test_parse_rejects_negative_index() {
        assert!(Cli::try_parse_from(["quadromon", "read", "temp", "-1"]).is_err());
    }

    #[test]
    fn test_channel_table_lists_every_channel() {
        let out = render_channels(&channel_table(), false).unwrap();
        assert!(out.starts_with("Channels (22):"));
        assert!(out.contains("Flow speed [l/h]"));
        assert!(out.contains("in0_input"));
        assert!(out.contains("curr4_label"));
    }

    #[test]
    fn test_render_readings_uses_units() {
        let readings = vec![
            ChannelReading { kind: "temp".into(), index: 0, label: "Temp1".into(), value: 25_370 },
            ChannelReading { kind: "fan".into(), index: 0, label: "Flow speed [l/h]".into(), value: 118 },
            ChannelReading { kind: "bogus".into(), index: 0, label: "Other".into(), value: 7 },
        ];
        let out = render_readings(&readings, false).unwrap();
        assert!(out.contains("25.37 °C"));
        assert!(out.contains("118 l/h"));
        let last: Vec<&str> = out.lines().last().unwrap().split_whitespace().collect();
        assert_eq!(last, ["Other", "7"]);
    }

    #[test]
    fn test_render_status_without_data() {
        let status = DeviceStatus {
            device: None,
            fresh: false,
            age_ms: None,
            freshness_window_ms: 2000,
            reports_decoded: 0,
            reports_ignored: 0,
            decode_errors: 0,
        };
        let out = render_status("0.1.0", &status, false).unwrap();
        assert!(out.contains("Daemon version:   0.1.0"));
        assert!(out.contains("(not connected)"));
        assert!(out.contains("stale"));
        assert!(out.contains("never"));
    }

    #[test]
    fn test_render_status_json_carries_daemon_version() {
        let status = DeviceStatus {
            device: Some("/dev/hidraw3".into()),
            fresh: true,
            age_ms: Some(120),
            freshness_window_ms: 2000,
            reports_decoded: 9,
            reports_ignored: 2,
            decode_errors: 0,
        };
        let out = render_status("0.1.0", &status, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["daemon_version"], "0.1.0");
        assert_eq!(value["device"], "/dev/hidraw3");
        assert_eq!(value["reports_decoded"], 9);
    }

    #[test]
    fn test_missing_daemon_socket_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("quadromon.sock");
        let cli = parse(&["status", "--socket", socket.to_str().unwrap()]);

        let err = execute_command(&cli).unwrap_err();
        assert!(err.to_string().contains("quadromond is not running"));
    }

    #[test]
    fn test_render_decoded_json() {
        let report = RawReportBuilder::new().temperature(0, 2537).serial_number(1, 2).build();
        let DecodeOutcome::Decoded(decoded) = decode_report(&report).unwrap() else {
            panic!("expected a status report");
        };
        let out = render_decoded(&decoded, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["readings"][0]["value"], 25_370);
        assert_eq!(value["identity"]["serial_number"], "00001-00002");
        assert_eq!(value["readings"].as_array().unwrap().len(), 22);
    }
}
