//! Unified error handling for Quadromon
//!
//! This crate provides a single error type used across all Quadromon components.
//! It uses thiserror for ergonomic error definitions with proper Display and Error trait impls.
//!
//! Read-time outcomes (`Stale`, `ChannelNotFound`) are ordinary values here:
//! both happen in normal operation and are returned through `Result`, never raised.

use std::io;
use std::path::PathBuf;

/// Result type alias using QuadroError
pub type Result<T> = std::result::Result<T, QuadroError>;

/// Unified error type for all Quadromon operations
#[derive(thiserror::Error, Debug)]
pub enum QuadroError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    // ============================================================================
    // Report Decoding Errors
    // ============================================================================
    #[error("Report too short: {len} bytes (need at least {required})")]
    ReportTooShort {
        len: usize,
        required: usize,
    },

    // ============================================================================
    // Channel Read Errors
    // ============================================================================
    #[error("No {kind} channel with index {index}")]
    ChannelNotFound {
        kind: &'static str,
        index: usize,
    },

    #[error("Unknown sensor attribute: {0}")]
    UnknownAttribute(String),

    #[error("Unknown sensor kind: {0}")]
    UnknownSensorKind(String),

    /// No report decoded within the freshness window. `age_ms` is `None`
    /// when the device has not produced a single report yet.
    #[error("Sensor data is stale{}", stale_suffix(.age_ms))]
    Stale {
        age_ms: Option<u64>,
    },

    // ============================================================================
    // Hardware Access Errors
    // ============================================================================
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open device {path}: {source}")]
    DeviceOpen {
        path: PathBuf,
        source: io::Error,
    },

    // ============================================================================
    // Configuration and Settings Errors
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    // ============================================================================
    // Daemon and IPC Errors
    // ============================================================================
    #[error("Daemon connection failed: {0}")]
    DaemonConnection(String),

    #[error("Daemon request failed: {0}")]
    DaemonRequest(String),

    #[error("IPC protocol error: {0}")]
    IpcProtocol(String),

    /// Error the daemon answered with; `code` is the protocol error code name
    #[error("{message}")]
    Remote {
        code: String,
        message: String,
    },

    #[error("Message too large: {size} bytes (max {max_size} bytes)")]
    MessageTooLarge {
        size: usize,
        max_size: usize,
    },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Generic(String),
}

fn stale_suffix(age_ms: &Option<u64>) -> String {
    match age_ms {
        Some(ms) => format!(" (last update {} ms ago)", ms),
        None => " (no report received yet)".to_string(),
    }
}

impl QuadroError {
    /// Create a generic error from a string
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid configuration error for a named field
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a daemon error from a string
    pub fn daemon(msg: impl Into<String>) -> Self {
        Self::DaemonRequest(msg.into())
    }

    /// True for the "no fresh data" outcome
    pub fn is_stale(&self) -> bool {
        match self {
            Self::Stale { .. } => true,
            Self::Remote { code, .. } => code == "stale",
            _ => false,
        }
    }

    /// True when the caller asked for a channel or attribute that does not exist
    pub fn is_channel_not_found(&self) -> bool {
        match self {
            Self::ChannelNotFound { .. } | Self::UnknownAttribute(_) | Self::UnknownSensorKind(_) => true,
            Self::Remote { code, .. } => code == "channel_not_found",
            _ => false,
        }
    }
}

// Allow converting from String to QuadroError
impl From<String> for QuadroError {
    fn from(s: String) -> Self {
        Self::Generic(s)
    }
}

// Allow converting from &str to QuadroError
impl From<&str> for QuadroError {
    fn from(s: &str) -> Self {
        Self::Generic(s.to_string())
    }
}
