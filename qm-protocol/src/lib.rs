use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global request ID counter for correlation
static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Maximum message size for IPC (8KB)
pub const MAX_MESSAGE_SIZE: usize = 8 * 1024;

/// Longest attribute name accepted ("power4_input" is 12 bytes)
const MAX_ATTRIBUTE_NAME_LENGTH: usize = 32;

/// Longest sensor kind name accepted
const MAX_SENSOR_KIND_LENGTH: usize = 16;

/// Channel indices above this are rejected before reaching the daemon
const MAX_CHANNEL_INDEX: u32 = 255;

/// Generate a unique request ID for correlation
pub fn generate_request_id() -> u64 {
    REQUEST_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Unique request ID for correlation and debugging
    pub id: u64,
    /// The actual request
    #[serde(flatten)]
    pub request: Request,
}

impl RequestEnvelope {
    pub fn new(request: Request) -> Self {
        Self {
            id: generate_request_id(),
            request,
        }
    }

    pub fn with_id(request: Request, id: u64) -> Self {
        Self { id, request }
    }
}

/// Every request is read-only; the daemon never writes to the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "data")]
pub enum Request {
    Ping,
    Version,
    /// Transport and freshness diagnostics
    Status,
    /// Every channel the device exposes, with labels and attribute names
    ListChannels,
    /// Staleness-gated value of one channel
    ReadChannel { kind: String, index: u32 },
    /// Static label of one channel (not staleness-gated)
    ReadLabel { kind: String, index: u32 },
    /// hwmon-style attribute, e.g. `temp1_input` or `fan1_label`
    ReadAttribute { name: String },
    /// All channel values from one consistent snapshot
    ReadAll,
    /// Serial number, firmware version and power-cycle count
    Identity,
}

impl Request {
    /// Validate request parameters before sending to daemon
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Request::Ping
            | Request::Version
            | Request::Status
            | Request::ListChannels
            | Request::ReadAll
            | Request::Identity => Ok(()),

            Request::ReadChannel { kind, index } | Request::ReadLabel { kind, index } => {
                validate_sensor_kind(kind)?;
                validate_channel_index(*index)
            }

            Request::ReadAttribute { name } => validate_attribute_name(name),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Request::Ping => "Ping",
            Request::Version => "Version",
            Request::Status => "Status",
            Request::ListChannels => "ListChannels",
            Request::ReadChannel { .. } => "ReadChannel",
            Request::ReadLabel { .. } => "ReadLabel",
            Request::ReadAttribute { .. } => "ReadAttribute",
            Request::ReadAll => "ReadAll",
            Request::Identity => "Identity",
        }
    }
}

/// Sensor kinds travel as short lowercase names ("temp", "fan", ...)
pub fn validate_sensor_kind(kind: &str) -> Result<(), String> {
    if kind.is_empty() {
        return Err("Sensor kind cannot be empty".into());
    }
    if kind.len() > MAX_SENSOR_KIND_LENGTH {
        return Err(format!(
            "Sensor kind too long ({} > {})",
            kind.len(),
            MAX_SENSOR_KIND_LENGTH
        ));
    }
    if !kind.bytes().all(|b| b.is_ascii_lowercase()) {
        return Err("Sensor kind must be lowercase ASCII letters".into());
    }
    Ok(())
}

pub fn validate_channel_index(index: u32) -> Result<(), String> {
    if index > MAX_CHANNEL_INDEX {
        return Err(format!("Channel index out of range (0-{})", MAX_CHANNEL_INDEX));
    }
    Ok(())
}

/// Attribute names are restricted to `[a-z0-9_]`
pub fn validate_attribute_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Attribute name cannot be empty".into());
    }
    if name.len() > MAX_ATTRIBUTE_NAME_LENGTH {
        return Err(format!(
            "Attribute name too long ({} > {})",
            name.len(),
            MAX_ATTRIBUTE_NAME_LENGTH
        ));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
    {
        return Err("Attribute name contains invalid characters".into());
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Request ID this response corresponds to
    pub id: u64,
    /// The actual response
    #[serde(flatten)]
    pub response: Response,
}

impl ResponseEnvelope {
    pub fn new(id: u64, response: Response) -> Self {
        Self { id, response }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Response {
    #[serde(rename = "ok")]
    Ok(ResponseData),
    #[serde(rename = "error")]
    Error { code: ErrorCode, message: String },
}

/// Lets clients tell "no fresh data" apart from a real zero reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Stale,
    ChannelNotFound,
    InvalidRequest,
    Internal,
}

impl ErrorCode {
    /// Wire name, identical to the serialized form
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Stale => "stale",
            ErrorCode::ChannelNotFound => "channel_not_found",
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::Internal => "internal",
        }
    }
}

/// Response data - a flat struct where each request fills one field
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reading: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<Vec<ChannelInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readings: Option<Vec<ChannelReading>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<IdentityInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_status: Option<DeviceStatus>,
}

impl ResponseData {
    pub fn none() -> Self { Self::default() }
    pub fn string(v: String) -> Self { Self { value: Some(v), ..Self::default() } }
    pub fn channel_value(v: i64) -> Self { Self { reading: Some(v), ..Self::default() } }
    pub fn channel_label(l: String) -> Self { Self { label: Some(l), ..Self::default() } }
    pub fn channel_list(c: Vec<ChannelInfo>) -> Self { Self { channels: Some(c), ..Self::default() } }
    pub fn all_readings(r: Vec<ChannelReading>) -> Self { Self { readings: Some(r), ..Self::default() } }
    pub fn identity(i: IdentityInfo) -> Self { Self { identity: Some(i), ..Self::default() } }
    pub fn status(s: DeviceStatus) -> Self { Self { device_status: Some(s), ..Self::default() } }
}

impl Response {
    pub fn ok() -> Self {
        Response::Ok(ResponseData::none())
    }

    pub fn ok_string(s: impl Into<String>) -> Self {
        Response::Ok(ResponseData::string(s.into()))
    }

    pub fn ok_reading(v: i64) -> Self {
        Response::Ok(ResponseData::channel_value(v))
    }

    pub fn ok_label(l: impl Into<String>) -> Self {
        Response::Ok(ResponseData::channel_label(l.into()))
    }

    pub fn error(code: ErrorCode, msg: impl Into<String>) -> Self {
        Response::Error { code, message: msg.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub kind: String,
    pub index: u32,
    pub label: String,
    pub input_attribute: String,
    pub label_attribute: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelReading {
    pub kind: String,
    pub index: u32,
    pub label: String,
    /// Fixed-point value in the channel's hwmon unit
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityInfo {
    /// Two zero-padded five digit groups, e.g. "01234-00042"
    pub serial_number: String,
    pub firmware_version: u16,
    pub power_cycles: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// hidraw node the daemon is reading, if one is open
    pub device: Option<String>,
    pub fresh: bool,
    /// Milliseconds since the last decoded report; None before the first one
    pub age_ms: Option<u64>,
    pub freshness_window_ms: u64,
    pub reports_decoded: u64,
    pub reports_ignored: u64,
    pub decode_errors: u64,
}
