//! Daemon Client
//!
//! Talks to quadromond over its Unix socket. One request per line, one
//! response per line; every response is checked against the request ID and
//! the kind of data the request asks for.

use std::io::{BufRead, BufReader, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use qm_protocol::{
    ChannelInfo, ChannelReading, DeviceStatus, IdentityInfo, Request, RequestEnvelope, Response,
    ResponseData, ResponseEnvelope, MAX_MESSAGE_SIZE,
};

use crate::error::{QuadroError, Result};
use crate::registry::SensorKind;

const TIMEOUT: Duration = Duration::from_secs(5);

/// ReadAll and ListChannels responses are a few KiB
const INITIAL_BUFFER_SIZE: usize = 4096;

pub struct DaemonClient {
    writer: UnixStream,
    reader: BufReader<UnixStream>,
}

impl DaemonClient {
    pub fn connect(socket_path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(socket_path).map_err(|e| {
            QuadroError::DaemonConnection(format!(
                "Failed to connect to daemon at {}: {}",
                socket_path.display(),
                e
            ))
        })?;
        stream.set_read_timeout(Some(TIMEOUT))?;
        stream.set_write_timeout(Some(TIMEOUT))?;
        let reader_stream = stream.try_clone()?;

        Ok(Self {
            writer: stream,
            reader: BufReader::new(reader_stream),
        })
    }

    /// Send one request and return the verified response
    pub fn request(&mut self, req: Request) -> Result<Response> {
        req.validate()
            .map_err(|e| QuadroError::daemon(format!("Request validation failed: {}", e)))?;

        let envelope = RequestEnvelope::new(req);
        let mut json = serde_json::to_vec(&envelope)?;
        json.push(b'\n');
        if json.len() > MAX_MESSAGE_SIZE {
            return Err(QuadroError::MessageTooLarge {
                size: json.len(),
                max_size: MAX_MESSAGE_SIZE,
            });
        }

        self.writer.write_all(&json).map_err(|e| {
            QuadroError::DaemonConnection(format!("Failed to send request: {}", e))
        })?;

        let mut response_buf: Vec<u8> = Vec::with_capacity(INITIAL_BUFFER_SIZE);
        self.reader
            .by_ref()
            .take(MAX_MESSAGE_SIZE as u64 + 1)
            .read_until(b'\n', &mut response_buf)
            .map_err(|e| QuadroError::DaemonConnection(format!("Failed to read response: {}", e)))?;

        if response_buf.is_empty() {
            return Err(QuadroError::DaemonConnection("Daemon closed connection".into()));
        }
        if response_buf.len() > MAX_MESSAGE_SIZE {
            return Err(QuadroError::MessageTooLarge {
                size: response_buf.len(),
                max_size: MAX_MESSAGE_SIZE,
            });
        }
        if response_buf.last() == Some(&b'\n') {
            response_buf.pop();
        }

        let response: ResponseEnvelope = serde_json::from_slice(&response_buf)?;
        if response.id != envelope.id {
            return Err(QuadroError::IpcProtocol(format!(
                "Response ID mismatch: expected {}, got {}",
                envelope.id, response.id
            )));
        }

        verify_response_type(&envelope.request, &response.response)?;
        Ok(response.response)
    }

    /// Send a request and unwrap its data, turning daemon errors into `QuadroError::Remote`
    fn request_data(&mut self, req: Request) -> Result<ResponseData> {
        match self.request(req)? {
            Response::Ok(data) => Ok(data),
            Response::Error { code, message } => Err(QuadroError::Remote {
                code: code.as_str().to_string(),
                message,
            }),
        }
    }

    pub fn ping(&mut self) -> Result<()> {
        self.request_data(Request::Ping).map(|_| ())
    }

    pub fn version(&mut self) -> Result<String> {
        self.request_data(Request::Version)?
            .value
            .ok_or_else(unexpected)
    }

    pub fn status(&mut self) -> Result<DeviceStatus> {
        self.request_data(Request::Status)?
            .device_status
            .ok_or_else(unexpected)
    }

    pub fn list_channels(&mut self) -> Result<Vec<ChannelInfo>> {
        self.request_data(Request::ListChannels)?
            .channels
            .ok_or_else(unexpected)
    }

    /// Staleness-gated channel value; a stale device is an error, never zero
    pub fn read_channel(&mut self, kind: SensorKind, index: u32) -> Result<i64> {
        self.request_data(Request::ReadChannel {
            kind: kind.hwmon_name().to_string(),
            index,
        })?
        .reading
        .ok_or_else(unexpected)
    }

    pub fn read_label(&mut self, kind: SensorKind, index: u32) -> Result<String> {
        self.request_data(Request::ReadLabel {
            kind: kind.hwmon_name().to_string(),
            index,
        })?
        .label
        .ok_or_else(unexpected)
    }

    pub fn read_attribute(&mut self, name: &str) -> Result<String> {
        self.request_data(Request::ReadAttribute { name: name.to_string() })?
            .value
            .ok_or_else(unexpected)
    }

    pub fn read_all(&mut self) -> Result<Vec<ChannelReading>> {
        self.request_data(Request::ReadAll)?
            .readings
            .ok_or_else(unexpected)
    }

    pub fn identity(&mut self) -> Result<IdentityInfo> {
        self.request_data(Request::Identity)?
            .identity
            .ok_or_else(unexpected)
    }
}

fn unexpected() -> QuadroError {
    QuadroError::IpcProtocol("Unexpected response type".into())
}

/// Check that an ok response carries the data the request asks for
fn verify_response_type(req: &Request, resp: &Response) -> Result<()> {
    let Response::Ok(data) = resp else {
        return Ok(());
    };

    let valid = match req {
        Request::Ping => true,
        Request::Version | Request::ReadAttribute { .. } => data.value.is_some(),
        Request::Status => data.device_status.is_some(),
        Request::ListChannels => data.channels.is_some(),
        Request::ReadChannel { .. } => data.reading.is_some(),
        Request::ReadLabel { .. } => data.label.is_some(),
        Request::ReadAll => data.readings.is_some(),
        Request::Identity => data.identity.is_some(),
    };

    if valid {
        Ok(())
    } else {
        Err(QuadroError::IpcProtocol(format!(
            "Response type mismatch: got {:?} for request {}",
            data,
            req.type_name()
        )))
    }
}

/// Whether the daemon socket exists
pub fn is_daemon_available(socket_path: &Path) -> bool {
    socket_path.exists()
}
