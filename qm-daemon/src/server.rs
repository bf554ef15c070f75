//! Unix Socket Server
//!
//! Serves the read-only telemetry API over newline-delimited JSON.
//!
//! # Limits
//! - **Connections**: at most `MAX_CONNECTIONS` concurrent clients
//! - **Messages**: requests over `MAX_MESSAGE_SIZE` are rejected before buffering
//! - **Timeouts**: idle clients are dropped after `READ_TIMEOUT`
//! - **Audit**: peer UID/PID is logged for every connection
//!
//! Nothing here writes to the device; every request is a read of
//! [`DeviceState`](qm_core::DeviceState) or of the static channel table.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use qm_core::{registry, QuadroError, SensorKind, TransportStatus, UpdateDriver};
use qm_protocol::{
    DeviceStatus, ErrorCode, Request, RequestEnvelope, Response, ResponseData, ResponseEnvelope,
};

// ============================================================================
// Limits
// ============================================================================

/// Maximum concurrent client connections
const MAX_CONNECTIONS: usize = 32;

const MAX_MESSAGE_SIZE: usize = qm_protocol::MAX_MESSAGE_SIZE;

/// Read timeout per message
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Write timeout per message
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// How often the accept loop checks the shutdown flag
const SHUTDOWN_POLL: Duration = Duration::from_millis(250);

/// World-readable: every request is read-only
const SOCKET_MODE: u32 = 0o666;

static ACTIVE_CONNECTIONS: AtomicUsize = AtomicUsize::new(0);

/// One counted client connection; released when dropped, including on panic
struct ConnectionSlot(&'static AtomicUsize);

impl ConnectionSlot {
    fn acquire(counter: &'static AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Everything a request handler can read
pub struct ServerContext {
    pub driver: Arc<UpdateDriver>,
    pub transport: Arc<TransportStatus>,
}

// ============================================================================
// Server
// ============================================================================

/// Accept clients until `shutdown` is set
pub async fn run_server(
    socket_path: &Path,
    ctx: Arc<ServerContext>,
    shutdown: Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error>> {
    if socket_path.exists() {
        let metadata = socket_path.symlink_metadata()?;
        if metadata.file_type().is_symlink() {
            return Err("Socket path is a symlink - refusing to replace it".into());
        }
        std::fs::remove_file(socket_path)?;
        debug!("Removed existing socket file");
    }

    let listener = UnixListener::bind(socket_path)?;
    std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(SOCKET_MODE))?;

    info!("Listening on {} (mode {:o})", socket_path.display(), SOCKET_MODE);
    info!("Limits: max_conn={}, max_msg={}", MAX_CONNECTIONS, MAX_MESSAGE_SIZE);

    let mut ticker = tokio::time::interval(SHUTDOWN_POLL);
    let mut accepted: u64 = 0;

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let current = ACTIVE_CONNECTIONS.load(Ordering::SeqCst);
                        if current >= MAX_CONNECTIONS {
                            warn!("Connection limit reached ({}), rejecting new connection", current);
                            drop(stream);
                            continue;
                        }

                        let slot = ConnectionSlot::acquire(&ACTIVE_CONNECTIONS);
                        accepted += 1;
                        let ctx = ctx.clone();
                        tokio::spawn(async move {
                            let _slot = slot;
                            handle_client(stream, ctx).await;
                        });
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                }
            }
            _ = ticker.tick() => {
                if shutdown.load(Ordering::SeqCst) {
                    info!("Shutdown requested");
                    break;
                }
            }
        }
    }

    info!("Server stopped ({} connections served)", accepted);
    Ok(())
}

/// Client credentials from Unix socket peer
#[derive(Debug, Clone, Copy, Default)]
struct PeerCredentials {
    uid: u32,
    pid: i32,
}

async fn handle_client(stream: UnixStream, ctx: Arc<ServerContext>) {
    let cred = get_peer_credentials(&stream).unwrap_or_default();
    debug!("Connection from uid={}, pid={}", cred.uid, cred.pid);

    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line: Vec<u8> = Vec::with_capacity(MAX_MESSAGE_SIZE);
    let mut request_count: u64 = 0;
    let connection_start = Instant::now();

    loop {
        let read_result = timeout(
            READ_TIMEOUT,
            read_line_bounded(&mut reader, &mut line, MAX_MESSAGE_SIZE),
        )
        .await;

        match read_result {
            Ok(Ok(0)) => {
                debug!(
                    "Client disconnected: uid={}, pid={}, requests={}, duration={:?}",
                    cred.uid,
                    cred.pid,
                    request_count,
                    connection_start.elapsed()
                );
                break;
            }
            Ok(Ok(n)) => {
                request_count += 1;
                trace!("Request #{} from uid={}: {} bytes", request_count, cred.uid, n);

                let response = match std::str::from_utf8(&line) {
                    Ok(text) => process_request(text, &ctx, Instant::now()),
                    Err(_) => invalid(0, "Invalid request encoding"),
                };
                if send_response(&mut writer, &response).await.is_err() {
                    break;
                }
            }
            Ok(Err(e)) => {
                if e.kind() == std::io::ErrorKind::InvalidData {
                    warn!("Message too large (>{} bytes) from uid={}", MAX_MESSAGE_SIZE, cred.uid);
                    let _ = send_response(&mut writer, &invalid(0, "Message too large")).await;
                } else {
                    error!("Read error from uid={}: {}", cred.uid, e);
                }
                break;
            }
            Err(_) => {
                debug!("Read timeout for uid={}, pid={}", cred.uid, cred.pid);
                break;
            }
        }
    }
}

/// Read one `\n`-terminated line without ever buffering more than `max_len` bytes
async fn read_line_bounded<R: tokio::io::AsyncBufRead + Unpin>(
    reader: &mut R,
    out: &mut Vec<u8>,
    max_len: usize,
) -> std::io::Result<usize> {
    out.clear();

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(out.len());
        }

        let (take_len, found_newline) = match available.iter().position(|b| *b == b'\n') {
            Some(pos) => (pos + 1, true),
            None => (available.len(), false),
        };

        let remaining = max_len.saturating_sub(out.len());
        if take_len > remaining {
            let consume_len = remaining.min(available.len());
            reader.consume(consume_len);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "Message too large",
            ));
        }

        out.extend_from_slice(&available[..take_len]);
        reader.consume(take_len);

        if found_newline {
            return Ok(out.len());
        }
    }
}

async fn send_response(
    writer: &mut tokio::net::unix::OwnedWriteHalf,
    response: &ResponseEnvelope,
) -> Result<(), ()> {
    let json = serde_json::to_string(response).unwrap_or_else(|_| {
        r#"{"id":0,"status":"error","code":"internal","message":"Serialization error"}"#.to_string()
    });

    let write_result = timeout(WRITE_TIMEOUT, async {
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        Ok::<_, std::io::Error>(())
    })
    .await;

    match write_result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            debug!("Write error: {}", e);
            Err(())
        }
        Err(_) => {
            warn!("Write timeout");
            Err(())
        }
    }
}

/// Get peer credentials (uid, pid) from the Unix socket
fn get_peer_credentials(stream: &UnixStream) -> Option<PeerCredentials> {
    use std::os::unix::io::AsRawFd;

    let fd = stream.as_raw_fd();

    // SAFETY: ucred is a plain C struct; all-zero is a valid value.
    let mut cred: libc::ucred = unsafe { std::mem::zeroed() };
    let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;

    // SAFETY: fd is a live socket owned by `stream`, and cred/len describe a
    // correctly sized writable buffer for SO_PEERCRED.
    let result = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_PEERCRED,
            &mut cred as *mut _ as *mut libc::c_void,
            &mut len,
        )
    };

    (result == 0).then_some(PeerCredentials {
        uid: cred.uid,
        pid: cred.pid,
    })
}

// ============================================================================
// Request Handling
// ============================================================================

fn invalid(id: u64, message: &str) -> ResponseEnvelope {
    ResponseEnvelope::new(id, Response::error(ErrorCode::InvalidRequest, message))
}

/// Map a core error onto the protocol, keeping stale and missing-channel distinct
fn error_response(e: &QuadroError) -> Response {
    let code = if e.is_stale() {
        ErrorCode::Stale
    } else if e.is_channel_not_found() {
        ErrorCode::ChannelNotFound
    } else {
        ErrorCode::Internal
    };
    Response::error(code, e.to_string())
}

fn respond<T>(result: qm_core::Result<T>, ok: impl FnOnce(T) -> Response) -> Response {
    match result {
        Ok(value) => ok(value),
        Err(e) => error_response(&e),
    }
}

/// Parse, validate and answer one request line
fn process_request(line: &str, ctx: &ServerContext, now: Instant) -> ResponseEnvelope {
    let envelope: RequestEnvelope = match serde_json::from_str(line.trim()) {
        Ok(e) => e,
        Err(e) => {
            debug!("Invalid JSON: {}", e);
            return invalid(0, "Invalid request format");
        }
    };

    let request_id = envelope.id;
    let request = envelope.request;

    if let Err(e) = request.validate() {
        warn!("Request validation failed: {}", e);
        return invalid(request_id, &e);
    }

    let request_type = request.type_name();
    trace!("Processing {} (id={})", request_type, request_id);

    let state = ctx.driver.state();
    let response = match request {
        Request::Ping => Response::ok_string("pong"),

        Request::Version => Response::ok_string(env!("CARGO_PKG_VERSION")),

        Request::Status => Response::Ok(ResponseData::status(device_status(ctx, now))),

        Request::ListChannels => Response::Ok(ResponseData::channel_list(
            registry::channels().map(|c| c.to_info()).collect(),
        )),

        Request::ReadChannel { kind, index } => respond(
            kind.parse::<SensorKind>()
                .and_then(|kind| state.read(kind, index as usize, now)),
            Response::ok_reading,
        ),

        Request::ReadLabel { kind, index } => respond(
            kind.parse::<SensorKind>()
                .and_then(|kind| state.read_label(kind, index as usize)),
            Response::ok_label,
        ),

        Request::ReadAttribute { name } => {
            respond(state.read_attribute(&name, now), Response::ok_string)
        }

        Request::ReadAll => respond(state.read_all(now), |readings| {
            Response::Ok(ResponseData::all_readings(
                readings.iter().map(|r| r.to_protocol()).collect(),
            ))
        }),

        Request::Identity => Response::Ok(ResponseData::identity(state.identity().to_info())),
    };

    if let Response::Error { code, ref message } = response {
        debug!("Request {} (id={}) failed [{:?}]: {}", request_type, request_id, code, message);
    }

    ResponseEnvelope::new(request_id, response)
}

fn device_status(ctx: &ServerContext, now: Instant) -> DeviceStatus {
    let state = ctx.driver.state();
    let counters = ctx.driver.counters();
    DeviceStatus {
        device: ctx.transport.device(),
        fresh: state.is_fresh(now),
        age_ms: state.age(now).map(|age| age.as_millis() as u64),
        freshness_window_ms: state.freshness_window().as_millis() as u64,
        reports_decoded: counters.decoded,
        reports_ignored: counters.ignored,
        decode_errors: counters.decode_errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qm_core::{DeviceState, RawReportBuilder};

    fn context() -> ServerContext {
        ServerContext {
            driver: Arc::new(UpdateDriver::new(Arc::new(DeviceState::new()))),
            transport: Arc::new(TransportStatus::new()),
        }
    }

    fn call(ctx: &ServerContext, request: Request, now: Instant) -> Response {
        let line = serde_json::to_string(&RequestEnvelope::with_id(request, 42)).unwrap();
        let envelope = process_request(&line, ctx, now);
        assert_eq!(envelope.id, 42);
        envelope.response
    }

    fn error_code(response: Response) -> ErrorCode {
        match response {
            Response::Error { code, .. } => code,
            Response::Ok(data) => panic!("expected error, got {:?}", data),
        }
    }

    #[test]
    fn test_read_before_first_report_is_stale() {
        let ctx = context();
        let response = call(
            &ctx,
            Request::ReadChannel { kind: "temp".into(), index: 0 },
            Instant::now(),
        );
        assert_eq!(error_code(response), ErrorCode::Stale);
    }

    #[test]
    fn test_read_after_report() {
        let ctx = context();
        let t = Instant::now();
        ctx.driver
            .on_report_at(&RawReportBuilder::new().fan_speed(1, 1500).build(), t);

        match call(&ctx, Request::ReadChannel { kind: "fan".into(), index: 2 }, t) {
            Response::Ok(data) => assert_eq!(data.reading, Some(1500)),
            other => panic!("unexpected {:?}", other),
        }
        match call(&ctx, Request::ReadAttribute { name: "fan3_input".into() }, t) {
            Response::Ok(data) => assert_eq!(data.value.as_deref(), Some("1500")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_channel_and_kind() {
        let ctx = context();
        let now = Instant::now();
        let response = call(&ctx, Request::ReadChannel { kind: "curr".into(), index: 4 }, now);
        assert_eq!(error_code(response), ErrorCode::ChannelNotFound);

        let response = call(&ctx, Request::ReadLabel { kind: "pwm".into(), index: 0 }, now);
        assert_eq!(error_code(response), ErrorCode::ChannelNotFound);
    }

    #[test]
    fn test_labels_are_served_while_stale() {
        let ctx = context();
        match call(&ctx, Request::ReadLabel { kind: "in".into(), index: 0 }, Instant::now()) {
            Response::Ok(data) => assert_eq!(data.label.as_deref(), Some("VCC")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_list_channels() {
        let ctx = context();
        match call(&ctx, Request::ListChannels, Instant::now()) {
            Response::Ok(data) => {
                let channels = data.channels.unwrap();
                assert_eq!(channels.len(), 22);
                assert_eq!(channels[0].input_attribute, "temp1_input");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_status_reports_counters() {
        let ctx = context();
        let t = Instant::now();
        ctx.driver.on_report_at(&RawReportBuilder::new().build(), t);
        ctx.driver.on_report_at(&[0x01, 0x02], t);

        match call(&ctx, Request::Status, t + Duration::from_millis(250)) {
            Response::Ok(data) => {
                let status = data.device_status.unwrap();
                assert!(status.fresh);
                assert_eq!(status.age_ms, Some(250));
                assert_eq!(status.reports_decoded, 1);
                assert_eq!(status.decode_errors, 1);
                assert_eq!(status.freshness_window_ms, 2000);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_invalid_json_and_validation() {
        let ctx = context();
        let envelope = process_request("not json", &ctx, Instant::now());
        assert_eq!(envelope.id, 0);
        assert_eq!(error_code(envelope.response), ErrorCode::InvalidRequest);

        let response = call(&ctx, Request::ReadAttribute { name: "../x".into() }, Instant::now());
        assert_eq!(error_code(response), ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn test_connection_slot_released_when_task_panics() {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);

        let slot = ConnectionSlot::acquire(&COUNTER);
        assert_eq!(COUNTER.load(Ordering::SeqCst), 1);

        let handle = tokio::spawn(async move {
            let _slot = slot;
            panic!("client handler failed");
        });
        assert!(handle.await.unwrap_err().is_panic());
        assert_eq!(COUNTER.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_read_line_bounded() {
        let mut reader = BufReader::new(&b"{\"id\":1}\nrest"[..]);
        let mut out = Vec::new();
        assert_eq!(read_line_bounded(&mut reader, &mut out, 64).await.unwrap(), 9);
        assert_eq!(out, b"{\"id\":1}\n");

        let mut reader = BufReader::new(&[b'a'; 100][..]);
        let err = read_line_bounded(&mut reader, &mut out, 16).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
