//! Report transport
//!
//! Delivers raw reports to the [`UpdateDriver`], one `on_report` call per
//! report, from a single thread. The transport never looks inside a report.
//!
//! A failed read closes the source; the loop waits `reconnect_delay` and
//! opens it again, so unplugging and replugging the device is survivable.

use parking_lot::RwLock;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::constants::transport::{ERROR_LOG_EVERY, REPORT_BUFFER_SIZE};
use crate::driver::UpdateDriver;
use crate::error::{QuadroError, Result};

/// Granularity of shutdown checks while waiting to reconnect
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// Something that yields one raw report per call
pub trait ReportSource: Send {
    /// Block until the next report is available and copy it into `buf`.
    /// Returns the report length.
    fn next_report(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Human-readable origin for logs and status
    fn describe(&self) -> String;
}

/// A `/dev/hidrawN` node; each `read` returns exactly one report
pub struct HidrawSource {
    path: PathBuf,
    file: File,
}

impl HidrawSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| QuadroError::DeviceOpen {
            path: path.to_path_buf(),
            source: e,
        })?;
        info!("Opened {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }
}

impl ReportSource for HidrawSource {
    fn next_report(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.file.read(buf) {
                Ok(0) => {
                    return Err(QuadroError::Io(std::io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "hidraw device closed",
                    )))
                }
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Which source the transport is currently reading, for status queries
#[derive(Debug, Default)]
pub struct TransportStatus {
    device: RwLock<Option<String>>,
}

impl TransportStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device(&self) -> Option<String> {
        self.device.read().clone()
    }

    fn set_device(&self, device: Option<String>) {
        *self.device.write() = device;
    }
}

/// Read reports until `shutdown` is set, reopening the source on failure.
///
/// `open` is called for the first connection and after every transport error.
/// A blocking read only notices `shutdown` once the next report arrives.
pub fn run_transport<F>(
    mut open: F,
    driver: &UpdateDriver,
    status: &TransportStatus,
    shutdown: &AtomicBool,
    reconnect_delay: Duration,
) where
    F: FnMut() -> Result<Box<dyn ReportSource>>,
{
    let mut buf = vec![0u8; REPORT_BUFFER_SIZE];
    let mut open_failures: u64 = 0;

    while !shutdown.load(Ordering::SeqCst) {
        let mut source = match open() {
            Ok(source) => {
                open_failures = 0;
                source
            }
            Err(e) => {
                open_failures += 1;
                if open_failures == 1 || open_failures % ERROR_LOG_EVERY == 0 {
                    warn!(attempts = open_failures, "Cannot open report source: {}", e);
                }
                sleep_unless_shutdown(reconnect_delay, shutdown);
                continue;
            }
        };

        let name = source.describe();
        info!("Reading reports from {}", name);
        status.set_device(Some(name.clone()));

        while !shutdown.load(Ordering::SeqCst) {
            match source.next_report(&mut buf) {
                Ok(len) => driver.on_report(&buf[..len]),
                Err(e) => {
                    warn!("Report source {} failed: {}", name, e);
                    break;
                }
            }
        }

        status.set_device(None);
        if !shutdown.load(Ordering::SeqCst) {
            sleep_unless_shutdown(reconnect_delay, shutdown);
        }
    }

    debug!("Transport loop stopped");
}

fn sleep_unless_shutdown(delay: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + delay;
    while !shutdown.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep(SHUTDOWN_POLL.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SensorKind;
    use crate::report::RawReportBuilder;
    use crate::state::DeviceState;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Replays canned reports, then fails; sets `shutdown` when its queue drains
    struct Replay {
        reports: VecDeque<Vec<u8>>,
        shutdown: Arc<AtomicBool>,
    }

    impl ReportSource for Replay {
        fn next_report(&mut self, buf: &mut [u8]) -> Result<usize> {
            match self.reports.pop_front() {
                Some(report) => {
                    buf[..report.len()].copy_from_slice(&report);
                    Ok(report.len())
                }
                None => {
                    self.shutdown.store(true, Ordering::SeqCst);
                    Err(QuadroError::generic("replay exhausted"))
                }
            }
        }

        fn describe(&self) -> String {
            "replay".to_string()
        }
    }

    #[test]
    fn test_reports_flow_into_state() {
        let state = Arc::new(DeviceState::new());
        let driver = UpdateDriver::new(state.clone());
        let status = TransportStatus::new();
        let shutdown = Arc::new(AtomicBool::new(false));

        let reports = VecDeque::from(vec![
            RawReportBuilder::new().temperature(0, 100).build(),
            RawReportBuilder::new().report_id(0x02).build(),
            vec![0x01, 0x00, 0x00],
            RawReportBuilder::new().temperature(0, 300).build(),
        ]);
        let mut replay = Some(Replay { reports, shutdown: shutdown.clone() });

        run_transport(
            || {
                replay
                    .take()
                    .map(|r| Box::new(r) as Box<dyn ReportSource>)
                    .ok_or_else(|| QuadroError::generic("already opened"))
            },
            &driver,
            &status,
            &shutdown,
            Duration::from_millis(1),
        );

        assert_eq!(state.read(SensorKind::Temperature, 0, Instant::now()).unwrap(), 3000);
        let counters = driver.counters();
        assert_eq!(counters.decoded, 2);
        assert_eq!(counters.ignored, 1);
        assert_eq!(counters.decode_errors, 1);
        assert_eq!(status.device(), None);
    }

    #[test]
    fn test_open_failures_retry_until_shutdown() {
        let driver = UpdateDriver::new(Arc::new(DeviceState::new()));
        let status = TransportStatus::new();
        let shutdown = AtomicBool::new(false);
        let mut attempts = 0;

        run_transport(
            || {
                attempts += 1;
                if attempts == 3 {
                    shutdown.store(true, Ordering::SeqCst);
                }
                Err(QuadroError::DeviceNotFound("none".into()))
            },
            &driver,
            &status,
            &shutdown,
            Duration::from_millis(1),
        );

        assert_eq!(attempts, 3);
        assert_eq!(driver.counters().decoded, 0);
    }

    /// Yields one report, then fails like an unplugged device
    struct OneShot {
        report: Option<Vec<u8>>,
    }

    impl ReportSource for OneShot {
        fn next_report(&mut self, buf: &mut [u8]) -> Result<usize> {
            let report = self
                .report
                .take()
                .ok_or_else(|| QuadroError::generic("device unplugged"))?;
            buf[..report.len()].copy_from_slice(&report);
            Ok(report.len())
        }

        fn describe(&self) -> String {
            "one-shot".to_string()
        }
    }

    #[test]
    fn test_read_failure_reopens_source() {
        let state = Arc::new(DeviceState::new());
        let driver = UpdateDriver::new(state.clone());
        let status = TransportStatus::new();
        let shutdown = AtomicBool::new(false);
        let mut opens = 0;

        run_transport(
            || {
                opens += 1;
                match opens {
                    1 => Ok(Box::new(OneShot {
                        report: Some(RawReportBuilder::new().temperature(0, 100).build()),
                    }) as Box<dyn ReportSource>),
                    2 => Ok(Box::new(OneShot {
                        report: Some(RawReportBuilder::new().temperature(0, 200).build()),
                    }) as Box<dyn ReportSource>),
                    _ => {
                        shutdown.store(true, Ordering::SeqCst);
                        Err(QuadroError::DeviceNotFound("gone".into()))
                    }
                }
            },
            &driver,
            &status,
            &shutdown,
            Duration::from_millis(1),
        );

        assert_eq!(opens, 3);
        assert_eq!(driver.counters().decoded, 2);
        assert_eq!(state.read(SensorKind::Temperature, 0, Instant::now()).unwrap(), 2000);
    }

    #[test]
    fn test_zero_length_read_is_disconnect() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut source = HidrawSource::open(file.path()).unwrap();
        let mut buf = [0u8; 64];

        match source.next_report(&mut buf) {
            Err(QuadroError::Io(e)) => assert_eq!(e.kind(), ErrorKind::UnexpectedEof),
            other => panic!("expected EOF error, got {:?}", other),
        }
        assert_eq!(source.describe(), file.path().display().to_string());
    }

    #[test]
    fn test_hidraw_open_missing_node() {
        let err = HidrawSource::open(Path::new("/nonexistent/hidraw99")).err().unwrap();
        assert!(matches!(err, QuadroError::DeviceOpen { .. }));
    }
}
