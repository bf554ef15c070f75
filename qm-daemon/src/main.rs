//! Quadromon Daemon (quadromond)
//!
//! Reads status reports from an Aquacomputer Quadro over hidraw and serves the
//! decoded telemetry to unprivileged clients over a Unix domain socket.
//!
//! # Threads
//! - **Transport**: one blocking std thread reading reports and feeding the
//!   update driver; reopens the device after errors
//! - **Server**: single-threaded Tokio runtime answering read-only requests
//!
//! The device is never written to.

mod server;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use qm_core::{
    find_quadro_device, run_transport, DeviceState, HidrawSource, ReportSource, Settings,
    SimulatedSource, TransportStatus, UpdateDriver,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable holding the tracing filter
const LOG_ENV: &str = "QUADROMON_LOG";

// ============================================================================
// CLI
// ============================================================================

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    device: Option<PathBuf>,
    socket: Option<PathBuf>,
    simulate: bool,
}

fn print_help() {
    eprintln!("quadromond {} - Aquacomputer Quadro telemetry daemon", VERSION);
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    quadromond [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -c, --config PATH   Settings file (default: /etc/quadromon/settings.json)");
    eprintln!("    -d, --device PATH   hidraw node (default: discovered by USB id)");
    eprintln!("    -s, --socket PATH   Socket path (default: /run/quadromon.sock)");
    eprintln!("        --simulate      Serve a simulated device instead of hardware");
    eprintln!("    -v, --version       Print version");
    eprintln!("    -h, --help          Print this help");
    eprintln!();
    eprintln!("ENVIRONMENT:");
    eprintln!("    {}       Log filter (trace, debug, info, warn, error)", LOG_ENV);
}

fn print_version() {
    println!("quadromond {}", VERSION);
}

/// `Ok(None)` means help or version was printed and the process should exit
fn parse_args(args: &[String]) -> Result<Option<Args>, String> {
    let mut parsed = Args::default();
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .map(PathBuf::from)
                .ok_or_else(|| format!("{} requires a path argument", flag))
        };

        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                return Ok(None);
            }
            "-v" | "--version" => {
                print_version();
                return Ok(None);
            }
            "-c" | "--config" => parsed.config = Some(value("--config")?),
            "-d" | "--device" => parsed.device = Some(value("--device")?),
            "-s" | "--socket" => parsed.socket = Some(value("--socket")?),
            "--simulate" => parsed.simulate = true,
            other => return Err(format!("Unknown argument: {}", other)),
        }
    }

    Ok(Some(parsed))
}

// ============================================================================
// Logging
// ============================================================================

/// Journald when available, stdout otherwise. Returns whether journald is used.
fn init_logging(filter: &str) -> bool {
    if Path::new("/run/systemd/journal/socket").exists() {
        match tracing_journald::layer() {
            Ok(journald_layer) => {
                use tracing_subscriber::prelude::*;
                tracing_subscriber::registry()
                    .with(journald_layer)
                    .with(tracing_subscriber::EnvFilter::new(filter))
                    .init();
                return true;
            }
            Err(e) => {
                eprintln!("Failed to create journald layer: {}, falling back to stdout", e);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(filter)
        .init();
    false
}

// ============================================================================
// Transport
// ============================================================================

fn open_source(device: Option<&Path>, simulate: bool) -> qm_core::Result<Box<dyn ReportSource>> {
    if simulate {
        return Ok(Box::new(SimulatedSource::default()));
    }

    let node = match device {
        Some(node) => node.to_path_buf(),
        None => find_quadro_device()?.node,
    };
    Ok(Box::new(HidrawSource::open(&node)?))
}

fn cleanup(socket_path: &Path) {
    if socket_path.exists() {
        if let Err(e) = std::fs::remove_file(socket_path) {
            warn!("Failed to remove socket: {}", e);
        }
    }
    debug!("Cleanup complete");
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let raw_args: Vec<String> = std::env::args().collect();
    let args = match parse_args(&raw_args) {
        Ok(Some(args)) => args,
        Ok(None) => return Ok(()),
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(device) = args.device {
        settings.device = Some(device);
    }
    if let Some(socket) = args.socket {
        settings.socket_path = socket;
    }
    settings.validate()?;

    let log_filter = std::env::var(LOG_ENV)
        .ok()
        .or_else(|| settings.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    let use_journald = init_logging(&log_filter);

    info!("STARTUP: quadromond {} starting", VERSION);
    info!("STARTUP: Logging to {}", if use_journald { "systemd journal" } else { "stdout" });
    info!("STARTUP: Socket path: {}", settings.socket_path.display());
    info!("STARTUP: Freshness window: {:?}", settings.freshness_window());
    match (&settings.device, args.simulate) {
        (_, true) => info!("STARTUP: Using simulated device"),
        (Some(device), false) => info!("STARTUP: Device: {}", device.display()),
        (None, false) => info!("STARTUP: Device: discovered by USB id"),
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            info!("SIGNAL: Received SIGINT/SIGTERM - initiating shutdown");
            shutdown.store(true, Ordering::SeqCst);
        }) {
            warn!("Failed to set signal handler: {}", e);
        }
    }

    let state = Arc::new(DeviceState::with_freshness_window(settings.freshness_window()));
    let driver = Arc::new(UpdateDriver::new(state));
    let transport_status = Arc::new(TransportStatus::new());

    {
        let driver = driver.clone();
        let status = transport_status.clone();
        let shutdown = shutdown.clone();
        let device = settings.device.clone();
        let simulate = args.simulate;
        let reconnect_delay = settings.reconnect_delay();

        // Not joined on exit: a blocking hidraw read only returns with the next report
        std::thread::Builder::new()
            .name("quadro-transport".into())
            .spawn(move || {
                run_transport(
                    || open_source(device.as_deref(), simulate),
                    &driver,
                    &status,
                    &shutdown,
                    reconnect_delay,
                )
            })?;
    }
    info!("Transport thread started");

    let ctx = Arc::new(server::ServerContext {
        driver,
        transport: transport_status,
    });
    let result = server::run_server(&settings.socket_path, ctx, shutdown.clone()).await;

    shutdown.store(true, Ordering::SeqCst);
    cleanup(&settings.socket_path);

    if let Err(e) = result {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("SHUTDOWN: Daemon terminated gracefully");
    Ok(())
}
