//! MASH gateway: main entry point.
//!
//! ```text
//!  ┌──────────────┐   ┌───────────────┐   ┌────────────────┐
//!  │ mash-link    │   │ main (control)│   │ mash-records   │
//!  │ serial I/O   │◀─▶│ tick @ 1 s    │──▶│ JSONL / log    │
//!  └──────────────┘   └───────────────┘   └────────────────┘
//!                        ▲        ▲
//!            mash-console┘        └mash-signals (SIGINT/SIGTERM)
//! ```
//!
//! Shutdown: stop ticking, queue OFF for every actuator, let the link
//! writer drain, then exit.

mod args;

use std::fs::{File, OpenOptions};
use std::io::{BufRead as _, BufWriter, Write as _};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context as _, Result, anyhow};
use clap::Parser as _;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, info, warn};

use mashctl::adapters::config_file::JsonConfigFile;
use mashctl::adapters::log_sink::LogEventSink;
use mashctl::adapters::record_sink::{ChannelRecordSink, RecordChannel};
use mashctl::adapters::serial::SerialTransport;
use mashctl::adapters::time::MonotonicClock;
use mashctl::app::ports::ConfigPort as _;
use mashctl::config::GatewayConfig;
use mashctl::gateway::console::{self, ConsoleCommand};
use mashctl::gateway::{Controller, GatewayLinks, io_task};
use mashctl::model::ActuatorId;

type ConsoleChannel = Channel<CriticalSectionRawMutex, ConsoleCommand, 8>;

const RECORD_POLL: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = args::Args::parse();
    info!("MASH gateway v{}", env!("CARGO_PKG_VERSION"));

    let config = JsonConfigFile::<GatewayConfig>::new(&args.config)
        .load()
        .map_err(|e| anyhow!("{}: {e}", args.config.display()))?;
    let transport = SerialTransport::open(&args.port, args.baud)
        .with_context(|| format!("opening {}", args.port))?;

    let clock = MonotonicClock::new();
    let links = Arc::new(GatewayLinks::new());
    let quit = Arc::new(AtomicBool::new(false));

    let io = io_task::spawn(transport, links.clone(), config.keepalive_interval_ms, clock)?;
    let records = Arc::new(RecordChannel::new());
    let drain = spawn_record_drain(records.clone(), links.clone(), args.records.clone())?;
    watch_signals(quit.clone())?;
    let commands = Arc::new(ConsoleChannel::new());
    if args.console {
        spawn_console(commands.clone())?;
    }

    let tick = Duration::from_millis(u64::from(config.tick_interval_ms));
    let mut controller = Controller::new(
        config,
        links.clone(),
        LogEventSink::new(),
        ChannelRecordSink::new(records),
    );

    // ── Control loop ──────────────────────────────────────────
    while !quit.load(Ordering::Acquire) && links.is_running() {
        let now = clock.now_ms();
        while let Ok(cmd) = commands.try_receive() {
            apply_console(&mut controller, cmd, now, &quit);
        }
        let report = controller.tick(now, Some(chrono::Local::now().time()));
        if report.full_resend {
            info!("Gateway: full actuator map resent ({} lines)", report.commands);
        }
        thread::sleep(tick);
    }

    // ── Graceful shutdown ─────────────────────────────────────
    warn!("Gateway: shutting down, turning all actuators off");
    controller.shutdown(clock.now_ms());
    links.stop();
    if io.join().is_err() {
        warn!("Gateway: link thread panicked");
    }
    if drain.join().is_err() {
        warn!("Gateway: record thread panicked");
    }
    info!(
        "Gateway: stopped ({} records dropped)",
        controller.records().dropped()
    );
    Ok(())
}

fn apply_console(
    controller: &mut Controller<LogEventSink, ChannelRecordSink>,
    cmd: ConsoleCommand,
    now_ms: u64,
    quit: &AtomicBool,
) {
    match cmd {
        ConsoleCommand::Set { actuator, on } => controller.set_manual(actuator, on, now_ms),
        ConsoleCommand::Release(actuator) => controller.release_manual(actuator),
        ConsoleCommand::Auto(enabled) => controller.set_auto_mode(enabled),
        ConsoleCommand::Status => {
            let snap = controller.links().state.snapshot();
            for id in ActuatorId::ALL {
                let desired = snap.desired[id.index()];
                let confirmed = match snap.confirmed[id.index()] {
                    Some(true) => "ON",
                    Some(false) => "OFF",
                    None => "?",
                };
                info!(
                    "STATUS | {id:<22} desired={:<3} ({}) node={confirmed}",
                    if desired.on { "ON" } else { "OFF" },
                    desired.provenance
                );
            }
            info!(
                "STATUS | link stale={} lines={} errors={} auto={}",
                snap.link.stale,
                snap.link.lines_in,
                snap.link.decode_errors,
                controller.auto_mode()
            );
        }
        ConsoleCommand::Quit => quit.store(true, Ordering::Release),
    }
}

// ── Worker threads ───────────────────────────────────────────

/// Persistence consumer: JSON lines to a file, or debug log lines.
fn spawn_record_drain(
    records: Arc<RecordChannel>,
    links: Arc<GatewayLinks>,
    path: Option<PathBuf>,
) -> Result<thread::JoinHandle<()>> {
    let mut out = match &path {
        Some(p) => {
            let file: File = OpenOptions::new()
                .create(true)
                .append(true)
                .open(p)
                .with_context(|| format!("opening {}", p.display()))?;
            info!("Records: appending to {}", p.display());
            Some(BufWriter::new(file))
        }
        None => None,
    };
    let handle = thread::Builder::new()
        .name("mash-records".into())
        .spawn(move || {
            loop {
                let mut idle = true;
                while let Ok(record) = records.try_receive() {
                    idle = false;
                    match out.as_mut() {
                        Some(w) => match serde_json::to_string(&record) {
                            Ok(line) => {
                                if let Err(e) = writeln!(w, "{line}") {
                                    warn!("Records: write failed ({e})");
                                }
                            }
                            Err(e) => warn!("Records: encode failed ({e})"),
                        },
                        None => debug!("RECORD | {record:?}"),
                    }
                }
                if let Some(w) = out.as_mut() {
                    let _ = w.flush();
                }
                if idle && !links.is_running() {
                    return;
                }
                thread::sleep(RECORD_POLL);
            }
        })?;
    Ok(handle)
}

fn spawn_console(commands: Arc<ConsoleChannel>) -> Result<()> {
    thread::Builder::new()
        .name("mash-console".into())
        .spawn(move || {
            info!("Console: on|off|release <ACTUATOR>, auto on|off, status, quit");
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { return };
                if line.trim().is_empty() {
                    continue;
                }
                match console::parse(&line) {
                    Ok(cmd) => {
                        if commands.try_send(cmd).is_err() {
                            warn!("Console: busy, command dropped");
                        }
                    }
                    Err(e) => warn!("Console: {e}"),
                }
            }
        })?;
    Ok(())
}

/// SIGINT/SIGTERM set `quit`; the control loop does the rest.
fn watch_signals(quit: Arc<AtomicBool>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    thread::Builder::new()
        .name("mash-signals".into())
        .spawn(move || {
            let reason = runtime.block_on(wait_for_signal());
            warn!("Gateway: {reason} received");
            quit.store(true, Ordering::Release);
        })?;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => tokio::select! {
            _ = ctrl_c => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        },
        Err(_) => {
            let _ = ctrl_c.await;
            "SIGINT"
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "Ctrl-C"
}
