//! Serial link unit: the only code that touches the port.
//!
//! Runs in a dedicated thread using `edge-executor` for cooperative
//! scheduling and `async-io-mini` timers for pacing.  Three tasks:
//!
//! 1. **Read**: polls the transport every 10 ms, frames lines, decodes
//!    them and hands frames to the control thread
//! 2. **Write**: wakes on the outbound channel and writes lines in FIFO
//!    order; on stop it drains the queue and returns
//! 3. **Keepalive**: queues `{"keepalive":true}` on a fixed cadence
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────────┐
//!  │  link thread                                             │
//!  │  ┌────────────────────────────────────────────────────┐  │
//!  │  │  futures_lite::future::block_on                    │  │
//!  │  │  ┌──────────────────────────────────────────────┐  │  │
//!  │  │  │  edge_executor::LocalExecutor                │  │  │
//!  │  │  │  ┌────────┐  ┌──────────────┐  ┌──────────┐  │  │  │
//!  │  │  │  │ Read   │  │ Write (run)  │  │ Keepalive│  │  │  │
//!  │  │  │  │ 10ms ⏱ │  │ wake-on-send │  │ 2s ⏱     │  │  │  │
//!  │  │  │  └────────┘  └──────────────┘  └──────────┘  │  │  │
//!  │  │  └──────────────────────────────────────────────┘  │  │
//!  │  └────────────────────────────────────────────────────┘  │
//!  └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The thread exits once the write task has drained after
//! [`GatewayLinks::stop`]; the other two tasks are dropped with the
//! executor.

use core::cell::RefCell;
use core::time::Duration;
use std::rc::Rc;
use std::sync::Arc;

use log::{debug, error, info, warn};

use super::channels::GatewayLinks;
use crate::adapters::time::MonotonicClock;
use crate::error::LinkError;
use crate::protocol::frames::{self, DownlinkFrame, UplinkFrame};
use crate::protocol::line::{LineDecoder, LineEvent};
use crate::protocol::transport::Transport;

/// Gateway lines may carry two full room objects; leave headroom.
pub const GATEWAY_LINE_LEN: usize = 512;

const READ_POLL: Duration = Duration::from_millis(10);
const WRITE_POLL: Duration = Duration::from_millis(50);

/// Consecutive read errors (about a second of polling) before the link
/// is declared gone.
const MAX_READ_FAILURES: u32 = 100;

type Shared<T> = Rc<RefCell<T>>;

// ── Inbound ──────────────────────────────────────────────────

/// Book-keep and decode one complete line.
pub fn handle_line(line: &[u8], now_ms: u64, links: &GatewayLinks) {
    links.state.with(|s| {
        s.link.last_inbound_ms = Some(now_ms);
        s.link.lines_in = s.link.lines_in.wrapping_add(1);
    });

    // Node boot banners and log echoes are plain text.
    if line.first() == Some(&b'[') {
        debug!("Node: {}", String::from_utf8_lossy(line));
        return;
    }

    match frames::decode_uplink(line) {
        Ok(frame) => {
            if frame == UplinkFrame::Recovered {
                links.state.with(|s| s.link.resync_pending = true);
            }
            if links.inbound.try_send(frame).is_err() {
                warn!("Link: inbound queue full, frame dropped");
            }
        }
        Err(e) => {
            links.state.with(|s| s.link.decode_errors = s.link.decode_errors.wrapping_add(1));
            warn!("Link: discarded line ({e}): {}", String::from_utf8_lossy(line));
        }
    }
}

async fn read_loop<T: Transport>(transport: Shared<T>, links: Arc<GatewayLinks>, clock: MonotonicClock) {
    let mut decoder = LineDecoder::<GATEWAY_LINE_LEN>::new();
    let mut buf = [0u8; 256];
    let mut failures = 0u32;

    while links.is_running() {
        let read = transport.borrow_mut().read(&mut buf);
        match read {
            Ok(n) => {
                failures = 0;
                let now = clock.now_ms();
                for &byte in &buf[..n] {
                    match decoder.push(byte) {
                        None => {}
                        Some(LineEvent::Line(line)) => handle_line(line, now, &links),
                        Some(LineEvent::Overflow) => {
                            links.state.with(|s| {
                                s.link.decode_errors = s.link.decode_errors.wrapping_add(1)
                            });
                            warn!("Link: overlong line discarded");
                        }
                    }
                }
            }
            Err(e) => {
                failures += 1;
                if failures == 1 {
                    warn!("Link: {} ({e:?})", LinkError::ReadFailed);
                }
                if failures >= MAX_READ_FAILURES {
                    error!("Link: {} {failures} times, stopping", LinkError::ReadFailed);
                    links.stop();
                    return;
                }
            }
        }
        async_io_mini::Timer::after(READ_POLL).await;
    }
}

// ── Outbound ─────────────────────────────────────────────────

fn write_line<T: Transport>(transport: &Shared<T>, line: &str) {
    if let Err(e) = transport.borrow_mut().write_all(line.as_bytes()) {
        warn!("Link: {e}, dropped {}", line.trim_end());
    } else {
        debug!("Link: -> {}", line.trim_end());
    }
}

/// Writes queued lines until stopped, then drains and returns.
async fn write_loop<T: Transport>(transport: Shared<T>, links: Arc<GatewayLinks>) {
    loop {
        let next = futures_lite::future::or(async { Some(links.outbound.receive().await) }, async {
            async_io_mini::Timer::after(WRITE_POLL).await;
            None
        })
        .await;

        match next {
            Some(line) => write_line(&transport, &line),
            None if !links.is_running() => {
                while let Ok(line) = links.outbound.try_receive() {
                    write_line(&transport, &line);
                }
                info!("Link: writer drained");
                return;
            }
            None => {}
        }
    }
}

async fn keepalive_loop(links: Arc<GatewayLinks>, interval: Duration) {
    let line = match frames::encode_downlink(&DownlinkFrame::Keepalive) {
        Ok(line) => line,
        Err(e) => {
            error!("Link: keepalive encoding failed ({e})");
            return;
        }
    };
    while links.is_running() {
        async_io_mini::Timer::after(interval).await;
        if links.outbound.try_send(line.clone()).is_err() {
            warn!("Link: outbound queue full, keepalive skipped");
        }
    }
}

// ── Thread ───────────────────────────────────────────────────

fn run_io_loop<T: Transport>(
    transport: T,
    links: Arc<GatewayLinks>,
    keepalive: Duration,
    clock: MonotonicClock,
) {
    let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();
    let transport: Shared<T> = Rc::new(RefCell::new(transport));

    executor
        .spawn(read_loop(transport.clone(), links.clone(), clock))
        .detach();
    executor
        .spawn(keepalive_loop(links.clone(), keepalive))
        .detach();

    info!("Link: I/O task started (keepalive every {} ms)", keepalive.as_millis());
    futures_lite::future::block_on(executor.run(write_loop(transport, links)));
}

/// Spawn the link thread.  It owns `transport` for its whole life.
pub fn spawn<T>(
    transport: T,
    links: Arc<GatewayLinks>,
    keepalive_interval_ms: u32,
    clock: MonotonicClock,
) -> std::io::Result<std::thread::JoinHandle<()>>
where
    T: Transport + Send + 'static,
{
    std::thread::Builder::new().name("mash-link".into()).spawn(move || {
        run_io_loop(
            transport,
            links,
            Duration::from_millis(u64::from(keepalive_interval_ms)),
            clock,
        )
    })
}
