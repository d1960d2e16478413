//! Microcontroller node: one cooperative loop, no preemption.
//!
//! [`FirmwareNode::poll`] is called from a fixed external tick.  Each call
//! does a bounded amount of work:
//!
//! ```text
//!  poll(now)
//!   ├─ drain link ── every byte ─▶ watchdog.heartbeat()  (liveness first)
//!   │                  └─────────▶ line decoder ─▶ command ─▶ relay + ack
//!   ├─ every check interval ─▶ watchdog.check_timeout() ─▶ shutdown_all?
//!   └─ after warm-up, every sensor interval ─▶ read both rooms ─▶ telemetry
//! ```
//!
//! Nothing here can terminate the loop: bad lines are answered with an
//! error line and dropped, write failures are logged and counted.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::I2c;
use log::{debug, error, info, warn};

use crate::config::FirmwareConfig;
use crate::drivers::relay::ActuatorDriver;
use crate::error::ProtocolError;
use crate::model::{ActuatorId, RoomId, SwitchState};
use crate::protocol::frames::{self, DownlinkFrame, Telemetry, UplinkFrame};
use crate::protocol::line::{LineDecoder, LineEvent, MAX_LINE_LEN};
use crate::protocol::transport::Transport;
use crate::safety::SafetyWatchdog;
use crate::sensors::SensorAcquisition;
use crate::sensors::bus_recovery::BusLines;

/// Bytes pulled from the link per read call.
const READ_CHUNK: usize = 64;

/// Upper bound on read calls per poll so a chattering link cannot starve
/// the watchdog and sensor work.
const MAX_READS_PER_POLL: usize = 8;

/// Counters kept for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    pub commands_applied: u32,
    pub lines_rejected: u32,
    pub keepalives: u32,
    pub telemetry_sent: u32,
    pub write_failures: u32,
    pub read_failures: u32,
}

pub struct FirmwareNode<B, D, P, T> {
    sensors: SensorAcquisition<B, D>,
    actuators: ActuatorDriver<P>,
    watchdog: SafetyWatchdog,
    link: T,
    decoder: LineDecoder<MAX_LINE_LEN>,
    config: FirmwareConfig,
    started_at_ms: u64,
    last_check_ms: u64,
    last_report_ms: Option<u64>,
    stats: NodeStats,
}

impl<B, D, P, T> FirmwareNode<B, D, P, T>
where
    B: I2c + BusLines,
    D: DelayNs,
    P: OutputPin,
    T: Transport,
{
    /// `actuators` must already be in the all-off state; the driver
    /// guarantees that on construction.
    pub fn new(
        sensors: SensorAcquisition<B, D>,
        actuators: ActuatorDriver<P>,
        link: T,
        config: FirmwareConfig,
    ) -> Self {
        Self {
            sensors,
            actuators,
            watchdog: SafetyWatchdog::new(config.watchdog_timeout_ms, config.watchdog_policy),
            link,
            decoder: LineDecoder::new(),
            config,
            started_at_ms: 0,
            last_check_ms: 0,
            last_report_ms: None,
            stats: NodeStats::default(),
        }
    }

    /// Start the sensors and arm the link watchdog.
    pub fn begin(&mut self, now_ms: u64) {
        let started = self.sensors.begin();
        if started < RoomId::ALL.len() {
            warn!("Node: {started}/{} sensors started", RoomId::ALL.len());
        }
        self.watchdog.begin(now_ms);
        self.started_at_ms = now_ms;
        self.last_check_ms = now_ms;
        info!(
            "Node: ready (watchdog {} ms, policy {:?}, report every {} ms)",
            self.config.watchdog_timeout_ms,
            self.config.watchdog_policy,
            self.config.sensor_interval_ms
        );
    }

    /// One pass of the cooperative loop.
    pub fn poll(&mut self, now_ms: u64) {
        self.service_link(now_ms);
        self.service_watchdog(now_ms);
        self.service_sensors(now_ms);
    }

    // ── Inbound ──────────────────────────────────────────────

    fn service_link(&mut self, now_ms: u64) {
        let mut buf = [0u8; READ_CHUNK];
        for _ in 0..MAX_READS_PER_POLL {
            let n = match self.link.read(&mut buf) {
                Ok(0) => return,
                Ok(n) => n,
                Err(e) => {
                    self.stats.read_failures = self.stats.read_failures.saturating_add(1);
                    warn!("Link: read failed ({e:?})");
                    return;
                }
            };
            for &byte in &buf[..n] {
                self.on_byte(byte, now_ms);
            }
        }
    }

    fn on_byte(&mut self, byte: u8, now_ms: u64) {
        if let Some(recovery) = self.watchdog.heartbeat(now_ms) {
            info!(
                "Watchdog: link back after {} ms (recovery #{})",
                recovery.downtime_ms, recovery.count
            );
            self.send(&UplinkFrame::Recovered);
        }

        let decoded = match self.decoder.push(byte) {
            None => return,
            Some(LineEvent::Line(line)) => frames::decode_downlink(line),
            Some(LineEvent::Overflow) => Err(ProtocolError::LineTooLong),
        };

        match decoded {
            Ok(DownlinkFrame::Command { actuator, state }) => self.apply(actuator, state),
            Ok(DownlinkFrame::Keepalive) => {
                self.stats.keepalives = self.stats.keepalives.wrapping_add(1);
                debug!("Link: keepalive");
            }
            Err(e) => {
                self.stats.lines_rejected = self.stats.lines_rejected.saturating_add(1);
                warn!("Link: line discarded ({e})");
                self.send(&UplinkFrame::NodeError(e.tag().into()));
            }
        }
    }

    fn apply(&mut self, actuator: ActuatorId, state: SwitchState) {
        match self.actuators.set(actuator, state.is_on()) {
            Ok(()) => {
                self.stats.commands_applied = self.stats.commands_applied.wrapping_add(1);
                self.send(&UplinkFrame::Ack { actuator, state });
            }
            Err(e) => {
                self.stats.lines_rejected = self.stats.lines_rejected.saturating_add(1);
                error!("Relay: {e}");
                self.send(&UplinkFrame::NodeError(e.tag().into()));
            }
        }
    }

    // ── Periodic ─────────────────────────────────────────────

    fn service_watchdog(&mut self, now_ms: u64) {
        if now_ms.saturating_sub(self.last_check_ms) < u64::from(self.config.watchdog_check_interval_ms) {
            return;
        }
        self.last_check_ms = now_ms;
        if self.watchdog.check_timeout(now_ms) && self.watchdog.shuts_down_on_trigger() {
            warn!("Watchdog: forcing all actuators off");
            self.actuators.shutdown_all();
        }
    }

    fn service_sensors(&mut self, now_ms: u64) {
        if now_ms.saturating_sub(self.started_at_ms) < u64::from(self.config.sensor_warmup_ms) {
            return;
        }
        let due = self.last_report_ms.is_none_or(|last| {
            now_ms.saturating_sub(last) >= u64::from(self.config.sensor_interval_ms)
        });
        if !due {
            return;
        }
        self.last_report_ms = Some(now_ms);

        let readings = RoomId::ALL.map(|room| self.sensors.read_room(room, now_ms));
        if self.send(&UplinkFrame::Telemetry(Telemetry::from_readings(&readings))) {
            self.stats.telemetry_sent = self.stats.telemetry_sent.wrapping_add(1);
        }
    }

    // ── Outbound ─────────────────────────────────────────────

    fn send(&mut self, frame: &UplinkFrame) -> bool {
        let line = match frames::encode_uplink(frame) {
            Ok(line) => line,
            Err(e) => {
                error!("Link: {e}");
                return false;
            }
        };
        match self.link.write_all(line.as_bytes()) {
            Ok(()) => true,
            Err(e) => {
                self.stats.write_failures = self.stats.write_failures.saturating_add(1);
                warn!("Link: {e}");
                false
            }
        }
    }

    // ── Accessors ────────────────────────────────────────────

    pub fn actuators(&self) -> &ActuatorDriver<P> {
        &self.actuators
    }

    pub fn watchdog(&self) -> &SafetyWatchdog {
        &self.watchdog
    }

    pub fn sensors(&self) -> &SensorAcquisition<B, D> {
        &self.sensors
    }

    pub fn sensors_mut(&mut self) -> &mut SensorAcquisition<B, D> {
        &mut self.sensors
    }

    pub fn link_mut(&mut self) -> &mut T {
        &mut self.link
    }

    pub fn stats(&self) -> NodeStats {
        self.stats
    }
}
