//! Gateway node: link unit plus the control unit that owns decisions.
//!
//! ```text
//!  serial ◀──▶ io_task (thread) ──inbound──▶ Controller::tick (thread)
//!                  ▲                            │
//!                  └─────────outbound───────────┘
//!                         SharedState (one lock)
//! ```
//!
//! One [`Controller::tick`] per `tick_interval_ms`:
//!
//! 1. drain decoded frames (telemetry, acks, recovery notices)
//! 2. supervise link silence
//! 3. photoperiod for every room, then (after warm-up) the decision engine
//!    for each room with a reading
//! 4. advance the passive fan scheduler
//! 5. arbitrate, queue only changed commands (all of them after a resync)
//! 6. publish the desired map to the shared state

pub mod channels;
pub mod console;
pub mod io_task;
pub mod state;

use std::sync::Arc;

use chrono::NaiveTime;
use heapless::Deque;
use log::{info, warn};

use crate::app::events::{ControlEvent, Record};
use crate::app::ports::{EventSink, FanPhase, RecordSink, SchedulerDelegate};
use crate::config::GatewayConfig;
use crate::control::{CommandArbiter, DecisionEngine, photoperiod};
use crate::error::{LinkError, Result};
use crate::model::{ActuatorId, ActuatorState, Intent, Provenance, RoomId, SensorReading};
use crate::protocol::frames::{self, RoomReport, UplinkFrame};
use crate::scheduler::PassiveFanScheduler;
pub use channels::GatewayLinks;
pub use state::{GatewaySnapshot, LinkStatus, SharedState};

/// Unacknowledged commands remembered per actuator.
const IN_FLIGHT_DEPTH: usize = 4;

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub frames: usize,
    pub commands: usize,
    pub full_resend: bool,
    /// Sensor-driven automation is live.
    pub armed: bool,
}

/// Forwards scheduler transitions to the event sink.
struct TransitionForwarder<'a, E: EventSink>(&'a mut E);

impl<E: EventSink> SchedulerDelegate for TransitionForwarder<'_, E> {
    fn on_fan_transition(&mut self, actuator: ActuatorId, from: FanPhase, to: FanPhase) {
        self.0.emit(&ControlEvent::FanTransition { actuator, from, to });
    }
}

pub struct Controller<E, R> {
    config: GatewayConfig,
    links: Arc<GatewayLinks>,
    events: E,
    records: R,
    engine: DecisionEngine,
    scheduler: PassiveFanScheduler,
    arbiter: CommandArbiter,
    latest: [Option<SensorReading>; 2],
    /// Commands queued but not yet acknowledged, oldest first.
    in_flight: [Deque<bool, IN_FLIGHT_DEPTH>; ActuatorId::COUNT],
    started_at_ms: Option<u64>,
    armed: bool,
    auto_mode: bool,
}

impl<E: EventSink, R: RecordSink> Controller<E, R> {
    pub fn new(config: GatewayConfig, links: Arc<GatewayLinks>, events: E, records: R) -> Self {
        Self {
            scheduler: PassiveFanScheduler::new(&config.fans),
            arbiter: CommandArbiter::new(config.manual_override_secs),
            auto_mode: config.auto_mode,
            config,
            links,
            events,
            records,
            engine: DecisionEngine::new(),
            latest: [None; 2],
            in_flight: core::array::from_fn(|_| Deque::new()),
            started_at_ms: None,
            armed: false,
        }
    }

    /// One control cycle.  Never blocks: every channel access is `try_*`.
    pub fn tick(&mut self, now_ms: u64, clock: Option<NaiveTime>) -> TickReport {
        let started = *self.started_at_ms.get_or_insert_with(|| {
            self.events.emit(&ControlEvent::Started);
            now_ms
        });

        let mut report = TickReport::default();
        while let Ok(frame) = self.links.inbound.try_receive() {
            self.handle_frame(frame, now_ms);
            report.frames += 1;
        }

        self.supervise_link(now_ms, started);
        if self.links.state.take_resync() {
            self.resync();
        }

        if !self.armed && now_ms.saturating_sub(started) >= u64::from(self.config.warmup_secs) * 1000 {
            self.armed = true;
            self.events.emit(&ControlEvent::AutomationArmed);
        }
        report.armed = self.armed;

        let mut decided: Vec<Intent> = RoomId::ALL
            .into_iter()
            .filter_map(|room| photoperiod(self.config.room(room).lighting.as_ref(), clock))
            .collect();
        if self.armed {
            self.decide(now_ms, &mut decided);
        }
        let scheduled = self.scheduler.tick(
            now_ms,
            clock,
            &self.latest,
            self.armed,
            &mut TransitionForwarder(&mut self.events),
        );

        let resolution = self.arbiter.resolve(now_ms, &decided, &scheduled, self.auto_mode);
        report.full_resend = resolution.full_resend;
        for (id, state) in resolution.changes {
            match self.queue(id, state, now_ms) {
                Ok(()) => report.commands += 1,
                Err(e) => {
                    warn!("Controller: {id} not sent ({e}), retried next tick");
                    self.arbiter.mark_unsent(id);
                }
            }
        }

        let desired = self.arbiter.snapshot();
        self.links.state.with(|s| s.desired = desired);
        report
    }

    fn decide(&mut self, now_ms: u64, intents: &mut Vec<Intent>) {
        for room in RoomId::ALL {
            let Some(reading) = self.latest[room.index()] else {
                continue;
            };
            let decision = self
                .engine
                .evaluate(room, &reading, self.config.room(room), now_ms);
            for c in decision.changes {
                self.events.emit(&ControlEvent::SeverityChanged {
                    room,
                    metric: c.metric,
                    from: c.from,
                    to: c.to,
                    value: c.value,
                });
            }
            intents.extend(decision.intents);
        }
    }

    fn queue(&mut self, id: ActuatorId, state: ActuatorState, now_ms: u64) -> Result<()> {
        let line = frames::command_line(id, state.on)?;
        self.links
            .outbound
            .try_send(line)
            .map_err(|_| LinkError::QueueFull)?;

        let pending = &mut self.in_flight[id.index()];
        if pending.is_full() {
            // Oldest never answered; the node dropped it.
            pending.pop_front();
        }
        let _ = pending.push_back(state.on);

        self.events.emit(&ControlEvent::CommandIssued { actuator: id, state });
        self.records.record(Record::Actuator {
            actuator: id,
            state,
            at_ms: now_ms,
        });
        Ok(())
    }

    /// Node state is unknown after an outage: forget unanswered commands
    /// and resend the whole map.
    fn resync(&mut self) {
        for pending in &mut self.in_flight {
            pending.clear();
        }
        self.arbiter.request_resync();
    }

    fn supervise_link(&mut self, now_ms: u64, started_ms: u64) {
        let limit = u64::from(self.config.link_stale_ms);
        let change = self.links.state.with(|s| {
            let silent = now_ms.saturating_sub(s.link.last_inbound_ms.unwrap_or(started_ms));
            match (s.link.stale, silent > limit) {
                (false, true) => {
                    s.link.stale = true;
                    Some(ControlEvent::LinkStale { silent_ms: silent })
                }
                (true, false) => {
                    s.link.stale = false;
                    Some(ControlEvent::LinkRestored)
                }
                _ => None,
            }
        });
        if let Some(event) = change {
            self.events.emit(&event);
        }
    }

    /// Apply one decoded frame from the node.
    pub fn handle_frame(&mut self, frame: UplinkFrame, now_ms: u64) {
        match frame {
            UplinkFrame::Telemetry(t) => {
                for room in RoomId::ALL {
                    match t.room(room) {
                        Some(RoomReport::Reading(values)) => {
                            let reading = values.to_reading(room, now_ms);
                            self.latest[room.index()] = Some(reading);
                            self.records.record(Record::Reading(reading));
                        }
                        // Keep the last valid reading; only report.
                        Some(RoomReport::Fault { .. }) => {
                            self.events.emit(&ControlEvent::SensorFault { room });
                        }
                        None => {}
                    }
                }
            }
            UplinkFrame::Recovered => {
                self.events.emit(&ControlEvent::NodeRecovered);
                self.resync();
            }
            // Acks arrive in command order: match each against the command
            // it answers.  An unsolicited ack is checked against the map.
            UplinkFrame::Ack { actuator, state } => {
                let reported = state.is_on();
                self.links
                    .state
                    .with(|s| s.confirmed[actuator.index()] = Some(reported));
                let expected = self.in_flight[actuator.index()]
                    .pop_front()
                    .unwrap_or_else(|| self.arbiter.state(actuator).on);
                if expected != reported {
                    self.events.emit(&ControlEvent::AckMismatch {
                        actuator,
                        expected,
                        reported,
                    });
                }
            }
            UplinkFrame::NodeError(kind) => {
                self.events.emit(&ControlEvent::NodeError { kind });
            }
        }
    }

    /// Operator override, applied on the next tick.
    pub fn set_manual(&mut self, id: ActuatorId, on: bool, now_ms: u64) {
        self.arbiter.set_manual(id, on, now_ms);
    }

    pub fn release_manual(&mut self, id: ActuatorId) {
        self.arbiter.clear_manual(id);
    }

    pub fn set_auto_mode(&mut self, enabled: bool) {
        info!("Controller: auto mode {}", if enabled { "on" } else { "off" });
        self.auto_mode = enabled;
    }

    pub fn auto_mode(&self) -> bool {
        self.auto_mode
    }

    /// Queue OFF for every actuator: the wire form of `shutdown_all`.
    /// Returns how many lines were queued.
    pub fn shutdown(&mut self, now_ms: u64) -> usize {
        let off = ActuatorState::new(false, Provenance::Manual);
        let mut queued = 0;
        for id in ActuatorId::ALL {
            match self.queue(id, off, now_ms) {
                Ok(()) => queued += 1,
                Err(e) => warn!("Controller: shutdown {id} not sent ({e})"),
            }
        }
        if queued < ActuatorId::COUNT {
            warn!("Controller: only {queued}/{} OFF commands queued", ActuatorId::COUNT);
        }
        self.links.state.with(|s| s.desired = [off; ActuatorId::COUNT]);
        info!("Controller: shutdown commands queued");
        queued
    }

    pub fn latest(&self, room: RoomId) -> Option<SensorReading> {
        self.latest[room.index()]
    }

    pub fn arbiter(&self) -> &CommandArbiter {
        &self.arbiter
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    pub fn scheduler(&self) -> &PassiveFanScheduler {
        &self.scheduler
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    pub fn links(&self) -> &Arc<GatewayLinks> {
        &self.links
    }
}
