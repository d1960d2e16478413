//! Outbound domain events and persistence records.
//!
//! The gateway [`Controller`](crate::gateway::Controller) emits
//! [`ControlEvent`]s through the [`EventSink`](super::ports::EventSink)
//! port and [`Record`]s through the [`RecordSink`](super::ports::RecordSink)
//! port.  Adapters on the other side decide what to do with them.

use serde::Serialize;

use crate::app::ports::FanPhase;
use crate::model::{ActuatorId, ActuatorState, Metric, RoomId, SensorReading, Severity};

/// Structured events emitted by the control core.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    /// The controller ran its first tick.
    Started,

    /// Warm-up elapsed; sensor-driven automation is now live.
    AutomationArmed,

    /// A room's classification for one metric changed.
    SeverityChanged {
        room: RoomId,
        metric: Metric,
        from: Severity,
        to: Severity,
        value: f32,
    },

    /// The node reported no valid data for a room.
    SensorFault { room: RoomId },

    /// A command line was queued for the node.
    CommandIssued {
        actuator: ActuatorId,
        state: ActuatorState,
    },

    /// A passive fan changed phase.
    FanTransition {
        actuator: ActuatorId,
        from: FanPhase,
        to: FanPhase,
    },

    /// The node acknowledged a state other than the command it answers.
    AckMismatch {
        actuator: ActuatorId,
        expected: bool,
        reported: bool,
    },

    /// Nothing has arrived from the node for longer than the stale limit.
    LinkStale { silent_ms: u64 },

    /// Traffic resumed after a stale period.
    LinkRestored,

    /// The node announced the end of a watchdog outage; full map resend follows.
    NodeRecovered,

    /// The node rejected a line and said why.
    NodeError { kind: String },
}

/// Persistence/sync payloads.  Serialized one JSON object per record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Reading(SensorReading),
    Actuator {
        actuator: ActuatorId,
        state: ActuatorState,
        at_ms: u64,
    },
}
