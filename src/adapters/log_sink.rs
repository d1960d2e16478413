//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by rendering each [`ControlEvent`] as one log
//! line with a category prefix.  On the gateway the log facade is backed
//! by `tracing-subscriber`; on the node by the ESP-IDF logger.

use log::{error, info, warn};

use crate::app::events::ControlEvent;
use crate::app::ports::EventSink;
use crate::model::Severity;

/// Adapter that logs every [`ControlEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink {
    emitted: u64,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &ControlEvent) {
        self.emitted += 1;
        match event {
            ControlEvent::Started => info!("START | controller running"),
            ControlEvent::AutomationArmed => info!("START | warm-up done, automation armed"),
            ControlEvent::SeverityChanged {
                room,
                metric,
                from,
                to,
                value,
            } => match to {
                Severity::Critical => error!("ALERT | {room} {metric} {from} -> {to} ({value:.1})"),
                Severity::Warning => warn!("ALERT | {room} {metric} {from} -> {to} ({value:.1})"),
                Severity::Normal => info!("ALERT | {room} {metric} back to normal ({value:.1})"),
            },
            ControlEvent::SensorFault { room } => warn!("SENSOR | {room}: no valid reading"),
            ControlEvent::CommandIssued { actuator, state } => {
                info!(
                    "CMD | {actuator} -> {} ({})",
                    if state.on { "ON" } else { "OFF" },
                    state.provenance
                );
            }
            ControlEvent::FanTransition { actuator, from, to } => {
                info!("FAN | {actuator} {from:?} -> {to:?}");
            }
            ControlEvent::AckMismatch {
                actuator,
                expected,
                reported,
            } => warn!("ACK | {actuator} sent={expected} node={reported}"),
            ControlEvent::LinkStale { silent_ms } => {
                error!("LINK | no data from node for {silent_ms} ms");
            }
            ControlEvent::LinkRestored => info!("LINK | node traffic resumed"),
            ControlEvent::NodeRecovered => {
                warn!("LINK | node watchdog recovered, resending full actuator map");
            }
            ControlEvent::NodeError { kind } => warn!("LINK | node rejected a line: {kind}"),
        }
    }
}
