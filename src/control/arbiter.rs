//! Merge decision-engine and scheduler intents into one actuator map.
//!
//! Evaluation order per cycle is fixed:
//!
//! 1. expire manual overrides
//! 2. decision-engine intents (`automatic`, skipped when auto mode is off)
//! 3. scheduler intents (`timed` / `flush`), last writer wins
//! 4. live manual overrides
//!
//! `flush` is never displaced by anything else, including manual.
//! Actuators nobody speaks for keep their previous state.
//!
//! Only actuators whose resolved on/off differs from what was last handed
//! to the link are emitted.  A resync (node recovery) forgets the emitted
//! map, so the next cycle sends all of it.

use log::{debug, info};

use crate::model::{ActuatorId, ActuatorState, Intent, Provenance};

const N: usize = ActuatorId::COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ManualOverride {
    on: bool,
    until_ms: u64,
}

/// Output of one arbitration cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resolution {
    /// Actuators to command, in relay order.
    pub changes: Vec<(ActuatorId, ActuatorState)>,
    /// This cycle resends the whole map.
    pub full_resend: bool,
}

#[derive(Debug, Clone)]
pub struct CommandArbiter {
    resolved: [ActuatorState; N],
    /// Last state handed to the link; `None` forces a send.
    emitted: [Option<bool>; N],
    manual: [Option<ManualOverride>; N],
    manual_ttl_ms: u64,
    resync: bool,
}

impl CommandArbiter {
    pub fn new(manual_override_secs: u32) -> Self {
        Self {
            resolved: [ActuatorState::OFF; N],
            emitted: [None; N],
            manual: [None; N],
            manual_ttl_ms: u64::from(manual_override_secs) * 1000,
            resync: true,
        }
    }

    /// Run one cycle.  `decision` is applied before `scheduled`.
    pub fn resolve(
        &mut self,
        now_ms: u64,
        decision: &[Intent],
        scheduled: &[Intent],
        auto_mode: bool,
    ) -> Resolution {
        for (slot, id) in self.manual.iter_mut().zip(ActuatorId::ALL) {
            if slot.is_some_and(|m| now_ms >= m.until_ms) {
                info!("Arbiter: manual override on {id} expired");
                *slot = None;
            }
        }

        let mut cycle: [Option<ActuatorState>; N] = [None; N];
        let automatic = decision
            .iter()
            .filter(|i| auto_mode || i.provenance != Provenance::Automatic);
        for intent in automatic.chain(scheduled.iter()) {
            let slot = &mut cycle[intent.actuator.index()];
            let flush_held = slot.is_some_and(|s| s.provenance == Provenance::Flush);
            if !flush_held || intent.provenance == Provenance::Flush {
                *slot = Some(intent.state());
            }
        }

        for (i, m) in self.manual.iter().enumerate() {
            let Some(m) = m else { continue };
            if cycle[i].is_some_and(|s| s.provenance == Provenance::Flush) {
                continue;
            }
            cycle[i] = Some(ActuatorState::new(m.on, Provenance::Manual));
        }

        for (resolved, candidate) in self.resolved.iter_mut().zip(cycle) {
            if let Some(state) = candidate {
                *resolved = state;
            }
        }

        let full_resend = self.resync;
        self.resync = false;

        let mut out = Resolution {
            changes: Vec::new(),
            full_resend,
        };
        for id in ActuatorId::ALL {
            let state = self.resolved[id.index()];
            if self.emitted[id.index()] != Some(state.on) {
                self.emitted[id.index()] = Some(state.on);
                out.changes.push((id, state));
            }
        }
        if !out.changes.is_empty() {
            debug!(
                "Arbiter: {} change(s){}",
                out.changes.len(),
                if full_resend { " (full resend)" } else { "" }
            );
        }
        out
    }

    /// Operator intent, held for the configured override time.
    pub fn set_manual(&mut self, id: ActuatorId, on: bool, now_ms: u64) {
        self.manual[id.index()] = Some(ManualOverride {
            on,
            until_ms: now_ms.saturating_add(self.manual_ttl_ms),
        });
        info!("Arbiter: manual {id} -> {}", if on { "ON" } else { "OFF" });
    }

    pub fn clear_manual(&mut self, id: ActuatorId) {
        self.manual[id.index()] = None;
    }

    pub fn manual(&self, id: ActuatorId) -> Option<bool> {
        self.manual[id.index()].map(|m| m.on)
    }

    /// Forget what was emitted; the next cycle sends the entire map.
    pub fn request_resync(&mut self) {
        self.emitted = [None; N];
        self.resync = true;
    }

    /// The line for `id` never reached the link; send it again next cycle.
    pub fn mark_unsent(&mut self, id: ActuatorId) {
        self.emitted[id.index()] = None;
    }

    pub fn snapshot(&self) -> [ActuatorState; N] {
        self.resolved
    }

    pub fn state(&self, id: ActuatorId) -> ActuatorState {
        self.resolved[id.index()]
    }
}
