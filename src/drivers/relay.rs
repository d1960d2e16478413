//! Relay bank driver (8-channel, active LOW).
//!
//! Maps each [`ActuatorId`] to one relay control line and remembers the
//! last commanded state.
//!
//! ## Safety contract
//!
//! `on` drives the line LOW.  [`shutdown_all`](ActuatorDriver::shutdown_all)
//! drives every line HIGH and clears the in-memory state; it never fails
//! and is the fail-safe primitive used at boot and on link loss.
//!
//! ## Dual-target design
//!
//! Generic over `embedded-hal` output pins: real GPIO lines on ESP-IDF,
//! recording mocks on host.

use embedded_hal::digital::OutputPin;
use log::{error, info};

use crate::error::ActuatorError;
use crate::model::ActuatorId;

pub struct ActuatorDriver<P> {
    lines: [Option<P>; ActuatorId::COUNT],
    on: [bool; ActuatorId::COUNT],
}

impl<P: OutputPin> ActuatorDriver<P> {
    /// Take ownership of the relay lines and immediately force them all off.
    ///
    /// `None` marks an actuator this board revision does not wire.
    pub fn new(lines: [Option<P>; ActuatorId::COUNT]) -> Self {
        let mut driver = Self {
            lines,
            on: [false; ActuatorId::COUNT],
        };
        driver.shutdown_all();
        driver
    }

    /// Build from `(id, line)` pairs; unlisted actuators stay unmapped.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (ActuatorId, P)>) -> Self {
        let mut lines: [Option<P>; ActuatorId::COUNT] = Default::default();
        for (id, line) in pairs {
            lines[id.index()] = Some(line);
        }
        Self::new(lines)
    }

    pub fn set(&mut self, id: ActuatorId, on: bool) -> Result<(), ActuatorError> {
        let line = self.lines[id.index()]
            .as_mut()
            .ok_or(ActuatorError::Unmapped(id))?;
        let result = if on { line.set_low() } else { line.set_high() };
        result.map_err(|_| ActuatorError::GpioWriteFailed(id))?;
        self.on[id.index()] = on;
        info!("Relay: {id} -> {}", if on { "ON" } else { "OFF" });
        Ok(())
    }

    /// All lines HIGH (off), all state cleared.  Line errors are logged, not returned.
    pub fn shutdown_all(&mut self) {
        for id in ActuatorId::ALL {
            if let Some(line) = self.lines[id.index()].as_mut() {
                if line.set_high().is_err() {
                    error!("Relay: {id} failed to release during shutdown");
                }
            }
        }
        self.on = [false; ActuatorId::COUNT];
        info!("Relay: all actuators off");
    }

    /// Last commanded state (`false` for unmapped actuators).
    pub fn get(&self, id: ActuatorId) -> bool {
        self.on[id.index()]
    }

    pub fn is_mapped(&self, id: ActuatorId) -> bool {
        self.lines[id.index()].is_some()
    }

    /// Snapshot of every actuator's commanded state, in relay order.
    pub fn states(&self) -> [bool; ActuatorId::COUNT] {
        self.on
    }
}
