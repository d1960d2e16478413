//! State shared between the link thread and the control thread.
//!
//! One lock, one closure: every access goes through
//! [`SharedState::with`], so a reader never sees half of an update.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::model::{ActuatorId, ActuatorState};

/// Link health as seen from the gateway.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStatus {
    /// Monotonic time of the last complete inbound line.
    pub last_inbound_ms: Option<u64>,
    /// Silence has exceeded the stale limit.
    pub stale: bool,
    /// The node reported a watchdog recovery that the control loop has
    /// not acted on yet.
    pub resync_pending: bool,
    pub lines_in: u32,
    pub decode_errors: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewaySnapshot {
    /// What the arbiter last resolved.
    pub desired: [ActuatorState; ActuatorId::COUNT],
    /// What the node last acknowledged; `None` until the first ack.
    pub confirmed: [Option<bool>; ActuatorId::COUNT],
    pub link: LinkStatus,
}

impl Default for GatewaySnapshot {
    fn default() -> Self {
        Self {
            desired: [ActuatorState::OFF; ActuatorId::COUNT],
            confirmed: [None; ActuatorId::COUNT],
            link: LinkStatus::default(),
        }
    }
}

impl GatewaySnapshot {
    /// Actuators whose acknowledged state differs from the desired one.
    pub fn unconfirmed(&self) -> impl Iterator<Item = ActuatorId> + '_ {
        ActuatorId::ALL
            .into_iter()
            .filter(|id| self.confirmed[id.index()] != Some(self.desired[id.index()].on))
    }
}

pub struct SharedState {
    inner: Mutex<CriticalSectionRawMutex, RefCell<GatewaySnapshot>>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(GatewaySnapshot::default())),
        }
    }

    /// Run `f` with exclusive access.  Keep `f` short: it holds a
    /// critical section.
    pub fn with<R>(&self, f: impl FnOnce(&mut GatewaySnapshot) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub fn snapshot(&self) -> GatewaySnapshot {
        self.with(|s| *s)
    }

    /// Read and clear the resync flag.
    pub fn take_resync(&self) -> bool {
        self.with(|s| core::mem::take(&mut s.link.resync_pending))
    }
}
