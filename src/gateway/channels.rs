//! Handoffs between the link thread and the control thread.
//!
//! ```text
//! ┌──────────────┐  UplinkFrame  ┌───────────────┐
//! │  link thread │──────────────▶│ control thread│
//! │  (async)     │◀──────────────│ (tick)        │
//! └──────────────┘  command line └───────────────┘
//!            ╲                       ╱
//!             ╲──── SharedState ────╱
//! ```
//!
//! Bounded `embassy-sync` channels on both sides; the control thread only
//! ever uses `try_send`/`try_receive` so it never blocks on the link.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use super::state::SharedState;
use crate::protocol::frames::UplinkFrame;

/// Decoded frames waiting for the control thread.
pub const INBOUND_DEPTH: usize = 16;

/// Encoded lines waiting for the serial writer.  Sized for a full map
/// resend plus keepalives.
pub const OUTBOUND_DEPTH: usize = 32;

pub struct GatewayLinks {
    pub inbound: Channel<CriticalSectionRawMutex, UplinkFrame, INBOUND_DEPTH>,
    pub outbound: Channel<CriticalSectionRawMutex, String, OUTBOUND_DEPTH>,
    pub state: SharedState,
    running: AtomicBool,
}

impl Default for GatewayLinks {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayLinks {
    pub fn new() -> Self {
        Self {
            inbound: Channel::new(),
            outbound: Channel::new(),
            state: SharedState::new(),
            running: AtomicBool::new(true),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask every unit to wind down.  The writer drains what is queued first.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}
