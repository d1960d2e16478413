//! Link safety watchdog.
//!
//! Tracks time since the last inbound serial byte.  Any byte counts, valid
//! or not.  The node polls [`check_timeout`](SafetyWatchdog::check_timeout)
//! on a fixed cadence, independent of traffic.
//!
//! ## Lifecycle
//!
//! ```text
//!        begin()            silence > timeout
//!  Idle ────────▶ Active ─────────────────────▶ Triggered
//!                   ▲       (check_timeout: true once)  │
//!                   └───────────────────────────────────┘
//!                     heartbeat(): Recovery event once
//! ```
//!
//! Both edges fire exactly once per outage: repeated checks during one
//! outage are idempotent, and only the first heartbeat after it reports
//! recovery.  Whether a trigger forces all relays off is the caller's
//! [`WatchdogPolicy`](crate::config::WatchdogPolicy) decision.

use log::{error, info};

use crate::config::WatchdogPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogStatus {
    Idle,
    Active,
    Triggered,
}

/// One-shot report produced by the first heartbeat after an outage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recovery {
    /// Silence from the last heartbeat before the outage to this one.
    pub downtime_ms: u64,
    /// Recoveries so far, including this one.
    pub count: u32,
}

/// Snapshot for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogState {
    pub status: WatchdogStatus,
    pub last_heartbeat_ms: u64,
    pub timeout_ms: u32,
    pub triggered_at_ms: Option<u64>,
    pub recovery_count: u32,
}

pub struct SafetyWatchdog {
    status: WatchdogStatus,
    last_heartbeat_ms: u64,
    timeout_ms: u32,
    policy: WatchdogPolicy,
    triggered_at_ms: Option<u64>,
    /// Last heartbeat before the current outage started.
    silent_since_ms: u64,
    recovery_count: u32,
}

impl SafetyWatchdog {
    pub fn new(timeout_ms: u32, policy: WatchdogPolicy) -> Self {
        Self {
            status: WatchdogStatus::Idle,
            last_heartbeat_ms: 0,
            timeout_ms,
            policy,
            triggered_at_ms: None,
            silent_since_ms: 0,
            recovery_count: 0,
        }
    }

    /// Start monitoring from `now_ms`.
    pub fn begin(&mut self, now_ms: u64) {
        self.status = WatchdogStatus::Active;
        self.last_heartbeat_ms = now_ms;
        self.triggered_at_ms = None;
        info!(
            "Watchdog: started ({}ms timeout, policy {:?})",
            self.timeout_ms, self.policy
        );
    }

    /// Record link activity.  Returns `Some` exactly once per outage.
    pub fn heartbeat(&mut self, now_ms: u64) -> Option<Recovery> {
        match self.status {
            WatchdogStatus::Idle => None,
            WatchdogStatus::Active => {
                self.last_heartbeat_ms = now_ms;
                None
            }
            WatchdogStatus::Triggered => {
                self.status = WatchdogStatus::Active;
                self.last_heartbeat_ms = now_ms;
                self.triggered_at_ms = None;
                self.recovery_count = self.recovery_count.saturating_add(1);
                let recovery = Recovery {
                    downtime_ms: now_ms.saturating_sub(self.silent_since_ms),
                    count: self.recovery_count,
                };
                info!(
                    "Watchdog: link restored after {}ms (recovery #{})",
                    recovery.downtime_ms, recovery.count
                );
                Some(recovery)
            }
        }
    }

    /// Returns `true` only on the `Active → Triggered` edge.
    pub fn check_timeout(&mut self, now_ms: u64) -> bool {
        if self.status != WatchdogStatus::Active {
            return false;
        }
        let elapsed = now_ms.saturating_sub(self.last_heartbeat_ms);
        if elapsed > u64::from(self.timeout_ms) {
            self.status = WatchdogStatus::Triggered;
            self.triggered_at_ms = Some(now_ms);
            self.silent_since_ms = self.last_heartbeat_ms;
            error!("Watchdog: TIMEOUT, no serial traffic for {}ms", elapsed);
            return true;
        }
        false
    }

    pub fn status(&self) -> WatchdogStatus {
        self.status
    }

    pub fn is_safe(&self) -> bool {
        self.status != WatchdogStatus::Triggered
    }

    pub fn policy(&self) -> WatchdogPolicy {
        self.policy
    }

    /// True if a trigger should force every relay off.
    pub fn shuts_down_on_trigger(&self) -> bool {
        self.policy == WatchdogPolicy::FailSafeShutdown
    }

    pub fn recovery_count(&self) -> u32 {
        self.recovery_count
    }

    pub fn state(&self) -> WatchdogState {
        WatchdogState {
            status: self.status,
            last_heartbeat_ms: self.last_heartbeat_ms,
            timeout_ms: self.timeout_ms,
            triggered_at_ms: self.triggered_at_ms,
            recovery_count: self.recovery_count,
        }
    }
}
