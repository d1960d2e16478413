//! Alternating mist/fan cycle used while a room asks for humidity.
//!
//! ```text
//!  demand ─▶ Misting (mist ON, fan OFF) ── mist_secs ─▶ Fanning (mist OFF, fan ON)
//!               ▲                                            │
//!               └──────────────────── fan_secs ──────────────┘
//!  no demand ─▶ Off (both OFF)
//! ```
//!
//! Phase boundaries are anchored to their deadlines, not to the tick that
//! observed them, so a slow tick does not stretch the cycle.
//!
//! [`HumidityTrend`] keeps the last few distinct readings so the decision
//! engine can end a cycle before the room overshoots its band.

use heapless::Deque;

use crate::config::HumidifierConfig;

/// Readings kept for the trend (15 s of telemetry at the node's 5 s cadence).
pub const TREND_SAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HumidifierPhase {
    #[default]
    Off,
    Misting { since_ms: u64 },
    Fanning { since_ms: u64 },
}

/// Desired outputs for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumidifierOutput {
    pub mist: bool,
    pub fan: bool,
}

#[derive(Debug, Clone, Default)]
pub struct HumidifierCycle {
    phase: HumidifierPhase,
}

impl HumidifierCycle {
    pub const fn new() -> Self {
        Self {
            phase: HumidifierPhase::Off,
        }
    }

    pub fn phase(&self) -> HumidifierPhase {
        self.phase
    }

    pub fn update(&mut self, demand: bool, now_ms: u64, config: &HumidifierConfig) -> HumidifierOutput {
        if !demand {
            self.phase = HumidifierPhase::Off;
            return HumidifierOutput { mist: false, fan: false };
        }

        let mist_ms = u64::from(config.mist_secs.max(1)) * 1000;
        let fan_ms = u64::from(config.fan_secs.max(1)) * 1000;

        if self.phase == HumidifierPhase::Off {
            self.phase = HumidifierPhase::Misting { since_ms: now_ms };
        }
        // A gap longer than a whole cycle restarts from misting at `now`.
        let since = match self.phase {
            HumidifierPhase::Misting { since_ms } | HumidifierPhase::Fanning { since_ms } => since_ms,
            HumidifierPhase::Off => now_ms,
        };
        if now_ms.saturating_sub(since) >= mist_ms + fan_ms {
            self.phase = HumidifierPhase::Misting { since_ms: now_ms };
        }

        loop {
            match self.phase {
                HumidifierPhase::Misting { since_ms } if now_ms >= since_ms + mist_ms => {
                    self.phase = HumidifierPhase::Fanning {
                        since_ms: since_ms + mist_ms,
                    };
                }
                HumidifierPhase::Fanning { since_ms } if now_ms >= since_ms + fan_ms => {
                    self.phase = HumidifierPhase::Misting {
                        since_ms: since_ms + fan_ms,
                    };
                }
                _ => break,
            }
        }

        match self.phase {
            HumidifierPhase::Misting { .. } => HumidifierOutput { mist: true, fan: false },
            HumidifierPhase::Fanning { .. } => HumidifierOutput { mist: false, fan: true },
            HumidifierPhase::Off => HumidifierOutput { mist: false, fan: false },
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Trend
// ═══════════════════════════════════════════════════════════════

/// Rolling humidity history for one room.
#[derive(Debug, Clone)]
pub struct HumidityTrend {
    samples: Deque<(u64, f32), TREND_SAMPLES>,
}

impl Default for HumidityTrend {
    fn default() -> Self {
        Self { samples: Deque::new() }
    }
}

impl HumidityTrend {
    /// Add a reading.  A repeat of the newest timestamp is ignored, so the
    /// same reading seen on several control ticks counts once.
    pub fn observe(&mut self, captured_at_ms: u64, humidity_pct: f32) {
        if self.samples.back().is_some_and(|&(t, _)| t == captured_at_ms) {
            return;
        }
        if self.samples.is_full() {
            self.samples.pop_front();
        }
        let _ = self.samples.push_back((captured_at_ms, humidity_pct));
    }

    /// Change in %RH per second across the window; zero with fewer than two readings.
    pub fn rate_per_sec(&self) -> f32 {
        match (self.samples.front(), self.samples.back()) {
            (Some(&(t0, h0)), Some(&(t1, h1))) if t1 > t0 => (h1 - h0) / ((t1 - t0) as f32 / 1000.0),
            _ => 0.0,
        }
    }

    /// A rising trend carries `humidity_pct` past `limit` within `horizon_secs`.
    pub fn overshoots(&self, humidity_pct: f32, limit: f32, horizon_secs: u32) -> bool {
        let rate = self.rate_per_sec();
        rate > 0.0 && humidity_pct + rate * horizon_secs as f32 > limit
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
