//! Per-room climate decisions.
//!
//! Classification and actuation are separate:
//!
//! - **Severity** is a pure function of the reading: deviation beyond the
//!   tolerance is a warning, beyond 1.5× tolerance (or 1.3× the CO2
//!   ceiling) is critical.
//! - **Intents** go through hysteresis bands.  The only memory is whether
//!   each demand is currently on, so the same reading can yield different
//!   intents depending on what came before.
//!
//! ```text
//!  temperature   OFF ── > target+tol ──▶ ON ── < target-tol ──▶ OFF    (exhaust)
//!  humidity      OFF ── < target-tol ──▶ ON ── > target+tol ──▶ OFF    (humidifier)
//!  co2           OFF ── > max ─────────▶ ON ── < max-hyst ───▶ OFF     (exhaust)
//! ```
//!
//! The humidifier also ends early: at or above target, a rising trend
//! that would cross `target+tol` within the configured horizon drops the
//! demand.  Restarting then needs the full fall below `target-tol`.
//!
//! The photoperiod is independent of readings; see [`photoperiod`].

use chrono::NaiveTime;
use log::info;

use crate::config::{Photoperiod, RoomConfig};
use crate::control::humidifier::{HumidifierCycle, HumidityTrend};
use crate::model::{Intent, Metric, Provenance, RoomId, SensorReading, Severity};

const CRITICAL_TOLERANCE_FACTOR: f32 = 1.5;
const CRITICAL_CO2_FACTOR: f32 = 1.3;

// ═══════════════════════════════════════════════════════════════
//  Classification
// ═══════════════════════════════════════════════════════════════

/// Severity of a value against `target ± tolerance`.
pub fn classify_band(value: f32, target: f32, tolerance: f32) -> Severity {
    let deviation = (value - target).abs();
    if deviation > tolerance * CRITICAL_TOLERANCE_FACTOR {
        Severity::Critical
    } else if deviation > tolerance {
        Severity::Warning
    } else {
        Severity::Normal
    }
}

/// Severity of a CO2 value against its ceiling.
pub fn classify_ceiling(co2_ppm: u16, max_ppm: u16) -> Severity {
    let value = f32::from(co2_ppm);
    let max = f32::from(max_ppm);
    if value > max * CRITICAL_CO2_FACTOR {
        Severity::Critical
    } else if value > max {
        Severity::Warning
    } else {
        Severity::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Assessment {
    pub temperature: Severity,
    pub humidity: Severity,
    pub co2: Severity,
}

impl Assessment {
    pub fn of(reading: &SensorReading, config: &RoomConfig) -> Self {
        Self {
            temperature: classify_band(
                reading.temperature_c,
                config.temp_target_c,
                config.temp_tolerance_c,
            ),
            humidity: classify_band(
                reading.humidity_pct,
                config.humidity_target_pct,
                config.humidity_tolerance_pct,
            ),
            co2: classify_ceiling(reading.co2_ppm, config.co2_max_ppm),
        }
    }

    pub fn get(&self, metric: Metric) -> Severity {
        match metric {
            Metric::Temperature => self.temperature,
            Metric::Humidity => self.humidity,
            Metric::Co2 => self.co2,
        }
    }

    /// Worst of the three.
    pub fn overall(&self) -> Severity {
        self.temperature.max(self.humidity).max(self.co2)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Hysteresis
// ═══════════════════════════════════════════════════════════════

/// A two-edge switching band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hysteresis {
    pub lower: f32,
    pub upper: f32,
}

impl Hysteresis {
    pub fn around(target: f32, tolerance: f32) -> Self {
        Self {
            lower: target - tolerance,
            upper: target + tolerance,
        }
    }

    /// Demand that rises with the value (cooling, venting).
    pub fn direct(&self, on: bool, value: f32) -> bool {
        if on { value >= self.lower } else { value > self.upper }
    }

    /// Demand that rises as the value falls (humidifying).
    pub fn reverse(&self, on: bool, value: f32) -> bool {
        if on { value <= self.upper } else { value < self.lower }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Engine
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeverityChange {
    pub metric: Metric,
    pub from: Severity,
    pub to: Severity,
    pub value: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Decision {
    pub assessment: Assessment,
    pub intents: Vec<Intent>,
    pub changes: Vec<SeverityChange>,
}

/// Demand memory for one room.
#[derive(Debug, Clone, Default)]
struct RoomLoop {
    heat: bool,
    co2: bool,
    humidify: bool,
    assessment: Assessment,
    humidifier: HumidifierCycle,
    trend: HumidityTrend,
}

/// Light intent for a room's photoperiod.  Needs only the clock, so it
/// runs whether or not the room has reported; `None` without a window or
/// without a clock.
pub fn photoperiod(lighting: Option<&Photoperiod>, clock: Option<NaiveTime>) -> Option<Intent> {
    let (light, now) = (lighting?, clock?);
    Some(Intent::new(light.led, light.is_lit(now), Provenance::Automatic))
}

#[derive(Debug, Clone, Default)]
pub struct DecisionEngine {
    rooms: [RoomLoop; 2],
}

impl DecisionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate one room's climate for this control cycle.
    ///
    /// An invalid reading changes nothing: no classification, no intents.
    pub fn evaluate(&mut self, room: RoomId, reading: &SensorReading, config: &RoomConfig, now_ms: u64) -> Decision {
        let state = &mut self.rooms[room.index()];
        let mut decision = Decision {
            assessment: state.assessment,
            ..Decision::default()
        };

        if !reading.valid {
            return decision;
        }

        let assessment = Assessment::of(reading, config);
        for (metric, value) in [
            (Metric::Temperature, reading.temperature_c),
            (Metric::Humidity, reading.humidity_pct),
            (Metric::Co2, f32::from(reading.co2_ppm)),
        ] {
            let (from, to) = (state.assessment.get(metric), assessment.get(metric));
            if from != to {
                decision.changes.push(SeverityChange { metric, from, to, value });
            }
        }
        state.assessment = assessment;
        decision.assessment = assessment;

        let temp_band = Hysteresis::around(config.temp_target_c, config.temp_tolerance_c);
        let humidity_band = Hysteresis::around(config.humidity_target_pct, config.humidity_tolerance_pct);
        let co2_band = Hysteresis {
            lower: f32::from(config.co2_max_ppm.saturating_sub(config.co2_hysteresis_ppm)),
            upper: f32::from(config.co2_max_ppm),
        };

        state.heat = temp_band.direct(state.heat, reading.temperature_c);
        state.co2 = co2_band.direct(state.co2, f32::from(reading.co2_ppm));
        state.humidify = humidity_band.reverse(state.humidify, reading.humidity_pct);

        state.trend.observe(reading.captured_at_ms, reading.humidity_pct);
        if let Some(h) = &config.humidifier {
            let rh = reading.humidity_pct;
            if state.humidify
                && rh >= config.humidity_target_pct
                && state.trend.overshoots(rh, humidity_band.upper, h.overshoot_horizon_secs)
            {
                info!(
                    "Decision: {room} humidifier stopped early ({rh:.1}%, rising {:.3}%/s)",
                    state.trend.rate_per_sec()
                );
                state.humidify = false;
            }
        }

        let exhaust = state.heat || state.co2;
        decision.intents.extend(
            config
                .ventilation
                .iter()
                .map(|&fan| Intent::new(fan, exhaust, Provenance::Automatic)),
        );

        if let Some(h) = &config.humidifier {
            let out = state.humidifier.update(state.humidify, now_ms, h);
            decision.intents.push(Intent::new(h.mist, out.mist, Provenance::Automatic));
            decision.intents.push(Intent::new(h.fan, out.fan, Provenance::Automatic));
        }

        decision
    }

    pub fn assessment(&self, room: RoomId) -> Assessment {
        self.rooms[room.index()].assessment
    }

    /// Whether the room currently wants ventilation (heat or CO2).
    pub fn exhaust_demand(&self, room: RoomId) -> bool {
        let r = &self.rooms[room.index()];
        r.heat || r.co2
    }

    pub fn humidify_demand(&self, room: RoomId) -> bool {
        self.rooms[room.index()].humidify
    }
}
