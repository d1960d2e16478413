//! System configuration parameters.
//!
//! Two documents: [`FirmwareConfig`] for the relay/sensor node and
//! [`GatewayConfig`] for the decision side.  Both serialize to JSON and are
//! range-checked by `validate()` before use; an invalid document is
//! rejected, never clamped.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::model::{ActuatorId, RoomId};

/// A configuration document that can check its own ranges.
pub trait Validate {
    fn validate(&self) -> Result<(), ConfigError>;
}

impl Validate for FirmwareConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        FirmwareConfig::validate(self)
    }
}

impl Validate for GatewayConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        GatewayConfig::validate(self)
    }
}

/// Samples per moving-average window.
pub const FILTER_WINDOW: usize = 5;

/// A flush ends once the trigger value falls below this share of its threshold.
pub const FLUSH_RELEASE_RATIO: f32 = 0.9;

// ═══════════════════════════════════════════════════════════════
//  Node side
// ═══════════════════════════════════════════════════════════════

/// Plausibility limits; anything outside is a sensor anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReadingBounds {
    pub temp_min_c: f32,
    pub temp_max_c: f32,
    pub humidity_min_pct: f32,
    pub humidity_max_pct: f32,
    pub co2_min_ppm: u16,
    pub co2_max_ppm: u16,
}

impl ReadingBounds {
    pub fn contains(&self, temperature_c: f32, humidity_pct: f32, co2_ppm: u16) -> bool {
        (self.temp_min_c..=self.temp_max_c).contains(&temperature_c)
            && (self.humidity_min_pct..=self.humidity_max_pct).contains(&humidity_pct)
            && (self.co2_min_ppm..=self.co2_max_ppm).contains(&co2_ppm)
    }
}

impl Default for ReadingBounds {
    fn default() -> Self {
        Self {
            temp_min_c: -10.0,
            temp_max_c: 60.0,
            humidity_min_pct: 0.0,
            humidity_max_pct: 100.0,
            co2_min_ppm: 400,
            co2_max_ppm: 5000,
        }
    }
}

/// What the node does when the link watchdog fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchdogPolicy {
    /// Drive every relay off on timeout.
    #[default]
    FailSafeShutdown,
    /// Log the outage and keep relays as they are.
    DiagnosticsOnly,
}

/// Relay/sensor node configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirmwareConfig {
    // --- Link ---
    /// Serial line rate shared with the gateway.
    pub baud_rate: u32,

    // --- Sensors ---
    /// Sensor read + telemetry interval (milliseconds).
    pub sensor_interval_ms: u32,
    /// Delay after boot before the first read (milliseconds).
    pub sensor_warmup_ms: u32,
    /// Consecutive low-level I2C failures before bus recovery.
    pub i2c_recovery_retries: u8,
    /// Transfer timeout armed when the I2C peripheral is re-initialised.
    pub i2c_timeout_ms: u32,
    pub bounds: ReadingBounds,

    // --- Safety ---
    /// Serial silence (milliseconds) that declares the link unsafe.
    pub watchdog_timeout_ms: u32,
    /// Cadence of watchdog checks (milliseconds).
    pub watchdog_check_interval_ms: u32,
    pub watchdog_policy: WatchdogPolicy,
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            sensor_interval_ms: 5000,
            sensor_warmup_ms: 2000,
            i2c_recovery_retries: 3,
            i2c_timeout_ms: 50,
            bounds: ReadingBounds::default(),
            watchdog_timeout_ms: 10_000,
            watchdog_check_interval_ms: 1000,
            watchdog_policy: WatchdogPolicy::FailSafeShutdown,
        }
    }
}

impl FirmwareConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.baud_rate == 0 {
            return Err(ConfigError::ValidationFailed("baud_rate must be > 0"));
        }
        if self.sensor_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("sensor_interval_ms must be > 0"));
        }
        if self.i2c_recovery_retries == 0 {
            return Err(ConfigError::ValidationFailed("i2c_recovery_retries must be >= 1"));
        }
        if self.i2c_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("i2c_timeout_ms must be > 0"));
        }
        if self.watchdog_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("watchdog_timeout_ms must be > 0"));
        }
        if self.watchdog_check_interval_ms == 0
            || self.watchdog_check_interval_ms >= self.watchdog_timeout_ms
        {
            return Err(ConfigError::ValidationFailed(
                "watchdog_check_interval_ms must be in 1..watchdog_timeout_ms",
            ));
        }
        let b = &self.bounds;
        if !(b.temp_min_c < b.temp_max_c)
            || !(b.humidity_min_pct < b.humidity_max_pct)
            || b.co2_min_ppm >= b.co2_max_ppm
        {
            return Err(ConfigError::ValidationFailed("bounds: min must be below max"));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Gateway side
// ═══════════════════════════════════════════════════════════════

/// Alternating mist/fan humidifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumidifierConfig {
    pub mist: ActuatorId,
    pub fan: ActuatorId,
    pub mist_secs: u32,
    pub fan_secs: u32,
    /// Look-ahead for the humidity trend: once at target, a rise that would
    /// cross the upper band edge within this many seconds ends the cycle.
    #[serde(default = "default_overshoot_horizon")]
    pub overshoot_horizon_secs: u32,
}

fn default_overshoot_horizon() -> u32 {
    15
}

/// Daily light window.  `lights_off` earlier than `lights_on` wraps midnight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photoperiod {
    pub led: ActuatorId,
    #[serde(with = "hhmm")]
    pub lights_on: NaiveTime,
    #[serde(with = "hhmm")]
    pub lights_off: NaiveTime,
}

impl Photoperiod {
    pub fn is_lit(&self, now: NaiveTime) -> bool {
        if self.lights_on <= self.lights_off {
            now >= self.lights_on && now < self.lights_off
        } else {
            now >= self.lights_on || now < self.lights_off
        }
    }
}

/// Spawning temperature that forces the exhaust on through its flush.
pub const SPAWNING_TEMP_EMERGENCY_C: f32 = 28.0;

/// Per-room climate thresholds and the actuators the room drives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomConfig {
    pub temp_target_c: f32,
    pub temp_tolerance_c: f32,
    pub humidity_target_pct: f32,
    pub humidity_tolerance_pct: f32,
    pub co2_max_ppm: u16,
    pub co2_hysteresis_ppm: u16,
    /// Fans switched on by heat or CO2 demand.
    #[serde(default)]
    pub ventilation: Vec<ActuatorId>,
    #[serde(default)]
    pub humidifier: Option<HumidifierConfig>,
    #[serde(default)]
    pub lighting: Option<Photoperiod>,
}

impl RoomConfig {
    pub fn fruiting() -> Self {
        Self {
            temp_target_c: 24.0,
            temp_tolerance_c: 2.0,
            humidity_target_pct: 90.0,
            humidity_tolerance_pct: 5.0,
            co2_max_ppm: 1000,
            co2_hysteresis_ppm: 100,
            ventilation: vec![ActuatorId::FruitingExhaustFan, ActuatorId::FruitingIntakeFan],
            humidifier: Some(HumidifierConfig {
                mist: ActuatorId::MistMaker,
                fan: ActuatorId::HumidifierFan,
                mist_secs: 10,
                fan_secs: 30,
                overshoot_horizon_secs: default_overshoot_horizon(),
            }),
            lighting: None,
        }
    }

    /// Spawning room: alerts only, ventilation comes from the passive fan
    /// and its CO2/heat flush.
    pub fn spawning() -> Self {
        Self {
            temp_target_c: 24.0,
            temp_tolerance_c: 2.0,
            humidity_target_pct: 85.0,
            humidity_tolerance_pct: 5.0,
            co2_max_ppm: 3000,
            co2_hysteresis_ppm: 200,
            ventilation: Vec::new(),
            humidifier: None,
            lighting: None,
        }
    }

    /// Every actuator this room's decision engine may command.
    pub fn owned_actuators(&self) -> impl Iterator<Item = ActuatorId> + '_ {
        self.ventilation
            .iter()
            .copied()
            .chain(self.humidifier.iter().flat_map(|h| [h.mist, h.fan]))
            .chain(self.lighting.iter().map(|l| l.led))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.temp_tolerance_c > 0.0) {
            return Err(ConfigError::ValidationFailed("temp_tolerance_c must be > 0"));
        }
        if !(self.humidity_tolerance_pct > 0.0) {
            return Err(ConfigError::ValidationFailed("humidity_tolerance_pct must be > 0"));
        }
        if !(0.0..=100.0).contains(&self.humidity_target_pct) {
            return Err(ConfigError::ValidationFailed("humidity_target_pct must be in 0..=100"));
        }
        if self.co2_max_ppm == 0 {
            return Err(ConfigError::ValidationFailed("co2_max_ppm must be > 0"));
        }
        if self.co2_hysteresis_ppm >= self.co2_max_ppm {
            return Err(ConfigError::ValidationFailed(
                "co2_hysteresis_ppm must be below co2_max_ppm",
            ));
        }
        if let Some(h) = &self.humidifier {
            if h.mist_secs == 0 || h.fan_secs == 0 {
                return Err(ConfigError::ValidationFailed("humidifier phases must be > 0 s"));
            }
            if h.mist == h.fan {
                return Err(ConfigError::ValidationFailed("humidifier mist and fan must differ"));
            }
        }
        if let Some(l) = &self.lighting {
            if l.lights_on == l.lights_off {
                return Err(ConfigError::ValidationFailed("lighting window is empty"));
            }
        }
        Ok(())
    }
}

/// Timer mode of a passive fan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum FanMode {
    /// `run_secs` on, then `period_secs - run_secs` off, forever.
    Interval { period_secs: u32, run_secs: u32 },
    /// `run_secs` on at each listed time of day.
    Clock {
        #[serde(with = "hhmm_list")]
        times: Vec<NaiveTime>,
        run_secs: u32,
        /// How long after a listed time the trigger still matches.
        #[serde(default = "default_clock_window")]
        window_secs: u32,
    },
}

fn default_clock_window() -> u32 {
    60
}

/// Sensor-triggered override that forces a fan on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlushConfig {
    /// Room whose readings arm the flush.
    pub room: RoomId,
    #[serde(default)]
    pub co2_trigger_ppm: Option<u16>,
    #[serde(default)]
    pub temp_trigger_c: Option<f32>,
    /// Upper bound on one flush, even if the condition persists.
    pub max_secs: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanScheduleConfig {
    pub actuator: ActuatorId,
    #[serde(flatten)]
    pub mode: FanMode,
    #[serde(default)]
    pub flush: Option<FlushConfig>,
}

impl FanScheduleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.mode {
            FanMode::Interval {
                period_secs,
                run_secs,
            } => {
                if *run_secs == 0 || run_secs >= period_secs {
                    return Err(ConfigError::ValidationFailed(
                        "interval fan: run_secs must be in 1..period_secs",
                    ));
                }
            }
            FanMode::Clock {
                times,
                run_secs,
                window_secs,
            } => {
                if times.is_empty() {
                    return Err(ConfigError::ValidationFailed("clock fan: empty schedule"));
                }
                if *run_secs == 0 || *window_secs == 0 {
                    return Err(ConfigError::ValidationFailed(
                        "clock fan: run_secs and window_secs must be > 0",
                    ));
                }
            }
        }
        if let Some(flush) = &self.flush {
            if flush.max_secs == 0 {
                return Err(ConfigError::ValidationFailed("flush: max_secs must be > 0"));
            }
            if flush.co2_trigger_ppm.is_none() && flush.temp_trigger_c.is_none() {
                return Err(ConfigError::ValidationFailed("flush: no trigger configured"));
            }
            if flush.co2_trigger_ppm == Some(0) {
                return Err(ConfigError::ValidationFailed("flush: co2_trigger_ppm must be > 0"));
            }
        }
        Ok(())
    }
}

/// Gateway configuration document.  Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub fruiting: RoomConfig,
    pub spawning: RoomConfig,
    pub fans: Vec<FanScheduleConfig>,

    // --- Timing ---
    /// Control tick cadence (milliseconds).
    pub tick_interval_ms: u32,
    /// Keepalive cadence towards the node (milliseconds).
    pub keepalive_interval_ms: u32,
    /// Inbound silence (milliseconds) reported as a stale link.
    pub link_stale_ms: u32,
    /// Uptime before sensor-driven automation starts (seconds).
    pub warmup_secs: u32,

    // --- Operator ---
    /// Lifetime of a manual override (seconds).
    pub manual_override_secs: u32,
    /// When false, `automatic` intents are ignored; timers and flushes continue.
    pub auto_mode: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            fruiting: RoomConfig::fruiting(),
            spawning: RoomConfig::spawning(),
            fans: vec![
                FanScheduleConfig {
                    actuator: ActuatorId::SpawningExhaustFan,
                    mode: FanMode::Interval {
                        period_secs: 1800,
                        run_secs: 120,
                    },
                    flush: Some(FlushConfig {
                        room: RoomId::Spawning,
                        co2_trigger_ppm: Some(2000),
                        // Heat emergency.
                        temp_trigger_c: Some(SPAWNING_TEMP_EMERGENCY_C),
                        max_secs: 300,
                    }),
                },
                FanScheduleConfig {
                    actuator: ActuatorId::DeviceExhaustFan,
                    mode: FanMode::Clock {
                        times: vec![at(8, 0), at(14, 0), at(20, 0)],
                        run_secs: 180,
                        window_secs: 60,
                    },
                    flush: None,
                },
            ],
            tick_interval_ms: 1000,
            keepalive_interval_ms: 2000,
            link_stale_ms: 15_000,
            warmup_secs: 30,
            manual_override_secs: 300,
            auto_mode: true,
        }
    }
}

impl GatewayConfig {
    pub fn room(&self, room: RoomId) -> &RoomConfig {
        match room {
            RoomId::Fruiting => &self.fruiting,
            RoomId::Spawning => &self.spawning,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fruiting.validate()?;
        self.spawning.validate()?;
        for (i, fan) in self.fans.iter().enumerate() {
            fan.validate()?;
            if self.fans[..i].iter().any(|f| f.actuator == fan.actuator) {
                return Err(ConfigError::ValidationFailed("fans: actuator scheduled twice"));
            }
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("tick_interval_ms must be > 0"));
        }
        if self.keepalive_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("keepalive_interval_ms must be > 0"));
        }
        if self.link_stale_ms <= self.keepalive_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "link_stale_ms must exceed keepalive_interval_ms",
            ));
        }
        if self.manual_override_secs == 0 {
            return Err(ConfigError::ValidationFailed("manual_override_secs must be > 0"));
        }
        Ok(())
    }
}

// ── Clock-of-day helpers ──────────────────────────────────────

/// `HH:MM` literal for defaults.
const fn at(hour: u32, minute: u32) -> NaiveTime {
    match NaiveTime::from_hms_opt(hour, minute, 0) {
        Some(t) => t,
        None => NaiveTime::MIN,
    }
}

/// Seconds since midnight, ignoring leap-second fractions.
pub fn seconds_of_day(t: NaiveTime) -> u32 {
    t.num_seconds_from_midnight()
}

pub fn parse_hhmm(s: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(s, "%H:%M")
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&t.format("%H:%M"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_hhmm(&raw).map_err(de::Error::custom)
    }
}

mod hhmm_list {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(times: &[NaiveTime], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(times.iter().map(|t| t.format("%H:%M").to_string()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<NaiveTime>, D::Error> {
        Vec::<String>::deserialize(d)?
            .iter()
            .map(|raw| super::parse_hhmm(raw).map_err(de::Error::custom))
            .collect()
    }
}
