//! Domain vocabulary shared by the node and the gateway.
//!
//! Everything here is plain data: identifiers decoded once at the protocol
//! boundary, commanded states with their provenance, and sensor readings.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

// ── Rooms ─────────────────────────────────────────────────────

/// An independently sensed enclosure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomId {
    Fruiting,
    Spawning,
}

impl RoomId {
    pub const ALL: [RoomId; 2] = [RoomId::Fruiting, RoomId::Spawning];

    /// Dense index for per-room arrays.
    pub const fn index(self) -> usize {
        match self {
            Self::Fruiting => 0,
            Self::Spawning => 1,
        }
    }

    /// JSON key used in telemetry frames.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Fruiting => "fruiting",
            Self::Spawning => "spawning",
        }
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.key())
    }
}

// ── Actuators ─────────────────────────────────────────────────

/// Logical relay-driven device on the eight-channel board revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActuatorId {
    MistMaker,
    HumidifierFan,
    FruitingExhaustFan,
    FruitingIntakeFan,
    SpawningExhaustFan,
    DeviceExhaustFan,
    FruitingLed,
    Reserved,
}

impl ActuatorId {
    pub const COUNT: usize = 8;

    /// Relay order, channel 1 first.
    pub const ALL: [ActuatorId; Self::COUNT] = [
        Self::MistMaker,
        Self::HumidifierFan,
        Self::FruitingExhaustFan,
        Self::FruitingIntakeFan,
        Self::SpawningExhaustFan,
        Self::DeviceExhaustFan,
        Self::FruitingLed,
        Self::Reserved,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MistMaker => "MIST_MAKER",
            Self::HumidifierFan => "HUMIDIFIER_FAN",
            Self::FruitingExhaustFan => "FRUITING_EXHAUST_FAN",
            Self::FruitingIntakeFan => "FRUITING_INTAKE_FAN",
            Self::SpawningExhaustFan => "SPAWNING_EXHAUST_FAN",
            Self::DeviceExhaustFan => "DEVICE_EXHAUST_FAN",
            Self::FruitingLed => "FRUITING_LED",
            Self::Reserved => "RESERVED",
        }
    }
}

impl fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ActuatorId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or(ProtocolError::UnknownActuator)
    }
}

// ── Commanded state ───────────────────────────────────────────

/// Wire form of a relay state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SwitchState {
    On,
    Off,
}

impl SwitchState {
    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::On => "ON",
            Self::Off => "OFF",
        }
    }
}

impl From<bool> for SwitchState {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

impl FromStr for SwitchState {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ON" => Ok(Self::On),
            "OFF" => Ok(Self::Off),
            _ => Err(ProtocolError::InvalidCommand),
        }
    }
}

/// Which decision source last set an actuator.  Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Manual,
    Automatic,
    Timed,
    Flush,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Manual => "manual",
            Self::Automatic => "automatic",
            Self::Timed => "timed",
            Self::Flush => "flush",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActuatorState {
    pub on: bool,
    pub provenance: Provenance,
}

impl ActuatorState {
    pub const OFF: Self = Self {
        on: false,
        provenance: Provenance::Automatic,
    };

    pub const fn new(on: bool, provenance: Provenance) -> Self {
        Self { on, provenance }
    }
}

/// One decision source's wish for one actuator in one control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intent {
    pub actuator: ActuatorId,
    pub on: bool,
    pub provenance: Provenance,
}

impl Intent {
    pub const fn new(actuator: ActuatorId, on: bool, provenance: Provenance) -> Self {
        Self {
            actuator,
            on,
            provenance,
        }
    }

    pub const fn state(&self) -> ActuatorState {
        ActuatorState::new(self.on, self.provenance)
    }
}

// ── Sensor readings ───────────────────────────────────────────

/// One published measurement for one room.  Superseded, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub room: RoomId,
    pub temperature_c: f32,
    pub humidity_pct: f32,
    pub co2_ppm: u16,
    pub valid: bool,
    /// Monotonic capture time in milliseconds.
    pub captured_at_ms: u64,
}

impl SensorReading {
    /// Placeholder for a room that has never produced valid data.
    pub const fn invalid(room: RoomId, captured_at_ms: u64) -> Self {
        Self {
            room,
            temperature_c: 0.0,
            humidity_pct: 0.0,
            co2_ppm: 0,
            valid: false,
            captured_at_ms,
        }
    }
}

/// Deviation class used for alerts and actuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Normal,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Normal => "normal",
            Self::Warning => "warning",
            Self::Critical => "critical",
        })
    }
}

/// Which measured quantity an assessment refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Temperature,
    Humidity,
    Co2,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Co2 => "co2",
        })
    }
}
