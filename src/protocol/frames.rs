//! Wire frames: one JSON object per line.
//!
//! ```text
//!  node → gateway   {"fruiting":{"temp":T,"humidity":H,"co2":C},"spawning":{...}}
//!                   {"spawning":{"error":"invalid_reading"}}
//!                   {"watchdog":"recovered"}
//!                   {"ack":"<ActuatorId>","state":"ON"|"OFF"}
//!                   {"error":"<kind>"}
//!  gateway → node   {"actuator":"<ActuatorId>","state":"ON"|"OFF"}
//!                   {"keepalive":true}
//! ```
//!
//! Every inbound line is decoded once, here, into a closed enum.  Unknown
//! actuator names and bad states are rejected at this boundary.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::model::{ActuatorId, RoomId, SensorReading, SwitchState};

/// Error text for a room with no valid data.
pub const INVALID_READING: &str = "invalid_reading";

const RECOVERED: &str = "recovered";

// ═══════════════════════════════════════════════════════════════
//  Telemetry
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoomTelemetry {
    pub temp: f32,
    pub humidity: f32,
    pub co2: u16,
}

impl RoomTelemetry {
    pub fn to_reading(self, room: RoomId, captured_at_ms: u64) -> SensorReading {
        SensorReading {
            room,
            temperature_c: self.temp,
            humidity_pct: self.humidity,
            co2_ppm: self.co2,
            valid: true,
            captured_at_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoomReport {
    Reading(RoomTelemetry),
    Fault { error: String },
}

impl RoomReport {
    /// Telemetry view of a published reading, rounded to one decimal.
    pub fn from_reading(reading: &SensorReading) -> Self {
        if reading.valid {
            Self::Reading(RoomTelemetry {
                temp: round1(reading.temperature_c),
                humidity: round1(reading.humidity_pct),
                co2: reading.co2_ppm,
            })
        } else {
            Self::Fault {
                error: INVALID_READING.into(),
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fruiting: Option<RoomReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawning: Option<RoomReport>,
}

impl Telemetry {
    pub fn from_readings(readings: &[SensorReading]) -> Self {
        let mut t = Self::default();
        for r in readings {
            t.set(r.room, RoomReport::from_reading(r));
        }
        t
    }

    pub fn room(&self, room: RoomId) -> Option<&RoomReport> {
        match room {
            RoomId::Fruiting => self.fruiting.as_ref(),
            RoomId::Spawning => self.spawning.as_ref(),
        }
    }

    pub fn set(&mut self, room: RoomId, report: RoomReport) {
        match room {
            RoomId::Fruiting => self.fruiting = Some(report),
            RoomId::Spawning => self.spawning = Some(report),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fruiting.is_none() && self.spawning.is_none()
    }
}

fn round1(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}

// ═══════════════════════════════════════════════════════════════
//  Node → gateway
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum UplinkFrame {
    Telemetry(Telemetry),
    /// A watchdog outage ended; the gateway must resend its full map.
    Recovered,
    Ack {
        actuator: ActuatorId,
        state: SwitchState,
    },
    /// The node rejected a line.
    NodeError(String),
}

#[derive(Deserialize)]
struct UplinkWire {
    fruiting: Option<RoomReport>,
    spawning: Option<RoomReport>,
    watchdog: Option<String>,
    ack: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

pub fn decode_uplink(line: &[u8]) -> Result<UplinkFrame, ProtocolError> {
    let wire: UplinkWire = serde_json::from_slice(line).map_err(|_| ProtocolError::Malformed)?;

    if let Some(w) = wire.watchdog {
        return if w == RECOVERED {
            Ok(UplinkFrame::Recovered)
        } else {
            Err(ProtocolError::Malformed)
        };
    }
    if let Some(ack) = wire.ack {
        let actuator = ack.parse()?;
        let state = wire
            .state
            .as_deref()
            .ok_or(ProtocolError::InvalidCommand)?
            .parse()?;
        return Ok(UplinkFrame::Ack { actuator, state });
    }
    if wire.fruiting.is_some() || wire.spawning.is_some() {
        return Ok(UplinkFrame::Telemetry(Telemetry {
            fruiting: wire.fruiting,
            spawning: wire.spawning,
        }));
    }
    if let Some(kind) = wire.error {
        return Ok(UplinkFrame::NodeError(kind));
    }
    Err(ProtocolError::Malformed)
}

#[derive(Serialize)]
struct RecoveredWire {
    watchdog: &'static str,
}

#[derive(Serialize)]
struct AckWire {
    ack: ActuatorId,
    state: SwitchState,
}

#[derive(Serialize)]
struct ErrorWire<'a> {
    error: &'a str,
}

pub fn encode_uplink(frame: &UplinkFrame) -> Result<String, ProtocolError> {
    match frame {
        UplinkFrame::Telemetry(t) => encode_line(t),
        UplinkFrame::Recovered => encode_line(&RecoveredWire {
            watchdog: RECOVERED,
        }),
        UplinkFrame::Ack { actuator, state } => encode_line(&AckWire {
            ack: *actuator,
            state: *state,
        }),
        UplinkFrame::NodeError(kind) => encode_line(&ErrorWire { error: kind }),
    }
}

// ═══════════════════════════════════════════════════════════════
//  Gateway → node
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownlinkFrame {
    Command {
        actuator: ActuatorId,
        state: SwitchState,
    },
    Keepalive,
}

/// Borrows where the JSON text allows it; escaped strings are unescaped
/// into an owned buffer.
#[derive(Deserialize)]
struct DownlinkWire<'a> {
    #[serde(borrow)]
    actuator: Option<Cow<'a, str>>,
    #[serde(borrow)]
    state: Option<Cow<'a, str>>,
    keepalive: Option<bool>,
}

pub fn decode_downlink(line: &[u8]) -> Result<DownlinkFrame, ProtocolError> {
    let wire: DownlinkWire<'_> =
        serde_json::from_slice(line).map_err(|_| ProtocolError::Malformed)?;

    if let Some(name) = wire.actuator {
        let actuator = name.parse()?;
        let state = wire.state.ok_or(ProtocolError::InvalidCommand)?.parse()?;
        return Ok(DownlinkFrame::Command { actuator, state });
    }
    match wire.keepalive {
        Some(true) => Ok(DownlinkFrame::Keepalive),
        _ => Err(ProtocolError::Malformed),
    }
}

#[derive(Serialize)]
struct CommandWire {
    actuator: ActuatorId,
    state: SwitchState,
}

#[derive(Serialize)]
struct KeepaliveWire {
    keepalive: bool,
}

pub fn encode_downlink(frame: &DownlinkFrame) -> Result<String, ProtocolError> {
    match frame {
        DownlinkFrame::Command { actuator, state } => encode_line(&CommandWire {
            actuator: *actuator,
            state: *state,
        }),
        DownlinkFrame::Keepalive => encode_line(&KeepaliveWire { keepalive: true }),
    }
}

/// Command line for one actuator.
pub fn command_line(actuator: ActuatorId, on: bool) -> Result<String, ProtocolError> {
    encode_downlink(&DownlinkFrame::Command {
        actuator,
        state: SwitchState::from(on),
    })
}

/// Serialize one frame as a `\n`-terminated line.
pub fn encode_line<T: Serialize>(frame: &T) -> Result<String, ProtocolError> {
    let mut line = serde_json::to_string(frame).map_err(|_| ProtocolError::Encode)?;
    line.push('\n');
    Ok(line)
}
