//! Unified error types for both nodes.
//!
//! A single `Error` enum that every subsystem can convert into, keeping
//! the control loops' error handling uniform.  All variants are `Copy` so
//! they can be logged, counted and passed around without allocation.

use core::fmt;

use crate::model::ActuatorId;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor produced no usable reading.
    Sensor(SensorError),
    /// The I2C bus itself misbehaved.
    Bus(BusError),
    /// A relay command could not be carried out.
    Actuator(ActuatorError),
    /// A serial line could not be decoded or encoded.
    Protocol(ProtocolError),
    /// The serial link is unusable.
    Link(LinkError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors (transient: handled by last-valid fallback)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The sensor has no fresh measurement (CO2 of zero, NACK while busy).
    NotReady,
    /// A response word failed its CRC-8 check.
    CrcMismatch,
    /// A value fell outside the configured plausibility bounds.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "measurement not ready"),
            Self::CrcMismatch => write!(f, "CRC mismatch"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Bus errors (counted towards bus recovery)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// Writing the channel mask to the multiplexer failed.
    MuxSelectFailed,
    /// A sensor transfer failed below the protocol level (timeout, arbitration).
    TransferFailed,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MuxSelectFailed => write!(f, "multiplexer select failed"),
            Self::TransferFailed => write!(f, "I2C transfer failed"),
        }
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// No relay line is wired for this actuator on this board.
    Unmapped(ActuatorId),
    /// Driving the relay line failed.
    GpioWriteFailed(ActuatorId),
}

impl ActuatorError {
    /// Tag used in the node's `{"error": ...}` reply.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Unmapped(_) => "unknown_actuator",
            Self::GpioWriteFailed(_) => "actuator_fault",
        }
    }
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unmapped(id) => write!(f, "{id} has no relay line"),
            Self::GpioWriteFailed(id) => write!(f, "GPIO write failed for {id}"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Protocol errors (the offending line is discarded)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Not JSON, or JSON of an unrecognised shape.
    Malformed,
    /// The line exceeded the receive buffer and was dropped whole.
    LineTooLong,
    /// The `actuator` field named no known actuator.
    UnknownActuator,
    /// The `state` field was missing or not `ON`/`OFF`.
    InvalidCommand,
    /// Serialising an outbound frame failed.
    Encode,
}

impl ProtocolError {
    /// Short machine-readable tag used in `{"error": ...}` replies.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::LineTooLong => "line_too_long",
            Self::UnknownActuator => "unknown_actuator",
            Self::InvalidCommand => "invalid_command",
            Self::Encode => "encode_failed",
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed line"),
            Self::LineTooLong => write!(f, "line too long"),
            Self::UnknownActuator => write!(f, "unknown actuator"),
            Self::InvalidCommand => write!(f, "invalid command"),
            Self::Encode => write!(f, "frame encoding failed"),
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Link errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// The transport rejected a read.
    ReadFailed,
    /// The transport rejected or truncated a write.
    WriteFailed,
    /// The outbound queue towards the link thread is full.
    QueueFull,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed => write!(f, "serial read failed"),
            Self::WriteFailed => write!(f, "serial write failed"),
            Self::QueueFull => write!(f, "outbound queue full"),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
