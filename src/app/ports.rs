//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Controller / FirmwareNode (domain)
//! ```
//!
//! Driven adapters (event sinks, record sinks, config files) implement
//! these traits.  The gateway [`Controller`](crate::gateway::Controller)
//! consumes them via generics, so the domain core never touches I/O.
//!
//! ## Contract notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - **RecordSink** implementations MUST NOT block the control cycle.

use crate::app::events::{ControlEvent, Record};
use crate::model::ActuatorId;

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / alerting)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`ControlEvent`]s through this port.
/// Adapters decide where they go (log lines, alert channel, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &ControlEvent);
}

// ───────────────────────────────────────────────────────────────
// Record sink port (driven adapter: domain → persistence / sync)
// ───────────────────────────────────────────────────────────────

/// Fire-and-forget sink for accepted readings and emitted actuator states.
///
/// Called from inside the control tick: implementations must return
/// immediately, dropping the record rather than waiting for space.
pub trait RecordSink {
    fn record(&mut self, record: Record);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists a configuration document of type `C`.
///
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// never silently clamped.
pub trait ConfigPort<C> {
    /// Load configuration.  Returns the default document if none is stored.
    fn load(&self) -> Result<C, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &C) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples fan timers from event reporting)
// ───────────────────────────────────────────────────────────────

/// Callback the [`PassiveFanScheduler`](crate::scheduler::PassiveFanScheduler)
/// invokes whenever a fan changes phase.
///
/// The scheduler itself knows nothing about events or sinks; the
/// controller implements this to forward transitions to its [`EventSink`].
pub trait SchedulerDelegate {
    fn on_fan_transition(&mut self, actuator: ActuatorId, from: FanPhase, to: FanPhase);
}

/// Observable phase of one passive fan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanPhase {
    /// Timer says off.
    Idle,
    /// Timer says on.
    Running,
    /// Sensor-triggered override is forcing the fan on.
    Flushing,
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config document exists yet.
    NotFound,
    /// The stored document failed to deserialize.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::error::Error for ConfigError {}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::NotFound => Self::Config("config not found"),
            ConfigError::Corrupted => Self::Config("config corrupted"),
            ConfigError::IoError => Self::Config("config I/O error"),
        }
    }
}
