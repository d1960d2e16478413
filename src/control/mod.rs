//! Gateway-side decision layer: climate decisions, the humidifier cycle
//! and command arbitration.

pub mod arbiter;
pub mod decision;
pub mod humidifier;

pub use arbiter::{CommandArbiter, Resolution};
pub use decision::{Assessment, Decision, DecisionEngine, Hysteresis, SeverityChange, photoperiod};
pub use humidifier::{HumidifierCycle, HumidityTrend};
