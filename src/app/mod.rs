//! Application boundary: port traits and the events crossing them.
//!
//! The control logic (sensing, decision, scheduling, arbitration) never
//! touches a file, a serial port or a log backend directly.  All of that
//! happens through the **port traits** defined in [`ports`], keeping the
//! core testable without real peripherals.

pub mod events;
pub mod ports;
