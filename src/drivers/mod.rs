//! Device drivers: relay bank, I2C multiplexer, SCD41 sensor, task watchdog.

pub mod mux;
pub mod relay;
pub mod scd4x;
pub mod watchdog;
