//! MASH enclosure control library.
//!
//! Shared by both binaries: the ESP32 relay/sensor node (`mash-firmware`)
//! and the Linux gateway (`mash-gateway`).  Everything below is plain
//! logic over `embedded-hal` traits and port traits, so the whole control
//! path runs under `cargo test` on the host.  ESP-IDF specifics are gated
//! by `#[cfg(target_os = "espidf")]` inside the modules that need them.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod firmware;
pub mod gateway;
pub mod model;
pub mod pins;
pub mod protocol;
pub mod safety;
pub mod scheduler;
pub mod sensors;

pub use error::{Error, Result};
