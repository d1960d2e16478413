//! MASH relay/sensor node: main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  GpioLine ×8     EspI2cBus (TCA9548A + 2× SCD41)   UartLink  │
//! │      │                 │                              │      │
//! │  ────┼──── embedded-hal / Transport boundary ─────────┼───── │
//! │      ▼                 ▼                              ▼      │
//! │  ActuatorDriver   SensorAcquisition          line protocol   │
//! │      └──────────── FirmwareNode::poll ◀──────────────┘       │
//! │                    + SafetyWatchdog                          │
//! │                                                              │
//! │  loop { poll(now); twdt.feed(); delay 10 ms }                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Boot order matters: relay lines are claimed and forced off before any
//! other subsystem starts.
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_svc::hal::delay::{Delay, FreeRtos};
use log::{error, info};

use mashctl::adapters::esp::{EspI2cBus, GpioLine, UartLink};
use mashctl::adapters::time::MonotonicClock;
use mashctl::config::FirmwareConfig;
use mashctl::drivers::relay::ActuatorDriver;
use mashctl::drivers::watchdog::TaskWatchdog;
use mashctl::firmware::FirmwareNode;
use mashctl::model::ActuatorId;
use mashctl::pins;
use mashctl::sensors::SensorAcquisition;

/// Cooperative loop period.
const LOOP_PERIOD_MS: u32 = 10;

/// Device watchdog: well above the longest loop pass (bus recovery).
const TWDT_TIMEOUT_MS: u32 = 5_000;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    info!("MASH node v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Relays off before anything else ────────────────────
    let lines = ActuatorId::ALL.map(|id| match GpioLine::output_high(pins::relay_gpio(id)) {
        Ok(line) => Some(line),
        Err(e) => {
            error!("Relay: {id} line unavailable ({e}), left unmapped");
            None
        }
    });
    let actuators = ActuatorDriver::new(lines);

    // ── 3. Config, sensors, link ──────────────────────────────
    let config = FirmwareConfig::default();
    config.validate()?;

    let bus = EspI2cBus::new(config.i2c_timeout_ms)?;
    let sensors = SensorAcquisition::new(bus, Delay::new_default(), &config);
    let link = UartLink::new(config.baud_rate)?;

    let clock = MonotonicClock::new();
    let twdt = TaskWatchdog::new(TWDT_TIMEOUT_MS);

    let mut node = FirmwareNode::new(sensors, actuators, link, config);
    node.begin(clock.now_ms());

    // ── 4. Main loop ──────────────────────────────────────────
    loop {
        node.poll(clock.now_ms());
        twdt.feed();
        FreeRtos::delay_ms(LOOP_PERIOD_MS);
    }
}
