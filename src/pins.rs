//! GPIO / peripheral pin assignments for the MASH relay node (ESP32-S3).
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

use crate::model::{ActuatorId, RoomId};

// ---------------------------------------------------------------------------
// 8-channel relay board (active LOW)
// ---------------------------------------------------------------------------

/// Relay control lines in [`ActuatorId::ALL`] order (relay 1 on GPIO 2).
pub const RELAY_GPIOS: [i32; ActuatorId::COUNT] = [2, 3, 4, 5, 6, 7, 8, 9];

pub const fn relay_gpio(id: ActuatorId) -> i32 {
    RELAY_GPIOS[id.index()]
}

// ---------------------------------------------------------------------------
// I²C bus: TCA9548A multiplexer + two SCD41 sensors
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 14;
pub const I2C_SCL_GPIO: i32 = 15;
/// Standard-mode clock; the SCD41 tops out at 100 kHz.
pub const I2C_FREQ_HZ: u32 = 100_000;

/// Multiplexer downstream channel wired to each room's sensor.
pub const fn mux_channel(room: RoomId) -> u8 {
    match room {
        RoomId::Fruiting => 0,
        RoomId::Spawning => 1,
    }
}

// ---------------------------------------------------------------------------
// UART link to the gateway (the console UART stays free for logs)
// ---------------------------------------------------------------------------

pub const LINK_UART_PORT: i32 = 1;
pub const LINK_UART_TX_GPIO: i32 = 17;
pub const LINK_UART_RX_GPIO: i32 = 18;
