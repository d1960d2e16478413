//! Sensirion SCD41 CO2 / temperature / humidity sensor.
//!
//! Minimal command set for periodic measurement mode over any
//! `embedded-hal` 1.0 I2C bus.  Every 16-bit response word carries a
//! CRC-8 (poly 0x31, init 0xFF).
//!
//! ```text
//!  read_measurement: write 0xEC05 ─▶ wait 1 ms ─▶ read 9 bytes
//!  ┌────────┬─────┬────────┬─────┬────────┬─────┐
//!  │ CO2 w0 │ crc │ T  w1  │ crc │ RH w2  │ crc │
//!  └────────┴─────┴────────┴─────┴────────┴─────┘
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

pub const SCD4X_ADDRESS: u8 = 0x62;

const CMD_START_PERIODIC: u16 = 0x21B1;
const CMD_STOP_PERIODIC: u16 = 0x3F86;
const CMD_READ_MEASUREMENT: u16 = 0xEC05;

const READ_EXEC_MS: u32 = 1;
const STOP_SETTLE_MS: u32 = 500;

/// Converted measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub co2_ppm: u16,
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

/// Driver failure.  `I2c` carries the bus error for classification upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scd4xError<E> {
    I2c(E),
    Crc,
}

impl<E> From<E> for Scd4xError<E> {
    fn from(e: E) -> Self {
        Self::I2c(e)
    }
}

/// Stateless handle; the bus and delay are lent per call so the
/// multiplexer and recovery code can share them.
#[derive(Debug, Clone, Copy)]
pub struct Scd4x {
    address: u8,
}

impl Default for Scd4x {
    fn default() -> Self {
        Self::new()
    }
}

impl Scd4x {
    pub const fn new() -> Self {
        Self {
            address: SCD4X_ADDRESS,
        }
    }

    pub fn start_periodic_measurement<B: I2c>(&self, bus: &mut B) -> Result<(), B::Error> {
        bus.write(self.address, &CMD_START_PERIODIC.to_be_bytes())
    }

    /// Stop periodic mode; the sensor ignores commands for 500 ms afterwards.
    pub fn stop_periodic_measurement<B: I2c, D: DelayNs>(
        &self,
        bus: &mut B,
        delay: &mut D,
    ) -> Result<(), B::Error> {
        bus.write(self.address, &CMD_STOP_PERIODIC.to_be_bytes())?;
        delay.delay_ms(STOP_SETTLE_MS);
        Ok(())
    }

    pub fn read_measurement<B: I2c, D: DelayNs>(
        &self,
        bus: &mut B,
        delay: &mut D,
    ) -> Result<Measurement, Scd4xError<B::Error>> {
        bus.write(self.address, &CMD_READ_MEASUREMENT.to_be_bytes())?;
        delay.delay_ms(READ_EXEC_MS);
        let mut raw = [0u8; 9];
        bus.read(self.address, &mut raw)?;
        decode_measurement(&raw).ok_or(Scd4xError::Crc)
    }
}

/// Sensirion CRC-8: polynomial 0x31, init 0xFF, no reflection, no final XOR.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Check CRCs and convert a raw 9-byte response.  `None` on any CRC mismatch.
pub fn decode_measurement(raw: &[u8; 9]) -> Option<Measurement> {
    let mut words = [0u16; 3];
    for (i, chunk) in raw.chunks_exact(3).enumerate() {
        if crc8(&chunk[..2]) != chunk[2] {
            return None;
        }
        words[i] = u16::from_be_bytes([chunk[0], chunk[1]]);
    }
    Some(Measurement {
        co2_ppm: words[0],
        temperature_c: -45.0 + 175.0 * f32::from(words[1]) / 65535.0,
        humidity_pct: 100.0 * f32::from(words[2]) / 65535.0,
    })
}
