//! I2C bus-lockup recovery.
//!
//! A slave reset mid-read can hold SDA low forever.  The standard cure is
//! to take the lines as plain GPIO, clock SCL until the slave finishes
//! shifting out its byte and releases SDA (at most 9 pulses), then
//! synthesize a STOP and bring the I2C peripheral back up.
//!
//! ```text
//!  SCL ‾‾|_|‾|_|‾ … (≤ 9) ‾‾‾‾‾‾‾‾|____|‾‾‾‾‾‾‾‾
//!  SDA ____________ (released?) ____|‾‾‾‾‾‾  STOP: SDA ↑ while SCL high
//! ```
//!
//! Bounded: the routine never waits on the bus, only on fixed delays.

use embedded_hal::delay::DelayNs;

/// Upper bound on recovery clock pulses (one byte plus ACK).
pub const MAX_CLOCK_PULSES: u8 = 9;

/// Half-period of the recovery clock (~100 kHz).
const HALF_PERIOD_US: u32 = 5;

/// Raw control of the I2C lines, implemented by the bus adapter.
pub trait BusLines {
    /// Detach the I2C peripheral: SCL becomes an open-drain output, SDA an input.
    fn release(&mut self);
    fn set_scl(&mut self, high: bool);
    /// Drive SDA as an open-drain output.
    fn set_sda(&mut self, high: bool);
    fn sda_is_high(&mut self) -> bool;
    /// Re-attach the I2C peripheral with a transfer timeout guard.
    /// Returns false if the driver refused to come back.
    fn reinit(&mut self, timeout_ms: u32) -> bool;
}

/// What one recovery attempt observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    pub pulses: u8,
    pub sda_released: bool,
    pub reinit_ok: bool,
}

pub fn recover_bus<L: BusLines, D: DelayNs>(
    lines: &mut L,
    delay: &mut D,
    timeout_ms: u32,
) -> RecoveryReport {
    lines.release();
    lines.set_scl(true);
    delay.delay_us(HALF_PERIOD_US);

    let mut pulses = 0;
    while pulses < MAX_CLOCK_PULSES && !lines.sda_is_high() {
        lines.set_scl(false);
        delay.delay_us(HALF_PERIOD_US);
        lines.set_scl(true);
        delay.delay_us(HALF_PERIOD_US);
        pulses += 1;
    }
    let sda_released = lines.sda_is_high();

    // STOP condition: SDA low → high while SCL is high.
    lines.set_scl(false);
    delay.delay_us(HALF_PERIOD_US);
    lines.set_sda(false);
    delay.delay_us(HALF_PERIOD_US);
    lines.set_scl(true);
    delay.delay_us(HALF_PERIOD_US);
    lines.set_sda(true);
    delay.delay_us(HALF_PERIOD_US);

    let reinit_ok = lines.reinit(timeout_ms);
    RecoveryReport {
        pulses,
        sda_released,
        reinit_ok,
    }
}
