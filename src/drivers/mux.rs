//! TCA9548A eight-channel I2C multiplexer.
//!
//! The control register is a single byte: bit *n* connects downstream
//! channel *n*.  Both SCD41 sensors share address 0x62, so exactly one
//! channel is enabled at a time.

use embedded_hal::i2c::I2c;

pub const TCA9548A_ADDRESS: u8 = 0x70;
pub const CHANNEL_COUNT: u8 = 8;

#[derive(Debug, Clone, Copy)]
pub struct Tca9548a {
    address: u8,
}

impl Default for Tca9548a {
    fn default() -> Self {
        Self::new(TCA9548A_ADDRESS)
    }
}

impl Tca9548a {
    pub const fn new(address: u8) -> Self {
        Self { address }
    }

    /// Connect `channel` (0..8) and disconnect every other channel.
    pub fn select<B: I2c>(&self, bus: &mut B, channel: u8) -> Result<(), B::Error> {
        bus.write(self.address, &[channel_mask(channel)])
    }

    /// Disconnect all downstream channels.
    pub fn deselect_all<B: I2c>(&self, bus: &mut B) -> Result<(), B::Error> {
        bus.write(self.address, &[0])
    }
}

/// Control byte for `channel`; out-of-range channels wrap into 0..8.
pub const fn channel_mask(channel: u8) -> u8 {
    1 << (channel % CHANNEL_COUNT)
}
