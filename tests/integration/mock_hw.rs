//! Mock hardware for integration tests.
//!
//! A simulated I2C bus with a TCA9548A and one SCD41 per channel, relay
//! lines that remember their level, and an in-memory serial link.

use std::cell::Cell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

use mashctl::app::events::ControlEvent;
use mashctl::app::ports::EventSink;
use mashctl::drivers::mux::TCA9548A_ADDRESS;
use mashctl::drivers::relay::ActuatorDriver;
use mashctl::drivers::scd4x::{SCD4X_ADDRESS, crc8};
use mashctl::model::ActuatorId;
use mashctl::protocol::transport::Transport;
use mashctl::sensors::bus_recovery::BusLines;

// ── I2C bus ───────────────────────────────────────────────────

/// Raw SCD41 response for the given values.
pub fn scd_frame(co2_ppm: u16, temperature_c: f32, humidity_pct: f32) -> [u8; 9] {
    let t = (((temperature_c + 45.0) * 65535.0) / 175.0).round() as u16;
    let rh = ((humidity_pct * 65535.0) / 100.0).round() as u16;
    let mut raw = [0u8; 9];
    for (i, w) in [co2_ppm, t, rh].into_iter().enumerate() {
        let [hi, lo] = w.to_be_bytes();
        raw[i * 3] = hi;
        raw[i * 3 + 1] = lo;
        raw[i * 3 + 2] = crc8(&[hi, lo]);
    }
    raw
}

pub struct MockBus {
    /// Sensor response per multiplexer channel; `None` means nothing answers.
    pub sensors: [Option<[u8; 9]>; 8],
    selected: Option<u8>,
    /// Fail this many upcoming sensor transfers with a bus error.
    pub fail_transfers: u32,
    pub mux_writes: u32,
    pub reinits: u32,
}

#[allow(dead_code)]
impl MockBus {
    pub fn new() -> Self {
        Self {
            sensors: [None; 8],
            selected: None,
            fail_transfers: 0,
            mux_writes: 0,
            reinits: 0,
        }
    }

    pub fn with_rooms(fruiting: [u8; 9], spawning: [u8; 9]) -> Self {
        let mut bus = Self::new();
        bus.sensors[0] = Some(fruiting);
        bus.sensors[1] = Some(spawning);
        bus
    }
}

impl ErrorType for MockBus {
    type Error = ErrorKind;
}

impl I2c for MockBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        for op in operations {
            match (address, op) {
                (TCA9548A_ADDRESS, Operation::Write(data)) => {
                    self.mux_writes += 1;
                    let mask = data.first().copied().unwrap_or(0);
                    self.selected = (mask != 0).then(|| mask.trailing_zeros() as u8);
                }
                (SCD4X_ADDRESS, op) => {
                    if self.fail_transfers > 0 {
                        self.fail_transfers -= 1;
                        return Err(ErrorKind::Bus);
                    }
                    let sensor = self
                        .selected
                        .and_then(|ch| self.sensors[usize::from(ch)])
                        .ok_or(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))?;
                    if let Operation::Read(buf) = op {
                        let n = buf.len().min(sensor.len());
                        buf[..n].copy_from_slice(&sensor[..n]);
                    }
                }
                _ => return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)),
            }
        }
        Ok(())
    }
}

impl BusLines for MockBus {
    fn release(&mut self) {}
    fn set_scl(&mut self, _high: bool) {}
    fn set_sda(&mut self, _high: bool) {}
    fn sda_is_high(&mut self) -> bool {
        true
    }
    fn reinit(&mut self, _timeout_ms: u32) -> bool {
        self.reinits += 1;
        true
    }
}

pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

// ── Relay lines ───────────────────────────────────────────────

/// Output line whose level is shared with the test; `None` until driven.
pub struct MockPin(pub Rc<Cell<Option<bool>>>);

impl PinErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.set(Some(false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.set(Some(true));
        Ok(())
    }
}

/// Relay bank with every actuator except `Reserved` wired.
pub fn relay_bank() -> (ActuatorDriver<MockPin>, Vec<Rc<Cell<Option<bool>>>>) {
    let levels: Vec<_> = ActuatorId::ALL
        .iter()
        .map(|_| Rc::new(Cell::new(None)))
        .collect();
    let driver = ActuatorDriver::from_pairs(
        ActuatorId::ALL
            .into_iter()
            .filter(|&id| id != ActuatorId::Reserved)
            .map(|id| (id, MockPin(levels[id.index()].clone()))),
    );
    (driver, levels)
}

// ── Serial link ───────────────────────────────────────────────

#[derive(Default)]
pub struct MockLink {
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
}

#[allow(dead_code)]
impl MockLink {
    pub fn push(&mut self, data: &str) {
        self.rx.extend(data.bytes());
    }

    /// Complete lines written so far; clears the buffer.
    pub fn take_lines(&mut self) -> Vec<String> {
        let text = String::from_utf8_lossy(&self.tx).into_owned();
        self.tx.clear();
        text.lines().map(str::to_owned).collect()
    }
}

impl Transport for MockLink {
    type Error = Infallible;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Infallible> {
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, Infallible> {
        self.tx.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

// ── Event capture ─────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingEvents {
    pub events: Vec<ControlEvent>,
}

#[allow(dead_code)]
impl RecordingEvents {
    pub fn count(&self, pred: impl Fn(&ControlEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingEvents {
    fn emit(&mut self, event: &ControlEvent) {
        self.events.push(event.clone());
    }
}
