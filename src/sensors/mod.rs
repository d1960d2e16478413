//! Sensor acquisition: the multiplexed SCD41 pair behind one I2C bus.
//!
//! [`SensorAcquisition`] owns the bus, the per-room filters and the
//! last-valid cache.  Every call to [`read_room`](SensorAcquisition::read_room)
//! returns *something* publishable:
//!
//! ```text
//!  select mux ch ──fail──▶ tally++ ─▶ (tally ≥ N ? recover) ─▶ last valid
//!       │ ok
//!  read SCD41 ──not ready / CRC / CO2=0──▶ last valid
//!       │ ok       ──transfer error──▶ tally++ ─▶ …
//!  bounds check ──anomaly──▶ last valid
//!       │ ok
//!  filter T/RH (CO2 raw) ─▶ new valid reading
//! ```
//!
//! A single flaky sensor or a wedged bus must not crash the control loop.

pub mod bus_recovery;
pub mod filter;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, ErrorKind, I2c};
use log::{debug, error, info, warn};

use crate::config::{FILTER_WINDOW, FirmwareConfig, ReadingBounds};
use crate::drivers::mux::Tca9548a;
use crate::drivers::scd4x::{Measurement, Scd4x, Scd4xError};
use crate::error::{BusError, SensorError};
use crate::model::{RoomId, SensorReading};
use crate::pins;
use bus_recovery::{BusLines, RecoveryReport, recover_bus};
use filter::MovingAverage;

/// Settle time after switching multiplexer channels.
const MUX_SETTLE_MS: u32 = 5;

/// Per-room filter and fallback state.
#[derive(Debug, Clone, Default)]
struct RoomChannel {
    temperature: MovingAverage<FILTER_WINDOW>,
    humidity: MovingAverage<FILTER_WINDOW>,
    last_valid: Option<SensorReading>,
}

/// Why the latest attempt for a room did not yield a fresh reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadFault {
    Sensor(SensorError),
    Bus(BusError),
}

pub struct SensorAcquisition<B, D> {
    bus: B,
    delay: D,
    mux: Tca9548a,
    scd: Scd4x,
    bounds: ReadingBounds,
    recovery_threshold: u8,
    i2c_timeout_ms: u32,
    /// Consecutive low-level I2C failures.
    failures: u8,
    recoveries: u32,
    rooms: [RoomChannel; 2],
    last_fault: [Option<ReadFault>; 2],
}

impl<B, D> SensorAcquisition<B, D>
where
    B: I2c + BusLines,
    D: DelayNs,
{
    pub fn new(bus: B, delay: D, config: &FirmwareConfig) -> Self {
        Self {
            bus,
            delay,
            mux: Tca9548a::default(),
            scd: Scd4x::new(),
            bounds: config.bounds,
            recovery_threshold: config.i2c_recovery_retries.max(1),
            i2c_timeout_ms: config.i2c_timeout_ms,
            failures: 0,
            recoveries: 0,
            rooms: Default::default(),
            last_fault: [None; 2],
        }
    }

    /// Put both sensors into periodic measurement mode.
    /// Returns the number of sensors that accepted the command.
    pub fn begin(&mut self) -> usize {
        let mut started = 0;
        for room in RoomId::ALL {
            if self.mux.select(&mut self.bus, pins::mux_channel(room)).is_err() {
                warn!("Sensors: {room} multiplexer channel unreachable");
                continue;
            }
            self.delay.delay_ms(MUX_SETTLE_MS);
            // A sensor left running by a warm reset rejects start until stopped.
            let _ = self.scd.stop_periodic_measurement(&mut self.bus, &mut self.delay);
            match self.scd.start_periodic_measurement(&mut self.bus) {
                Ok(()) => {
                    info!("Sensors: {room} SCD41 started");
                    started += 1;
                }
                Err(e) => warn!("Sensors: {room} SCD41 start failed ({:?})", e.kind()),
            }
        }
        started
    }

    /// Read one room.  Always returns a publishable reading: a fresh one,
    /// the last valid one, or an invalid placeholder if none exists yet.
    pub fn read_room(&mut self, room: RoomId, now_ms: u64) -> SensorReading {
        match self.acquire(room) {
            Ok(m) => {
                self.failures = 0;
                self.accept(room, m, now_ms)
            }
            Err(fault) => {
                self.last_fault[room.index()] = Some(fault);
                if let ReadFault::Bus(e) = fault {
                    self.note_bus_failure(room, e);
                }
                self.fallback(room, now_ms)
            }
        }
    }

    fn acquire(&mut self, room: RoomId) -> Result<Measurement, ReadFault> {
        self.mux
            .select(&mut self.bus, pins::mux_channel(room))
            .map_err(|_| ReadFault::Bus(BusError::MuxSelectFailed))?;
        self.delay.delay_ms(MUX_SETTLE_MS);

        let m = match self.scd.read_measurement(&mut self.bus, &mut self.delay) {
            Ok(m) => m,
            Err(Scd4xError::Crc) => {
                self.failures = 0;
                return Err(ReadFault::Sensor(SensorError::CrcMismatch));
            }
            Err(Scd4xError::I2c(e)) => {
                return Err(match e.kind() {
                    ErrorKind::NoAcknowledge(_) => ReadFault::Sensor(SensorError::NotReady),
                    _ => ReadFault::Bus(BusError::TransferFailed),
                });
            }
        };
        // The transfer completed, so the bus is healthy from here on.
        self.failures = 0;
        if m.co2_ppm == 0 {
            return Err(ReadFault::Sensor(SensorError::NotReady));
        }
        if !self
            .bounds
            .contains(m.temperature_c, m.humidity_pct, m.co2_ppm)
        {
            warn!(
                "Sensors: {room} anomaly rejected (T={:.1} RH={:.1} CO2={})",
                m.temperature_c, m.humidity_pct, m.co2_ppm
            );
            return Err(ReadFault::Sensor(SensorError::OutOfRange));
        }
        Ok(m)
    }

    fn accept(&mut self, room: RoomId, m: Measurement, now_ms: u64) -> SensorReading {
        let ch = &mut self.rooms[room.index()];
        let reading = SensorReading {
            room,
            temperature_c: ch.temperature.push(m.temperature_c),
            humidity_pct: ch.humidity.push(m.humidity_pct),
            co2_ppm: m.co2_ppm,
            valid: true,
            captured_at_ms: now_ms,
        };
        ch.last_valid = Some(reading);
        self.last_fault[room.index()] = None;
        reading
    }

    fn fallback(&self, room: RoomId, now_ms: u64) -> SensorReading {
        if let Some(fault) = self.last_fault[room.index()] {
            debug!("Sensors: {room} using last valid reading ({fault:?})");
        }
        self.rooms[room.index()]
            .last_valid
            .unwrap_or(SensorReading::invalid(room, now_ms))
    }

    fn note_bus_failure(&mut self, room: RoomId, e: BusError) {
        self.failures = self.failures.saturating_add(1);
        warn!(
            "I2C: {room} {e} ({}/{})",
            self.failures, self.recovery_threshold
        );
        if self.failures >= self.recovery_threshold {
            let report = self.recover();
            if !report.reinit_ok {
                error!("I2C: peripheral did not come back after recovery");
            }
        }
    }

    /// Run bus recovery now.  Resets the failure tally whatever the outcome.
    pub fn recover(&mut self) -> RecoveryReport {
        warn!("I2C: starting bus recovery");
        let report = recover_bus(&mut self.bus, &mut self.delay, self.i2c_timeout_ms);
        self.failures = 0;
        self.recoveries = self.recoveries.saturating_add(1);
        info!(
            "I2C: recovery done (pulses={}, sda_released={}, reinit_ok={})",
            report.pulses, report.sda_released, report.reinit_ok
        );
        report
    }

    /// Current consecutive-failure tally.
    pub fn failure_count(&self) -> u8 {
        self.failures
    }

    pub fn recovery_count(&self) -> u32 {
        self.recoveries
    }

    pub fn last_valid(&self, room: RoomId) -> Option<SensorReading> {
        self.rooms[room.index()].last_valid
    }

    /// Why the most recent read of `room` fell back, if it did.
    pub fn last_fault(&self, room: RoomId) -> Option<ReadFault> {
        self.last_fault[room.index()]
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}
