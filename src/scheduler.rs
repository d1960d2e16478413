//! Passive fan scheduler.
//!
//! One independent timer per configured fan, with an optional
//! sensor-triggered flush layered on top.  The scheduler reports phase
//! changes to a [`SchedulerDelegate`] and returns one intent per fan per
//! tick; the arbiter decides what actually reaches the relays.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │  interval:  Running(run) ─▶ Idle(period-run) ─▶ Running ─▶ …   │
//! │  clock:     Idle ── HH:MM window ──▶ Running(run) ─▶ Idle      │
//! │                                                                │
//! │  flush:     Inactive ── trigger ──▶ Active ── bound ─▶ Exhausted│
//! │                ▲                      │                 │      │
//! │                └──── < 90% of trigger ┴─────────────────┘      │
//! │                                                                │
//! │  Active flush ⇒ Running (provenance flush); the timer keeps    │
//! │  advancing underneath, so clearing resumes at its real offset. │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveTime;
use log::{info, warn};

use crate::app::ports::{FanPhase, SchedulerDelegate};
use crate::config::{FLUSH_RELEASE_RATIO, FanMode, FanScheduleConfig, FlushConfig, seconds_of_day};
use crate::model::{ActuatorId, Intent, Provenance, SensorReading};

const SECS_PER_DAY: u32 = 86_400;

// ═══════════════════════════════════════════════════════════════
//  Timer
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    /// Interval fan before its first tick.
    Unstarted,
    Idle { until_ms: Option<u64> },
    Running { until_ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flush {
    Inactive,
    Active { since_ms: u64 },
    /// Hit the bound; waits for the condition to clear.
    Exhausted,
}

#[derive(Debug, Clone)]
struct FanTimer {
    config: FanScheduleConfig,
    timer: Timer,
    flush: Flush,
    /// Clock entry whose window already fired.
    fired_slot: Option<usize>,
    reported: FanPhase,
}

impl FanTimer {
    fn new(config: FanScheduleConfig) -> Self {
        let timer = match config.mode {
            FanMode::Interval { .. } => Timer::Unstarted,
            FanMode::Clock { .. } => Timer::Idle { until_ms: None },
        };
        Self {
            config,
            timer,
            flush: Flush::Inactive,
            fired_slot: None,
            reported: FanPhase::Idle,
        }
    }

    fn advance_timer(&mut self, now_ms: u64, clock: Option<NaiveTime>) {
        match &self.config.mode {
            FanMode::Interval {
                period_secs,
                run_secs,
            } => {
                let period = u64::from(*period_secs) * 1000;
                let run = u64::from(*run_secs) * 1000;
                advance_interval(&mut self.timer, now_ms, period, run);
            }
            FanMode::Clock {
                times,
                run_secs,
                window_secs,
            } => {
                if let Timer::Running { until_ms } = self.timer {
                    if now_ms >= until_ms {
                        self.timer = Timer::Idle { until_ms: None };
                    }
                }
                let slot = clock.and_then(|t| clock_slot(t, times, *window_secs));
                match slot {
                    Some(i) if self.fired_slot != Some(i) => {
                        self.fired_slot = Some(i);
                        self.timer = Timer::Running {
                            until_ms: now_ms + u64::from(*run_secs) * 1000,
                        };
                    }
                    Some(_) => {}
                    None => self.fired_slot = None,
                }
            }
        }
    }

    fn advance_flush(&mut self, now_ms: u64, latest: Option<&SensorReading>, enabled: bool) {
        let Some(cfg) = &self.config.flush else {
            return;
        };
        if !enabled {
            self.flush = Flush::Inactive;
            return;
        }
        let reading = latest.filter(|r| r.valid);
        let triggered = reading.is_some_and(|r| flush_triggered(cfg, r));
        let released = reading.is_some_and(|r| flush_released(cfg, r));

        let id = self.config.actuator;
        self.flush = match self.flush {
            Flush::Inactive if triggered => {
                info!("Scheduler: {id} flush started ({} room)", cfg.room);
                Flush::Active { since_ms: now_ms }
            }
            Flush::Active { since_ms } if now_ms.saturating_sub(since_ms) >= u64::from(cfg.max_secs) * 1000 => {
                warn!("Scheduler: {id} flush hit its {} s bound", cfg.max_secs);
                Flush::Exhausted
            }
            Flush::Active { .. } | Flush::Exhausted if released => {
                info!("Scheduler: {id} flush cleared");
                Flush::Inactive
            }
            other => other,
        };
    }

    fn phase(&self) -> FanPhase {
        if matches!(self.flush, Flush::Active { .. }) {
            return FanPhase::Flushing;
        }
        match self.timer {
            Timer::Running { .. } => FanPhase::Running,
            Timer::Idle { .. } | Timer::Unstarted => FanPhase::Idle,
        }
    }
}

/// Deadline-anchored interval stepping.  Whole missed periods are skipped
/// arithmetically so a long gap costs one step, not one per period.
fn advance_interval(timer: &mut Timer, now_ms: u64, period: u64, run: u64) {
    if *timer == Timer::Unstarted {
        *timer = Timer::Running {
            until_ms: now_ms + run,
        };
    }
    let deadline = match *timer {
        Timer::Running { until_ms } | Timer::Idle { until_ms: Some(until_ms) } => until_ms,
        _ => return,
    };
    if period > 0 && now_ms >= deadline + period {
        let skipped = (now_ms - deadline) / period * period;
        *timer = match *timer {
            Timer::Running { until_ms } => Timer::Running {
                until_ms: until_ms + skipped,
            },
            Timer::Idle { until_ms } => Timer::Idle {
                until_ms: until_ms.map(|u| u + skipped),
            },
            other => other,
        };
    }
    loop {
        *timer = match *timer {
            Timer::Running { until_ms } if now_ms >= until_ms => Timer::Idle {
                until_ms: Some(until_ms + (period - run)),
            },
            Timer::Idle {
                until_ms: Some(until_ms),
            } if now_ms >= until_ms => Timer::Running {
                until_ms: until_ms + run,
            },
            _ => break,
        };
    }
}

/// Index of the clock entry whose window contains `now`.
fn clock_slot(now: NaiveTime, times: &[NaiveTime], window_secs: u32) -> Option<usize> {
    let now_s = seconds_of_day(now);
    times.iter().position(|&t| {
        let since = (now_s + SECS_PER_DAY - seconds_of_day(t)) % SECS_PER_DAY;
        since < window_secs
    })
}

fn flush_triggered(cfg: &FlushConfig, r: &SensorReading) -> bool {
    cfg.co2_trigger_ppm.is_some_and(|t| r.co2_ppm > t)
        || cfg.temp_trigger_c.is_some_and(|t| r.temperature_c > t)
}

/// Every configured trigger has fallen below its release level.
fn flush_released(cfg: &FlushConfig, r: &SensorReading) -> bool {
    cfg.co2_trigger_ppm
        .is_none_or(|t| f32::from(r.co2_ppm) < f32::from(t) * FLUSH_RELEASE_RATIO)
        && cfg
            .temp_trigger_c
            .is_none_or(|t| r.temperature_c < t * FLUSH_RELEASE_RATIO)
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

/// Timers for every configured passive fan.
///
/// Decoupled from events: phase changes go to the [`SchedulerDelegate`]
/// passed to [`tick`](Self::tick), which lets tests observe transitions
/// without any sink.
#[derive(Debug, Clone)]
pub struct PassiveFanScheduler {
    fans: Vec<FanTimer>,
}

impl PassiveFanScheduler {
    pub fn new(fans: &[FanScheduleConfig]) -> Self {
        for f in fans {
            info!("Scheduler: {} in {:?}", f.actuator, f.mode);
        }
        Self {
            fans: fans.iter().cloned().map(FanTimer::new).collect(),
        }
    }

    /// Advance every fan to `now_ms` and return one intent per fan.
    ///
    /// * `clock`: wall-clock time of day, `None` if unknown (clock fans
    ///   then never start a run).
    /// * `latest`: latest reading per room, indexed by
    ///   [`RoomId::index`](crate::model::RoomId::index).
    /// * `flush_enabled`: `false` during sensor warm-up.
    pub fn tick(
        &mut self,
        now_ms: u64,
        clock: Option<NaiveTime>,
        latest: &[Option<SensorReading>; 2],
        flush_enabled: bool,
        delegate: &mut dyn SchedulerDelegate,
    ) -> Vec<Intent> {
        let mut intents = Vec::with_capacity(self.fans.len());
        for fan in &mut self.fans {
            fan.advance_timer(now_ms, clock);
            let room_reading = fan
                .config
                .flush
                .as_ref()
                .and_then(|f| latest[f.room.index()].as_ref());
            fan.advance_flush(now_ms, room_reading, flush_enabled);

            let phase = fan.phase();
            if phase != fan.reported {
                delegate.on_fan_transition(fan.config.actuator, fan.reported, phase);
                fan.reported = phase;
            }
            intents.push(match phase {
                FanPhase::Flushing => Intent::new(fan.config.actuator, true, Provenance::Flush),
                FanPhase::Running => Intent::new(fan.config.actuator, true, Provenance::Timed),
                FanPhase::Idle => Intent::new(fan.config.actuator, false, Provenance::Timed),
            });
        }
        intents
    }

    pub fn phase(&self, actuator: ActuatorId) -> Option<FanPhase> {
        self.fan(actuator).map(FanTimer::phase)
    }

    /// A flush hit its bound and is waiting for the trigger to clear.
    pub fn flush_exhausted(&self, actuator: ActuatorId) -> bool {
        self.fan(actuator).is_some_and(|f| f.flush == Flush::Exhausted)
    }

    pub fn actuators(&self) -> impl Iterator<Item = ActuatorId> + '_ {
        self.fans.iter().map(|f| f.config.actuator)
    }

    fn fan(&self, actuator: ActuatorId) -> Option<&FanTimer> {
        self.fans.iter().find(|f| f.config.actuator == actuator)
    }
}
