//! Property tests for the core state machines and parsers.
//!
//! Runs on host (x86_64) only; proptest is not available for ESP32 targets.
//! On ESP32, these tests are compiled out.

#![cfg(not(target_os = "espidf"))]

use mashctl::app::ports::{FanPhase, SchedulerDelegate};
use mashctl::config::{FanMode, FanScheduleConfig, WatchdogPolicy};
use mashctl::control::decision::Hysteresis;
use mashctl::control::CommandArbiter;
use mashctl::model::{ActuatorId, Intent, Provenance};
use mashctl::protocol::frames::{decode_downlink, decode_uplink};
use mashctl::protocol::line::{LineDecoder, LineEvent};
use mashctl::safety::SafetyWatchdog;
use mashctl::scheduler::PassiveFanScheduler;
use mashctl::sensors::filter::MovingAverage;
use proptest::prelude::*;

// ── Line framing ──────────────────────────────────────────────

#[derive(Debug, PartialEq)]
enum Seen {
    Line(Vec<u8>),
    Overflow,
}

fn frame_all<const N: usize>(chunks: &[&[u8]]) -> Vec<Seen> {
    let mut dec = LineDecoder::<N>::new();
    let mut out = Vec::new();
    for chunk in chunks {
        dec.feed(chunk, |e| {
            out.push(match e {
                LineEvent::Line(l) => Seen::Line(l.to_vec()),
                LineEvent::Overflow => Seen::Overflow,
            });
        });
    }
    out
}

proptest! {
    /// Chunk boundaries never change what the decoder yields.
    #[test]
    fn framing_is_chunking_invariant(
        data in proptest::collection::vec(
            prop_oneof![4 => 0x20u8..0x7f, 1 => Just(b'\n'), 1 => Just(b'\r')],
            0..400,
        ),
        split in 0usize..400,
    ) {
        let split = split.min(data.len());
        let whole = frame_all::<32>(&[&data]);
        let (a, b) = data.split_at(split);
        let parts = frame_all::<32>(&[a, b]);
        prop_assert_eq!(whole, parts);
    }

    /// Emitted lines fit the buffer and never contain a terminator.
    #[test]
    fn lines_are_bounded_and_clean(
        data in proptest::collection::vec(any::<u8>(), 0..600),
    ) {
        for seen in frame_all::<64>(&[&data]) {
            if let Seen::Line(l) = seen {
                prop_assert!(!l.is_empty() && l.len() <= 64);
                prop_assert!(!l.contains(&b'\n') && !l.contains(&b'\r'));
            }
        }
    }

    /// Arbitrary bytes produce a typed error or a frame, never a panic.
    #[test]
    fn decoders_never_panic(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode_downlink(&data);
        let _ = decode_uplink(&data);
    }
}

// ── Moving average ────────────────────────────────────────────

proptest! {
    #[test]
    fn average_stays_within_window_extremes(
        samples in proptest::collection::vec(-40.0f32..80.0, 1..30),
    ) {
        let mut f = MovingAverage::<5>::new();
        for (i, &s) in samples.iter().enumerate() {
            let avg = f.push(s);
            let window = &samples[i.saturating_sub(4)..=i];
            let lo = window.iter().copied().fold(f32::INFINITY, f32::min);
            let hi = window.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            prop_assert!(avg >= lo - 1e-3 && avg <= hi + 1e-3, "{avg} not in {lo}..{hi}");
        }
        prop_assert!(f.len() <= 5);
    }
}

// ── Watchdog ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum WdOp {
    Advance(u64),
    Heartbeat,
    Check,
}

fn arb_wd_op() -> impl Strategy<Value = WdOp> {
    prop_oneof![
        (1u64..5_000).prop_map(WdOp::Advance),
        Just(WdOp::Heartbeat),
        Just(WdOp::Check),
    ]
}

proptest! {
    /// Trigger and recovery edges strictly alternate.
    #[test]
    fn watchdog_edges_alternate(ops in proptest::collection::vec(arb_wd_op(), 1..60)) {
        let mut wd = SafetyWatchdog::new(3_000, WatchdogPolicy::FailSafeShutdown);
        wd.begin(0);
        let mut now = 0u64;
        let mut outage = false;
        for op in ops {
            match op {
                WdOp::Advance(d) => now += d,
                WdOp::Heartbeat => {
                    let recovered = wd.heartbeat(now).is_some();
                    prop_assert_eq!(recovered, outage);
                    outage = false;
                }
                WdOp::Check => {
                    let fired = wd.check_timeout(now);
                    if fired {
                        prop_assert!(!outage, "fired twice in one outage");
                        outage = true;
                    }
                }
            }
            prop_assert_eq!(wd.is_safe(), !outage);
        }
    }
}

// ── Hysteresis ────────────────────────────────────────────────

proptest! {
    /// Outside the band the previous state is irrelevant; inside it holds.
    #[test]
    fn hysteresis_only_remembers_inside_band(
        lower in 0.0f32..100.0,
        width in 0.5f32..20.0,
        value in -50.0f32..200.0,
        on in any::<bool>(),
    ) {
        let band = Hysteresis { lower, upper: lower + width };
        if value > band.upper {
            prop_assert!(band.direct(on, value));
            prop_assert!(!band.reverse(on, value));
        } else if value < band.lower {
            prop_assert!(!band.direct(on, value));
            prop_assert!(band.reverse(on, value));
        } else {
            prop_assert_eq!(band.direct(on, value), on);
            prop_assert_eq!(band.reverse(on, value), on);
        }
    }
}

// ── Passive fan scheduler ─────────────────────────────────────

struct Quiet;

impl SchedulerDelegate for Quiet {
    fn on_fan_transition(&mut self, _: ActuatorId, _: FanPhase, _: FanPhase) {}
}

proptest! {
    /// However irregular the ticks, an interval fan's phase is a pure
    /// function of time since its first tick.
    #[test]
    fn interval_phase_tracks_wall_time(
        period in 2u32..600,
        run_share in 1u32..100,
        steps in proptest::collection::vec(0u64..2_000_000, 1..40),
    ) {
        let run = (period * run_share / 100).clamp(1, period - 1);
        let mut sched = PassiveFanScheduler::new(&[FanScheduleConfig {
            actuator: ActuatorId::SpawningExhaustFan,
            mode: FanMode::Interval { period_secs: period, run_secs: run },
            flush: None,
        }]);
        let (period_ms, run_ms) = (u64::from(period) * 1000, u64::from(run) * 1000);
        let mut now = 5_000u64;
        let start = now;
        for step in std::iter::once(0).chain(steps) {
            now += step;
            let intents = sched.tick(now, None, &[None, None], false, &mut Quiet);
            let expected = (now - start) % period_ms < run_ms;
            prop_assert_eq!(intents[0].on, expected, "at +{} ms", now - start);
            prop_assert_eq!(intents[0].provenance, Provenance::Timed);
        }
    }
}

// ── Arbiter ───────────────────────────────────────────────────

fn arb_intent() -> impl Strategy<Value = Intent> {
    (
        0usize..ActuatorId::COUNT,
        any::<bool>(),
        prop_oneof![
            Just(Provenance::Automatic),
            Just(Provenance::Timed),
            Just(Provenance::Flush),
        ],
    )
        .prop_map(|(i, on, p)| Intent::new(ActuatorId::ALL[i], on, p))
}

proptest! {
    #[test]
    fn flush_is_never_displaced(
        decision in proptest::collection::vec(arb_intent(), 0..12),
        scheduled in proptest::collection::vec(arb_intent(), 0..12),
        manual in proptest::collection::vec((0usize..ActuatorId::COUNT, any::<bool>()), 0..4),
    ) {
        let mut arb = CommandArbiter::new(60);
        for &(i, on) in &manual {
            arb.set_manual(ActuatorId::ALL[i], on, 0);
        }
        arb.resolve(0, &decision, &scheduled, true);

        for id in ActuatorId::ALL {
            let flushed = decision
                .iter()
                .chain(&scheduled)
                .filter(|i| i.actuator == id && i.provenance == Provenance::Flush)
                .last();
            if let Some(f) = flushed {
                let state = arb.state(id);
                prop_assert_eq!(state.provenance, Provenance::Flush);
                prop_assert_eq!(state.on, f.on);
            }
        }
    }

    /// Repeating an identical cycle emits nothing.
    #[test]
    fn stable_inputs_emit_once(
        decision in proptest::collection::vec(arb_intent(), 0..12),
        scheduled in proptest::collection::vec(arb_intent(), 0..12),
    ) {
        let mut arb = CommandArbiter::new(60);
        let first = arb.resolve(0, &decision, &scheduled, true);
        prop_assert!(first.full_resend);
        prop_assert_eq!(first.changes.len(), ActuatorId::COUNT);

        let second = arb.resolve(1_000, &decision, &scheduled, true);
        prop_assert!(!second.full_resend);
        prop_assert!(second.changes.is_empty());
    }
}
