//! Controller against in-memory links: decisions, arbitration, resync.

use std::sync::Arc;

use chrono::NaiveTime;
use mashctl::adapters::record_sink::MemoryRecordSink;
use mashctl::app::events::{ControlEvent, Record};
use mashctl::config::{GatewayConfig, Photoperiod};
use mashctl::gateway::channels::OUTBOUND_DEPTH;
use mashctl::gateway::{Controller, GatewayLinks, io_task};
use mashctl::model::{ActuatorId, Metric, Provenance, RoomId, Severity};

use crate::mock_hw::RecordingEvents;

type Ctl = Controller<RecordingEvents, MemoryRecordSink>;

const HOT_FRUITING: &[u8] = b"{\"fruiting\":{\"temp\":30.0,\"humidity\":95.0,\"co2\":1500}}";
const CALM_FRUITING: &[u8] = b"{\"fruiting\":{\"temp\":24.0,\"humidity\":90.0,\"co2\":800}}";
const HOT_SPAWNING: &[u8] = b"{\"spawning\":{\"temp\":32.0,\"humidity\":85.0,\"co2\":800}}";

fn controller(config: GatewayConfig) -> Ctl {
    Controller::new(
        config,
        Arc::new(GatewayLinks::new()),
        RecordingEvents::default(),
        MemoryRecordSink::default(),
    )
}

/// No warm-up, so readings act on the first tick.
fn armed() -> Ctl {
    controller(GatewayConfig {
        warmup_secs: 0,
        ..GatewayConfig::default()
    })
}

fn feed(c: &Ctl, line: &[u8], now_ms: u64) {
    io_task::handle_line(line, now_ms, c.links());
}

fn outbound(c: &Ctl) -> Vec<String> {
    let mut lines = Vec::new();
    while let Ok(line) = c.links().outbound.try_receive() {
        lines.push(line);
    }
    lines
}

fn commanded(lines: &[String], id: ActuatorId) -> Option<bool> {
    lines
        .iter()
        .rev()
        .filter(|l| l.contains(&format!("\"{id}\"")))
        .map(|l| l.contains("\"ON\""))
        .next()
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn first_tick_sends_the_whole_map() {
    let mut c = controller(GatewayConfig::default());
    let report = c.tick(0, None);

    assert!(report.full_resend);
    assert_eq!(report.commands, ActuatorId::COUNT);
    let lines = outbound(&c);
    assert_eq!(lines.len(), ActuatorId::COUNT);
    assert!(lines.iter().all(|l| l.ends_with('\n')));
    // The interval fan starts with its run phase.
    assert_eq!(commanded(&lines, ActuatorId::SpawningExhaustFan), Some(true));
    assert_eq!(commanded(&lines, ActuatorId::MistMaker), Some(false));
    assert_eq!(c.events().count(|e| *e == ControlEvent::Started), 1);

    let report = c.tick(1000, None);
    assert_eq!(report.commands, 0);
    assert!(outbound(&c).is_empty());
}

#[test]
fn warmup_holds_sensor_driven_automation() {
    let mut c = controller(GatewayConfig::default());
    c.tick(0, None);
    outbound(&c);

    feed(&c, HOT_FRUITING, 1000);
    let report = c.tick(1000, None);
    assert!(!report.armed);
    assert!(!c.arbiter().state(ActuatorId::FruitingExhaustFan).on);

    let report = c.tick(30_000, None);
    assert!(report.armed);
    assert_eq!(c.events().count(|e| *e == ControlEvent::AutomationArmed), 1);
    assert_eq!(commanded(&outbound(&c), ActuatorId::FruitingExhaustFan), Some(true));
}

// ── Decisions ─────────────────────────────────────────────────

#[test]
fn hot_room_goes_critical_and_ventilates() {
    let mut c = armed();
    feed(&c, HOT_FRUITING, 0);
    c.tick(0, None);

    let a = c.engine().assessment(RoomId::Fruiting);
    assert_eq!(a.get(Metric::Temperature), Severity::Critical);
    assert_eq!(a.get(Metric::Co2), Severity::Critical);
    assert_eq!(a.overall(), Severity::Critical);

    let critical = c.events().count(|e| {
        matches!(
            e,
            ControlEvent::SeverityChanged {
                room: RoomId::Fruiting,
                to: Severity::Critical,
                ..
            }
        )
    });
    assert_eq!(critical, 2);

    let fan = c.arbiter().state(ActuatorId::FruitingExhaustFan);
    assert!(fan.on);
    assert_eq!(fan.provenance, Provenance::Automatic);
    assert!(c.arbiter().state(ActuatorId::FruitingIntakeFan).on);
    assert!(!c.arbiter().state(ActuatorId::MistMaker).on);
}

#[test]
fn fault_report_keeps_last_valid_reading() {
    let mut c = armed();
    feed(&c, CALM_FRUITING, 0);
    c.tick(0, None);
    feed(&c, b"{\"fruiting\":{\"error\":\"invalid_reading\"}}", 1000);
    c.tick(1000, None);

    let latest = c.latest(RoomId::Fruiting).unwrap();
    assert!(latest.valid);
    assert_eq!(latest.co2_ppm, 800);
    assert_eq!(
        c.events()
            .count(|e| *e == ControlEvent::SensorFault { room: RoomId::Fruiting }),
        1
    );
}

#[test]
fn photoperiod_follows_the_clock() {
    let mut config = GatewayConfig {
        warmup_secs: 0,
        ..GatewayConfig::default()
    };
    config.fruiting.lighting = Some(Photoperiod {
        led: ActuatorId::FruitingLed,
        lights_on: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
        lights_off: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
    });
    let mut c = controller(config);
    feed(&c, CALM_FRUITING, 0);

    c.tick(0, NaiveTime::from_hms_opt(12, 0, 0));
    assert!(c.arbiter().state(ActuatorId::FruitingLed).on);
    c.tick(1000, NaiveTime::from_hms_opt(19, 0, 0));
    assert!(!c.arbiter().state(ActuatorId::FruitingLed).on);
}

#[test]
fn lights_follow_the_clock_without_telemetry() {
    let mut config = GatewayConfig::default();
    config.fruiting.lighting = Some(Photoperiod {
        led: ActuatorId::FruitingLed,
        lights_on: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
        lights_off: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
    });
    // Still warming up and no sensor has reported.
    let mut c = controller(config);
    let report = c.tick(0, NaiveTime::from_hms_opt(12, 0, 0));

    assert!(!report.armed);
    assert!(c.latest(RoomId::Fruiting).is_none());
    let led = c.arbiter().state(ActuatorId::FruitingLed);
    assert!(led.on);
    assert_eq!(led.provenance, Provenance::Automatic);
    assert_eq!(commanded(&outbound(&c), ActuatorId::FruitingLed), Some(true));

    c.tick(1000, NaiveTime::from_hms_opt(18, 0, 0));
    assert_eq!(commanded(&outbound(&c), ActuatorId::FruitingLed), Some(false));
}

#[test]
fn hot_spawning_room_vents_during_idle_phase() {
    let mut c = armed();
    c.tick(0, None);
    outbound(&c);

    // 600 s in: the 120 s run is long over.
    feed(&c, HOT_SPAWNING, 600_000);
    c.tick(600_000, None);

    let fan = c.arbiter().state(ActuatorId::SpawningExhaustFan);
    assert!(fan.on);
    assert_eq!(fan.provenance, Provenance::Flush);
    assert_eq!(commanded(&outbound(&c), ActuatorId::SpawningExhaustFan), Some(true));

    // 25.0 is below 90 % of 28: back to the idle timer.
    feed(&c, b"{\"spawning\":{\"temp\":25.0,\"humidity\":85.0,\"co2\":800}}", 660_000);
    c.tick(660_000, None);
    assert_eq!(
        c.arbiter().state(ActuatorId::SpawningExhaustFan).provenance,
        Provenance::Timed
    );
    assert!(!c.arbiter().state(ActuatorId::SpawningExhaustFan).on);
}

#[test]
fn readings_and_commands_are_recorded() {
    let mut c = armed();
    feed(&c, CALM_FRUITING, 0);
    c.tick(0, None);

    let records = &c.records().records;
    assert!(records
        .iter()
        .any(|r| matches!(r, Record::Reading(s) if s.room == RoomId::Fruiting && s.co2_ppm == 800)));
    let actuators = records
        .iter()
        .filter(|r| matches!(r, Record::Actuator { .. }))
        .count();
    assert_eq!(actuators, ActuatorId::COUNT);
}

// ── Arbitration ───────────────────────────────────────────────

#[test]
fn manual_override_wins_until_it_expires() {
    let mut c = armed();
    feed(&c, CALM_FRUITING, 0);
    c.tick(0, None);
    outbound(&c);

    c.set_manual(ActuatorId::FruitingExhaustFan, true, 1000);
    c.tick(1000, None);
    assert_eq!(commanded(&outbound(&c), ActuatorId::FruitingExhaustFan), Some(true));
    assert_eq!(
        c.arbiter().state(ActuatorId::FruitingExhaustFan).provenance,
        Provenance::Manual
    );

    // 300 s lifetime; the calm room then wants the fan off again.
    c.tick(301_000, None);
    assert_eq!(commanded(&outbound(&c), ActuatorId::FruitingExhaustFan), Some(false));
    assert_eq!(c.arbiter().manual(ActuatorId::FruitingExhaustFan), None);
}

#[test]
fn release_returns_control_immediately() {
    let mut c = armed();
    feed(&c, CALM_FRUITING, 0);
    c.set_manual(ActuatorId::FruitingIntakeFan, true, 0);
    c.tick(0, None);
    assert!(c.arbiter().state(ActuatorId::FruitingIntakeFan).on);

    c.release_manual(ActuatorId::FruitingIntakeFan);
    c.tick(1000, None);
    assert!(!c.arbiter().state(ActuatorId::FruitingIntakeFan).on);
}

#[test]
fn flush_beats_manual_off() {
    let mut c = armed();
    feed(&c, b"{\"spawning\":{\"temp\":24.0,\"humidity\":85.0,\"co2\":2500}}", 0);
    // Let the interval fan's first run finish so only the flush holds it on.
    c.tick(0, None);
    c.set_manual(ActuatorId::SpawningExhaustFan, false, 130_000);
    c.tick(130_000, None);

    let fan = c.arbiter().state(ActuatorId::SpawningExhaustFan);
    assert!(fan.on);
    assert_eq!(fan.provenance, Provenance::Flush);
}

#[test]
fn auto_mode_off_keeps_timers_only() {
    let mut c = armed();
    c.set_auto_mode(false);
    feed(&c, HOT_FRUITING, 0);
    c.tick(0, None);

    assert!(!c.arbiter().state(ActuatorId::FruitingExhaustFan).on);
    assert!(c.arbiter().state(ActuatorId::SpawningExhaustFan).on);
    // Classification still runs for alerts.
    assert_eq!(c.engine().assessment(RoomId::Fruiting).overall(), Severity::Critical);
}

// ── Link supervision ──────────────────────────────────────────

#[test]
fn ack_mismatch_is_reported() {
    let mut c = controller(GatewayConfig::default());
    c.tick(0, None);
    feed(&c, b"{\"ack\":\"MIST_MAKER\",\"state\":\"ON\"}", 500);
    c.tick(1000, None);

    assert_eq!(
        c.events().count(|e| *e
            == ControlEvent::AckMismatch {
                actuator: ActuatorId::MistMaker,
                expected: false,
                reported: true,
            }),
        1
    );
    let snap = c.links().state.snapshot();
    assert_eq!(snap.confirmed[ActuatorId::MistMaker.index()], Some(true));
}

#[test]
fn ack_answers_the_command_it_follows() {
    let mut c = controller(GatewayConfig::default());
    c.tick(0, None);
    outbound(&c);
    // OFF went out at boot; ON follows before the node answers either.
    c.set_manual(ActuatorId::MistMaker, true, 500);
    c.tick(1000, None);
    assert_eq!(commanded(&outbound(&c), ActuatorId::MistMaker), Some(true));

    feed(&c, b"{\"ack\":\"MIST_MAKER\",\"state\":\"OFF\"}", 1100);
    feed(&c, b"{\"ack\":\"MIST_MAKER\",\"state\":\"ON\"}", 1200);
    c.tick(2000, None);

    assert_eq!(c.events().count(|e| matches!(e, ControlEvent::AckMismatch { .. })), 0);
    let snap = c.links().state.snapshot();
    assert_eq!(snap.confirmed[ActuatorId::MistMaker.index()], Some(true));
    assert_eq!(snap.unconfirmed().count(), ActuatorId::COUNT - 1);
}

#[test]
fn full_outbound_queue_retries_next_tick() {
    let mut c = controller(GatewayConfig::default());
    for _ in 0..OUTBOUND_DEPTH {
        let _ = c.links().outbound.try_send("{\"keepalive\":true}\n".to_string());
    }
    let report = c.tick(0, None);
    assert_eq!(report.commands, 0);
    assert_eq!(c.events().count(|e| matches!(e, ControlEvent::CommandIssued { .. })), 0);

    outbound(&c);
    let report = c.tick(1000, None);
    assert_eq!(report.commands, ActuatorId::COUNT);
    assert_eq!(outbound(&c).len(), ActuatorId::COUNT);
}

#[test]
fn node_recovery_resends_everything() {
    let mut c = controller(GatewayConfig::default());
    c.tick(0, None);
    outbound(&c);
    assert_eq!(c.tick(1000, None).commands, 0);

    feed(&c, b"{\"watchdog\":\"recovered\"}", 1500);
    let report = c.tick(2000, None);
    assert!(report.full_resend);
    assert_eq!(report.commands, ActuatorId::COUNT);
    assert_eq!(outbound(&c).len(), ActuatorId::COUNT);
    assert_eq!(c.events().count(|e| *e == ControlEvent::NodeRecovered), 1);
}

#[test]
fn silence_marks_link_stale_until_traffic_returns() {
    let mut c = controller(GatewayConfig::default());
    c.tick(0, None);
    c.tick(16_000, None);
    assert!(c.links().state.snapshot().link.stale);

    feed(&c, CALM_FRUITING, 17_000);
    c.tick(17_000, None);
    assert!(!c.links().state.snapshot().link.stale);
    assert_eq!(
        c.events()
            .count(|e| matches!(e, ControlEvent::LinkStale { .. })),
        1
    );
    assert_eq!(c.events().count(|e| *e == ControlEvent::LinkRestored), 1);
}

#[test]
fn garbage_lines_are_counted_not_forwarded() {
    let mut c = controller(GatewayConfig::default());
    feed(&c, b"{\"ack\":\"HEATER\",\"state\":\"ON\"}", 0);
    feed(&c, b"[boot] relay node v0.3", 0);
    let report = c.tick(0, None);

    assert_eq!(report.frames, 0);
    let link = c.links().state.snapshot().link;
    assert_eq!(link.decode_errors, 1);
    assert_eq!(link.lines_in, 2);
}

#[test]
fn shutdown_queues_off_for_every_actuator() {
    let mut c = controller(GatewayConfig::default());
    c.tick(0, None);
    outbound(&c);

    assert_eq!(c.shutdown(1000), ActuatorId::COUNT);
    let lines = outbound(&c);
    assert_eq!(lines.len(), ActuatorId::COUNT);
    assert!(lines.iter().all(|l| l.contains("\"OFF\"")));
    assert!(c.links().state.snapshot().desired.iter().all(|s| !s.on));
}
