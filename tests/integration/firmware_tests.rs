//! Node loop against mock hardware: relays, telemetry, watchdog.

use mashctl::config::{FirmwareConfig, WatchdogPolicy};
use mashctl::firmware::FirmwareNode;
use mashctl::model::{ActuatorId, RoomId};
use mashctl::safety::WatchdogStatus;
use mashctl::sensors::SensorAcquisition;
use serde_json::Value;

use crate::mock_hw::{MockBus, MockLink, MockPin, NoDelay, relay_bank, scd_frame};
use std::cell::Cell;
use std::rc::Rc;

type Node = FirmwareNode<MockBus, NoDelay, MockPin, MockLink>;

fn node_with(bus: MockBus, config: FirmwareConfig) -> (Node, Vec<Rc<Cell<Option<bool>>>>) {
    let (relays, levels) = relay_bank();
    let sensors = SensorAcquisition::new(bus, NoDelay, &config);
    let mut node = FirmwareNode::new(sensors, relays, MockLink::default(), config);
    node.begin(0);
    (node, levels)
}

fn healthy_node() -> (Node, Vec<Rc<Cell<Option<bool>>>>) {
    let bus = MockBus::with_rooms(scd_frame(800, 24.0, 90.0), scd_frame(1200, 22.0, 85.0));
    node_with(bus, FirmwareConfig::default())
}

fn level(levels: &[Rc<Cell<Option<bool>>>], id: ActuatorId) -> Option<bool> {
    levels[id.index()].get()
}

fn json(line: &str) -> Value {
    serde_json::from_str(line).unwrap()
}

// ── Relays ────────────────────────────────────────────────────

#[test]
fn boot_drives_every_wired_relay_off() {
    let (node, levels) = healthy_node();
    for id in ActuatorId::ALL {
        let expected = if id == ActuatorId::Reserved { None } else { Some(true) };
        assert_eq!(level(&levels, id), expected, "{id}");
    }
    assert_eq!(node.actuators().states(), [false; ActuatorId::COUNT]);
}

#[test]
fn command_switches_relay_low_and_acks() {
    let (mut node, levels) = healthy_node();
    node.link_mut()
        .push("{\"actuator\":\"FRUITING_EXHAUST_FAN\",\"state\":\"ON\"}\n");
    node.poll(100);

    assert_eq!(level(&levels, ActuatorId::FruitingExhaustFan), Some(false));
    assert!(node.actuators().get(ActuatorId::FruitingExhaustFan));
    let lines = node.link_mut().take_lines();
    assert_eq!(lines, vec!["{\"ack\":\"FRUITING_EXHAUST_FAN\",\"state\":\"ON\"}"]);
    assert_eq!(node.stats().commands_applied, 1);
}

#[test]
fn bad_lines_get_error_replies_and_change_nothing() {
    let (mut node, levels) = healthy_node();
    node.link_mut().push("{\"actuator\":\"HEATER\",\"state\":\"ON\"}\n");
    node.link_mut().push("{\"actuator\":\"MIST_MAKER\",\"state\":\"MAYBE\"}\n");
    node.link_mut().push("not json\n");
    node.link_mut().push("{\"actuator\":\"RESERVED\",\"state\":\"ON\"}\n");
    node.poll(100);

    let kinds: Vec<String> = node
        .link_mut()
        .take_lines()
        .iter()
        .map(|l| json(l)["error"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(
        kinds,
        ["unknown_actuator", "invalid_command", "malformed", "unknown_actuator"]
    );
    assert_eq!(level(&levels, ActuatorId::MistMaker), Some(true));
    assert_eq!(node.stats().lines_rejected, 4);
}

#[test]
fn overlong_line_is_rejected_whole() {
    let (mut node, levels) = healthy_node();
    let padding = "x".repeat(200);
    node.link_mut().push(&format!(
        "{{\"actuator\":\"MIST_MAKER\",\"state\":\"ON\",\"pad\":\"{padding}\"}}\n"
    ));
    node.link_mut().push("{\"actuator\":\"MIST_MAKER\",\"state\":\"ON\"}\n");
    node.poll(100);

    let lines = node.link_mut().take_lines();
    assert_eq!(json(&lines[0])["error"], "line_too_long");
    assert_eq!(json(&lines[1])["ack"], "MIST_MAKER");
    assert_eq!(level(&levels, ActuatorId::MistMaker), Some(false));
}

#[test]
fn keepalive_is_silent() {
    let (mut node, _) = healthy_node();
    node.link_mut().push("{\"keepalive\":true}\r\n");
    node.poll(100);
    assert!(node.link_mut().take_lines().is_empty());
    assert_eq!(node.stats().keepalives, 1);
}

// ── Telemetry ─────────────────────────────────────────────────

#[test]
fn telemetry_waits_for_warmup_then_follows_interval() {
    let (mut node, _) = healthy_node();
    node.poll(1000);
    assert!(node.link_mut().take_lines().is_empty());

    node.poll(2000);
    let lines = node.link_mut().take_lines();
    assert_eq!(lines.len(), 1);
    let t = json(&lines[0]);
    assert_eq!(t["fruiting"]["co2"], 800);
    assert_eq!(t["fruiting"]["temp"].as_f64(), Some(24.0));
    assert_eq!(t["fruiting"]["humidity"].as_f64(), Some(90.0));
    assert_eq!(t["spawning"]["co2"], 1200);

    node.poll(4000);
    assert!(node.link_mut().take_lines().is_empty());
    node.poll(7000);
    assert_eq!(node.link_mut().take_lines().len(), 1);
    assert_eq!(node.stats().telemetry_sent, 2);
}

#[test]
fn missing_sensor_reports_invalid_reading() {
    let mut bus = MockBus::new();
    bus.sensors[0] = Some(scd_frame(800, 24.0, 90.0));
    let (mut node, _) = node_with(bus, FirmwareConfig::default());
    node.poll(2000);

    let t = json(&node.link_mut().take_lines()[0]);
    assert_eq!(t["spawning"]["error"], "invalid_reading");
    assert_eq!(t["fruiting"]["co2"], 800);
}

#[test]
fn failed_read_republishes_last_valid_value() {
    let (mut node, _) = healthy_node();
    node.poll(2000);
    node.link_mut().take_lines();

    // A corrupted CRC on the fruiting sensor.
    let mut bad = scd_frame(900, 30.0, 50.0);
    bad[2] ^= 0xFF;
    set_sensor(&mut node, RoomId::Fruiting, bad);
    node.poll(7000);

    let t = json(&node.link_mut().take_lines()[0]);
    assert_eq!(t["fruiting"]["co2"], 800);
    assert!(node.sensors().last_fault(RoomId::Fruiting).is_some());
}

fn set_sensor(node: &mut Node, room: RoomId, raw: [u8; 9]) {
    node.sensors_mut().bus_mut().sensors[usize::from(mashctl::pins::mux_channel(room))] =
        Some(raw);
}

#[test]
fn repeated_bus_errors_trigger_recovery() {
    let (mut node, _) = healthy_node();
    node.sensors_mut().bus_mut().fail_transfers = 3;

    node.poll(2000);
    assert_eq!(node.sensors().failure_count(), 2);
    let t = json(&node.link_mut().take_lines()[0]);
    assert_eq!(t["fruiting"]["error"], "invalid_reading");

    // Third failure crosses the threshold; the spawning read then succeeds.
    node.poll(7000);
    assert_eq!(node.sensors().recovery_count(), 1);
    assert_eq!(node.sensors_mut().bus_mut().reinits, 1);
    assert_eq!(node.sensors().failure_count(), 0);
    let t = json(&node.link_mut().take_lines()[0]);
    assert_eq!(t["spawning"]["co2"], 1200);
}

// ── Watchdog ──────────────────────────────────────────────────

#[test]
fn silence_forces_all_off_and_first_byte_reports_recovery() {
    let (mut node, levels) = healthy_node();
    node.link_mut()
        .push("{\"actuator\":\"MIST_MAKER\",\"state\":\"ON\"}\n");
    node.poll(0);
    node.link_mut().take_lines();
    assert_eq!(level(&levels, ActuatorId::MistMaker), Some(false));

    node.poll(10_000);
    assert_eq!(node.watchdog().status(), WatchdogStatus::Active);
    node.poll(11_000);
    assert_eq!(node.watchdog().status(), WatchdogStatus::Triggered);
    assert_eq!(level(&levels, ActuatorId::MistMaker), Some(true));
    assert!(!node.actuators().get(ActuatorId::MistMaker));
    node.link_mut().take_lines();

    node.link_mut().push("{\"keepalive\":true}\n");
    node.poll(12_000);
    let lines = node.link_mut().take_lines();
    assert_eq!(lines.iter().filter(|l| l.contains("recovered")).count(), 1);
    assert_eq!(node.watchdog().recovery_count(), 1);
    // Relays stay off until the gateway resends its map.
    assert_eq!(level(&levels, ActuatorId::MistMaker), Some(true));
}

#[test]
fn diagnostics_only_policy_keeps_relays() {
    let bus = MockBus::with_rooms(scd_frame(800, 24.0, 90.0), scd_frame(800, 24.0, 90.0));
    let config = FirmwareConfig {
        watchdog_policy: WatchdogPolicy::DiagnosticsOnly,
        ..FirmwareConfig::default()
    };
    let (mut node, levels) = node_with(bus, config);
    node.link_mut()
        .push("{\"actuator\":\"FRUITING_LED\",\"state\":\"ON\"}\n");
    node.poll(0);
    node.poll(11_000);
    assert_eq!(node.watchdog().status(), WatchdogStatus::Triggered);
    assert_eq!(level(&levels, ActuatorId::FruitingLed), Some(false));
}
