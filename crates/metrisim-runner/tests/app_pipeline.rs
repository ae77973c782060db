#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use metrisim_core::error::ErrorCode;
use metrisim_core::{DerivedValue, DomainError, FixedSource, SimError, SimEventKind};
use metrisim_runner::app::SimulationApp;
use metrisim_runner::config;

const CFG: &str = r#"
version: 1
driver: { period_ms: 100, max_ticks: 5 }
channels:
  - { name: speed, initial: 2.0,  lower: 0, upper: 200, max_step: 1.0 }
  - { name: fuel,  initial: 10.5, lower: 0, upper: 100, max_step: 0.2 }
  - { name: rpm,   initial: 900,  lower: 800, upper: 6000, max_step: 50 }
derivations:
  - name: consumption
    kind:
      linear: { channel: speed, scale: 0.03, offset: 6.5 }
  - name: avg_speed
    kind:
      running_average: { channel: speed }
  - name: rpm_per_speed
    kind:
      calculator: { op: divide, left: rpm, right: speed }
  - name: fuel_fraction
    kind:
      ratio: { numerator: fuel, denominator: rpm, scale: 100 }
thresholds:
  - { name: fuel_low, channel: fuel, op: "<", value: 10.0, severity: warning, message: "Fuel level critical" }
alerts:
  - { name: tire_pressure, message: "Front left tire pressure low" }
"#;

fn app() -> SimulationApp {
    SimulationApp::from_config(config::load_from_str(CFG).unwrap()).unwrap()
}

#[test]
fn builds_and_counts_startup_alerts() {
    let app = app();
    let m = app.metrics();
    assert_eq!(m.alerts_raised.get(&[("severity", "warning")]), 1);
    assert_eq!(app.simulator().active_alerts().len(), 1);
}

#[test]
fn steps_update_metrics_and_derivations() {
    let mut app = app();
    let mut rng = FixedSource(-1.0);

    let mut last = None;
    for _ in 0..3 {
        last = Some(app.step(&mut rng).unwrap());
    }
    let report = last.unwrap();

    // speed 2 -> 1 -> 0 -> 0
    assert_eq!(report.snapshot.get("speed"), Some(0.0));
    assert_eq!(
        report.derived.get("rpm_per_speed").unwrap().value,
        DerivedValue::Undefined(DomainError::DivisionByZero)
    );
    let avg = report.derived.number("avg_speed").unwrap();
    assert!((avg - (1.0 + 0.0 + 0.0) / 3.0).abs() < 1e-12);
    assert!((report.derived.number("consumption").unwrap() - 6.5).abs() < 1e-12);
    let ff = report.derived.number("fuel_fraction").unwrap();
    assert!((ff - 100.0 * report.snapshot.get("fuel").unwrap() / 800.0).abs() < 1e-9);

    let m = app.metrics();
    assert_eq!(m.ticks.get(&[]), 3);
    assert_eq!(m.tick_duration.count(&[]), 3);
    assert_eq!(m.channel_values.get(&[("channel", "speed")]), Some(0.0));
    assert_eq!(m.channel_values.get(&[("channel", "rpm")]), Some(800.0));
    // speed hits zero on tick 2 and stays there
    assert_eq!(m.undefined_derivations.get(&[("derivation", "rpm_per_speed")]), 2);

    // fuel 10.5 -> 10.3 -> 10.1 -> 9.9
    assert_eq!(
        m.threshold_transitions.get(&[("rule", "fuel_low"), ("state", "active")]),
        1
    );
}

#[test]
fn listener_failures_are_counted_by_kind() {
    let mut app = app();
    app.simulator()
        .observers()
        .subscribe(SimEventKind::Tick, |_| Err(SimError::listener("display offline")));

    let report = app.step(&mut FixedSource(0.0)).unwrap();
    assert_eq!(report.listener_failures, 1);
    assert_eq!(app.metrics().listener_failures.get(&[("kind", "tick")]), 1);
}

#[test]
fn override_fuel_fires_threshold() {
    let mut app = app();
    let events = app.simulator_mut().set_value("fuel", 5.0).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(app.simulator().store().value("fuel").unwrap(), 5.0);
    assert_eq!(
        app.simulator_mut().set_value("trip", 0.0).unwrap_err().code(),
        ErrorCode::NotFound
    );
}

#[test]
fn reset_trip_meter_on_dashboard() {
    let mut app = SimulationApp::from_config(config::builtin_dashboard().unwrap()).unwrap();
    assert_eq!(app.simulator().store().value("trip_meter").unwrap(), 423.0);

    let events = app.simulator_mut().set_value("trip_meter", 0.0).unwrap();
    assert!(events.is_empty());
    assert_eq!(app.simulator().store().value("trip_meter").unwrap(), 0.0);

    app.step(&mut FixedSource(1.0)).unwrap();
    assert_eq!(app.simulator().store().value("trip_meter").unwrap(), 0.0);
}

#[test]
fn unknown_threshold_channel_fails_build() {
    let bad = r#"
version: 1
channels:
  - { name: a, initial: 0, lower: 0, upper: 1, max_step: 1 }
thresholds:
  - { name: t, channel: b, op: ">", value: 0.5, severity: info }
"#;
    let cfg = config::load_from_str(bad).unwrap();
    let err = SimulationApp::from_config(cfg).err().expect("must fail");
    assert_eq!(err.code(), ErrorCode::Config);
}

#[test]
fn render_contains_prometheus_series() {
    let mut app = app();
    app.step(&mut FixedSource(0.0)).unwrap();
    let text = app.metrics().render();
    assert!(text.contains("# TYPE metrisim_ticks_total counter"));
    assert!(text.contains("metrisim_ticks_total 1"));
    assert!(text.contains("metrisim_channel_value{channel=\"fuel\"} 10.5"));
    assert!(text.contains("metrisim_tick_duration_micros_bucket{le=\"+Inf\"} 1"));
    assert!(text.contains("metrisim_alerts_raised_total{severity=\"warning\"} 1"));
}
