//! DerivedMetricEngine recompute semantics.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use metrisim_core::calc::{evaluate, Operation};
use metrisim_core::error::ErrorCode;
use metrisim_core::{DerivedMetricEngine, DerivedValue, DomainError, MetricSnapshot, RunningStatistic};

fn snap(pairs: &[(&str, f64)]) -> MetricSnapshot {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[test]
fn computes_in_registration_order() {
    let mut engine = DerivedMetricEngine::new();
    engine
        .register_derivation("instant_consumption", ["speed"], |ctx| {
            ctx.value("speed").map(|s| 6.5 + s / 100.0 * 3.0).into()
        })
        .unwrap();
    engine
        .register_derivation("range", ["fuel"], |ctx| {
            ctx.value("fuel").map(|f| f / 100.0 * 50.0 * (100.0 / 8.2)).into()
        })
        .unwrap();

    let out = engine.recompute(&snap(&[("speed", 100.0), ("fuel", 82.0)])).unwrap();
    let names: Vec<_> = out.iter().map(|m| m.name.to_string()).collect();
    assert_eq!(names, vec!["instant_consumption", "range"]);
    assert_eq!(out.number("instant_consumption"), Some(9.5));
    assert!((out.number("range").unwrap() - 500.0).abs() < 1e-9);
}

#[test]
fn duplicate_derivation_is_config_error() {
    let mut engine = DerivedMetricEngine::new();
    engine.register_derivation("x", ["a"], |_| DerivedValue::Number(1.0)).unwrap();
    let err = engine
        .register_derivation("x", ["b"], |_| DerivedValue::Number(2.0))
        .expect_err("must fail");
    assert_eq!(err.code(), ErrorCode::Config);
}

#[test]
fn undeclared_channels_are_invisible() {
    let mut engine = DerivedMetricEngine::new();
    engine
        .register_derivation("peek", ["a"], |ctx| ctx.value("b").into())
        .unwrap();
    let out = engine.recompute(&snap(&[("a", 1.0), ("b", 2.0)])).unwrap();
    assert_eq!(
        out.get("peek").unwrap().value,
        DerivedValue::Undefined(DomainError::MissingInput)
    );
}

#[test]
fn missing_dependency_fails_without_committing() {
    let mut engine = DerivedMetricEngine::new();
    engine
        .register_derivation("avg", ["speed"], |ctx| {
            let x = ctx.value("speed").unwrap_or(f64::NAN);
            RunningStatistic::step(ctx.last_number().unwrap_or(0.0), ctx.samples() + 1, x).into()
        })
        .unwrap();

    engine.recompute(&snap(&[("speed", 10.0)])).unwrap();
    let err = engine.recompute(&snap(&[("rpm", 1.0)])).expect_err("must fail");
    assert_eq!(err.code(), ErrorCode::NotFound);

    let prev = engine.previous("avg").unwrap().unwrap();
    assert_eq!(prev.value, DerivedValue::Number(10.0));
    assert_eq!(prev.samples, 1);
}

#[test]
fn accumulator_sees_previous_value() {
    let mut engine = DerivedMetricEngine::new();
    engine
        .register_derivation("avg_speed", ["speed"], |ctx| match ctx.value("speed") {
            Some(x) => {
                RunningStatistic::step(ctx.last_number().unwrap_or(0.0), ctx.samples() + 1, x).into()
            }
            None => DerivedValue::Undefined(DomainError::MissingInput),
        })
        .unwrap();

    let speeds = [10.0, 20.0, 60.0, 30.0];
    let mut last = None;
    for s in speeds {
        last = Some(engine.recompute(&snap(&[("speed", s)])).unwrap());
    }
    let last = last.unwrap();
    let m = last.get("avg_speed").unwrap();
    assert_eq!(m.samples, 4);
    assert!((m.value.as_f64().unwrap() - 30.0).abs() < 1e-12);

    engine.reset_derivation("avg_speed").unwrap();
    assert!(engine.previous("avg_speed").unwrap().is_none());
    assert!(engine.reset_derivation("nope").is_err());
}

#[test]
fn accumulator_survives_undefined_tick() {
    let mut engine = DerivedMetricEngine::new();
    engine
        .register_derivation("mean_sqrt", ["x"], |ctx| {
            let x = ctx.value("x").unwrap_or(f64::NAN);
            match evaluate(Operation::Sqrt, x, 0.0) {
                DerivedValue::Number(r) => {
                    RunningStatistic::step(ctx.last_number().unwrap_or(0.0), ctx.samples() + 1, r).into()
                }
                undefined => undefined,
            }
        })
        .unwrap();

    engine.recompute(&snap(&[("x", 4.0)])).unwrap();
    let out = engine.recompute(&snap(&[("x", -1.0)])).unwrap();
    let m = out.get("mean_sqrt").unwrap();
    assert_eq!(m.value, DerivedValue::Undefined(DomainError::NegativeSqrt));
    assert_eq!(m.samples, 1);
    assert_eq!(m.last_number, Some(2.0));

    let out = engine.recompute(&snap(&[("x", 16.0)])).unwrap();
    let m = out.get("mean_sqrt").unwrap();
    assert_eq!(m.samples, 2);
    assert_eq!(m.value, DerivedValue::Number(3.0));
}

#[test]
fn non_finite_results_become_undefined() {
    let mut engine = DerivedMetricEngine::new();
    engine
        .register_derivation("ratio", ["a", "b"], |ctx| {
            DerivedValue::Number(ctx.value("a").unwrap_or(0.0) / ctx.value("b").unwrap_or(0.0))
        })
        .unwrap();
    let out = engine.recompute(&snap(&[("a", 1.0), ("b", 0.0)])).unwrap();
    let m = out.get("ratio").unwrap();
    assert_eq!(m.value, DerivedValue::Undefined(DomainError::NonFinite));
    assert_eq!(m.samples, 0);
}

#[test]
fn divide_by_zero_is_explicit() {
    let mut engine = DerivedMetricEngine::new();
    engine
        .register_derivation("quotient", ["a", "b"], |ctx| {
            match (ctx.value("a"), ctx.value("b")) {
                (Some(a), Some(b)) => evaluate(Operation::Divide, a, b),
                _ => DerivedValue::Undefined(DomainError::MissingInput),
            }
        })
        .unwrap();

    let out = engine.recompute(&snap(&[("a", 10.0), ("b", 0.0)])).unwrap();
    let v = out.get("quotient").unwrap().value;
    assert_eq!(v, DerivedValue::Undefined(DomainError::DivisionByZero));
    assert!(!v.is_number());

    let out = engine.recompute(&snap(&[("a", 10.0), ("b", 4.0)])).unwrap();
    assert_eq!(out.get("quotient").unwrap().value, DerivedValue::Number(2.5));
}

#[test]
fn dependencies_are_deduplicated() {
    let mut engine = DerivedMetricEngine::new();
    engine
        .register_derivation("sq", ["a", "a"], |ctx| ctx.value("a").map(|a| a * a).into())
        .unwrap();
    assert_eq!(engine.dependencies("sq").unwrap(), ["a".to_string()]);
    assert_eq!(engine.derivation_names().collect::<Vec<_>>(), vec!["sq"]);
}
