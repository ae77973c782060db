//! Calculator operations, statistics, and events.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrisim_core::calc::{evaluate, round_to, CalcEvent, CalcEventKind, Calculator, Complex, Operation};
use metrisim_core::error::ErrorCode;
use metrisim_core::{DerivedValue, DomainError};

#[test]
fn basic_operations() {
    assert_eq!(evaluate(Operation::Add, 2.0, 3.0), DerivedValue::Number(5.0));
    assert_eq!(evaluate(Operation::Subtract, 2.0, 3.0), DerivedValue::Number(-1.0));
    assert_eq!(evaluate(Operation::Multiply, 2.0, 3.0), DerivedValue::Number(6.0));
    assert_eq!(evaluate(Operation::Divide, 3.0, 2.0), DerivedValue::Number(1.5));
    assert_eq!(evaluate(Operation::Power, 2.0, 10.0), DerivedValue::Number(1024.0));
    assert_eq!(evaluate(Operation::Sqrt, 81.0, 0.0), DerivedValue::Number(9.0));
}

#[test]
fn domain_failures_are_values() {
    assert_eq!(
        evaluate(Operation::Divide, 10.0, 0.0),
        DerivedValue::Undefined(DomainError::DivisionByZero)
    );
    assert_eq!(
        evaluate(Operation::Sqrt, -4.0, 0.0),
        DerivedValue::Undefined(DomainError::NegativeSqrt)
    );
    assert_eq!(
        evaluate(Operation::Power, 10.0, 400.0),
        DerivedValue::Undefined(DomainError::NonFinite)
    );
}

#[test]
fn codes_round_trip() {
    for code in 1..=6 {
        assert_eq!(Operation::from_code(code).unwrap().code(), code);
    }
    assert!(Operation::from_code(0).is_none());
    assert!(Operation::from_code(7).is_none());
    assert!(Operation::Sqrt.is_unary());
}

#[test]
fn stats_and_running_average_time() {
    let mut calc = Calculator::new();
    calc.calculate(10.0, 2.0, Operation::Divide, Duration::from_micros(100));
    calc.calculate(10.0, 0.0, Operation::Divide, Duration::from_micros(300));
    calc.calculate(1.0, 1.0, Operation::Add, Duration::from_micros(200));

    let stats = calc.stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.successful, 2);
    assert_eq!(stats.errors, 1);
    let avg = stats.average_execution().as_secs_f64();
    assert!((avg - 200e-6).abs() < 1e-12, "avg={avg}");

    calc.reset();
    assert_eq!(calc.stats().total, 0);
    assert_eq!(calc.stats().average_execution(), Duration::ZERO);
}

#[test]
fn precision_rounds_results() {
    let mut calc = Calculator::new();
    assert_eq!(calc.precision(), 2);
    let c = calc.calculate(1.0, 3.0, Operation::Divide, Duration::ZERO);
    assert_eq!(c.value, DerivedValue::Number(0.33));

    calc.set_precision(4).unwrap();
    let c = calc.calculate(2.0, 3.0, Operation::Divide, Duration::ZERO);
    assert_eq!(c.value, DerivedValue::Number(0.6667));

    assert_eq!(calc.set_precision(16).unwrap_err().code(), ErrorCode::Config);
    assert_eq!(calc.precision(), 4);
    assert_eq!(round_to(1e300, 15), 1e300);
}

#[test]
fn events_split_by_outcome() {
    let calc = Calculator::new();
    let seen: Arc<Mutex<Vec<CalcEvent>>> = Arc::default();
    for kind in [CalcEventKind::Completed, CalcEventKind::Error] {
        let seen = Arc::clone(&seen);
        calc.observers().subscribe(kind, move |ev: &CalcEvent| {
            seen.lock().unwrap().push(ev.clone());
            Ok(())
        });
    }

    let mut calc = calc;
    calc.calculate(4.0, 0.0, Operation::Sqrt, Duration::ZERO);
    calc.calculate(10.0, 0.0, Operation::Divide, Duration::ZERO);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].kind(), CalcEventKind::Completed);
    match &seen[1] {
        CalcEvent::Error { error, calculation } => {
            assert_eq!(*error, DomainError::DivisionByZero);
            assert_eq!(calculation.op, Operation::Divide);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn complex_add_and_subtract_only() {
    let a = Complex::new(1.0, 2.0);
    let b = Complex::new(0.5, -1.0);
    assert_eq!(a.apply(Operation::Add, b), Some(Complex::new(1.5, 1.0)));
    assert_eq!(a.apply(Operation::Subtract, b), Some(Complex::new(0.5, 3.0)));
    assert_eq!(a.apply(Operation::Multiply, b), None);
}
