//! Calculator operations as pure derivations, plus a stateful calculator that
//! keeps running statistics and fires completion/error events.
//!
//! Timing is measured by the caller and passed in; this module never reads a
//! clock.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::derive::{DerivedValue, DomainError};
use crate::error::{Result, SimError};
use crate::observer::ObserverRegistry;
use crate::stats::RunningStatistic;

/// Binary (and one unary) arithmetic operations with stable codes 1..=6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    /// Unary: uses the left operand only.
    Sqrt,
}

impl Operation {
    pub fn code(self) -> u8 {
        match self {
            Operation::Add => 1,
            Operation::Subtract => 2,
            Operation::Multiply => 3,
            Operation::Divide => 4,
            Operation::Power => 5,
            Operation::Sqrt => 6,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Operation::Add),
            2 => Some(Operation::Subtract),
            3 => Some(Operation::Multiply),
            4 => Some(Operation::Divide),
            5 => Some(Operation::Power),
            6 => Some(Operation::Sqrt),
            _ => None,
        }
    }

    pub fn is_unary(self) -> bool {
        matches!(self, Operation::Sqrt)
    }
}

/// Apply `op`. Never panics; domain failures come back as `Undefined`.
pub fn evaluate(op: Operation, left: f64, right: f64) -> DerivedValue {
    let v = match op {
        Operation::Add => left + right,
        Operation::Subtract => left - right,
        Operation::Multiply => left * right,
        Operation::Divide => {
            if right == 0.0 {
                return DerivedValue::Undefined(DomainError::DivisionByZero);
            }
            left / right
        }
        Operation::Power => left.powf(right),
        Operation::Sqrt => {
            if left < 0.0 {
                return DerivedValue::Undefined(DomainError::NegativeSqrt);
            }
            left.sqrt()
        }
    };
    DerivedValue::number(v)
}

/// Round to `places` decimals; values too large to scale are returned as-is.
pub fn round_to(v: f64, places: u8) -> f64 {
    let scale = 10f64.powi(i32::from(places));
    let scaled = (v * scale).round();
    if scaled.is_finite() {
        scaled / scale
    } else {
        v
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    /// Only addition and subtraction are defined; other ops yield `None`.
    pub fn apply(self, op: Operation, rhs: Complex) -> Option<Complex> {
        match op {
            Operation::Add => Some(Complex::new(self.re + rhs.re, self.im + rhs.im)),
            Operation::Subtract => Some(Complex::new(self.re - rhs.re, self.im - rhs.im)),
            _ => None,
        }
    }
}

/// One finished calculation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Calculation {
    pub op: Operation,
    pub left: f64,
    pub right: f64,
    /// Rounded to the calculator precision when defined.
    pub value: DerivedValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalcEventKind {
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CalcEvent {
    Completed(Calculation),
    Error { calculation: Calculation, error: DomainError },
}

impl CalcEvent {
    pub fn kind(&self) -> CalcEventKind {
        match self {
            CalcEvent::Completed(_) => CalcEventKind::Completed,
            CalcEvent::Error { .. } => CalcEventKind::Error,
        }
    }
}

/// Counters and the mean execution time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CalculatorStats {
    pub total: u64,
    pub successful: u64,
    pub errors: u64,
    /// Running mean of reported execution times, in seconds.
    pub execution_secs: RunningStatistic,
}

impl CalculatorStats {
    pub fn average_execution(&self) -> Duration {
        Duration::from_secs_f64(self.execution_secs.mean().max(0.0))
    }
}

const DEFAULT_PRECISION: u8 = 2;
const MAX_PRECISION: u8 = 15;

#[derive(Debug)]
pub struct Calculator {
    stats: CalculatorStats,
    precision: u8,
    observers: ObserverRegistry<CalcEventKind, CalcEvent>,
}

impl Default for Calculator {
    fn default() -> Self {
        Self::new()
    }
}

impl Calculator {
    pub fn new() -> Self {
        Self {
            stats: CalculatorStats::default(),
            precision: DEFAULT_PRECISION,
            observers: ObserverRegistry::new(),
        }
    }

    /// Evaluate, record stats, and notify listeners. `elapsed` is the
    /// caller-measured execution time.
    pub fn calculate(&mut self, left: f64, right: f64, op: Operation, elapsed: Duration) -> Calculation {
        let value = match evaluate(op, left, right) {
            DerivedValue::Number(v) => DerivedValue::Number(round_to(v, self.precision)),
            undefined => undefined,
        };
        let calculation = Calculation { op, left, right, value };

        self.stats.total += 1;
        self.stats.execution_secs.push(elapsed.as_secs_f64());

        match value {
            DerivedValue::Number(_) => {
                self.stats.successful += 1;
                self.observers
                    .notify(CalcEventKind::Completed, &CalcEvent::Completed(calculation));
            }
            DerivedValue::Undefined(error) => {
                self.stats.errors += 1;
                tracing::debug!(op = ?op, left, right, %error, "calculation failed");
                self.observers.notify(
                    CalcEventKind::Error,
                    &CalcEvent::Error { calculation, error },
                );
            }
        }
        calculation
    }

    pub fn stats(&self) -> CalculatorStats {
        self.stats
    }

    pub fn reset(&mut self) {
        self.stats = CalculatorStats::default();
    }

    pub fn precision(&self) -> u8 {
        self.precision
    }

    pub fn set_precision(&mut self, places: u8) -> Result<()> {
        if places > MAX_PRECISION {
            return Err(SimError::Config(format!(
                "precision must be between 0 and {MAX_PRECISION} (got {places})"
            )));
        }
        self.precision = places;
        Ok(())
    }

    pub fn observers(&self) -> &ObserverRegistry<CalcEventKind, CalcEvent> {
        &self.observers
    }

    pub fn observers_mut(&mut self) -> &mut ObserverRegistry<CalcEventKind, CalcEvent> {
        &mut self.observers
    }
}
