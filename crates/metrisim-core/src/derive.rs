//! DerivedMetricEngine: secondary metrics and threshold evaluation.
//!
//! Derivations read raw channels only (never other derivations), so the
//! evaluation order is simply registration order. Each derivation may see
//! its own previous result, which is how accumulators such as running
//! averages carry state across ticks without capturing shared mutable state.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Result, SimError};
use crate::snapshot::MetricSnapshot;
use crate::threshold::{RuleState, ThresholdEvent, ThresholdRule, ThresholdState};

/// Why a derivation produced no number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainError {
    DivisionByZero,
    NegativeSqrt,
    MissingInput,
    NonFinite,
}

impl DomainError {
    pub fn as_str(self) -> &'static str {
        match self {
            DomainError::DivisionByZero => "division by zero",
            DomainError::NegativeSqrt => "square root of a negative number",
            DomainError::MissingInput => "missing input",
            DomainError::NonFinite => "non-finite result",
        }
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a derivation: a number, or an explicit domain failure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedValue {
    Number(f64),
    Undefined(DomainError),
}

impl DerivedValue {
    /// Wrap `v`, mapping NaN and infinities to `Undefined(NonFinite)`.
    pub fn number(v: f64) -> Self {
        if v.is_finite() {
            DerivedValue::Number(v)
        } else {
            DerivedValue::Undefined(DomainError::NonFinite)
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            DerivedValue::Number(v) => Some(v),
            DerivedValue::Undefined(_) => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, DerivedValue::Number(_))
    }

    pub fn domain_error(&self) -> Option<DomainError> {
        match *self {
            DerivedValue::Undefined(e) => Some(e),
            DerivedValue::Number(_) => None,
        }
    }
}

impl From<f64> for DerivedValue {
    fn from(v: f64) -> Self {
        DerivedValue::number(v)
    }
}

impl From<Option<f64>> for DerivedValue {
    fn from(v: Option<f64>) -> Self {
        v.map_or(DerivedValue::Undefined(DomainError::MissingInput), DerivedValue::number)
    }
}

/// One derivation's output for one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedMetric {
    pub name: Arc<str>,
    pub value: DerivedValue,
    /// Tick of the snapshot this was computed from.
    pub tick: u64,
    /// Defined (numeric) results produced so far, this one included.
    pub samples: u64,
    /// Most recent defined result, carried across `Undefined` ticks.
    pub last_number: Option<f64>,
}

/// All derivation outputs for one tick, in registration order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DerivedMetrics {
    tick: u64,
    metrics: Vec<DerivedMetric>,
}

impl DerivedMetrics {
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn get(&self, name: &str) -> Option<&DerivedMetric> {
        self.metrics.iter().find(|m| &*m.name == name)
    }

    /// Numeric value of `name`, if defined.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|m| m.value.as_f64())
    }

    pub fn iter(&self) -> impl Iterator<Item = &DerivedMetric> + '_ {
        self.metrics.iter()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// What a compute function can see: its declared channels, its own previous
/// result, and nothing else.
pub struct DerivationCtx<'a> {
    snapshot: &'a MetricSnapshot,
    depends_on: &'a [String],
    previous: Option<&'a DerivedMetric>,
}

impl<'a> DerivationCtx<'a> {
    /// Value of a declared dependency. Undeclared channels read as `None`.
    pub fn value(&self, channel: &str) -> Option<f64> {
        if !self.depends_on.iter().any(|d| d == channel) {
            return None;
        }
        self.snapshot.get(channel)
    }

    pub fn previous(&self) -> Option<&'a DerivedMetric> {
        self.previous
    }

    /// Previous numeric result, if the last evaluation produced one.
    pub fn previous_number(&self) -> Option<f64> {
        self.previous.and_then(|p| p.value.as_f64())
    }

    /// Most recent defined result, skipping any `Undefined` ones since.
    /// Accumulators pair this with `samples`.
    pub fn last_number(&self) -> Option<f64> {
        self.previous.and_then(|p| p.last_number)
    }

    /// Defined results produced before this evaluation.
    pub fn samples(&self) -> u64 {
        self.previous.map_or(0, |p| p.samples)
    }

    pub fn tick(&self) -> u64 {
        self.snapshot.tick()
    }
}

/// Pure compute function of a derivation.
pub type ComputeFn = Box<dyn Fn(&DerivationCtx<'_>) -> DerivedValue + Send + Sync>;

struct Derivation {
    name: Arc<str>,
    depends_on: Vec<String>,
    compute: ComputeFn,
    previous: Option<DerivedMetric>,
}

/// Computes derived metrics and tracks threshold rule state.
#[derive(Default)]
pub struct DerivedMetricEngine {
    derivations: Vec<Derivation>,
    rules: Vec<RuleState>,
}

impl fmt::Debug for DerivedMetricEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedMetricEngine")
            .field("derivations", &self.derivation_names().collect::<Vec<_>>())
            .field("rules", &self.rules)
            .finish()
    }
}

impl DerivedMetricEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a derivation over `depends_on` raw channels.
    pub fn register_derivation<I, S, F>(&mut self, name: &str, depends_on: I, compute: F) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&DerivationCtx<'_>) -> DerivedValue + Send + Sync + 'static,
    {
        if name.is_empty() {
            return Err(SimError::Config("derivation name must not be empty".into()));
        }
        if self.derivations.iter().any(|d| &*d.name == name) {
            return Err(SimError::Config(format!("derivation already registered: {name}")));
        }

        let mut seen = HashSet::new();
        let depends_on: Vec<String> = depends_on
            .into_iter()
            .map(Into::into)
            .filter(|d| seen.insert(d.clone()))
            .collect();

        tracing::debug!(derivation = %name, depends_on = ?depends_on, "derivation registered");

        self.derivations.push(Derivation {
            name: Arc::from(name),
            depends_on,
            compute: Box::new(compute),
            previous: None,
        });
        Ok(())
    }

    /// Fails with `NotFound` on the first derivation dependency or rule
    /// channel that `known` does not recognise.
    pub fn check_inputs<F>(&self, known: F) -> Result<()>
    where
        F: Fn(&str) -> bool,
    {
        for d in &self.derivations {
            if let Some(missing) = d.depends_on.iter().find(|c| !known(c.as_str())) {
                return Err(SimError::NotFound(format!(
                    "channel {missing} (required by derivation {})",
                    d.name
                )));
            }
        }
        for r in &self.rules {
            if !known(r.rule.channel.as_str()) {
                return Err(SimError::NotFound(format!(
                    "channel {} (required by threshold {})",
                    r.rule.channel, r.rule.name
                )));
            }
        }
        Ok(())
    }

    /// Evaluate every derivation against `snapshot`.
    ///
    /// All-or-nothing: if any declared dependency is missing from the
    /// snapshot, nothing is computed and previous values stay untouched.
    pub fn recompute(&mut self, snapshot: &MetricSnapshot) -> Result<DerivedMetrics> {
        for d in &self.derivations {
            if let Some(missing) = d.depends_on.iter().find(|c| !snapshot.contains(c)) {
                return Err(SimError::NotFound(format!(
                    "channel {missing} (required by derivation {})",
                    d.name
                )));
            }
        }

        let mut metrics = Vec::with_capacity(self.derivations.len());
        for d in &self.derivations {
            let ctx = DerivationCtx {
                snapshot,
                depends_on: &d.depends_on,
                previous: d.previous.as_ref(),
            };
            let value = match (d.compute)(&ctx) {
                DerivedValue::Number(v) => DerivedValue::number(v),
                undefined => undefined,
            };
            let samples = ctx.samples() + u64::from(value.is_number());
            let last_number = value.as_f64().or_else(|| ctx.last_number());
            metrics.push(DerivedMetric {
                name: Arc::clone(&d.name),
                value,
                tick: snapshot.tick(),
                samples,
                last_number,
            });
        }

        for (d, m) in self.derivations.iter_mut().zip(&metrics) {
            d.previous = Some(m.clone());
        }

        tracing::trace!(tick = snapshot.tick(), derived = metrics.len(), "derived metrics recomputed");
        Ok(DerivedMetrics {
            tick: snapshot.tick(),
            metrics,
        })
    }

    /// Last result of `name`, if it has been computed at least once.
    pub fn previous(&self, name: &str) -> Result<Option<&DerivedMetric>> {
        self.derivations
            .iter()
            .find(|d| &*d.name == name)
            .map(|d| d.previous.as_ref())
            .ok_or_else(|| SimError::NotFound(format!("derivation: {name}")))
    }

    /// Forget accumulated state of one derivation (e.g. a trip reset).
    pub fn reset_derivation(&mut self, name: &str) -> Result<()> {
        let d = self
            .derivations
            .iter_mut()
            .find(|d| &*d.name == name)
            .ok_or_else(|| SimError::NotFound(format!("derivation: {name}")))?;
        d.previous = None;
        Ok(())
    }

    pub fn derivation_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.derivations.iter().map(|d| &*d.name)
    }

    /// Channels a derivation reads.
    pub fn dependencies(&self, name: &str) -> Result<&[String]> {
        self.derivations
            .iter()
            .find(|d| &*d.name == name)
            .map(|d| d.depends_on.as_slice())
            .ok_or_else(|| SimError::NotFound(format!("derivation: {name}")))
    }

    pub fn register_threshold(&mut self, rule: ThresholdRule) -> Result<()> {
        rule.validate()?;
        if self.rules.iter().any(|r| r.rule.name == rule.name) {
            return Err(SimError::Config(format!(
                "threshold already registered: {}",
                rule.name
            )));
        }
        tracing::debug!(
            rule = %rule.name,
            channel = %rule.channel,
            op = %rule.op,
            value = rule.value,
            severity = rule.severity.as_str(),
            "threshold registered"
        );
        self.rules.push(RuleState::new(rule));
        Ok(())
    }

    /// Compare each rule against `snapshot` and flip flags on edges.
    ///
    /// Returns one event per flipped rule, in rule registration order. Fails
    /// without touching any flag if a rule's channel is not in the snapshot.
    pub fn evaluate_thresholds(&mut self, snapshot: &MetricSnapshot) -> Result<Vec<ThresholdEvent>> {
        let mut met = Vec::with_capacity(self.rules.len());
        for r in &self.rules {
            let v = snapshot.get(&r.rule.channel).ok_or_else(|| {
                SimError::NotFound(format!(
                    "channel {} (required by threshold {})",
                    r.rule.channel, r.rule.name
                ))
            })?;
            met.push(r.rule.is_met(v));
        }

        let mut events = Vec::new();
        for (r, now) in self.rules.iter_mut().zip(met) {
            if r.active == now {
                continue;
            }
            r.active = now;
            let state = if now {
                ThresholdState::Active
            } else {
                ThresholdState::Cleared
            };
            tracing::info!(
                rule = %r.rule.name,
                channel = %r.rule.channel,
                state = state.as_str(),
                severity = r.rule.severity.as_str(),
                tick = snapshot.tick(),
                "threshold transition"
            );
            events.push(ThresholdEvent {
                rule: Arc::clone(&r.rule),
                state,
                snapshot: snapshot.clone(),
            });
        }
        Ok(events)
    }

    /// Rules whose condition currently holds.
    pub fn active_rules(&self) -> impl Iterator<Item = &ThresholdRule> + '_ {
        self.rules.iter().filter(|r| r.active).map(|r| r.rule.as_ref())
    }

    pub fn is_active(&self, rule: &str) -> Result<bool> {
        self.rules
            .iter()
            .find(|r| r.rule.name == rule)
            .map(|r| r.active)
            .ok_or_else(|| SimError::NotFound(format!("threshold: {rule}")))
    }

    /// Rules in registration order.
    pub fn rules(&self) -> impl Iterator<Item = &ThresholdRule> + '_ {
        self.rules.iter().map(|r| r.rule.as_ref())
    }
}
