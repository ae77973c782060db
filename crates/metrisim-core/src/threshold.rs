//! Threshold rules and their edge-triggered events.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, Result, SimError};
use crate::snapshot::MetricSnapshot;

/// Comparison applied as `channel <op> value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
}

impl Comparison {
    /// NaN never satisfies any comparison.
    pub fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::Lt => lhs < rhs,
            Comparison::Le => lhs <= rhs,
            Comparison::Gt => lhs > rhs,
            Comparison::Ge => lhs >= rhs,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Warning severity, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

/// `(channel, op, value, severity)` plus a unique name and display message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdRule {
    pub name: String,
    pub channel: String,
    pub op: Comparison,
    pub value: f64,
    pub severity: Severity,
    #[serde(default)]
    pub message: String,
}

impl ThresholdRule {
    pub fn new(
        name: impl Into<String>,
        channel: impl Into<String>,
        op: Comparison,
        value: f64,
        severity: Severity,
    ) -> Self {
        Self {
            name: name.into(),
            channel: channel.into(),
            op,
            value,
            severity,
            message: String::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(SimError::Config("threshold name must not be empty".into()));
        }
        if self.channel.is_empty() {
            return Err(SimError::Config(format!(
                "threshold {}: channel must not be empty",
                self.name
            )));
        }
        ensure_finite("threshold.value", self.value)
    }

    /// Whether the condition holds for `value`.
    pub fn is_met(&self, value: f64) -> bool {
        self.op.holds(value, self.value)
    }
}

/// Direction of a transition edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdState {
    /// inactive -> active
    Active,
    /// active -> inactive
    Cleared,
}

impl ThresholdState {
    pub fn as_str(self) -> &'static str {
        match self {
            ThresholdState::Active => "active",
            ThresholdState::Cleared => "cleared",
        }
    }
}

/// Emitted once per edge, never for a continued breach.
#[derive(Debug, Clone, Serialize)]
pub struct ThresholdEvent {
    pub rule: Arc<ThresholdRule>,
    pub state: ThresholdState,
    pub snapshot: MetricSnapshot,
}

impl ThresholdEvent {
    /// The channel value that caused the transition.
    pub fn value(&self) -> Option<f64> {
        self.snapshot.get(&self.rule.channel)
    }
}

/// Rule plus its mutable `active` flag.
#[derive(Debug)]
pub(crate) struct RuleState {
    pub(crate) rule: Arc<ThresholdRule>,
    pub(crate) active: bool,
}

impl RuleState {
    pub(crate) fn new(rule: ThresholdRule) -> Self {
        Self {
            rule: Arc::new(rule),
            active: false,
        }
    }
}
