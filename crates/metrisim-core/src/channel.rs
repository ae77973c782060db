//! Bounded numeric channels.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, Result, SimError};

/// Registration parameters for one channel (also the config file shape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelSpec {
    pub name: String,
    pub initial: f64,
    pub lower: f64,
    pub upper: f64,
    /// Largest per-tick change in either direction.
    pub max_step: f64,
}

impl ChannelSpec {
    pub fn new(name: impl Into<String>, initial: f64, lower: f64, upper: f64, max_step: f64) -> Self {
        Self {
            name: name.into(),
            initial,
            lower,
            upper,
            max_step,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(SimError::Config("channel name must not be empty".into()));
        }
        ensure_finite("channel.initial", self.initial)?;
        ensure_finite("channel.lower", self.lower)?;
        ensure_finite("channel.upper", self.upper)?;
        ensure_finite("channel.max_step", self.max_step)?;

        if self.lower > self.upper {
            return Err(SimError::Config(format!(
                "channel {}: lower bound {} exceeds upper bound {}",
                self.name, self.lower, self.upper
            )));
        }
        if !(self.lower..=self.upper).contains(&self.initial) {
            return Err(SimError::Config(format!(
                "channel {}: initial value {} outside [{}, {}]",
                self.name, self.initial, self.lower, self.upper
            )));
        }
        if self.max_step < 0.0 {
            return Err(SimError::Config(format!(
                "channel {}: max_step must not be negative",
                self.name
            )));
        }
        Ok(())
    }
}

/// Live channel state. Only `value` changes after registration.
#[derive(Debug, Clone)]
pub struct Channel {
    name: Arc<str>,
    lower: f64,
    upper: f64,
    max_step: f64,
    value: f64,
}

impl Channel {
    /// Build from a spec that has already passed `validate`.
    pub(crate) fn from_spec(spec: &ChannelSpec) -> Self {
        Self {
            name: Arc::from(spec.name.as_str()),
            lower: spec.lower,
            upper: spec.upper,
            max_step: spec.max_step,
            value: spec.initial,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn lower(&self) -> f64 {
        self.lower
    }
    pub fn upper(&self) -> f64 {
        self.upper
    }
    pub fn max_step(&self) -> f64 {
        self.max_step
    }
    pub fn value(&self) -> f64 {
        self.value
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// One random-walk step. `factor` is clamped to `[-1, 1]`.
    pub(crate) fn step(&mut self, factor: f64) -> f64 {
        let factor = if factor.is_nan() { 0.0 } else { factor.clamp(-1.0, 1.0) };
        self.set_clamped(self.value + factor * self.max_step)
    }

    /// Overwrite the value, clamping into bounds. Returns the stored value.
    pub(crate) fn set_clamped(&mut self, v: f64) -> f64 {
        self.value = v.clamp(self.lower, self.upper);
        self.value
    }
}
