//! MetricStore: owns channel values and applies one bounded walk step per tick.

use std::collections::{BTreeMap, HashMap};

use crate::channel::{Channel, ChannelSpec};
use crate::error::{ensure_finite, Result, SimError};
use crate::random::RandomSource;
use crate::snapshot::MetricSnapshot;

/// Authoritative channel state.
///
/// Single writer: `tick` and `set_value` take `&mut self`, so overlapping
/// updates are ruled out at compile time. Readers get `MetricSnapshot`s.
#[derive(Debug, Default)]
pub struct MetricStore {
    channels: Vec<Channel>,
    index: HashMap<String, usize>,
    ticks: u64,
}

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel. Fails on bad bounds, out-of-range initial value, or
    /// a duplicate name.
    pub fn register_channel(&mut self, spec: ChannelSpec) -> Result<()> {
        spec.validate()?;
        if self.index.contains_key(&spec.name) {
            return Err(SimError::Config(format!(
                "channel already registered: {}",
                spec.name
            )));
        }

        tracing::debug!(
            channel = %spec.name,
            initial = spec.initial,
            lower = spec.lower,
            upper = spec.upper,
            max_step = spec.max_step,
            "channel registered"
        );

        self.index.insert(spec.name.clone(), self.channels.len());
        self.channels.push(Channel::from_spec(&spec));
        Ok(())
    }

    /// Advance every channel by one step drawn from `rng`, in registration
    /// order, and return the post-update snapshot.
    pub fn tick<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> MetricSnapshot {
        for ch in &mut self.channels {
            let factor = rng.next_unit();
            ch.step(factor);
        }
        self.ticks += 1;
        tracing::trace!(tick = self.ticks, channels = self.channels.len(), "store ticked");
        self.snapshot()
    }

    /// Current values without advancing state.
    pub fn snapshot(&self) -> MetricSnapshot {
        let values: BTreeMap<_, _> = self
            .channels
            .iter()
            .map(|c| (c.shared_name(), c.value()))
            .collect();
        MetricSnapshot::new(self.ticks, values)
    }

    /// Override a channel value (clamped to bounds). Returns the stored value.
    pub fn set_value(&mut self, name: &str, value: f64) -> Result<f64> {
        ensure_finite("set_value", value)?;
        let ch = self.channel_mut(name)?;
        let stored = ch.set_clamped(value);
        tracing::debug!(channel = %name, requested = value, stored, "channel value set");
        Ok(stored)
    }

    pub fn value(&self, name: &str) -> Result<f64> {
        self.channel(name).map(Channel::value)
    }

    pub fn channel(&self, name: &str) -> Result<&Channel> {
        self.index
            .get(name)
            .and_then(|&i| self.channels.get(i))
            .ok_or_else(|| SimError::NotFound(format!("channel: {name}")))
    }

    /// Channel names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.channels.iter().map(Channel::name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Number of completed ticks.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    fn channel_mut(&mut self, name: &str) -> Result<&mut Channel> {
        let i = *self
            .index
            .get(name)
            .ok_or_else(|| SimError::NotFound(format!("channel: {name}")))?;
        self.channels
            .get_mut(i)
            .ok_or_else(|| SimError::NotFound(format!("channel: {name}")))
    }
}
