//! Immutable point-in-time capture of every channel value.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

/// Channel name -> value, frozen at one tick.
///
/// Cloning is cheap (shared `Arc`), and nothing can mutate a snapshot after
/// construction, so it can be handed to listeners or other threads freely.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSnapshot {
    tick: u64,
    values: Arc<BTreeMap<Arc<str>, f64>>,
}

impl MetricSnapshot {
    pub(crate) fn new(tick: u64, values: BTreeMap<Arc<str>, f64>) -> Self {
        Self {
            tick,
            values: Arc::new(values),
        }
    }

    /// Tick counter at capture time (`0` before the first tick).
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn get(&self, channel: &str) -> Option<f64> {
        self.values.get(channel).copied()
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.values.contains_key(channel)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Channels in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.values.iter().map(|(k, v)| (k.as_ref(), *v))
    }
}

impl FromIterator<(String, f64)> for MetricSnapshot {
    /// Build a detached snapshot at tick 0 (test fixtures, replays).
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let values = iter.into_iter().map(|(k, v)| (Arc::from(k), v)).collect();
        Self::new(0, values)
    }
}
