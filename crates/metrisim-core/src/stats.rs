//! Count-based running mean.

use serde::Serialize;

/// Incremental `(count, mean)` pair.
///
/// Uses `mean' = mean + (x - mean) / count'` instead of `sum / count`, so the
/// mean stays accurate over long runs without an ever-growing sum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RunningStatistic {
    count: u64,
    mean: f64,
}

impl RunningStatistic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one observation into the mean. Non-finite values are ignored.
    pub fn push(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.count += 1;
        self.mean = Self::step(self.mean, self.count, value);
    }

    /// The recurrence itself: `prev_mean` over `count - 1` samples, plus
    /// `value` as sample number `count`.
    pub fn step(prev_mean: f64, count: u64, value: f64) -> f64 {
        if count == 0 {
            return prev_mean;
        }
        prev_mean + (value - prev_mean) / count as f64
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// `0.0` when nothing has been observed.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Extend<f64> for RunningStatistic {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for v in iter {
            self.push(v);
        }
    }
}

impl FromIterator<f64> for RunningStatistic {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut s = Self::new();
        s.extend(iter);
        s
    }
}
