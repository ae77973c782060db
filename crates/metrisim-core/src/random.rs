//! Injected randomness for the bounded random walk.
//!
//! The store never reaches for a global generator. Callers pass a
//! `RandomSource` into every tick so a run is reproducible with a seeded or
//! fixed source.

use rand::Rng;

/// Source of step factors in `[-1, 1]`.
///
/// A tick multiplies each draw by the channel's `max_step`. Draws outside the
/// unit interval are clamped by the store, so a faulty source can never break
/// the per-tick step bound.
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;
}

impl<S: RandomSource + ?Sized> RandomSource for &mut S {
    fn next_unit(&mut self) -> f64 {
        (**self).next_unit()
    }
}

impl<S: RandomSource + ?Sized> RandomSource for Box<S> {
    fn next_unit(&mut self) -> f64 {
        (**self).next_unit()
    }
}

/// Uniform draws from any `rand` generator.
#[derive(Debug, Clone)]
pub struct RngSource<R>(R);

impl<R: Rng> RngSource<R> {
    pub fn new(rng: R) -> Self {
        Self(rng)
    }

    pub fn into_inner(self) -> R {
        self.0
    }
}

impl<R: Rng> RandomSource for RngSource<R> {
    fn next_unit(&mut self) -> f64 {
        self.0.random_range(-1.0..=1.0)
    }
}

/// Always returns the same factor (e.g. `-1.0` for a steady decline).
#[derive(Debug, Clone, Copy)]
pub struct FixedSource(pub f64);

impl RandomSource for FixedSource {
    fn next_unit(&mut self) -> f64 {
        self.0
    }
}

/// Cycles through a fixed list of factors. An empty list yields `0.0`.
#[derive(Debug, Clone)]
pub struct SequenceSource {
    values: Vec<f64>,
    pos: usize,
}

impl SequenceSource {
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        Self {
            values: values.into(),
            pos: 0,
        }
    }
}

impl RandomSource for SequenceSource {
    fn next_unit(&mut self) -> f64 {
        let Some(v) = self.values.get(self.pos).copied() else {
            return 0.0;
        };
        self.pos = (self.pos + 1) % self.values.len();
        v
    }
}
