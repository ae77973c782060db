//! metrisim core: bounded metric channels, derived metrics, threshold rules,
//! and synchronous observers.
//!
//! This crate holds the simulation state machine shared by the runner and any
//! embedding application. It intentionally carries no runtime, timer, or I/O
//! dependencies: randomness and time are passed in by the caller so every
//! step is reproducible under test.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `SimError`/`Result` so a misbehaving
//! configuration or listener never takes down the driving loop.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod calc;
pub mod channel;
pub mod derive;
pub mod error;
pub mod observer;
pub mod random;
pub mod sim;
pub mod snapshot;
pub mod stats;
pub mod store;
pub mod threshold;

/// Shared result type.
pub use error::{Result, SimError};

pub use channel::{Channel, ChannelSpec};
pub use derive::{DerivationCtx, DerivedMetric, DerivedMetricEngine, DerivedMetrics, DerivedValue, DomainError};
pub use observer::{DispatchReport, ObserverRegistry, Subscription};
pub use random::{FixedSource, RandomSource, RngSource, SequenceSource};
pub use sim::{Alert, SimEvent, SimEventKind, Simulator, TickReport};
pub use snapshot::MetricSnapshot;
pub use stats::RunningStatistic;
pub use store::MetricStore;
pub use threshold::{Comparison, Severity, ThresholdEvent, ThresholdRule, ThresholdState};
