//! In-process run metrics.
//!
//! Counters, gauges and a tick-duration histogram are stored as atomics,
//! updated by simulator listeners, and rendered in Prometheus text format
//! when the runner stops.

pub mod metrics;

pub use metrics::RunnerMetrics;
