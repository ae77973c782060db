//! Periodic driver: one `step` per interval tick, strictly serialized.

use std::future::Future;

use tokio::time::{interval, Duration, MissedTickBehavior};

use metrisim_core::error::Result;
use metrisim_core::RandomSource;

use crate::app::SimulationApp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxTicks,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub stopped: StopReason,
}

/// Drive `app` every `driver.period_ms` until `driver.max_ticks` is reached
/// or `shutdown` resolves. The first step happens immediately.
pub async fn run<R, F>(app: &mut SimulationApp, rng: &mut R, shutdown: F) -> Result<RunSummary>
where
    R: RandomSource + ?Sized,
    F: Future<Output = ()>,
{
    let period = Duration::from_millis(app.driver().period_ms);
    let max_ticks = app.driver().max_ticks;

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    tracing::info!(period_ms = app.driver().period_ms, ?max_ticks, "driver started");

    let mut ticks = 0u64;
    let stopped = loop {
        if max_ticks.is_some_and(|max| ticks >= max) {
            break StopReason::MaxTicks;
        }
        tokio::select! {
            biased;
            _ = &mut shutdown => break StopReason::Shutdown,
            _ = ticker.tick() => {}
        }

        let report = app.step(rng)?;
        ticks += 1;
        if !report.transitions.is_empty() {
            tracing::debug!(tick = report.snapshot.tick(), transitions = report.transitions.len(), "tick");
        }
    };

    tracing::info!(ticks, stopped = ?stopped, "driver stopped");
    Ok(RunSummary { ticks, stopped })
}
