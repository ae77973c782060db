//! Simulator: the tick pipeline wiring the store, the derived-metric engine
//! and the observer registry together.
//!
//! `step` = `tick` -> `recompute` -> `evaluate_thresholds` -> `notify`.

use serde::Serialize;

use crate::channel::ChannelSpec;
use crate::derive::{DerivationCtx, DerivedMetricEngine, DerivedMetrics, DerivedValue};
use crate::error::{Result, SimError};
use crate::observer::ObserverRegistry;
use crate::random::RandomSource;
use crate::snapshot::MetricSnapshot;
use crate::store::MetricStore;
use crate::threshold::{Severity, ThresholdEvent, ThresholdRule};

/// Closed set of event kinds listeners can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimEventKind {
    /// Every tick, with the post-update snapshot.
    Tick,
    /// Every tick, with the derived metrics.
    Derived,
    /// Once per threshold transition edge.
    Threshold,
    /// Ad-hoc alerts raised by the application.
    Alert,
}

#[derive(Debug, Clone)]
pub enum SimEvent {
    Tick(MetricSnapshot),
    Derived(DerivedMetrics),
    Threshold(ThresholdEvent),
    Alert(Alert),
}

impl SimEvent {
    pub fn kind(&self) -> SimEventKind {
        match self {
            SimEvent::Tick(_) => SimEventKind::Tick,
            SimEvent::Derived(_) => SimEventKind::Derived,
            SimEvent::Threshold(_) => SimEventKind::Threshold,
            SimEvent::Alert(_) => SimEventKind::Alert,
        }
    }
}

/// An active warning, either raised by hand or backed by an active rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub name: String,
    pub message: String,
    pub severity: Severity,
    /// Store tick at which the alert was raised (`None` for rule-backed
    /// alerts, whose state lives in the engine).
    pub raised_at: Option<u64>,
}

/// Everything one `step` produced.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub snapshot: MetricSnapshot,
    pub derived: DerivedMetrics,
    pub transitions: Vec<ThresholdEvent>,
    /// Listener failures across all dispatches of this step.
    pub listener_failures: usize,
}

#[derive(Debug, Default)]
pub struct Simulator {
    store: MetricStore,
    engine: DerivedMetricEngine,
    observers: ObserverRegistry<SimEventKind, SimEvent>,
    alerts: Vec<Alert>,
    listener_failures: u64,
}

impl Simulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_channel(&mut self, spec: ChannelSpec) -> Result<()> {
        self.store.register_channel(spec)
    }

    /// Register a derivation; every dependency must be a registered channel.
    pub fn register_derivation<F>(&mut self, name: &str, depends_on: &[&str], compute: F) -> Result<()>
    where
        F: Fn(&DerivationCtx<'_>) -> DerivedValue + Send + Sync + 'static,
    {
        if let Some(missing) = depends_on.iter().find(|c| !self.store.contains(c)) {
            return Err(SimError::Config(format!(
                "derivation {name} depends on unknown channel {missing}"
            )));
        }
        self.engine
            .register_derivation(name, depends_on.iter().copied(), compute)
    }

    /// Register a threshold rule over a registered channel.
    pub fn register_threshold(&mut self, rule: ThresholdRule) -> Result<()> {
        if !self.store.contains(&rule.channel) {
            return Err(SimError::Config(format!(
                "threshold {} refers to unknown channel {}",
                rule.name, rule.channel
            )));
        }
        self.engine.register_threshold(rule)
    }

    /// Advance one tick and dispatch the resulting events.
    ///
    /// Nothing advances if a derivation or rule reads an unregistered channel.
    pub fn step<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> Result<TickReport> {
        self.check_inputs()?;
        let snapshot = self.store.tick(rng);
        let derived = self.engine.recompute(&snapshot)?;
        let transitions = self.engine.evaluate_thresholds(&snapshot)?;

        let mut listener_failures = 0;
        listener_failures += self
            .observers
            .notify(SimEventKind::Tick, &SimEvent::Tick(snapshot.clone()))
            .failed;
        listener_failures += self
            .observers
            .notify(SimEventKind::Derived, &SimEvent::Derived(derived.clone()))
            .failed;
        listener_failures += self.dispatch_transitions(&transitions);
        self.record_failures(listener_failures);

        Ok(TickReport {
            snapshot,
            derived,
            transitions,
            listener_failures,
        })
    }

    /// Override a channel, then re-evaluate thresholds against the new state.
    pub fn set_value(&mut self, name: &str, value: f64) -> Result<Vec<ThresholdEvent>> {
        self.check_inputs()?;
        self.store.set_value(name, value)?;
        let snapshot = self.store.snapshot();
        let transitions = self.engine.evaluate_thresholds(&snapshot)?;
        let failed = self.dispatch_transitions(&transitions);
        self.record_failures(failed);
        Ok(transitions)
    }

    /// Raise an ad-hoc alert and notify `Alert` listeners.
    pub fn raise_alert(&mut self, name: &str, message: &str, severity: Severity) -> Alert {
        let alert = Alert {
            name: name.to_string(),
            message: message.to_string(),
            severity,
            raised_at: Some(self.store.ticks()),
        };
        tracing::info!(alert = %name, severity = severity.as_str(), "alert raised");
        self.alerts.push(alert.clone());
        let failed = self
            .observers
            .notify(SimEventKind::Alert, &SimEvent::Alert(alert.clone()))
            .failed;
        self.record_failures(failed);
        alert
    }

    /// Remove every ad-hoc alert named `name`.
    pub fn clear_alert(&mut self, name: &str) -> Result<()> {
        let before = self.alerts.len();
        self.alerts.retain(|a| a.name != name);
        if self.alerts.len() == before {
            return Err(SimError::NotFound(format!("alert: {name}")));
        }
        Ok(())
    }

    /// Ad-hoc alerts (oldest first) followed by currently active rules.
    pub fn active_alerts(&self) -> Vec<Alert> {
        let rule_backed = self.engine.active_rules().map(|r| Alert {
            name: r.name.clone(),
            message: r.message.clone(),
            severity: r.severity,
            raised_at: None,
        });
        self.alerts.iter().cloned().chain(rule_backed).collect()
    }

    /// Listener failures across every dispatch so far (steps, overrides,
    /// alerts).
    pub fn listener_failures(&self) -> u64 {
        self.listener_failures
    }

    pub fn snapshot(&self) -> MetricSnapshot {
        self.store.snapshot()
    }

    pub fn store(&self) -> &MetricStore {
        &self.store
    }

    pub fn engine(&self) -> &DerivedMetricEngine {
        &self.engine
    }

    /// Direct engine access. Registrations made here skip the channel check,
    /// so `step` and `set_value` re-check inputs before mutating anything.
    pub fn engine_mut(&mut self) -> &mut DerivedMetricEngine {
        &mut self.engine
    }

    pub fn observers(&self) -> &ObserverRegistry<SimEventKind, SimEvent> {
        &self.observers
    }

    pub fn observers_mut(&mut self) -> &mut ObserverRegistry<SimEventKind, SimEvent> {
        &mut self.observers
    }

    fn check_inputs(&self) -> Result<()> {
        self.engine.check_inputs(|c| self.store.contains(c))
    }

    fn record_failures(&mut self, failed: usize) {
        if failed > 0 {
            self.listener_failures += failed as u64;
            tracing::debug!(failed, total = self.listener_failures, "listener failures recorded");
        }
    }

    fn dispatch_transitions(&self, transitions: &[ThresholdEvent]) -> usize {
        transitions
            .iter()
            .map(|ev| {
                self.observers
                    .notify(SimEventKind::Threshold, &SimEvent::Threshold(ev.clone()))
                    .failed
            })
            .sum()
    }
}
