//! Simulation application: a configured `Simulator` plus its presentation
//! and counting listeners.
//!
//! Startup errors are returned as `Result` so the binary can report them
//! instead of panicking.

use std::sync::Arc;
use std::time::Instant;

use metrisim_core::error::Result;
use metrisim_core::{RandomSource, SimError, SimEvent, SimEventKind, Simulator, TickReport};

use crate::config::{DriverSection, SimConfig};
use crate::obs::RunnerMetrics;

pub struct SimulationApp {
    sim: Simulator,
    metrics: Arc<RunnerMetrics>,
    driver: DriverSection,
}

impl SimulationApp {
    /// Register channels, derivations and thresholds (in that order), raise
    /// the configured startup alerts, and attach listeners.
    pub fn from_config(cfg: SimConfig) -> Result<Self> {
        let mut sim = Simulator::new();

        for ch in cfg.channels {
            sim.register_channel(ch)?;
        }
        for d in &cfg.derivations {
            let deps = d.kind.depends_on();
            sim.register_derivation(&d.name, &deps, d.kind.compute_fn())?;
        }
        for t in cfg.thresholds {
            sim.register_threshold(t)?;
        }

        let metrics = Arc::new(RunnerMetrics::default());
        attach_listeners(&mut sim, &metrics, cfg.driver.json_snapshots);

        for a in &cfg.alerts {
            sim.raise_alert(&a.name, &a.message, a.severity);
        }

        tracing::info!(
            channels = sim.store().len(),
            derivations = sim.engine().derivation_names().count(),
            thresholds = sim.engine().rules().count(),
            "simulation configured"
        );

        Ok(Self {
            sim,
            metrics,
            driver: cfg.driver,
        })
    }

    /// One timed step of the simulation.
    pub fn step<R: RandomSource + ?Sized>(&mut self, rng: &mut R) -> Result<TickReport> {
        let started = Instant::now();
        let report = self.sim.step(rng)?;
        self.metrics.tick_duration.observe(&[], started.elapsed());
        self.metrics.ticks.inc(&[]);
        Ok(report)
    }

    pub fn simulator(&self) -> &Simulator {
        &self.sim
    }

    pub fn simulator_mut(&mut self) -> &mut Simulator {
        &mut self.sim
    }

    pub fn metrics(&self) -> Arc<RunnerMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn driver(&self) -> &DriverSection {
        &self.driver
    }
}

fn kind_label(kind: SimEventKind) -> &'static str {
    match kind {
        SimEventKind::Tick => "tick",
        SimEventKind::Derived => "derived",
        SimEventKind::Threshold => "threshold",
        SimEventKind::Alert => "alert",
    }
}

fn attach_listeners(sim: &mut Simulator, metrics: &Arc<RunnerMetrics>, json_snapshots: bool) {
    {
        let m = Arc::clone(metrics);
        sim.observers_mut().set_error_hook(move |kind, _err| {
            m.listener_failures.inc(&[("kind", kind_label(kind))]);
        });
    }

    let observers = sim.observers();

    {
        let m = Arc::clone(metrics);
        observers.subscribe(SimEventKind::Tick, move |ev: &SimEvent| {
            let SimEvent::Tick(snapshot) = ev else {
                return Ok(());
            };
            for (channel, v) in snapshot.iter() {
                m.channel_values.set(&[("channel", channel)], v);
            }
            tracing::trace!(tick = snapshot.tick(), "snapshot");
            Ok(())
        });
    }

    if json_snapshots {
        observers.subscribe(SimEventKind::Tick, |ev: &SimEvent| {
            let SimEvent::Tick(snapshot) = ev else {
                return Ok(());
            };
            let line = serde_json::to_string(snapshot)
                .map_err(|e| SimError::Io(format!("encode snapshot failed: {e}")))?;
            println!("{line}");
            Ok(())
        });
    }

    {
        let m = Arc::clone(metrics);
        observers.subscribe(SimEventKind::Derived, move |ev: &SimEvent| {
            let SimEvent::Derived(derived) = ev else {
                return Ok(());
            };
            for d in derived.iter() {
                match d.value.domain_error() {
                    None => tracing::debug!(metric = %d.name, value = ?d.value.as_f64(), "derived"),
                    Some(err) => {
                        m.undefined_derivations.inc(&[("derivation", &*d.name)]);
                        tracing::debug!(metric = %d.name, %err, "derived value undefined");
                    }
                }
            }
            Ok(())
        });
    }

    {
        let m = Arc::clone(metrics);
        observers.subscribe(SimEventKind::Threshold, move |ev: &SimEvent| {
            let SimEvent::Threshold(t) = ev else {
                return Ok(());
            };
            m.threshold_transitions
                .inc(&[("rule", t.rule.name.as_str()), ("state", t.state.as_str())]);
            tracing::warn!(
                rule = %t.rule.name,
                state = t.state.as_str(),
                severity = t.rule.severity.as_str(),
                value = ?t.value(),
                message = %t.rule.message,
                "threshold"
            );
            Ok(())
        });
    }

    {
        let m = Arc::clone(metrics);
        observers.subscribe(SimEventKind::Alert, move |ev: &SimEvent| {
            let SimEvent::Alert(a) = ev else {
                return Ok(());
            };
            m.alerts_raised.inc(&[("severity", a.severity.as_str())]);
            tracing::warn!(alert = %a.name, severity = a.severity.as_str(), message = %a.message, "alert");
            Ok(())
        });
    }
}
