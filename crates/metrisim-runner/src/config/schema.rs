use serde::Deserialize;

use metrisim_core::calc::Operation;
use metrisim_core::error::{Result, SimError};
use metrisim_core::{ChannelSpec, Severity, ThresholdRule};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimConfig {
    pub version: u32,

    #[serde(default)]
    pub driver: DriverSection,

    pub channels: Vec<ChannelSpec>,

    #[serde(default)]
    pub derivations: Vec<DerivationConfig>,

    #[serde(default)]
    pub thresholds: Vec<ThresholdRule>,

    /// Alerts raised once at startup.
    #[serde(default)]
    pub alerts: Vec<AlertConfig>,
}

impl SimConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(SimError::Config(format!(
                "unsupported config version {} (expected 1)",
                self.version
            )));
        }
        if self.channels.is_empty() {
            return Err(SimError::Config("channels must not be empty".into()));
        }
        for ch in &self.channels {
            ch.validate()?;
        }
        for d in &self.derivations {
            d.kind.validate(&d.name)?;
        }
        for t in &self.thresholds {
            t.validate()?;
        }

        self.driver.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriverSection {
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,

    /// Stop after this many ticks; run until interrupted when absent.
    #[serde(default)]
    pub max_ticks: Option<u64>,

    /// Seed for a reproducible run; OS entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Print every snapshot as one JSON line on stdout.
    #[serde(default)]
    pub json_snapshots: bool,
}

impl Default for DriverSection {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
            max_ticks: None,
            seed: None,
            json_snapshots: false,
        }
    }
}

impl DriverSection {
    pub fn validate(&self) -> Result<()> {
        if !(10..=60000).contains(&self.period_ms) {
            return Err(SimError::Config(
                "driver.period_ms must be between 10 and 60000".into(),
            ));
        }
        if self.max_ticks == Some(0) {
            return Err(SimError::Config(
                "driver.max_ticks must be positive when set".into(),
            ));
        }
        Ok(())
    }
}

fn default_period_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DerivationConfig {
    pub name: String,
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub kind: DerivationKind,
}

/// Built-in derivation shapes selectable from config.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum DerivationKind {
    /// `offset + scale * channel`
    Linear {
        channel: String,
        scale: f64,
        #[serde(default)]
        offset: f64,
    },
    /// `scale * numerator / denominator`
    Ratio {
        numerator: String,
        denominator: String,
        #[serde(default = "default_scale")]
        scale: f64,
    },
    /// Count-based running mean of a channel.
    RunningAverage { channel: String },
    /// Calculator operation over one or two channels.
    Calculator {
        op: Operation,
        left: String,
        #[serde(default)]
        right: Option<String>,
    },
}

fn default_scale() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlertConfig {
    pub name: String,
    pub message: String,
    #[serde(default = "default_alert_severity")]
    pub severity: Severity,
}

fn default_alert_severity() -> Severity {
    Severity::Warning
}
