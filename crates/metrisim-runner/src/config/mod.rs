//! Simulation config loader (strict parsing).

pub mod schema;

use std::fs;

use metrisim_core::error::{Result, SimError};

pub use schema::{AlertConfig, DerivationConfig, DerivationKind, DriverSection, SimConfig};

/// Built-in vehicle dashboard, used when no config path is given.
pub const DASHBOARD_YAML: &str = include_str!("dashboard.yaml");

pub fn load_from_file(path: &str) -> Result<SimConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| SimError::Io(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<SimConfig> {
    let cfg: SimConfig = serde_yaml::from_str(s)
        .map_err(|e| SimError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn builtin_dashboard() -> Result<SimConfig> {
    load_from_str(DASHBOARD_YAML)
}
