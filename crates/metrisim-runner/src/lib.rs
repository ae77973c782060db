//! metrisim runner library entry.
//!
//! This crate wires configuration, the core `Simulator`, presentation
//! listeners, counters, and the periodic driver into a runnable stack. It is
//! consumed by the binary (`main.rs`) and by integration tests.

pub mod app;
pub mod config;
pub mod derivations;
pub mod driver;
pub mod obs;
