//! Top-level facade crate for metrisim.
//!
//! Re-exports the core simulation types and the runner library so users can
//! depend on a single crate.

pub mod core {
    pub use metrisim_core::*;
}

pub mod runner {
    pub use metrisim_runner::*;
}
