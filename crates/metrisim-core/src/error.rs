//! Shared error type across metrisim crates.

use thiserror::Error;

/// Stable error codes (safe to match on in tests and logs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid registration or configuration.
    Config,
    /// Reference to an unregistered channel, derivation, or rule.
    NotFound,
    /// A listener callback failed.
    Listener,
    /// Reading configuration or writing output failed.
    Io,
}

impl ErrorCode {
    /// String representation used in logs and rendered output.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Config => "CONFIG",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Listener => "LISTENER",
            ErrorCode::Io => "IO",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, SimError>;

/// Unified error type used by core and runner.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("config error: {0}")]
    Config(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("listener failed: {0}")]
    Listener(String),
    #[error("io: {0}")]
    Io(String),
}

impl SimError {
    /// Map the error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            SimError::Config(_) => ErrorCode::Config,
            SimError::NotFound(_) => ErrorCode::NotFound,
            SimError::Listener(_) => ErrorCode::Listener,
            SimError::Io(_) => ErrorCode::Io,
        }
    }

    /// Shorthand used by listeners to report a failure.
    pub fn listener(msg: impl Into<String>) -> Self {
        SimError::Listener(msg.into())
    }
}

/// Reject NaN and infinities in configuration values.
pub(crate) fn ensure_finite(what: &str, v: f64) -> Result<()> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(SimError::Config(format!("{what} must be finite (got {v})")))
    }
}
