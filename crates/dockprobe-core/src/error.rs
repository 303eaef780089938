use std::path::PathBuf;

/// Result alias used across the core crate.
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Errors raised while benchmarking or scanning an image.
///
/// Only `Acquisition` (and `Config`/`Io` raised before a run starts) ever
/// reaches the caller of the pipeline. Everything else is caught at the probe
/// boundary and turned into an unavailable or empty result.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The target image could not be built or resolved.
    #[error("failed to acquire image '{image}': {reason}")]
    Acquisition { image: String, reason: String },

    /// A container failed to start or crashed while being inspected.
    #[error("failed to launch container from '{image}': {reason}")]
    Launch { image: String, reason: String },

    /// A container never reached the ready state within its deadline.
    #[error("container '{container}' not ready after {timeout_ms}ms")]
    ReadinessTimeout { container: String, timeout_ms: u64 },

    /// A probe's instrumentation step failed.
    #[error("{probe} measurement failed: {reason}")]
    Measurement { probe: &'static str, reason: String },

    /// An optional host tool is missing or refused to run.
    #[error("tool '{tool}' unavailable: {reason}")]
    ToolUnavailable { tool: String, reason: String },

    /// Configuration file could not be read or parsed.
    #[error("invalid config at {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    pub(crate) fn measurement(probe: &'static str, reason: impl Into<String>) -> Self {
        ProbeError::Measurement {
            probe,
            reason: reason.into(),
        }
    }

    /// Whether this error must abort the whole pipeline run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProbeError::Acquisition { .. } | ProbeError::Config { .. } | ProbeError::Io(_)
        )
    }
}
