//! Error types for the callflow framework.
//!
//! Configuration problems surface as [`PipelineConfigError`] at setup time.
//! Per-call problems surface as [`CallflowError`] from the traversal that
//! hit them. Cancellation is a distinct variant carrying a [`CancelReason`]
//! so callers never mistake a timeout for an application failure.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result alias for a pipeline traversal.
pub type CallResult = Result<(), CallflowError>;

/// The main error type for callflow operations.
#[derive(Debug, Error)]
pub enum CallflowError {
    /// The pipeline or a plugin was configured incorrectly.
    #[error("{0}")]
    Config(#[from] PipelineConfigError),

    /// A write-once attribute was written twice.
    #[error("{0}")]
    DataConflict(#[from] DataConflictError),

    /// The call was cancelled before the traversal finished.
    #[error("Call cancelled: {0}")]
    Cancelled(CancelReason),

    /// An interceptor failed.
    #[error("Interceptor in phase '{phase}' failed: {source}")]
    Interceptor {
        /// The phase the failing interceptor was registered on.
        phase: String,
        /// The underlying failure.
        #[source]
        source: anyhow::Error,
    },

    /// A callback-style operation awaited during the call reported failure.
    #[error("Pending operation failed: {0}")]
    Transport(#[source] anyhow::Error),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CallflowError {
    /// Wraps an arbitrary failure raised by an interceptor.
    pub fn interceptor(phase: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Interceptor {
            phase: phase.into(),
            source: source.into(),
        }
    }

    /// Returns true if this error represents cancellation rather than failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Returns the cancellation reason, if this is a cancellation.
    #[must_use]
    pub fn cancel_reason(&self) -> Option<&CancelReason> {
        match self {
            Self::Cancelled(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Why a call or pending operation was cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// Someone asked for cancellation explicitly.
    Requested(String),
    /// A deadline wrapping the call elapsed.
    Timeout(Duration),
}

impl CancelReason {
    /// Returns true if the cancellation was caused by a deadline.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested(reason) => write!(f, "{reason}"),
            Self::Timeout(after) => write!(f, "timed out after {}ms", after.as_millis()),
        }
    }
}

impl From<&str> for CancelReason {
    fn from(reason: &str) -> Self {
        Self::Requested(reason.to_string())
    }
}

impl From<String> for CancelReason {
    fn from(reason: String) -> Self {
        Self::Requested(reason)
    }
}

impl From<Duration> for CancelReason {
    fn from(after: Duration) -> Self {
        Self::Timeout(after)
    }
}

/// Metadata about a configuration error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigErrorInfo {
    /// Error code (e.g., "CONFIG-PHASE-UNKNOWN").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ConfigErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when a pipeline or plugin is configured incorrectly.
///
/// Always raised at setup; never deferred to the first call.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineConfigError {
    /// The error message.
    pub message: String,
    /// The phases involved in the error.
    pub phases: Vec<String>,
    /// Optional structured error info.
    pub error_info: Option<ConfigErrorInfo>,
}

impl PipelineConfigError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            phases: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the phases involved.
    #[must_use]
    pub fn with_phases(mut self, phases: Vec<String>) -> Self {
        self.phases = phases;
        self
    }

    /// Sets the structured error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ConfigErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }

    /// An anchor phase referenced by an insertion or interception is missing.
    #[must_use]
    pub fn unknown_phase(phase: &str) -> Self {
        Self::new(format!("Phase '{phase}' was not registered in this pipeline"))
            .with_phases(vec![phase.to_string()])
            .with_error_info(
                ConfigErrorInfo::new(
                    "CONFIG-PHASE-UNKNOWN",
                    format!("Phase '{phase}' not found"),
                )
                .with_fix_hint("Register the anchor phase before referencing it."),
            )
    }

    /// A phase with the same name is already registered.
    #[must_use]
    pub fn duplicate_phase(phase: &str) -> Self {
        Self::new(format!("Phase '{phase}' is already registered"))
            .with_phases(vec![phase.to_string()])
            .with_error_info(
                ConfigErrorInfo::new(
                    "CONFIG-PHASE-DUPLICATE",
                    format!("Phase '{phase}' registered twice"),
                )
                .with_fix_hint("Phase names must be unique within one pipeline."),
            )
    }

    /// The pipeline has no phases at all.
    #[must_use]
    pub fn empty_pipeline() -> Self {
        Self::new("Pipeline has no phases").with_error_info(
            ConfigErrorInfo::new("CONFIG-PIPELINE-EMPTY", "Cannot build an empty pipeline")
                .with_fix_hint("Add at least one phase before building."),
        )
    }

    /// A plugin with the same key is already installed.
    #[must_use]
    pub fn duplicate_plugin(key: &str) -> Self {
        Self::new(format!("Plugin '{key}' is already installed")).with_error_info(
            ConfigErrorInfo::new(
                "CONFIG-PLUGIN-DUPLICATE",
                format!("Plugin '{key}' installed twice"),
            )
            .with_context_entry("plugin", key),
        )
    }

    /// A generator was configured with parameters that cannot produce ids.
    #[must_use]
    pub fn invalid_generator(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(format!("Invalid call id generator: {reason}")).with_error_info(
            ConfigErrorInfo::new("CONFIG-GENERATOR-INVALID", reason)
                .with_fix_hint("Use a positive length and a non-empty alphabet."),
        )
    }
}

/// Error raised when writing to an existing key in a write-once bag.
#[derive(Debug, Clone, Error)]
#[error("Data conflict: key '{key}' already exists")]
pub struct DataConflictError {
    /// The conflicting key.
    pub key: String,
}

impl DataConflictError {
    /// Creates a new data conflict error.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_phase_error() {
        let err = PipelineConfigError::unknown_phase("Render");
        assert_eq!(err.code(), Some("CONFIG-PHASE-UNKNOWN"));
        assert_eq!(err.phases, vec!["Render".to_string()]);
        assert!(err.to_string().contains("Render"));
    }

    #[test]
    fn test_cancel_reason_serializes_by_kind() {
        let timeout = serde_json::to_value(CancelReason::Timeout(Duration::from_millis(1500))).unwrap();
        assert_eq!(timeout["timeout"]["secs"], 1);
        assert_eq!(timeout["timeout"]["nanos"], 500_000_000);

        let requested: CancelReason =
            serde_json::from_str(r#"{"requested":"client went away"}"#).unwrap();
        assert_eq!(requested, CancelReason::from("client went away"));
    }

    #[test]
    fn test_generator_error_code() {
        let err = PipelineConfigError::invalid_generator("length must be positive");
        assert_eq!(err.code(), Some("CONFIG-GENERATOR-INVALID"));
    }

    #[test]
    fn test_cancelled_is_distinct_from_failure() {
        let cancelled = CallflowError::Cancelled(CancelReason::Timeout(Duration::from_millis(50)));
        let failed = CallflowError::interceptor("Call", anyhow::anyhow!("boom"));

        assert!(cancelled.is_cancelled());
        assert!(cancelled.cancel_reason().is_some_and(CancelReason::is_timeout));
        assert!(!failed.is_cancelled());
        assert!(failed.cancel_reason().is_none());
    }

    #[test]
    fn test_cancel_reason_display() {
        assert_eq!(CancelReason::from("client went away").to_string(), "client went away");
        assert_eq!(
            CancelReason::from(Duration::from_millis(250)).to_string(),
            "timed out after 250ms"
        );
    }

    #[test]
    fn test_config_error_converts() {
        let err: CallflowError = PipelineConfigError::empty_pipeline().into();
        assert!(matches!(err, CallflowError::Config(_)));
    }
}
