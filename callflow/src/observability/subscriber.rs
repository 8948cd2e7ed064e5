//! Global `tracing` subscriber installation.
//!
//! `RUST_LOG` wins over the configured filter when it is set.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// How log output is formatted and filtered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracingConfig {
    /// Emit one JSON object per line instead of human-readable text.
    #[serde(default)]
    pub json: bool,
    /// `EnvFilter` directives; `RUST_LOG` takes precedence when set.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            json: false,
            filter: default_filter(),
        }
    }
}

impl TracingConfig {
    /// Text output filtered by `filter`.
    #[must_use]
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            json: false,
            filter: filter.into(),
        }
    }

    /// Switches to JSON output.
    #[must_use]
    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.filter))
    }
}

/// Installs the global subscriber.
///
/// Returns an error if a global subscriber is already set.
pub fn try_init_tracing(config: &TracingConfig) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(config.env_filter());
    if config.json {
        builder
            .json()
            .try_init()
            .map_err(|error| anyhow::anyhow!(error))?;
    } else {
        builder.try_init().map_err(|error| anyhow::anyhow!(error))?;
    }
    Ok(())
}

/// Installs the global subscriber with the default filter, ignoring the
/// call if one is already installed.
pub fn init_tracing(json: bool) {
    let config = TracingConfig {
        json,
        ..TracingConfig::default()
    };
    if try_init_tracing(&config).is_err() {
        tracing::debug!("Global tracing subscriber already installed");
    }
}
