//! The application host: default phases, installed plugins, lifecycle.

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::context::CallContext;
use crate::errors::{CallResult, PipelineConfigError};
use crate::events::{LifecycleEvent, LifecycleEvents, SubscriberFailure};
use crate::pipeline::{Interceptor, Pipeline, PipelineBuilder, PipelinePhase};
use crate::plugins::Plugin;

/// The phases every application pipeline starts with.
pub const DEFAULT_PHASES: [PipelinePhase; 5] = [
    PipelinePhase::SETUP,
    PipelinePhase::MONITORING,
    PipelinePhase::FEATURES,
    PipelinePhase::CALL,
    PipelinePhase::FALLBACK,
];

/// Data-only application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name, also used as the pipeline name.
    pub name: String,
    /// Deadline applied to every call, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_timeout_ms: Option<u64>,
}

impl ApplicationConfig {
    /// Creates a config with no call deadline.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            call_timeout_ms: None,
        }
    }

    /// Sets the per-call deadline.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// The per-call deadline, if any.
    #[must_use]
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }

    /// Parses a config from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Collects phases, interceptors and plugins for an [`Application`].
#[derive(Debug)]
pub struct ApplicationBuilder {
    config: ApplicationConfig,
    pipeline: PipelineBuilder,
    events: Arc<LifecycleEvents>,
    installed: DashSet<&'static str>,
}

impl ApplicationBuilder {
    /// Creates a builder named `name` with the default phases.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_config(ApplicationConfig::new(name))
    }

    /// Creates a builder from a loaded config.
    #[must_use]
    pub fn from_config(config: ApplicationConfig) -> Self {
        let mut pipeline = PipelineBuilder::new(config.name.clone());
        for phase in DEFAULT_PHASES {
            let added = pipeline.add_phase(phase).is_ok();
            debug_assert!(added, "default phase names must be distinct");
        }

        Self {
            config,
            pipeline,
            events: Arc::new(LifecycleEvents::new()),
            installed: DashSet::new(),
        }
    }

    /// Sets the per-call deadline.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_call_timeout(timeout);
        self
    }

    /// The application config.
    #[must_use]
    pub fn config(&self) -> &ApplicationConfig {
        &self.config
    }

    /// The pipeline under construction.
    #[must_use]
    pub fn pipeline(&self) -> &PipelineBuilder {
        &self.pipeline
    }

    /// Mutable access to the pipeline, for plugins adding phases.
    pub fn pipeline_mut(&mut self) -> &mut PipelineBuilder {
        &mut self.pipeline
    }

    /// The lifecycle bus the built application will raise events on.
    #[must_use]
    pub fn events(&self) -> &Arc<LifecycleEvents> {
        &self.events
    }

    /// Installs `plugin`.
    ///
    /// # Errors
    ///
    /// Returns an error if a plugin with the same key is already installed,
    /// or if the plugin's own configuration is invalid.
    pub fn install<P: Plugin>(&mut self, plugin: P) -> Result<&mut Self, PipelineConfigError> {
        let key = plugin.key();
        if self.installed.contains(key) {
            return Err(PipelineConfigError::duplicate_plugin(key));
        }

        plugin.install(self)?;
        self.installed.insert(key);
        debug!(app = %self.config.name, plugin = key, "Installed plugin");
        Ok(self)
    }

    /// Returns true if a plugin with `key` is installed.
    #[must_use]
    pub fn is_installed(&self, key: &str) -> bool {
        self.installed.contains(key)
    }

    /// Registers an interceptor on `phase`.
    ///
    /// # Errors
    ///
    /// Returns an error if `phase` is unknown.
    pub fn intercept<I>(
        &mut self,
        phase: &PipelinePhase,
        interceptor: I,
    ) -> Result<&mut Self, PipelineConfigError>
    where
        I: Interceptor + 'static,
    {
        self.pipeline.intercept(phase, interceptor)?;
        Ok(self)
    }

    /// Freezes the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline cannot be built.
    pub fn build(self) -> Result<Application, PipelineConfigError> {
        let pipeline = self.pipeline.build()?;
        let application = Application {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            config: self.config,
            pipeline: Arc::new(pipeline),
            events: self.events,
        };
        debug!(
            app = %application.name(),
            id = %application.id,
            phases = application.pipeline.phases().len(),
            interceptors = application.pipeline.interceptor_count(),
            "Application built"
        );
        Ok(application)
    }
}

/// A built application: a frozen pipeline plus its lifecycle bus.
#[derive(Debug)]
pub struct Application {
    id: Uuid,
    created_at: DateTime<Utc>,
    config: ApplicationConfig,
    pipeline: Arc<Pipeline>,
    events: Arc<LifecycleEvents>,
}

impl Application {
    /// Unique id of this application instance.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The application name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// When the application was built.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The application config.
    #[must_use]
    pub fn config(&self) -> &ApplicationConfig {
        &self.config
    }

    /// The frozen pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// The lifecycle bus.
    #[must_use]
    pub fn events(&self) -> &Arc<LifecycleEvents> {
        &self.events
    }

    /// Raises `Starting` then `Started`.
    pub fn start(&self) -> Vec<SubscriberFailure> {
        let mut failures = self.events.raise(LifecycleEvent::Starting, self);
        failures.extend(self.events.raise(LifecycleEvent::Started, self));
        info!(app = %self.name(), id = %self.id, "Application started");
        failures
    }

    /// Raises `Stopping` then `Stopped`.
    pub fn stop(&self) -> Vec<SubscriberFailure> {
        let mut failures = self.events.raise(LifecycleEvent::Stopping, self);
        failures.extend(self.events.raise(LifecycleEvent::Stopped, self));
        info!(app = %self.name(), id = %self.id, "Application stopped");
        failures
    }

    /// Runs `call` through the pipeline, honouring the configured deadline.
    pub async fn handle(&self, call: &mut CallContext) -> CallResult {
        match self.config.call_timeout() {
            Some(timeout) => self.pipeline.execute_with_timeout(call, timeout).await,
            None => self.pipeline.execute(call).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CallflowError;
    use crate::testing::{MarkerInterceptor, SlowInterceptor, TestCall};
    use pretty_assertions::assert_eq;

    struct NamedPlugin(&'static str);

    impl Plugin for NamedPlugin {
        fn key(&self) -> &'static str {
            self.0
        }

        fn install(self, _app: &mut ApplicationBuilder) -> Result<(), PipelineConfigError> {
            Ok(())
        }
    }

    #[test]
    fn test_default_phases() {
        let app = ApplicationBuilder::new("app").build().unwrap();
        let names: Vec<_> = app.pipeline().phases().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, vec!["Setup", "Monitoring", "Features", "Call", "Fallback"]);
    }

    #[test]
    fn test_default_phases_are_distinct() {
        let builder = PipelineBuilder::with_phases("app", DEFAULT_PHASES);
        assert!(builder.is_ok());
    }

    #[test]
    fn test_duplicate_plugin_rejected() {
        let mut builder = ApplicationBuilder::new("app");
        builder.install(NamedPlugin("Dup")).unwrap();
        assert!(builder.is_installed("Dup"));

        let err = builder.install(NamedPlugin("Dup")).unwrap_err();
        assert_eq!(err.code(), Some("CONFIG-PLUGIN-DUPLICATE"));
    }

    #[test]
    fn test_config_from_json() {
        let config = ApplicationConfig::from_json(r#"{"name":"svc","call_timeout_ms":250}"#).unwrap();
        assert_eq!(config.name, "svc");
        assert_eq!(config.call_timeout(), Some(Duration::from_millis(250)));

        let config = ApplicationConfig::from_json(r#"{"name":"svc"}"#).unwrap();
        assert_eq!(config.call_timeout(), None);
    }

    #[tokio::test]
    async fn test_handle_runs_pipeline() {
        let markers = MarkerInterceptor::log();
        let mut builder = ApplicationBuilder::new("app");
        builder
            .intercept(&PipelinePhase::CALL, MarkerInterceptor::new("call", &markers))
            .unwrap()
            .intercept(&PipelinePhase::SETUP, MarkerInterceptor::new("setup", &markers))
            .unwrap();
        let app = builder.build().unwrap();

        let mut call = TestCall::get("/").build();
        app.handle(&mut call).await.unwrap();
        assert_eq!(*markers.lock(), vec!["setup", "call"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_applies_call_timeout() {
        let mut builder =
            ApplicationBuilder::new("app").with_call_timeout(Duration::from_millis(100));
        builder
            .intercept(&PipelinePhase::CALL, SlowInterceptor::new(Duration::from_secs(5)))
            .unwrap();
        let app = builder.build().unwrap();

        let mut call = TestCall::get("/slow").build();
        let err = app.handle(&mut call).await.unwrap_err();
        assert!(matches!(err, CallflowError::Cancelled(ref reason) if reason.is_timeout()));
        assert!(call.is_cancelled());
    }

    #[test]
    fn test_start_and_stop_raise_in_order() {
        let app = ApplicationBuilder::new("app").build().unwrap();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for event in LifecycleEvent::ALL {
            let seen = Arc::clone(&seen);
            app.events().subscribe(event, move |app| {
                seen.lock().push(format!("{event}:{}", app.name()));
                Ok(())
            });
        }

        assert!(app.start().is_empty());
        assert!(app.stop().is_empty());
        assert_eq!(
            *seen.lock(),
            vec!["starting:app", "started:app", "stopping:app", "stopped:app"]
        );
    }
}
