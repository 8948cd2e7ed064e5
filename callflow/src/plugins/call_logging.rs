//! Call and lifecycle logging.

use async_trait::async_trait;
use http::StatusCode;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn, Level};

use super::Plugin;
use crate::application::ApplicationBuilder;
use crate::context::CallContext;
use crate::diagnostics::{with_diagnostics, DiagnosticTags};
use crate::errors::{CallResult, CallflowError, PipelineConfigError};
use crate::events::{LifecycleEvent, SubscriptionSet};
use crate::pipeline::{Interceptor, Next, PipelinePhase};

/// Decides whether a call is logged.
pub type CallFilter = Arc<dyn Fn(&CallContext) -> bool + Send + Sync>;

/// Computes one diagnostic entry for a call; `None` leaves it unset.
pub type MdcProvider = Arc<dyn Fn(&CallContext) -> Option<String> + Send + Sync>;

/// Settings for [`CallLogging`].
pub struct CallLoggingConfig {
    level: Level,
    filters: Vec<CallFilter>,
    mdc: Vec<(String, MdcProvider)>,
}

impl Default for CallLoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::TRACE,
            filters: Vec::new(),
            mdc: Vec::new(),
        }
    }
}

impl CallLoggingConfig {
    /// Creates a config logging every call at `TRACE`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the level call and lifecycle lines are logged at.
    #[must_use]
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Logs only calls matching at least one filter.
    #[must_use]
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CallContext) -> bool + Send + Sync + 'static,
    {
        self.filters.push(Arc::new(predicate));
        self
    }

    /// Puts `name` into the ambient diagnostics for the duration of each call.
    #[must_use]
    pub fn mdc<F>(mut self, name: impl Into<String>, provider: F) -> Self
    where
        F: Fn(&CallContext) -> Option<String> + Send + Sync + 'static,
    {
        self.mdc.push((name.into(), Arc::new(provider)));
        self
    }

    /// Puts the call's correlation id into the ambient diagnostics as `name`.
    #[must_use]
    pub fn call_id_mdc(self, name: impl Into<String>) -> Self {
        self.mdc(name, |call| call.call_id().map(str::to_string))
    }
}

impl std::fmt::Debug for CallLoggingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallLoggingConfig")
            .field("level", &self.level)
            .field("filters", &self.filters.len())
            .field(
                "mdc",
                &self.mdc.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Logs application lifecycle events and a line per finished call.
#[derive(Debug, Default)]
pub struct CallLogging {
    config: CallLoggingConfig,
}

impl CallLogging {
    /// The phase the logger runs in.
    pub const PHASE: PipelinePhase = PipelinePhase::new("Logging");

    /// Creates the plugin from `config`.
    #[must_use]
    pub fn new(config: CallLoggingConfig) -> Self {
        Self { config }
    }
}

impl Plugin for CallLogging {
    fn key(&self) -> &'static str {
        "CallLogging"
    }

    fn install(self, app: &mut ApplicationBuilder) -> Result<(), PipelineConfigError> {
        let CallLoggingConfig { level, filters, mdc } = self.config;

        app.pipeline_mut()
            .insert_phase_before(&PipelinePhase::MONITORING, Self::PHASE)?
            .intercept(&Self::PHASE, CallLogger { level, filters, mdc })?;

        let events = Arc::clone(app.events());
        let subscriptions = Arc::new(SubscriptionSet::new());
        for (event, verb) in [
            (LifecycleEvent::Starting, "starting"),
            (LifecycleEvent::Started, "started"),
            (LifecycleEvent::Stopping, "stopping"),
        ] {
            subscriptions.subscribe(&events, event, move |app| {
                log_at(level, &format!("Application {verb}: {}", app.name()));
                Ok(())
            });
        }

        let owned = Arc::clone(&subscriptions);
        subscriptions.subscribe(&events, LifecycleEvent::Stopped, move |app| {
            log_at(level, &format!("Application stopped: {}", app.name()));
            owned.unsubscribe_all(app.events());
            Ok(())
        });
        Ok(())
    }
}

struct CallLogger {
    level: Level,
    filters: Vec<CallFilter>,
    mdc: Vec<(String, MdcProvider)>,
}

impl CallLogger {
    fn diagnostics(&self, call: &CallContext) -> DiagnosticTags {
        let mut tags = call.diagnostics.clone();
        tags.extend(
            self.mdc
                .iter()
                .filter_map(|(name, provider)| provider(call).map(|value| (name.clone(), value))),
        );
        tags
    }

    fn should_log(&self, call: &CallContext) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|filter| filter(call))
    }

    fn log_outcome(&self, call: &CallContext, result: &CallResult) {
        match result {
            Ok(()) => {
                if self.should_log(call) {
                    log_at(self.level, &call_line(call));
                }
            }
            Err(CallflowError::Cancelled(reason)) => {
                debug!(%reason, "Call cancelled: {}", call.request.to_log_string());
            }
            Err(error) => {
                debug!(%error, "Call failed: {}", call.request.to_log_string());
            }
        }
    }
}

#[async_trait]
impl Interceptor for CallLogger {
    async fn intercept(&self, call: &mut CallContext, next: Next<'_>) -> CallResult {
        let tags = self.diagnostics(call);
        with_diagnostics(&tags, async {
            let result = next.proceed(call).await;
            self.log_outcome(call, &result);
            result
        })
        .await
    }
}

/// Formats the line logged for a finished call.
fn call_line(call: &CallContext) -> String {
    let request = call.request.to_log_string();
    match call.response.status() {
        Some(StatusCode::FOUND) => format!(
            "{}: {request} -> {}",
            StatusCode::FOUND,
            call.response.header(http::header::LOCATION.as_str()).unwrap_or("-"),
        ),
        Some(status) => format!("{status}: {request}"),
        None => format!("Unhandled: {request}"),
    }
}

fn log_at(level: Level, message: &str) {
    match level {
        Level::ERROR => error!("{message}"),
        Level::WARN => warn!("{message}"),
        Level::INFO => info!("{message}"),
        Level::DEBUG => debug!("{message}"),
        _ => trace!("{message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::Application;
    use crate::diagnostics;
    use crate::plugins::{CallId, CallIdConfig};
    use crate::testing::TestCall;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn lines(&self) -> Vec<String> {
            String::from_utf8_lossy(&self.0.lock())
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn capture() -> (Captured, tracing::subscriber::DefaultGuard) {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_max_level(Level::INFO)
            .with_ansi(false)
            .without_time()
            .with_target(false)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (captured, guard)
    }

    fn respond(status: StatusCode, location: Option<&'static str>) -> impl Fn(&mut ApplicationBuilder) {
        move |builder| {
            builder
                .pipeline_mut()
                .intercept_fn(&PipelinePhase::CALL, move |call, next| {
                    Box::pin(async move {
                        call.response.set_status(status);
                        if let Some(location) = location {
                            call.response
                                .set_header("Location", location)
                                .map_err(|e| CallflowError::interceptor("Call", e))?;
                        }
                        next.proceed(call).await
                    })
                })
                .unwrap();
        }
    }

    fn application(config: CallLoggingConfig, configure: impl Fn(&mut ApplicationBuilder)) -> Application {
        let mut builder = ApplicationBuilder::new("logging");
        builder.install(CallLogging::new(config)).unwrap();
        configure(&mut builder);
        builder.build().unwrap()
    }

    #[test]
    fn test_phase_installed_before_monitoring() {
        let app = application(CallLoggingConfig::new(), |_| {});
        let names: Vec<_> = app.pipeline().phases().iter().map(|p| p.name().to_string()).collect();
        assert_eq!(names, vec!["Setup", "Logging", "Monitoring", "Features", "Call", "Fallback"]);
    }

    #[test]
    fn test_call_line_format() {
        let mut call = TestCall::get("/users").build();
        assert_eq!(call_line(&call), "Unhandled: GET - /users");

        call.response.set_status(StatusCode::OK);
        assert_eq!(call_line(&call), "200 OK: GET - /users");

        call.response.set_status(StatusCode::FOUND);
        call.response.set_header("Location", "/login").unwrap();
        assert_eq!(call_line(&call), "302 Found: GET - /users -> /login");
    }

    #[tokio::test]
    async fn test_logs_finished_calls() {
        let (captured, _guard) = capture();
        let app = application(
            CallLoggingConfig::new().level(Level::INFO),
            respond(StatusCode::FOUND, Some("/new")),
        );

        let mut call = TestCall::get("/old").build();
        app.handle(&mut call).await.unwrap();

        assert!(captured
            .lines()
            .iter()
            .any(|line| line.ends_with("302 Found: GET - /old -> /new")));
    }

    #[tokio::test]
    async fn test_filters_select_logged_calls() {
        let (captured, _guard) = capture();
        let app = application(
            CallLoggingConfig::new()
                .level(Level::INFO)
                .filter(|call| call.request.path().starts_with("/api")),
            respond(StatusCode::OK, None),
        );

        for path in ["/api/users", "/health"] {
            let mut call = TestCall::new(http::Method::GET, path).build();
            app.handle(&mut call).await.unwrap();
        }

        let lines = captured.lines();
        assert!(lines.iter().any(|line| line.ends_with("200 OK: GET - /api/users")));
        assert!(!lines.iter().any(|line| line.contains("/health")));
    }

    #[tokio::test]
    async fn test_mdc_visible_during_call_and_removed_after() {
        let seen = Arc::new(Mutex::new(None));
        let app = {
            let seen = Arc::clone(&seen);
            let mut builder = ApplicationBuilder::new("logging");
            builder
                .install(CallId::new(CallIdConfig::new().header("X-Request-Id")))
                .unwrap()
                .install(CallLogging::new(
                    CallLoggingConfig::new()
                        .call_id_mdc("request_id")
                        .mdc("path", |call| Some(call.request.path().to_string())),
                ))
                .unwrap();
            builder
                .pipeline_mut()
                .intercept_fn(&PipelinePhase::CALL, move |call, next| {
                    let seen = Arc::clone(&seen);
                    Box::pin(async move {
                        tokio::task::yield_now().await;
                        *seen.lock() = Some((diagnostics::get("request_id"), diagnostics::get("path")));
                        next.proceed(call).await
                    })
                })
                .unwrap();
            builder.build().unwrap()
        };

        let mut call = TestCall::get("/orders").header("X-Request-Id", "req-9").build();
        app.handle(&mut call).await.unwrap();

        assert_eq!(
            seen.lock().clone(),
            Some((Some("req-9".to_string()), Some("/orders".to_string())))
        );
        assert_eq!(diagnostics::get("request_id"), None);
        assert_eq!(diagnostics::get("path"), None);
    }

    #[test]
    fn test_lifecycle_logging_unsubscribes_when_stopped() {
        let (captured, _guard) = capture();
        let app = application(CallLoggingConfig::new().level(Level::INFO), |_| {});
        for event in LifecycleEvent::ALL {
            assert_eq!(app.events().subscriber_count(event), 1);
        }

        assert!(app.start().is_empty());
        assert!(app.stop().is_empty());

        for event in LifecycleEvent::ALL {
            assert_eq!(app.events().subscriber_count(event), 0);
        }
        let lines = captured.lines();
        for expected in [
            "Application starting: logging",
            "Application started: logging",
            "Application stopping: logging",
            "Application stopped: logging",
        ] {
            assert!(lines.iter().any(|line| line.ends_with(expected)), "missing {expected}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_propagates_unchanged() {
        let app = application(CallLoggingConfig::new(), |builder| {
            builder
                .intercept(
                    &PipelinePhase::CALL,
                    crate::testing::SlowInterceptor::new(std::time::Duration::from_secs(10)),
                )
                .unwrap();
        });

        let mut call = TestCall::get("/slow").build();
        let token = Arc::clone(call.cancellation());
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            token.cancel("client went away");
        });

        let err = app.handle(&mut call).await.unwrap_err();
        canceller.await.unwrap();
        assert!(err.is_cancelled());
    }
}
