//! Mock interceptors for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::context::CallContext;
use crate::errors::{CallResult, CallflowError};
use crate::pipeline::{Interceptor, Next};

/// A shared, ordered record of markers written by interceptors.
pub type MarkerLog = Arc<Mutex<Vec<String>>>;

/// Appends a marker to a shared log, then proceeds.
#[derive(Debug)]
pub struct MarkerInterceptor {
    marker: String,
    log: MarkerLog,
}

impl MarkerInterceptor {
    /// Creates an empty marker log.
    #[must_use]
    pub fn log() -> MarkerLog {
        Arc::new(Mutex::new(Vec::new()))
    }

    /// Creates an interceptor writing `marker` to `log`.
    #[must_use]
    pub fn new(marker: impl Into<String>, log: &MarkerLog) -> Self {
        Self {
            marker: marker.into(),
            log: log.clone(),
        }
    }
}

#[async_trait]
impl Interceptor for MarkerInterceptor {
    async fn intercept(&self, call: &mut CallContext, next: Next<'_>) -> CallResult {
        self.log.lock().push(self.marker.clone());
        next.proceed(call).await
    }
}

/// Records `>name` before proceeding and `<name` after the downstream returns.
#[derive(Debug)]
pub struct WrapInterceptor {
    name: String,
    log: MarkerLog,
}

impl WrapInterceptor {
    /// Creates a wrapping interceptor writing to `log`.
    #[must_use]
    pub fn new(name: impl Into<String>, log: &MarkerLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
        }
    }
}

#[async_trait]
impl Interceptor for WrapInterceptor {
    async fn intercept(&self, call: &mut CallContext, next: Next<'_>) -> CallResult {
        self.log.lock().push(format!(">{}", self.name));
        let result = next.proceed(call).await;
        self.log.lock().push(format!("<{}", self.name));
        result
    }
}

/// Never proceeds, ending the traversal early.
#[derive(Debug, Default)]
pub struct ShortCircuitInterceptor {
    calls: AtomicUsize,
}

impl ShortCircuitInterceptor {
    /// Creates a new short-circuiting interceptor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of calls it stopped.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Interceptor for ShortCircuitInterceptor {
    async fn intercept(&self, _call: &mut CallContext, _next: Next<'_>) -> CallResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Always fails with a fixed message.
#[derive(Debug)]
pub struct FailingInterceptor {
    phase: String,
    error: String,
}

impl FailingInterceptor {
    /// Creates an interceptor failing with `error`, attributed to `phase`.
    #[must_use]
    pub fn new(phase: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            error: error.into(),
        }
    }
}

#[async_trait]
impl Interceptor for FailingInterceptor {
    async fn intercept(&self, _call: &mut CallContext, _next: Next<'_>) -> CallResult {
        Err(CallflowError::interceptor(
            self.phase.clone(),
            anyhow::anyhow!(self.error.clone()),
        ))
    }
}

/// Sleeps before proceeding.
#[derive(Debug)]
pub struct SlowInterceptor {
    delay: Duration,
}

impl SlowInterceptor {
    /// Creates an interceptor sleeping for `delay`.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Interceptor for SlowInterceptor {
    async fn intercept(&self, call: &mut CallContext, next: Next<'_>) -> CallResult {
        tokio::time::sleep(self.delay).await;
        next.proceed(call).await
    }
}
