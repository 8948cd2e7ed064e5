//! Wrap-style interceptors and the `proceed` continuation.

use super::phase::PipelinePhase;
use crate::context::CallContext;
use crate::errors::{CallResult, CallflowError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::trace;

/// A boxed, sendable future borrowed for `'a`.
pub use futures::future::BoxFuture;

/// A middleware unit attached to a phase.
///
/// Code before `next.proceed(call).await` runs on the way in, code after it
/// observes the fully processed downstream result. Returning without calling
/// `proceed` ends the traversal early without error. Returning an error
/// aborts the traversal for this call.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Handles one call.
    async fn intercept(&self, call: &mut CallContext, next: Next<'_>) -> CallResult;
}

/// An interceptor registered on a specific phase.
#[derive(Clone)]
pub(crate) struct Registered {
    pub(crate) phase: PipelinePhase,
    pub(crate) interceptor: Arc<dyn Interceptor>,
}

/// The remainder of the chain after the current interceptor.
///
/// `proceed` consumes the value, so an interceptor can continue at most once.
#[must_use = "dropping `Next` without proceeding short-circuits the call"]
pub struct Next<'a> {
    chain: &'a [Registered],
}

impl<'a> Next<'a> {
    pub(crate) fn new(chain: &'a [Registered]) -> Self {
        Self { chain }
    }

    /// Runs the rest of the chain for `call`.
    ///
    /// Stops with [`CallflowError::Cancelled`] before invoking the next
    /// interceptor if the call has been cancelled.
    pub async fn proceed(self, call: &mut CallContext) -> CallResult {
        let Some((current, rest)) = self.chain.split_first() else {
            return Ok(());
        };

        if let Some(reason) = call.cancellation().reason() {
            return Err(CallflowError::Cancelled(reason));
        }

        trace!(phase = %current.phase, remaining = rest.len(), "Proceeding");
        current.interceptor.intercept(call, Next::new(rest)).await
    }

    /// The phase of the interceptor `proceed` would run next.
    #[must_use]
    pub fn next_phase(&self) -> Option<&PipelinePhase> {
        self.chain.first().map(|registered| &registered.phase)
    }

    /// Number of interceptors still to run.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.chain.len()
    }
}

/// Adapts a closure into an [`Interceptor`].
///
/// ```rust,ignore
/// builder.intercept_fn(&PipelinePhase::CALL, |call, next| {
///     Box::pin(async move {
///         call.response.set_status(StatusCode::OK);
///         next.proceed(call).await
///     })
/// })?;
/// ```
pub struct FnInterceptor<F>(F);

impl<F> FnInterceptor<F>
where
    F: for<'a> Fn(&'a mut CallContext, Next<'a>) -> BoxFuture<'a, CallResult> + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> Interceptor for FnInterceptor<F>
where
    F: for<'a> Fn(&'a mut CallContext, Next<'a>) -> BoxFuture<'a, CallResult> + Send + Sync,
{
    async fn intercept(&self, call: &mut CallContext, next: Next<'_>) -> CallResult {
        (self.0)(call, next).await
    }
}
