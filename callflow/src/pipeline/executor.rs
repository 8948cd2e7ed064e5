//! Executing a frozen pipeline for one call.

use super::interceptor::{Next, Registered};
use super::phase::{PhaseSlot, PipelinePhase};
use crate::context::CallContext;
use crate::errors::{CallResult, CallflowError, CancelReason};
use std::time::{Duration, Instant};
use tracing::{debug, Instrument};

/// An immutable, ordered pipeline.
///
/// Built once by [`super::PipelineBuilder::build`] and shared across calls;
/// every call gets its own traversal over the same interceptor chain.
pub struct Pipeline {
    name: String,
    phases: Vec<PipelinePhase>,
    chain: Vec<Registered>,
}

impl Pipeline {
    pub(crate) fn from_slots(name: String, slots: Vec<PhaseSlot>) -> Self {
        let phases = slots.iter().map(|slot| slot.phase.clone()).collect();
        let chain = slots
            .into_iter()
            .flat_map(|slot| {
                let phase = slot.phase;
                slot.interceptors.into_iter().map(move |interceptor| Registered {
                    phase: phase.clone(),
                    interceptor,
                })
            })
            .collect();

        Self {
            name,
            phases,
            chain,
        }
    }

    /// The pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The phases in execution order.
    #[must_use]
    pub fn phases(&self) -> &[PipelinePhase] {
        &self.phases
    }

    /// Total number of interceptors across all phases.
    #[must_use]
    pub fn interceptor_count(&self) -> usize {
        self.chain.len()
    }

    /// Runs every interceptor for `call`: phases in pipeline order, and
    /// within a phase in registration order.
    ///
    /// The traversal races the call's cancellation token. If the token fires
    /// first the traversal is dropped, which also drops any operation it was
    /// awaiting, and `CallflowError::Cancelled` is returned.
    pub async fn execute(&self, call: &mut CallContext) -> CallResult {
        let started = Instant::now();
        let token = call.cancellation().clone();
        let span = call.span().clone();

        let result = async {
            tokio::select! {
                biased;
                reason = token.cancelled() => Err(CallflowError::Cancelled(reason)),
                result = Next::new(&self.chain).proceed(call) => result,
            }
        }
        .instrument(span)
        .await;

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(()) => debug!(pipeline = %self.name, elapsed_ms, "Call completed"),
            Err(CallflowError::Cancelled(reason)) => {
                debug!(pipeline = %self.name, %reason, elapsed_ms, "Call cancelled");
            }
            Err(error) => debug!(pipeline = %self.name, %error, elapsed_ms, "Call failed"),
        }
        result
    }

    /// Like [`Pipeline::execute`], but cancels the call once `timeout` elapses.
    ///
    /// The call's token is cancelled with [`CancelReason::Timeout`], so
    /// anything else sharing the token observes the same reason.
    pub async fn execute_with_timeout(
        &self,
        call: &mut CallContext,
        timeout: Duration,
    ) -> CallResult {
        if let Ok(result) = tokio::time::timeout(timeout, self.execute(call)).await {
            return result;
        }
        call.cancel(CancelReason::Timeout(timeout));
        debug!(pipeline = %self.name, timeout_ms = %timeout.as_millis(), "Call timed out");
        Err(CallflowError::Cancelled(CancelReason::Timeout(timeout)))
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("phases", &self.phases)
            .field("interceptors", &self.chain.len())
            .finish()
    }
}
