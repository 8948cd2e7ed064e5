//! Pipeline builder with validation.

use super::interceptor::{BoxFuture, FnInterceptor, Interceptor, Next};
use super::phase::{PhaseGraph, PipelinePhase};
use super::Pipeline;
use crate::context::CallContext;
use crate::errors::{CallResult, PipelineConfigError};
use std::sync::Arc;

/// Builder for creating validated pipelines.
///
/// Every phase reference is checked when it is made, so a builder that
/// accepted all its calls always builds.
#[derive(Debug)]
pub struct PipelineBuilder {
    /// The pipeline name.
    name: String,
    /// Phases and their interceptors.
    graph: PhaseGraph,
}

impl PipelineBuilder {
    /// Creates a new builder with no phases.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            graph: PhaseGraph::new(),
        }
    }

    /// Creates a builder whose phases are `phases`, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if two phases share a name.
    pub fn with_phases(
        name: impl Into<String>,
        phases: impl IntoIterator<Item = PipelinePhase>,
    ) -> Result<Self, PipelineConfigError> {
        let mut builder = Self::new(name);
        for phase in phases {
            builder.add_phase(phase)?;
        }
        Ok(builder)
    }

    /// Appends a phase at the end of the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the phase already exists.
    pub fn add_phase(&mut self, phase: PipelinePhase) -> Result<&mut Self, PipelineConfigError> {
        self.graph.add(phase)?;
        Ok(self)
    }

    /// Inserts `phase` directly before `anchor`.
    ///
    /// # Errors
    ///
    /// Returns an error if `anchor` is unknown or `phase` already exists.
    pub fn insert_phase_before(
        &mut self,
        anchor: &PipelinePhase,
        phase: PipelinePhase,
    ) -> Result<&mut Self, PipelineConfigError> {
        self.graph.insert_before(anchor, phase)?;
        Ok(self)
    }

    /// Inserts `phase` after `anchor`.
    ///
    /// # Errors
    ///
    /// Returns an error if `anchor` is unknown or `phase` already exists.
    pub fn insert_phase_after(
        &mut self,
        anchor: &PipelinePhase,
        phase: PipelinePhase,
    ) -> Result<&mut Self, PipelineConfigError> {
        self.graph.insert_after(anchor, phase)?;
        Ok(self)
    }

    /// Registers `interceptor` on `phase`, after any already registered there.
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
        self.intercept_arc(phase, Arc::new(interceptor))
    }

    /// Registers a shared interceptor on `phase`.
    ///
    /// # Errors
    ///
    /// Returns an error if `phase` is unknown.
    pub fn intercept_arc(
        &mut self,
        phase: &PipelinePhase,
        interceptor: Arc<dyn Interceptor>,
    ) -> Result<&mut Self, PipelineConfigError> {
        self.graph.intercept(phase, interceptor)?;
        Ok(self)
    }

    /// Registers a closure interceptor on `phase`.
    ///
    /// # Errors
    ///
    /// Returns an error if `phase` is unknown.
    pub fn intercept_fn<F>(
        &mut self,
        phase: &PipelinePhase,
        f: F,
    ) -> Result<&mut Self, PipelineConfigError>
    where
        F: for<'a> Fn(&'a mut CallContext, Next<'a>) -> BoxFuture<'a, CallResult>
            + Send
            + Sync
            + 'static,
    {
        self.intercept(phase, FnInterceptor::new(f))
    }

    /// Returns true if `phase` is registered.
    #[must_use]
    pub fn has_phase(&self, phase: &PipelinePhase) -> bool {
        self.graph.contains(phase)
    }

    /// The phases in pipeline order.
    #[must_use]
    pub fn phases(&self) -> Vec<PipelinePhase> {
        self.graph.phases()
    }

    /// The phase graph under construction.
    #[must_use]
    pub fn graph(&self) -> &PhaseGraph {
        &self.graph
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Freezes the phase order and interceptor lists.
    ///
    /// # Errors
    ///
    /// Returns an error if the builder has no phases.
    pub fn build(self) -> Result<Pipeline, PipelineConfigError> {
        if self.graph.is_empty() {
            return Err(PipelineConfigError::empty_pipeline());
        }
        Ok(Pipeline::from_slots(self.name, self.graph.into_slots()))
    }
}
