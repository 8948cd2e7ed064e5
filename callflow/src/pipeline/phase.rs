//! Named phases and their relative ordering.

use super::interceptor::Interceptor;
use crate::errors::PipelineConfigError;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A named stage of a pipeline.
///
/// Phases compare by name; two phases with the same name are the same phase.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelinePhase {
    name: Cow<'static, str>,
}

impl PipelinePhase {
    /// Prepares the call: correlation ids, request decoration.
    pub const SETUP: Self = Self::new("Setup");
    /// Observes the call: logging, metrics.
    pub const MONITORING: Self = Self::new("Monitoring");
    /// Cross-cutting features that shape the call.
    pub const FEATURES: Self = Self::new("Features");
    /// Handles the call.
    pub const CALL: Self = Self::new("Call");
    /// Runs when nothing else produced a response.
    pub const FALLBACK: Self = Self::new("Fallback");

    /// Creates a phase with a static name.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
        }
    }

    /// Creates a phase with a runtime name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Cow::Owned(name.into()),
        }
    }

    /// The phase name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// How a phase was placed relative to the others.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PhaseRelation {
    Last,
    Before(PipelinePhase),
    After(PipelinePhase),
}

/// One phase with its interceptors, in registration order.
pub(crate) struct PhaseSlot {
    pub(crate) phase: PipelinePhase,
    relation: PhaseRelation,
    pub(crate) interceptors: Vec<Arc<dyn Interceptor>>,
}

impl PhaseSlot {
    fn new(phase: PipelinePhase, relation: PhaseRelation) -> Self {
        Self {
            phase,
            relation,
            interceptors: Vec::new(),
        }
    }
}

/// The ordered list of phases of a pipeline under construction.
#[derive(Default)]
pub struct PhaseGraph {
    slots: Vec<PhaseSlot>,
}

impl PhaseGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `phase` at the end.
    ///
    /// # Errors
    ///
    /// Returns an error if a phase with the same name exists.
    pub fn add(&mut self, phase: PipelinePhase) -> Result<(), PipelineConfigError> {
        self.ensure_absent(&phase)?;
        debug!(phase = %phase, "Appended phase");
        self.slots.push(PhaseSlot::new(phase, PhaseRelation::Last));
        Ok(())
    }

    /// Inserts `phase` directly before `anchor`.
    ///
    /// # Errors
    ///
    /// Returns an error if `anchor` is unknown or `phase` already exists.
    pub fn insert_before(
        &mut self,
        anchor: &PipelinePhase,
        phase: PipelinePhase,
    ) -> Result<(), PipelineConfigError> {
        let index = self.require(anchor)?;
        self.ensure_absent(&phase)?;
        debug!(phase = %phase, anchor = %anchor, "Inserted phase before anchor");
        self.slots
            .insert(index, PhaseSlot::new(phase, PhaseRelation::Before(anchor.clone())));
        Ok(())
    }

    /// Inserts `phase` after `anchor` and after every phase previously
    /// inserted after the same anchor.
    ///
    /// # Errors
    ///
    /// Returns an error if `anchor` is unknown or `phase` already exists.
    pub fn insert_after(
        &mut self,
        anchor: &PipelinePhase,
        phase: PipelinePhase,
    ) -> Result<(), PipelineConfigError> {
        let index = self.require(anchor)?;
        self.ensure_absent(&phase)?;

        let mut last_related = index;
        for (i, slot) in self.slots.iter().enumerate().skip(index + 1) {
            if matches!(&slot.relation, PhaseRelation::After(a) if a == anchor) {
                last_related = i;
            }
        }

        debug!(phase = %phase, anchor = %anchor, "Inserted phase after anchor");
        self.slots.insert(
            last_related + 1,
            PhaseSlot::new(phase, PhaseRelation::After(anchor.clone())),
        );
        Ok(())
    }

    /// Appends `interceptor` to the interceptors of `phase`.
    ///
    /// # Errors
    ///
    /// Returns an error if `phase` is unknown.
    pub fn intercept(
        &mut self,
        phase: &PipelinePhase,
        interceptor: Arc<dyn Interceptor>,
    ) -> Result<(), PipelineConfigError> {
        let index = self.require(phase)?;
        self.slots[index].interceptors.push(interceptor);
        Ok(())
    }

    /// Returns true if a phase with this name exists.
    #[must_use]
    pub fn contains(&self, phase: &PipelinePhase) -> bool {
        self.position(phase).is_some()
    }

    /// The phases in pipeline order.
    #[must_use]
    pub fn phases(&self) -> Vec<PipelinePhase> {
        self.slots.iter().map(|slot| slot.phase.clone()).collect()
    }

    /// Number of phases.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the graph has no phases.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of interceptors registered on `phase`.
    #[must_use]
    pub fn interceptor_count(&self, phase: &PipelinePhase) -> usize {
        self.position(phase)
            .map_or(0, |index| self.slots[index].interceptors.len())
    }

    /// The anchor `phase` was inserted relative to, if it was not appended.
    #[must_use]
    pub fn anchor_of(&self, phase: &PipelinePhase) -> Option<&PipelinePhase> {
        let index = self.position(phase)?;
        match &self.slots[index].relation {
            PhaseRelation::Before(anchor) | PhaseRelation::After(anchor) => Some(anchor),
            PhaseRelation::Last => None,
        }
    }

    pub(crate) fn into_slots(self) -> Vec<PhaseSlot> {
        self.slots
    }

    fn position(&self, phase: &PipelinePhase) -> Option<usize> {
        self.slots.iter().position(|slot| &slot.phase == phase)
    }

    fn require(&self, phase: &PipelinePhase) -> Result<usize, PipelineConfigError> {
        self.position(phase)
            .ok_or_else(|| PipelineConfigError::unknown_phase(phase.name()))
    }

    fn ensure_absent(&self, phase: &PipelinePhase) -> Result<(), PipelineConfigError> {
        if self.contains(phase) {
            return Err(PipelineConfigError::duplicate_phase(phase.name()));
        }
        Ok(())
    }
}

impl fmt::Debug for PhaseGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.slots
                    .iter()
                    .map(|slot| (slot.phase.name(), slot.interceptors.len())),
            )
            .finish()
    }
}
