//! Per-tick output of a step.

use std::collections::BTreeMap;

use nalgebra::Vector3;

use crate::agent::{AgentId, PhysicsOverride};
use crate::error::StepFault;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationKind {
    Info,
    Good,
    Warning,
    Bad,
}

/// Overlay text produced during evaluation. Rendering belongs to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub text: String,
    /// World anchor; `None` means screen space
    pub anchor: Option<Vector3<f32>>,
    pub kind: AnnotationKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepResult {
    pub finished: bool,
    /// At most one override per agent
    pub overrides: BTreeMap<AgentId, PhysicsOverride>,
    /// Shared scene object (the ball)
    pub global_override: Option<PhysicsOverride>,
    pub annotations: Vec<Annotation>,
}

impl StepResult {
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn done() -> Self {
        Self { finished: true, ..Self::default() }
    }

    /// Ordinary duration rule: finished once `t` is strictly past `duration`.
    pub fn timed(t: f32, duration: f32) -> Self {
        Self { finished: t > duration, ..Self::default() }
    }

    pub fn with_overrides(mut self, overrides: BTreeMap<AgentId, PhysicsOverride>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_global(mut self, state: PhysicsOverride) -> Self {
        self.global_override = Some(state);
        self
    }

    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn has_overrides(&self) -> bool {
        !self.overrides.is_empty() || self.global_override.is_some()
    }

    /// Parallel merge: disjoint union of overrides, AND of `finished`.
    ///
    /// Two results overriding the same agent (or both carrying a global
    /// override) is a fault, never last-write-wins.
    pub fn join(mut self, other: StepResult) -> Result<StepResult, StepFault> {
        if let Some(agent) = other.overrides.keys().find(|id| self.overrides.contains_key(id)) {
            return Err(StepFault::OverlappingOverride { agent: *agent });
        }
        if self.global_override.is_some() && other.global_override.is_some() {
            return Err(StepFault::OverlappingGlobalOverride);
        }
        self.finished = self.finished && other.finished;
        self.overrides.extend(other.overrides);
        self.global_override = self.global_override.or(other.global_override);
        self.annotations.extend(other.annotations);
        Ok(self)
    }
}
