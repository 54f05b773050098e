//! Step composition
//!
//! A choreography is a tree of steps built once with [`Step`] and compiled
//! into a [`Schedule`]. Node kinds are closed:
//!
//! | Kind | Semantics |
//! |------|-----------|
//! | Composite | children one after another, each starting at local time 0 |
//! | Parallel | children every tick with the same time, finished when all are |
//! | Scoped | child sees only the agents whose slot is in the set |
//! | Scored | child runs unchanged, the observer is scored each tick |
//! | Repair | snaps drifting agents back into formation |
//! | Maneuver | any leaf behavior implementing [`Maneuver`] |

mod context;
mod result;
mod schedule;

pub use context::StepContext;
pub use result::{Annotation, AnnotationKind, StepResult};
pub use schedule::{ActiveSchedule, ExecutionState, NodeId, Schedule};

use std::collections::BTreeSet;
use std::fmt;

use crate::error::StepFault;
use crate::repair::RepairFormation;

/// Which overrides a leaf can emit; used to reject overlapping parallel
/// siblings when a schedule is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverrideReach {
    pub agents: bool,
    pub observer: bool,
    pub global: bool,
}

impl OverrideReach {
    pub const NONE: Self = Self { agents: false, observer: false, global: false };
    pub const AGENTS: Self = Self { agents: true, observer: false, global: false };
    pub const AGENTS_AND_OBSERVER: Self = Self { agents: true, observer: true, global: false };
    pub const GLOBAL: Self = Self { agents: false, observer: false, global: true };
}

/// Leaf behavior. Called at most once per tick with a non-decreasing local time.
pub trait Maneuver: fmt::Debug + Send {
    fn name(&self) -> &'static str;

    fn duration(&self) -> f32 {
        f32::INFINITY
    }

    fn reach(&self) -> OverrideReach {
        OverrideReach::NONE
    }

    fn perform(&self, ctx: &mut StepContext<'_>, t: f32) -> Result<StepResult, StepFault>;
}

/// Set of formation slots selected by a scoped step.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SlotSet(BTreeSet<usize>);

impl SlotSet {
    pub fn contains(&self, slot: usize) -> bool {
        self.0.contains(&slot)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn intersects(&self, other: &SlotSet) -> bool {
        self.0.iter().any(|slot| other.contains(*slot))
    }

    pub fn intersection(&self, other: &SlotSet) -> SlotSet {
        SlotSet(self.0.intersection(&other.0).copied().collect())
    }

    pub fn union(&self, other: &SlotSet) -> SlotSet {
        SlotSet(self.0.union(&other.0).copied().collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<usize> for SlotSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        SlotSet(iter.into_iter().collect())
    }
}

/// Declarative schedule tree. Children are owned by exactly one parent.
#[derive(Debug)]
pub enum Step {
    Composite(Vec<Step>),
    Parallel(Vec<Step>),
    Scoped { slots: SlotSet, step: Box<Step> },
    Scored(Box<Step>),
    Repair(RepairFormation),
    Maneuver(Box<dyn Maneuver>),
}

impl Step {
    pub fn composite(steps: Vec<Step>) -> Self {
        Step::Composite(steps)
    }

    pub fn parallel(steps: Vec<Step>) -> Self {
        Step::Parallel(steps)
    }

    pub fn scoped(slots: impl IntoIterator<Item = usize>, step: Step) -> Self {
        Step::Scoped { slots: slots.into_iter().collect(), step: Box::new(step) }
    }

    pub fn scored(step: Step) -> Self {
        Step::Scored(Box::new(step))
    }

    pub fn repair(duration: f32, include_observer: bool) -> Self {
        Step::Repair(RepairFormation { duration, include_observer })
    }

    pub fn maneuver(maneuver: impl Maneuver + 'static) -> Self {
        Step::Maneuver(Box::new(maneuver))
    }

    /// Number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        match self {
            Step::Composite(children) | Step::Parallel(children) => {
                1 + children.iter().map(Step::node_count).sum::<usize>()
            }
            Step::Scoped { step, .. } | Step::Scored(step) => 1 + step.node_count(),
            Step::Repair(_) | Step::Maneuver(_) => 1,
        }
    }
}
