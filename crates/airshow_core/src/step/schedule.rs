//! Compiled schedule and its execution state.
//!
//! The tree is flattened into an arena of nodes that never changes after
//! compilation. Everything that moves between ticks (composite cursors) lives
//! in [`ExecutionState`], one slot per node id, so a schedule can be swapped
//! or restarted by replacing the state table alone.

use tracing::trace;

use crate::error::{ScheduleError, StepFault};
use crate::repair::{self, RepairFormation};

use super::{Maneuver, OverrideReach, SlotSet, Step, StepContext, StepResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
enum Node {
    Composite { children: Vec<NodeId> },
    Parallel { children: Vec<NodeId> },
    Scoped { slots: SlotSet, child: NodeId },
    Scored { child: NodeId },
    Repair(RepairFormation),
    Maneuver(Box<dyn Maneuver>),
}

/// Cursor of a composite node.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Cursor {
    index: usize,
    /// Local time the active child's clock is measured from: zero for the
    /// first child, then the tick on which the previous child finished
    segment_start: f32,
}

/// Mutable per-node state of one run of a [`Schedule`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionState {
    cursors: Vec<Cursor>,
}

impl ExecutionState {
    fn new(len: usize) -> Self {
        Self { cursors: vec![Cursor::default(); len] }
    }

    /// Active child index of a composite node (0 for other kinds).
    pub fn cursor(&self, node: NodeId) -> usize {
        self.cursors.get(node.0).map_or(0, |c| c.index)
    }
}

/// Immutable compiled step tree.
#[derive(Debug)]
pub struct Schedule {
    nodes: Vec<Node>,
    root: NodeId,
}

/// Agents a subtree may write overrides for, under its enclosing scope.
#[derive(Debug, Clone, Default)]
struct Footprint {
    /// `Some(None)` = every agent in an unscoped context
    agents: Option<Option<SlotSet>>,
    observer: bool,
    global: bool,
}

impl Footprint {
    fn leaf(reach: OverrideReach, scope: &Option<SlotSet>) -> Self {
        Self {
            agents: reach.agents.then(|| scope.clone()),
            observer: reach.observer,
            global: reach.global,
        }
    }

    fn overlaps(&self, other: &Footprint) -> bool {
        let agents = match (&self.agents, &other.agents) {
            (Some(None), Some(_)) | (Some(_), Some(None)) => true,
            (Some(Some(a)), Some(Some(b))) => a.intersects(b),
            _ => false,
        };
        agents || (self.observer && other.observer) || (self.global && other.global)
    }

    fn union(self, other: Footprint) -> Footprint {
        let agents = match (self.agents, other.agents) {
            (Some(None), _) | (_, Some(None)) => Some(None),
            (Some(Some(a)), Some(Some(b))) => Some(Some(a.union(&b))),
            (a, None) => a,
            (None, b) => b,
        };
        Footprint {
            agents,
            observer: self.observer || other.observer,
            global: self.global || other.global,
        }
    }
}

impl Schedule {
    /// Flatten and validate a step tree.
    pub fn compile(step: Step) -> Result<Self, ScheduleError> {
        let mut nodes = Vec::with_capacity(step.node_count());
        let root = Self::push(&mut nodes, step)?;
        let schedule = Schedule { nodes, root };
        schedule.footprint(root, &None)?;
        Ok(schedule)
    }

    fn push(nodes: &mut Vec<Node>, step: Step) -> Result<NodeId, ScheduleError> {
        let id = NodeId(nodes.len());
        // placeholder keeps parents ahead of their children
        nodes.push(Node::Composite { children: Vec::new() });
        let node = match step {
            Step::Composite(steps) => {
                if steps.is_empty() {
                    return Err(ScheduleError::EmptyComposite);
                }
                let children = steps
                    .into_iter()
                    .map(|s| Self::push(nodes, s))
                    .collect::<Result<Vec<_>, _>>()?;
                Node::Composite { children }
            }
            Step::Parallel(steps) => {
                if steps.is_empty() {
                    return Err(ScheduleError::EmptyParallel);
                }
                let children = steps
                    .into_iter()
                    .map(|s| Self::push(nodes, s))
                    .collect::<Result<Vec<_>, _>>()?;
                Node::Parallel { children }
            }
            Step::Scoped { slots, step } => {
                if slots.is_empty() {
                    return Err(ScheduleError::EmptyScope);
                }
                let child = Self::push(nodes, *step)?;
                Node::Scoped { slots, child }
            }
            Step::Scored(step) => Node::Scored { child: Self::push(nodes, *step)? },
            Step::Repair(repair) => Node::Repair(repair),
            Step::Maneuver(maneuver) => Node::Maneuver(maneuver),
        };
        nodes[id.0] = node;
        Ok(id)
    }

    fn footprint(&self, id: NodeId, scope: &Option<SlotSet>) -> Result<Footprint, ScheduleError> {
        match &self.nodes[id.0] {
            Node::Composite { children } => children.iter().try_fold(Footprint::default(), |acc, c| {
                Ok(acc.union(self.footprint(*c, scope)?))
            }),
            Node::Parallel { children } => {
                let prints = children
                    .iter()
                    .map(|c| self.footprint(*c, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                for (i, a) in prints.iter().enumerate() {
                    for (j, b) in prints.iter().enumerate().skip(i + 1) {
                        if a.overlaps(b) {
                            return Err(ScheduleError::OverlappingScopes { first: i, second: j });
                        }
                    }
                }
                Ok(prints.into_iter().fold(Footprint::default(), Footprint::union))
            }
            Node::Scoped { slots, child } => {
                let narrowed = match scope {
                    Some(outer) => outer.intersection(slots),
                    None => slots.clone(),
                };
                self.footprint(*child, &Some(narrowed))
            }
            Node::Scored { child } => self.footprint(*child, scope),
            Node::Repair(repair) => Ok(Footprint::leaf(repair.reach(), scope)),
            Node::Maneuver(maneuver) => Ok(Footprint::leaf(maneuver.reach(), scope)),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn start(self) -> ActiveSchedule {
        let state = ExecutionState::new(self.nodes.len());
        ActiveSchedule { schedule: self, state }
    }

    /// Evaluate the whole schedule for one tick.
    pub fn evaluate(
        &self,
        state: &mut ExecutionState,
        ctx: &mut StepContext<'_>,
        t: f32,
    ) -> Result<StepResult, StepFault> {
        self.eval_node(self.root, state, ctx, t)
    }

    fn eval_node(
        &self,
        id: NodeId,
        state: &mut ExecutionState,
        ctx: &mut StepContext<'_>,
        t: f32,
    ) -> Result<StepResult, StepFault> {
        match &self.nodes[id.0] {
            Node::Composite { children } => {
                let cursor = state.cursors[id.0];
                if cursor.index >= children.len() {
                    // exhausted: stays finished, emits nothing
                    return Ok(StepResult::done());
                }
                let mut result =
                    self.eval_node(children[cursor.index], state, ctx, t - cursor.segment_start)?;
                if result.finished {
                    let next = cursor.index + 1;
                    state.cursors[id.0] = Cursor { index: next, segment_start: t };
                    trace!(node = id.0, index = next, t, "composite advanced");
                    if next < children.len() {
                        result.finished = false;
                    }
                }
                Ok(result)
            }
            Node::Parallel { children } => {
                let mut merged = StepResult::done();
                for child in children {
                    let result = self.eval_node(*child, state, ctx, t)?;
                    merged = merged.join(result)?;
                }
                Ok(merged)
            }
            Node::Scoped { slots, child } => {
                let mut scoped = ctx.scoped(slots);
                self.eval_node(*child, state, &mut scoped, t)
            }
            Node::Scored { child } => {
                let mut result = self.eval_node(*child, state, ctx, t)?;
                if let Some(annotation) = repair::score_observer(ctx) {
                    result.annotations.push(annotation);
                }
                Ok(result)
            }
            Node::Repair(repair) => Ok(repair.perform(ctx, t)),
            Node::Maneuver(maneuver) => maneuver.perform(ctx, t),
        }
    }
}

/// A schedule paired with the execution state of its current run.
#[derive(Debug)]
pub struct ActiveSchedule {
    schedule: Schedule,
    state: ExecutionState,
}

impl ActiveSchedule {
    pub fn evaluate(&mut self, ctx: &mut StepContext<'_>, t: f32) -> Result<StepResult, StepFault> {
        self.schedule.evaluate(&mut self.state, ctx, t)
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    /// Rewind to the first tick without recompiling.
    pub fn restart(&mut self) {
        self.state = ExecutionState::new(self.schedule.len());
    }
}
