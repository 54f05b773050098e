//! Formation error and repair
//!
//! The ideal pose of a slot is the circular mean of every scheduled agent's
//! pose, rotated to that slot. Agents that drift past the threshold are
//! snapped back with a physics override; agents within tolerance are left
//! alone so nobody visibly teleports for a small wobble.

use std::collections::BTreeMap;

use tracing::debug;

use crate::agent::{Agent, PhysicsOverride};
use crate::config::{RepairConfig, ScoringConfig};
use crate::formation::{FormationGeometry, IdealPose};
use crate::step::{Annotation, AnnotationKind, OverrideReach, StepContext, StepResult};

/// Weighted distance between an agent and its ideal pose.
pub fn formation_error(agent: &Agent, ideal: &IdealPose, weights: &RepairConfig) -> f32 {
    let position = (ideal.position - agent.position()).norm() * weights.position_weight;
    let velocity = (ideal.velocity - agent.velocity()).norm() * weights.velocity_weight;
    let orientation = ideal
        .forward
        .angle(&agent.forward())
        .max(ideal.up.angle(&agent.up()))
        * weights.orientation_weight;
    position + velocity + orientation
}

/// Ideal world pose of `slot` given the agents sharing the schedule.
pub fn ideal_pose(geometry: &FormationGeometry, agents: &[&Agent], slot: usize) -> IdealPose {
    geometry.mean_pose(agents).at_slot(geometry, slot)
}

/// Timed leaf that snaps drifting agents back into formation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepairFormation {
    pub duration: f32,
    /// Also consider the observer (with its looser threshold)
    pub include_observer: bool,
}

impl Default for RepairFormation {
    fn default() -> Self {
        Self { duration: 0.5, include_observer: false }
    }
}

impl RepairFormation {
    pub fn reach(&self) -> OverrideReach {
        if self.include_observer {
            OverrideReach::AGENTS_AND_OBSERVER
        } else {
            OverrideReach::AGENTS
        }
    }

    /// Overrides for every candidate strictly above its threshold.
    pub fn corrections(
        &self,
        geometry: &FormationGeometry,
        weights: &RepairConfig,
        agents: &[&Agent],
        observer: Option<&Agent>,
    ) -> BTreeMap<usize, PhysicsOverride> {
        let mut overrides = BTreeMap::new();
        if agents.is_empty() {
            return overrides;
        }
        let mean = geometry.mean_pose(agents);

        let observer = observer.filter(|_| self.include_observer);
        let candidates = agents
            .iter()
            .map(|agent| (*agent, weights.agent_threshold))
            .chain(observer.map(|o| (o, weights.observer_threshold)));

        for (agent, threshold) in candidates {
            let ideal = mean.at_slot(geometry, agent.slot);
            let error = formation_error(agent, &ideal, weights);
            if error > threshold {
                debug!(agent = agent.id, slot = agent.slot, error, "repairing formation");
                overrides.insert(
                    agent.id,
                    PhysicsOverride::snap(
                        ideal.position,
                        ideal.orientation(),
                        Some(ideal.velocity),
                        Some(ideal.angular_velocity),
                    ),
                );
            }
        }
        overrides
    }

    pub fn perform(&self, ctx: &mut StepContext<'_>, t: f32) -> StepResult {
        let agents = ctx.agent_refs();
        let overrides = self.corrections(ctx.geometry, &ctx.config.repair, &agents, ctx.observer);
        StepResult::timed(t, self.duration).with_overrides(overrides)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    Perfect,
    Okay,
    Bad,
    Lost,
}

impl Grade {
    pub fn from_error(error: f32, cfg: &ScoringConfig) -> Self {
        if error < cfg.perfect_below {
            Grade::Perfect
        } else if error < cfg.okay_below {
            Grade::Okay
        } else if error < cfg.bad_below {
            Grade::Bad
        } else {
            Grade::Lost
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Grade::Perfect => "Perfect",
            Grade::Okay => "Okay",
            Grade::Bad => "Bad",
            Grade::Lost => "?????",
        }
    }

    fn kind(self) -> AnnotationKind {
        match self {
            Grade::Perfect | Grade::Okay => AnnotationKind::Good,
            Grade::Bad => AnnotationKind::Warning,
            Grade::Lost => AnnotationKind::Bad,
        }
    }
}

/// Score the observer against the scheduled agents for this tick.
///
/// Returns the grade annotation, or `None` when there is nothing to compare
/// (no observer connected, or no agents in scope).
pub fn score_observer(ctx: &mut StepContext<'_>) -> Option<Annotation> {
    let observer = ctx.observer?;
    if ctx.agents.is_empty() {
        return None;
    }
    let ideal = ideal_pose(ctx.geometry, &ctx.agent_refs(), observer.slot);
    let error = formation_error(observer, &ideal, &ctx.config.repair);
    ctx.scorer.record(error);

    let grade = Grade::from_error(error, &ctx.config.scoring);
    Some(Annotation {
        text: grade.label().to_string(),
        anchor: Some(observer.position()),
        kind: grade.kind(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{look_at, AgentSnapshot, PhysicalState};
    use crate::config::FormationConfig;
    use nalgebra::Vector3;

    fn agent(id: usize, slot: usize, position: Vector3<f32>) -> Agent {
        let physics = PhysicalState::at_rest(position, look_at(Vector3::x(), Vector3::z()));
        Agent::from_snapshot(&AgentSnapshot::autonomous(id, physics), slot, 0.0)
    }

    fn position_only_weights() -> RepairConfig {
        RepairConfig {
            position_weight: 0.5,
            velocity_weight: 0.0,
            orientation_weight: 0.0,
            agent_threshold: 1.0,
            observer_threshold: 5.0,
        }
    }

    #[test]
    fn test_error_zero_at_ideal() {
        let geo = FormationGeometry::new(FormationConfig::default());
        let a = agent(0, 0, Vector3::new(1200.0, 0.0, 17.0));
        let ideal = ideal_pose(&geo, &[&a], 0);
        assert_eq!(formation_error(&a, &ideal, &RepairConfig::default()), 0.0);
    }

    #[test]
    fn test_error_weights_orientation_by_worse_axis() {
        let geo = FormationGeometry::new(FormationConfig::default());
        let a = agent(0, 0, Vector3::zeros());
        let mut ideal = ideal_pose(&geo, &[&a], 0);
        ideal.up = Vector3::x();
        let err = formation_error(&a, &ideal, &RepairConfig::default());
        assert!((err - std::f32::consts::FRAC_PI_2 * 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_agents_exactly_at_threshold_not_repaired() {
        let geo = FormationGeometry::new(FormationConfig::single_ring(4, 1000.0));
        let a = agent(0, 0, Vector3::new(0.0, 0.0, 0.0));
        let b = agent(1, 0, Vector3::new(4.0, 0.0, 0.0));
        // mean x = 2.0, each agent is 2.0 away -> error exactly 1.0
        let repair = RepairFormation::default();
        let fixes = repair.corrections(&geo, &position_only_weights(), &[&a, &b], None);
        assert!(fixes.is_empty());
    }

    #[test]
    fn test_agents_above_threshold_snapped_to_ideal() {
        let geo = FormationGeometry::new(FormationConfig::single_ring(4, 1000.0));
        let a = agent(0, 0, Vector3::new(0.0, 0.0, 0.0));
        let b = agent(1, 0, Vector3::new(4.5, 0.0, 0.0));
        let repair = RepairFormation::default();
        let fixes = repair.corrections(&geo, &position_only_weights(), &[&a, &b], None);
        assert_eq!(fixes.len(), 2);
        let expected = Vector3::new(2.25, 0.0, 0.0);
        assert_eq!(fixes[&0].position, Some(expected));
        assert_eq!(fixes[&1].position, Some(expected));
        assert_eq!(fixes[&1].velocity, Some(Vector3::zeros()));
    }

    #[test]
    fn test_observer_threshold_boundary() {
        let geo = FormationGeometry::new(FormationConfig::single_ring(4, 1000.0));
        let a = agent(0, 0, Vector3::new(100.0, 0.0, 17.0));
        let weights = position_only_weights();
        let repair = RepairFormation { duration: 0.5, include_observer: true };

        let at_threshold = agent(9, 0, Vector3::new(110.0, 0.0, 17.0));
        assert!(repair.corrections(&geo, &weights, &[&a], Some(&at_threshold)).is_empty());

        let beyond = agent(9, 0, Vector3::new(110.5, 0.0, 17.0));
        let fixes = repair.corrections(&geo, &weights, &[&a], Some(&beyond));
        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[&9].position, Some(Vector3::new(100.0, 0.0, 17.0)));
    }

    #[test]
    fn test_observer_ignored_unless_included() {
        let geo = FormationGeometry::new(FormationConfig::single_ring(4, 1000.0));
        let a = agent(0, 0, Vector3::new(100.0, 0.0, 17.0));
        let far = agent(9, 0, Vector3::new(5000.0, 0.0, 17.0));
        let fixes = RepairFormation::default().corrections(
            &geo,
            &position_only_weights(),
            &[&a],
            Some(&far),
        );
        assert!(fixes.is_empty());
    }

    #[test]
    fn test_grades() {
        let cfg = ScoringConfig::default();
        assert_eq!(Grade::from_error(0.1, &cfg), Grade::Perfect);
        assert_eq!(Grade::from_error(4.9, &cfg), Grade::Okay);
        assert_eq!(Grade::from_error(9.9, &cfg), Grade::Bad);
        assert_eq!(Grade::from_error(10.0, &cfg).label(), "?????");
    }
}
