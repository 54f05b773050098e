//! Leaf maneuvers of the airshow.
//!
//! Every maneuver is written once in ring-relative terms and applied to each
//! agent in scope; the formation emerges from the slot rotations.

use std::collections::BTreeMap;

use nalgebra::{Vector2, Vector3};

use crate::agent::{look_at, PhysicsOverride};
use crate::controller::{actuate, ControlTarget};
use crate::error::StepFault;
use crate::formation::{direction_on_circle, position_on_circle};
use crate::step::{Annotation, AnnotationKind, Maneuver, OverrideReach, StepContext, StepResult};

fn ring_direction(direction: Vector2<f32>) -> Vector3<f32> {
    Vector3::new(direction.x, direction.y, 0.0)
}

/// Do nothing for `duration`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wait {
    pub duration: f32,
}

impl Wait {
    pub fn new(duration: f32) -> Self {
        Self { duration }
    }
}

impl Maneuver for Wait {
    fn name(&self) -> &'static str {
        "wait"
    }

    fn duration(&self) -> f32 {
        self.duration
    }

    fn perform(&self, _ctx: &mut StepContext<'_>, t: f32) -> Result<StepResult, StepFault> {
        Ok(StepResult::timed(t, self.duration))
    }
}

/// Place every agent (and the observer) on its ring, on the ground, facing the center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetCircle {
    pub duration: f32,
}

impl Default for SetCircle {
    fn default() -> Self {
        Self { duration: 0.5 }
    }
}

impl Maneuver for SetCircle {
    fn name(&self) -> &'static str {
        "set_circle"
    }

    fn duration(&self) -> f32 {
        self.duration
    }

    fn reach(&self) -> OverrideReach {
        OverrideReach::AGENTS_AND_OBSERVER
    }

    fn perform(&self, ctx: &mut StepContext<'_>, t: f32) -> Result<StepResult, StepFault> {
        let geometry = ctx.geometry;
        let ground = geometry.config().ground_height;
        let slots = ctx
            .agents
            .iter()
            .map(|agent| (agent.id, agent.slot))
            .chain(ctx.observer.map(|o| (o.id, o.slot)));

        let overrides: BTreeMap<_, _> = slots
            .map(|(id, slot)| {
                let mut position = geometry.circle_pos(slot, 0.0, 0.0);
                position.z = ground;
                let facing = geometry.rotation_for(slot) * -Vector3::x();
                (id, PhysicsOverride::snap(position, look_at(facing, Vector3::z()), None, None))
            })
            .collect();
        Ok(StepResult::timed(t, self.duration).with_overrides(overrides))
    }
}

/// Move the ball; finishes immediately.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeleportBall {
    pub position: Vector3<f32>,
}

impl Default for TeleportBall {
    fn default() -> Self {
        Self { position: Vector3::new(0.0, 0.0, 93.0) }
    }
}

impl Maneuver for TeleportBall {
    fn name(&self) -> &'static str {
        "teleport_ball"
    }

    fn duration(&self) -> f32 {
        0.0
    }

    fn reach(&self) -> OverrideReach {
        OverrideReach::GLOBAL
    }

    fn perform(&self, _ctx: &mut StepContext<'_>, _t: f32) -> Result<StepResult, StepFault> {
        let ball = PhysicsOverride {
            position: Some(self.position),
            velocity: Some(Vector3::zeros()),
            angular_velocity: Some(Vector3::zeros()),
            orientation: None,
        };
        Ok(StepResult::done().with_global(ball))
    }
}

/// Hop, then turn in the air to face `direction` (ring-relative).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JumpAndTurn {
    pub duration: f32,
    pub direction: Vector2<f32>,
}

impl JumpAndTurn {
    pub fn new(direction: Vector2<f32>) -> Self {
        Self { duration: 2.3, direction }
    }
}

impl Maneuver for JumpAndTurn {
    fn name(&self) -> &'static str {
        "jump_and_turn"
    }

    fn duration(&self) -> f32 {
        self.duration
    }

    fn perform(&self, ctx: &mut StepContext<'_>, t: f32) -> Result<StepResult, StepFault> {
        let controller = ctx.controller;
        for agent in ctx.agents.iter_mut() {
            if t < 0.2 {
                agent.controls.jump = true;
            } else {
                let facing = direction_on_circle(agent.position(), ring_direction(self.direction));
                let target = look_at(facing, Vector3::z());
                actuate(controller, agent, ControlTarget::Orientation(target));
            }
        }
        Ok(StepResult::timed(t, self.duration))
    }
}

/// Keep wheels down while falling, facing `direction`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandSmoothly {
    pub duration: f32,
    pub direction: Vector2<f32>,
    pub up_z: f32,
}

impl LandSmoothly {
    pub fn new(duration: f32) -> Self {
        Self { duration, direction: Vector2::new(1.0, 0.0), up_z: 1.0 }
    }
}

impl Maneuver for LandSmoothly {
    fn name(&self) -> &'static str {
        "land_smoothly"
    }

    fn duration(&self) -> f32 {
        self.duration
    }

    fn perform(&self, ctx: &mut StepContext<'_>, t: f32) -> Result<StepResult, StepFault> {
        let controller = ctx.controller;
        for agent in ctx.agents.iter_mut() {
            let facing = direction_on_circle(agent.position(), ring_direction(self.direction));
            let target = look_at(facing, Vector3::new(0.0, 0.0, self.up_z));
            actuate(controller, agent, ControlTarget::Orientation(target));
        }
        Ok(StepResult::timed(t, self.duration))
    }
}

/// Hold a ring-relative orientation, optionally boosting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarReorient {
    pub duration: f32,
    pub forward: Vector3<f32>,
    pub up: Vector3<f32>,
    pub boost: bool,
}

impl PolarReorient {
    pub fn new(duration: f32, forward: Vector3<f32>, up: Vector3<f32>) -> Self {
        Self { duration, forward, up, boost: false }
    }

    pub fn boosting(mut self) -> Self {
        self.boost = true;
        self
    }
}

impl Maneuver for PolarReorient {
    fn name(&self) -> &'static str {
        "polar_reorient"
    }

    fn duration(&self) -> f32 {
        self.duration
    }

    fn perform(&self, ctx: &mut StepContext<'_>, t: f32) -> Result<StepResult, StepFault> {
        let controller = ctx.controller;
        for agent in ctx.agents.iter_mut() {
            let pos = agent.position();
            let target = look_at(direction_on_circle(pos, self.forward), direction_on_circle(pos, self.up));
            actuate(controller, agent, ControlTarget::Orientation(target));
            agent.controls.boost = self.boost;
        }
        Ok(StepResult::timed(t, self.duration))
    }
}

/// Jump, then dodge toward `direction` (x = forward flip, y = side flip).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JumpAndDodge {
    pub duration: f32,
    pub direction: Vector2<f32>,
}

impl JumpAndDodge {
    pub fn new(direction: Vector2<f32>) -> Self {
        Self { duration: 0.4, direction }
    }
}

impl Maneuver for JumpAndDodge {
    fn name(&self) -> &'static str {
        "jump_and_dodge"
    }

    fn duration(&self) -> f32 {
        self.duration
    }

    fn perform(&self, ctx: &mut StepContext<'_>, t: f32) -> Result<StepResult, StepFault> {
        for agent in ctx.agents.iter_mut() {
            if t < 0.2 {
                agent.controls.jump = true;
            } else if t > 0.3 {
                agent.controls.jump = true;
                agent.controls.pitch = -self.direction.x;
                agent.controls.yaw = self.direction.y;
            }
        }
        Ok(StepResult::timed(t, self.duration))
    }
}

/// Dodge on the spot (agents already airborne).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstantDodge {
    pub duration: f32,
    pub direction: Vector2<f32>,
}

impl InstantDodge {
    pub fn new(direction: Vector2<f32>) -> Self {
        Self { duration: 0.4, direction }
    }
}

impl Maneuver for InstantDodge {
    fn name(&self) -> &'static str {
        "instant_dodge"
    }

    fn duration(&self) -> f32 {
        self.duration
    }

    fn perform(&self, ctx: &mut StepContext<'_>, t: f32) -> Result<StepResult, StepFault> {
        for agent in ctx.agents.iter_mut() {
            agent.controls.jump = true;
            agent.controls.pitch = -self.direction.x;
            agent.controls.yaw = self.direction.y;
        }
        Ok(StepResult::timed(t, self.duration))
    }
}

/// Jump, point the nose up and boost.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JumpAndFlyUp {
    pub duration: f32,
}

impl JumpAndFlyUp {
    pub fn new(duration: f32) -> Self {
        Self { duration }
    }
}

impl Maneuver for JumpAndFlyUp {
    fn name(&self) -> &'static str {
        "jump_and_fly_up"
    }

    fn duration(&self) -> f32 {
        self.duration
    }

    fn perform(&self, ctx: &mut StepContext<'_>, t: f32) -> Result<StepResult, StepFault> {
        let controller = ctx.controller;
        for agent in ctx.agents.iter_mut() {
            if t > 0.2 {
                // roof toward the outside of the ring
                let target = look_at(Vector3::z(), agent.position());
                actuate(controller, agent, ControlTarget::Orientation(target));
            }
            if t < 0.8 {
                agent.controls.jump = true;
            } else {
                agent.controls.boost = true;
            }
        }
        Ok(StepResult::timed(t, self.duration))
    }
}

/// Drive around the ring (or out to `radius_offset`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarDrive {
    pub duration: f32,
    pub radius_offset: f32,
    pub speed: f32,
    /// +1 counter-clockwise, -1 clockwise, 0 straight out/in
    pub angular_direction: f32,
    pub boost: bool,
}

impl PolarDrive {
    pub fn new(duration: f32, speed: f32) -> Self {
        Self { duration, radius_offset: 0.0, speed, angular_direction: 1.0, boost: false }
    }
}

impl Maneuver for PolarDrive {
    fn name(&self) -> &'static str {
        "polar_drive"
    }

    fn duration(&self) -> f32 {
        self.duration
    }

    fn perform(&self, ctx: &mut StepContext<'_>, t: f32) -> Result<StepResult, StepFault> {
        let controller = ctx.controller;
        let geometry = ctx.geometry;
        for agent in ctx.agents.iter_mut() {
            let target = position_on_circle(
                agent.position(),
                geometry.ring_radius(agent.slot) + self.radius_offset,
                0.2 * self.angular_direction,
            );
            actuate(controller, agent, ControlTarget::Drive { target, speed: self.speed });
            if !self.boost {
                agent.controls.boost = false;
            }
        }
        Ok(StepResult::timed(t, self.duration))
    }
}

/// Brake until forward speed drops under 100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundStop {
    pub duration: f32,
}

impl Default for GroundStop {
    fn default() -> Self {
        Self { duration: 0.7 }
    }
}

impl Maneuver for GroundStop {
    fn name(&self) -> &'static str {
        "ground_stop"
    }

    fn duration(&self) -> f32 {
        self.duration
    }

    fn perform(&self, ctx: &mut StepContext<'_>, t: f32) -> Result<StepResult, StepFault> {
        for agent in ctx.agents.iter_mut() {
            let forward_speed = agent.forward().dot(&agent.velocity());
            if forward_speed.abs() > 100.0 {
                agent.controls.throttle = -forward_speed.signum();
            }
        }
        Ok(StepResult::timed(t, self.duration))
    }
}

/// Hover over the slot's ring point, optionally turning the whole formation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarFlight {
    pub duration: f32,
    pub height: f32,
    /// Radians per second added to every slot's angle
    pub angular_speed: f32,
}

impl PolarFlight {
    pub fn new(duration: f32) -> Self {
        Self { duration, height: 1000.0, angular_speed: 0.0 }
    }

    pub fn turning(duration: f32, angular_speed: f32) -> Self {
        Self { angular_speed, ..Self::new(duration) }
    }
}

impl Maneuver for PolarFlight {
    fn name(&self) -> &'static str {
        "polar_flight"
    }

    fn duration(&self) -> f32 {
        self.duration
    }

    fn perform(&self, ctx: &mut StepContext<'_>, t: f32) -> Result<StepResult, StepFault> {
        let controller = ctx.controller;
        let geometry = ctx.geometry;
        for agent in ctx.agents.iter_mut() {
            let mut target = geometry.circle_pos(agent.slot, 0.0, t * self.angular_speed);
            target.z = self.height;
            let up = agent.position();
            actuate(controller, agent, ControlTarget::Hover { target, up });
        }
        Ok(StepResult::timed(t, self.duration))
    }
}

/// Overlay text at the observer (screen space when there is none).
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayText {
    pub duration: f32,
    pub text: String,
}

impl DisplayText {
    pub fn new(duration: f32, text: impl Into<String>) -> Self {
        Self { duration, text: text.into() }
    }
}

impl Maneuver for DisplayText {
    fn name(&self) -> &'static str {
        "display_text"
    }

    fn duration(&self) -> f32 {
        self.duration
    }

    fn perform(&self, ctx: &mut StepContext<'_>, t: f32) -> Result<StepResult, StepFault> {
        Ok(StepResult::timed(t, self.duration).annotate(Annotation {
            text: self.text.clone(),
            anchor: ctx.observer.map(|o| o.position()),
            kind: AnnotationKind::Info,
        }))
    }
}

/// Overlay the observer's current score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayScore {
    pub duration: f32,
}

impl Maneuver for DisplayScore {
    fn name(&self) -> &'static str {
        "display_score"
    }

    fn duration(&self) -> f32 {
        self.duration
    }

    fn perform(&self, ctx: &mut StepContext<'_>, t: f32) -> Result<StepResult, StepFault> {
        Ok(StepResult::timed(t, self.duration).annotate(Annotation {
            text: format!("Score: {}", ctx.scorer.score()),
            anchor: ctx.observer.map(|o| o.position()),
            kind: AnnotationKind::Info,
        }))
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Rotation3;

    use super::*;
    use crate::agent::{Agent, AgentSnapshot, Controls, PhysicalState};
    use crate::config::AirshowConfig;
    use crate::controller::ProportionalController;
    use crate::formation::FormationGeometry;
    use crate::scorer::Scorer;

    fn airborne(count: usize) -> Vec<Agent> {
        (0..count)
            .map(|i| {
                let physics = PhysicalState::at_rest(Vector3::new(0.0, 0.0, 500.0), Rotation3::identity());
                Agent::from_snapshot(&AgentSnapshot::autonomous(i, physics), i, 0.0)
            })
            .collect()
    }

    /// Runs `maneuver` once at local time `t` on fresh agents; returns their controls.
    fn controls_at(maneuver: &dyn Maneuver, t: f32) -> (Vec<Controls>, bool) {
        let mut agents = airborne(3);
        let geometry = FormationGeometry::new(Default::default());
        let controller = ProportionalController::default();
        let config = AirshowConfig::default();
        let mut scorer = Scorer::default();
        let mut ctx = StepContext {
            agents: agents.iter_mut().collect(),
            observer: None,
            geometry: &geometry,
            controller: &controller,
            scorer: &mut scorer,
            config: &config,
        };
        let finished = maneuver.perform(&mut ctx, t).expect("maneuver runs").finished;
        (agents.iter().map(|a| a.controls).collect(), finished)
    }

    #[test]
    fn test_instant_dodge_flips_every_agent_at_once() {
        let dodge = InstantDodge::new(Vector2::new(1.0, -0.5));

        let (controls, finished) = controls_at(&dodge, 0.0);
        assert!(!finished);
        for c in &controls {
            assert!(c.jump);
            assert_eq!(c.pitch, -1.0);
            assert_eq!(c.yaw, -0.5);
        }

        let (_, finished) = controls_at(&dodge, 0.45);
        assert!(finished);
    }

    #[test]
    fn test_jump_and_dodge_releases_jump_before_flipping() {
        let dodge = JumpAndDodge::new(Vector2::new(0.0, 1.0));

        let (rising, _) = controls_at(&dodge, 0.1);
        assert!(rising[0].jump);
        assert_eq!(rising[0].yaw, 0.0);

        let (released, _) = controls_at(&dodge, 0.25);
        assert!(!released[0].jump);

        let (flipping, _) = controls_at(&dodge, 0.35);
        assert!(flipping[0].jump);
        assert_eq!(flipping[0].yaw, 1.0);
    }
}
