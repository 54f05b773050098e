//! Low-level control laws
//!
//! Leaf maneuvers never compute actuation themselves; they hand a target to a
//! [`ManeuverController`] and copy the relevant channels into the agent's
//! pending controls.
//!
//! Sign conventions (body frame x forward, y left, z up):
//! - `pitch > 0` lifts the nose, `yaw > 0` turns right, `roll > 0` rolls right
//! - `steer > 0` turns right

use nalgebra::{Rotation3, Vector3};

use crate::agent::{look_at, Agent, Controls};

/// What a maneuver wants an agent to do this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlTarget {
    /// Rotate toward an orientation; writes pitch/yaw/roll
    Orientation(Rotation3<f32>),
    /// Drive on the ground toward a point; writes throttle/steer/boost/handbrake
    Drive { target: Vector3<f32>, speed: f32 },
    /// Hold a point in the air; writes attitude and boost
    Hover { target: Vector3<f32>, up: Vector3<f32> },
}

pub trait ManeuverController: Send + Sync {
    fn compute(&self, target: &ControlTarget, agent: &Agent) -> Controls;
}

/// Compute controls for `target` and overlay the channels it owns.
pub fn actuate(controller: &dyn ManeuverController, agent: &mut Agent, target: ControlTarget) {
    let computed = controller.compute(&target, agent);
    match target {
        ControlTarget::Orientation(_) => agent.controls.set_attitude(&computed),
        ControlTarget::Drive { .. } => agent.controls.set_ground(&computed),
        ControlTarget::Hover { .. } => {
            agent.controls.set_attitude(&computed);
            agent.controls.boost = computed.boost;
        }
    }
}

/// Proportional-damped reference controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ProportionalController {
    pub attitude_gain: f32,
    pub attitude_damping: f32,
    pub steer_gain: f32,
    /// Throttle per unit/s of forward speed deficit
    pub speed_gain: f32,
    /// Boost only when this far below the requested speed
    pub boost_margin: f32,
    pub hover_position_gain: f32,
    pub hover_velocity_gain: f32,
    pub gravity: f32,
}

impl Default for ProportionalController {
    fn default() -> Self {
        Self {
            attitude_gain: 3.0,
            attitude_damping: 0.6,
            steer_gain: 2.5,
            speed_gain: 1.0 / 500.0,
            boost_margin: 300.0,
            hover_position_gain: 1.2,
            hover_velocity_gain: 1.6,
            gravity: 650.0,
        }
    }
}

impl ProportionalController {
    fn reorient(&self, agent: &Agent, target: &Rotation3<f32>) -> Controls {
        let current = agent.physics.orientation;
        let error = (current.inverse() * target).scaled_axis();
        let spin = current.inverse() * agent.angular_velocity();
        let cmd = error * self.attitude_gain - spin * self.attitude_damping;
        Controls { roll: cmd.x, pitch: -cmd.y, yaw: -cmd.z, ..Controls::default() }.clamped()
    }

    fn drive(&self, agent: &Agent, target: Vector3<f32>, speed: f32) -> Controls {
        let local = agent.physics.orientation.inverse() * (target - agent.position());
        let heading_error = local.y.atan2(local.x);
        let forward_speed = agent.forward().dot(&agent.velocity());
        let deficit = speed - forward_speed;
        Controls {
            steer: -heading_error * self.steer_gain,
            throttle: deficit * self.speed_gain,
            boost: deficit > self.boost_margin && heading_error.abs() < 0.3,
            handbrake: heading_error.abs() > 1.5,
            ..Controls::default()
        }
        .clamped()
    }

    fn hover(&self, agent: &Agent, target: Vector3<f32>, up: Vector3<f32>) -> Controls {
        let accel = (target - agent.position()) * self.hover_position_gain
            - agent.velocity() * self.hover_velocity_gain
            + Vector3::z() * self.gravity;
        let thrust_dir = accel.try_normalize(1e-6).unwrap_or_else(Vector3::z);
        let mut controls = self.reorient(agent, &look_at(thrust_dir, up));
        controls.boost = agent.forward().angle(&thrust_dir) < 0.5 && accel.norm() > self.gravity * 0.5;
        controls
    }
}

impl ManeuverController for ProportionalController {
    fn compute(&self, target: &ControlTarget, agent: &Agent) -> Controls {
        match target {
            ControlTarget::Orientation(orientation) => self.reorient(agent, orientation),
            ControlTarget::Drive { target, speed } => self.drive(agent, *target, *speed),
            ControlTarget::Hover { target, up } => self.hover(agent, *target, *up),
        }
    }
}
