//! Polar formation geometry
//!
//! Every slot owns a canonical angle on its ring. A maneuver written once in
//! ring-local coordinates (template centered on the world origin, slot 0's
//! angle along world +X) is replayed at every slot by rotating it about world
//! +Z by that slot's angle.
//!
//! ## Rings
//! - Inner ring: slots `0..inner_ring_size`
//! - Outer ring: slots `inner_ring_size..total_slots`

use std::f32::consts::TAU;

use nalgebra::{Rotation3, Vector3};

use crate::agent::{look_at, Agent};
use crate::config::FormationConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ring {
    Inner,
    Outer,
}

/// `index / ring_size` of a full turn.
pub fn canonical_angle(index_in_ring: usize, ring_size: usize) -> f32 {
    if ring_size == 0 {
        return 0.0;
    }
    index_in_ring as f32 / ring_size as f32 * TAU
}

/// Pure slot → pose mapping, fixed once configured.
#[derive(Debug, Clone, PartialEq)]
pub struct FormationGeometry {
    config: FormationConfig,
}

impl FormationGeometry {
    pub fn new(config: FormationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FormationConfig {
        &self.config
    }

    pub fn ring_of(&self, slot: usize) -> Ring {
        if slot < self.config.inner_ring_size {
            Ring::Inner
        } else {
            Ring::Outer
        }
    }

    pub fn ring_size(&self, ring: Ring) -> usize {
        match ring {
            Ring::Inner => self.config.inner_ring_size,
            Ring::Outer => self.config.outer_ring_size(),
        }
    }

    /// Slot range of a ring, for building scoped steps.
    pub fn ring_slots(&self, ring: Ring) -> std::ops::Range<usize> {
        match ring {
            Ring::Inner => 0..self.config.inner_ring_size,
            Ring::Outer => self.config.inner_ring_size..self.config.total_slots,
        }
    }

    pub fn ring_radius(&self, slot: usize) -> f32 {
        match self.ring_of(slot) {
            Ring::Inner => self.config.inner_radius,
            Ring::Outer => self.config.outer_radius,
        }
    }

    /// Angle of `slot` on its ring, shifted by `angular_offset`
    /// (the inner ring turns `inner_angular_multiplier` times as fast).
    pub fn slot_angle(&self, slot: usize, angular_offset: f32) -> f32 {
        match self.ring_of(slot) {
            Ring::Inner => {
                canonical_angle(slot, self.config.inner_ring_size)
                    + angular_offset * self.config.inner_angular_multiplier
            }
            Ring::Outer => {
                canonical_angle(slot - self.config.inner_ring_size, self.config.outer_ring_size())
                    + angular_offset
            }
        }
    }

    pub fn rotation_at(&self, slot: usize, angular_offset: f32) -> Rotation3<f32> {
        Rotation3::from_axis_angle(&Vector3::z_axis(), self.slot_angle(slot, angular_offset))
    }

    /// Carries the ring-local template pose to `slot`'s world pose.
    pub fn rotation_for(&self, slot: usize) -> Rotation3<f32> {
        self.rotation_at(slot, 0.0)
    }

    /// Point on the slot's ring, at ground level (z = 0).
    pub fn circle_pos(&self, slot: usize, radius_offset: f32, angular_offset: f32) -> Vector3<f32> {
        self.rotation_at(slot, angular_offset) * Vector3::x() * (self.ring_radius(slot) + radius_offset)
    }

    /// Mean over `agents` of `value`, each expressed in its own slot's ring-local frame.
    pub fn polar_mean<F>(&self, agents: &[&Agent], value: F) -> Vector3<f32>
    where
        F: Fn(&Agent) -> Vector3<f32>,
    {
        if agents.is_empty() {
            return Vector3::zeros();
        }
        let sum = agents.iter().fold(Vector3::zeros(), |acc, agent| {
            acc + self.rotation_for(agent.slot).inverse() * value(agent)
        });
        sum / agents.len() as f32
    }

    /// Circular mean of the full pose of `agents`.
    pub fn mean_pose(&self, agents: &[&Agent]) -> LocalPose {
        LocalPose {
            position: self.polar_mean(agents, Agent::position),
            velocity: self.polar_mean(agents, Agent::velocity),
            angular_velocity: self.polar_mean(agents, Agent::angular_velocity),
            forward: self.polar_mean(agents, Agent::forward),
            up: self.polar_mean(agents, Agent::up),
        }
    }
}

/// A pose expressed in the ring-local template frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalPose {
    pub position: Vector3<f32>,
    pub velocity: Vector3<f32>,
    pub angular_velocity: Vector3<f32>,
    pub forward: Vector3<f32>,
    pub up: Vector3<f32>,
}

impl LocalPose {
    /// The ideal world-frame pose for `slot`.
    pub fn at_slot(&self, geometry: &FormationGeometry, slot: usize) -> IdealPose {
        let rot = geometry.rotation_for(slot);
        IdealPose {
            position: rot * self.position,
            velocity: rot * self.velocity,
            angular_velocity: rot * self.angular_velocity,
            forward: rot * self.forward,
            up: rot * self.up,
        }
    }
}

/// World-frame pose a slot should hold right now.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdealPose {
    pub position: Vector3<f32>,
    pub velocity: Vector3<f32>,
    pub angular_velocity: Vector3<f32>,
    pub forward: Vector3<f32>,
    pub up: Vector3<f32>,
}

impl IdealPose {
    pub fn orientation(&self) -> Rotation3<f32> {
        look_at(self.forward, self.up)
    }

    pub fn left(&self) -> Vector3<f32> {
        self.up.cross(&self.forward).try_normalize(1e-6).unwrap_or_else(Vector3::zeros)
    }
}

/// Map a ring-relative direction (x = toward center, y = tangent, z = up) to world space at `pos`.
pub fn direction_on_circle(pos: Vector3<f32>, direction: Vector3<f32>) -> Vector3<f32> {
    let flat = Vector3::new(pos.x, pos.y, 0.0);
    let towards_center = -flat.try_normalize(1e-6).unwrap_or_else(Vector3::x);
    let tangent = towards_center.cross(&Vector3::z()).normalize();
    towards_center * direction.x + tangent * direction.y + Vector3::z() * direction.z
}

/// Point at `radius` from the center, rotated `angle_offset` about +Z from `pos`'s bearing.
pub fn position_on_circle(pos: Vector3<f32>, radius: f32, angle_offset: f32) -> Vector3<f32> {
    let bearing = pos.try_normalize(1e-6).unwrap_or_else(Vector3::x);
    Rotation3::from_axis_angle(&Vector3::z_axis(), angle_offset) * bearing * radius
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentSnapshot, PhysicalState};
    use std::f32::consts::PI;

    fn geometry() -> FormationGeometry {
        FormationGeometry::new(FormationConfig::default())
    }

    fn agent_with_local_pose(geo: &FormationGeometry, slot: usize, local: PhysicalState) -> Agent {
        let rot = geo.rotation_for(slot);
        let world = PhysicalState {
            position: rot * local.position,
            velocity: rot * local.velocity,
            orientation: rot * local.orientation,
            angular_velocity: rot * local.angular_velocity,
        };
        Agent::from_snapshot(&AgentSnapshot::autonomous(slot, world), slot, 0.0)
    }

    #[test]
    fn test_canonical_angle_linear() {
        assert_eq!(canonical_angle(0, 4), 0.0);
        assert!((canonical_angle(1, 4) - PI / 2.0).abs() < 1e-6);
        assert!((canonical_angle(3, 4) - 3.0 * PI / 2.0).abs() < 1e-6);
        assert_eq!(canonical_angle(3, 0), 0.0);
    }

    #[test]
    fn test_rings_and_radii() {
        let geo = geometry();
        assert_eq!(geo.ring_of(19), Ring::Inner);
        assert_eq!(geo.ring_of(20), Ring::Outer);
        assert_eq!(geo.ring_radius(5), 1200.0);
        assert_eq!(geo.ring_radius(40), 2000.0);
        assert_eq!(geo.ring_slots(Ring::Outer), 20..64);
    }

    #[test]
    fn test_outer_ring_normalized_separately() {
        let geo = geometry();
        // first outer slot sits at angle zero of its own ring
        assert!(geo.slot_angle(20, 0.0).abs() < 1e-6);
        assert!((geo.slot_angle(42, 0.0) - PI).abs() < 1e-5);
    }

    #[test]
    fn test_inner_ring_turns_faster() {
        let geo = geometry();
        assert!((geo.slot_angle(0, 0.1) - 0.2).abs() < 1e-6);
        assert!((geo.slot_angle(20, 0.1) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_circle_pos_on_radius() {
        let geo = geometry();
        let p = geo.circle_pos(5, 0.0, 0.0);
        assert!((p.norm() - 1200.0).abs() < 0.01);
        assert!((geo.circle_pos(0, 300.0, 0.0) - Vector3::new(1500.0, 0.0, 0.0)).norm() < 0.01);
    }

    #[test]
    fn test_polar_mean_self_consistent() {
        let geo = geometry();
        let local = PhysicalState {
            position: Vector3::new(1200.0, 50.0, 300.0),
            velocity: Vector3::new(-20.0, 400.0, 10.0),
            orientation: look_at(Vector3::new(0.0, 1.0, 0.2), Vector3::z()),
            angular_velocity: Vector3::new(0.1, 0.0, 0.5),
        };
        let agents: Vec<Agent> = [0, 3, 7, 11, 19]
            .iter()
            .map(|&slot| agent_with_local_pose(&geo, slot, local))
            .collect();
        let refs: Vec<&Agent> = agents.iter().collect();
        let mean = geo.mean_pose(&refs);

        for agent in &agents {
            let ideal = mean.at_slot(&geo, agent.slot);
            assert!((ideal.position - agent.position()).norm() < 0.05);
            assert!((ideal.velocity - agent.velocity()).norm() < 0.01);
            assert!(ideal.forward.angle(&agent.forward()) < 1e-3);
            assert!(ideal.up.angle(&agent.up()) < 1e-3);
        }
    }

    #[test]
    fn test_polar_mean_empty() {
        let geo = geometry();
        assert_eq!(geo.polar_mean(&[], Agent::position), Vector3::zeros());
    }

    #[test]
    fn test_direction_on_circle() {
        let pos = Vector3::new(1000.0, 0.0, 17.0);
        let inward = direction_on_circle(pos, Vector3::new(1.0, 0.0, 0.0));
        assert!((inward - Vector3::new(-1.0, 0.0, 0.0)).norm() < 1e-6);
        let tangent = direction_on_circle(pos, Vector3::new(0.0, 1.0, 0.0));
        assert!((tangent - Vector3::new(0.0, 1.0, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn test_position_on_circle() {
        let p = position_on_circle(Vector3::new(0.0, 500.0, 0.0), 2000.0, -PI / 2.0);
        assert!((p - Vector3::new(2000.0, 0.0, 0.0)).norm() < 0.01);
    }
}
