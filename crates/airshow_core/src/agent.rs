//! Agent state
//!
//! One controlled entity per formation slot. Agents are rebuilt from the
//! environment snapshot every tick; only the identity fields survive.
//!
//! Body frame: x = forward, y = left, z = up.

use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// Actuation routing index assigned by the environment.
pub type AgentId = usize;

/// Raw physical state of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalState {
    pub position: Vector3<f32>,
    pub velocity: Vector3<f32>,
    pub orientation: Rotation3<f32>,
    pub angular_velocity: Vector3<f32>,
}

impl Default for PhysicalState {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            velocity: Vector3::zeros(),
            orientation: Rotation3::identity(),
            angular_velocity: Vector3::zeros(),
        }
    }
}

impl PhysicalState {
    pub fn at_rest(position: Vector3<f32>, orientation: Rotation3<f32>) -> Self {
        Self { position, orientation, ..Self::default() }
    }

    pub fn forward(&self) -> Vector3<f32> {
        self.orientation * Vector3::x()
    }

    pub fn left(&self) -> Vector3<f32> {
        self.orientation * Vector3::y()
    }

    pub fn up(&self) -> Vector3<f32> {
        self.orientation * Vector3::z()
    }
}

/// Direct write of physical state. `None` fields are left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PhysicsOverride {
    pub position: Option<Vector3<f32>>,
    pub velocity: Option<Vector3<f32>>,
    pub orientation: Option<Rotation3<f32>>,
    pub angular_velocity: Option<Vector3<f32>>,
}

impl PhysicsOverride {
    /// Full snap: every field written, missing rates zeroed.
    pub fn snap(
        position: Vector3<f32>,
        orientation: Rotation3<f32>,
        velocity: Option<Vector3<f32>>,
        angular_velocity: Option<Vector3<f32>>,
    ) -> Self {
        Self {
            position: Some(position),
            velocity: Some(velocity.unwrap_or_else(Vector3::zeros)),
            orientation: Some(orientation),
            angular_velocity: Some(angular_velocity.unwrap_or_else(Vector3::zeros)),
        }
    }

    pub fn apply_to(&self, state: &mut PhysicalState) {
        if let Some(p) = self.position {
            state.position = p;
        }
        if let Some(v) = self.velocity {
            state.velocity = v;
        }
        if let Some(o) = self.orientation {
            state.orientation = o;
        }
        if let Some(w) = self.angular_velocity {
            state.angular_velocity = w;
        }
    }
}

/// Pending control output for one agent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Controls {
    pub throttle: f32,
    pub steer: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
    pub jump: bool,
    pub boost: bool,
    pub handbrake: bool,
}

impl Controls {
    /// Analog axes clamped to [-1, 1], the range every actuation sink accepts.
    pub fn clamped(&self) -> Self {
        Self {
            throttle: self.throttle.clamp(-1.0, 1.0),
            steer: self.steer.clamp(-1.0, 1.0),
            pitch: self.pitch.clamp(-1.0, 1.0),
            yaw: self.yaw.clamp(-1.0, 1.0),
            roll: self.roll.clamp(-1.0, 1.0),
            ..*self
        }
    }

    pub fn set_attitude(&mut self, other: &Controls) {
        self.pitch = other.pitch;
        self.yaw = other.yaw;
        self.roll = other.roll;
    }

    pub fn set_ground(&mut self, other: &Controls) {
        self.throttle = other.throttle;
        self.steer = other.steer;
        self.boost = other.boost;
        self.handbrake = other.handbrake;
    }
}

/// One entity as reported by the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub team: u8,
    /// Controlled from outside (the observer)
    pub external: bool,
    pub physics: PhysicalState,
    pub boost: f32,
    pub on_ground: bool,
    pub jumped: bool,
    pub double_jumped: bool,
}

impl AgentSnapshot {
    pub fn autonomous(id: AgentId, physics: PhysicalState) -> Self {
        Self {
            id,
            team: 0,
            external: false,
            physics,
            boost: 100.0,
            on_ground: true,
            jumped: false,
            double_jumped: false,
        }
    }

    pub fn observer(id: AgentId, physics: PhysicalState) -> Self {
        Self { external: true, ..Self::autonomous(id, physics) }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    pub id: AgentId,
    pub slot: usize,
    pub team: u8,
    pub physics: PhysicalState,
    pub boost: f32,
    pub on_ground: bool,
    pub jumped: bool,
    pub double_jumped: bool,
    /// Environment time of the last refresh
    pub time: f32,
    pub controls: Controls,
}

impl Agent {
    pub fn new(id: AgentId, team: u8, slot: usize) -> Self {
        Self {
            id,
            slot,
            team,
            physics: PhysicalState::default(),
            boost: 0.0,
            on_ground: true,
            jumped: false,
            double_jumped: false,
            time: 0.0,
            controls: Controls::default(),
        }
    }

    pub fn from_snapshot(snapshot: &AgentSnapshot, slot: usize, time: f32) -> Self {
        let mut agent = Self::new(snapshot.id, snapshot.team, slot);
        agent.refresh(snapshot, time);
        agent
    }

    /// Copy live state from the snapshot and reset pending controls.
    pub fn refresh(&mut self, snapshot: &AgentSnapshot, time: f32) {
        self.physics = snapshot.physics;
        self.boost = snapshot.boost;
        self.on_ground = snapshot.on_ground;
        self.jumped = snapshot.jumped;
        self.double_jumped = snapshot.double_jumped;
        self.time = time;
        self.controls = Controls::default();
    }

    pub fn position(&self) -> Vector3<f32> {
        self.physics.position
    }

    pub fn velocity(&self) -> Vector3<f32> {
        self.physics.velocity
    }

    pub fn angular_velocity(&self) -> Vector3<f32> {
        self.physics.angular_velocity
    }

    pub fn forward(&self) -> Vector3<f32> {
        self.physics.forward()
    }

    pub fn up(&self) -> Vector3<f32> {
        self.physics.up()
    }
}

/// Orientation whose forward axis points along `direction`, with up as close to `up` as possible.
///
/// Falls back to world Z (then world X) as the up hint when the hint is parallel to `direction`.
pub fn look_at(direction: Vector3<f32>, up: Vector3<f32>) -> Rotation3<f32> {
    let forward = direction.try_normalize(1e-6).unwrap_or_else(Vector3::x);
    let left = [up, Vector3::z(), Vector3::x()]
        .iter()
        .find_map(|hint| hint.cross(&forward).try_normalize(1e-6))
        .unwrap_or_else(Vector3::y);
    let up = forward.cross(&left);
    Rotation3::from_basis_unchecked(&[forward, left, up])
}
