//! In-memory environment for headless runs and tests.
//!
//! Agents drift with their velocity, nothing more: there are no vehicle
//! dynamics, so controls are recorded but do not move anything. Optional
//! seeded jitter knocks agents out of formation so repair has work to do.

use std::collections::BTreeMap;

use nalgebra::{Rotation3, Vector3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::agent::{AgentId, AgentSnapshot, Controls, PhysicalState, PhysicsOverride};
use crate::environment::{ActuationSink, EnvSnapshot, EnvironmentReader, EnvironmentWriter};
use crate::error::EnvironmentError;

/// Default simulation step (seconds)
pub const TICK_DT: f32 = 1.0 / 120.0;

#[derive(Debug)]
struct Jitter {
    rng: ChaCha8Rng,
    magnitude: f32,
}

#[derive(Debug)]
pub struct SandboxEnvironment {
    time: f32,
    dt: f32,
    agents: Vec<AgentSnapshot>,
    ball: PhysicalState,
    last_controls: BTreeMap<AgentId, Controls>,
    sends: usize,
    override_batches: usize,
    failing_snapshots: u32,
    jitter: Option<Jitter>,
}

impl Default for SandboxEnvironment {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SandboxEnvironment {
    /// `count` autonomous agents at rest at the origin, ids `0..count`.
    pub fn new(count: usize) -> Self {
        let agents = (0..count)
            .map(|id| AgentSnapshot::autonomous(id, PhysicalState::default()))
            .collect();
        Self {
            time: 0.0,
            dt: TICK_DT,
            agents,
            ball: PhysicalState::at_rest(Vector3::new(0.0, 0.0, 93.0), Rotation3::identity()),
            last_controls: BTreeMap::new(),
            sends: 0,
            override_batches: 0,
            failing_snapshots: 0,
            jitter: None,
        }
    }

    pub fn with_dt(mut self, dt: f32) -> Self {
        self.dt = dt;
        self
    }

    /// Random positional noise of up to `magnitude` per axis per step.
    pub fn with_jitter(mut self, seed: u64, magnitude: f32) -> Self {
        self.jitter = Some(Jitter { rng: ChaCha8Rng::seed_from_u64(seed), magnitude: magnitude.abs() });
        self
    }

    /// Connect an externally controlled observer; returns its id.
    pub fn add_observer(&mut self, physics: PhysicalState) -> AgentId {
        self.remove_observer();
        let id = self.agents.iter().map(|a| a.id + 1).max().unwrap_or(0);
        self.agents.push(AgentSnapshot::observer(id, physics));
        id
    }

    pub fn remove_observer(&mut self) {
        self.agents.retain(|a| !a.external);
    }

    /// Make the next `count` snapshot reads fail.
    pub fn fail_snapshots(&mut self, count: u32) {
        self.failing_snapshots = count;
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    pub fn agents(&self) -> &[AgentSnapshot] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> Option<&AgentSnapshot> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn agent_mut(&mut self, id: AgentId) -> Option<&mut AgentSnapshot> {
        self.agents.iter_mut().find(|a| a.id == id)
    }

    pub fn ball(&self) -> &PhysicalState {
        &self.ball
    }

    pub fn last_controls(&self, id: AgentId) -> Option<&Controls> {
        self.last_controls.get(&id)
    }

    /// Total number of `send` calls so far.
    pub fn sends(&self) -> usize {
        self.sends
    }

    pub fn override_batches(&self) -> usize {
        self.override_batches
    }

    /// Advance the clock one step and drift every body along its velocity.
    pub fn advance(&mut self) {
        self.time += self.dt;
        let dt = self.dt;
        for agent in &mut self.agents {
            agent.physics.position += agent.physics.velocity * dt;
        }
        self.ball.position += self.ball.velocity * dt;

        if let Some(jitter) = &mut self.jitter {
            let m = jitter.magnitude;
            for agent in self.agents.iter_mut().filter(|a| !a.external) {
                let noise = Vector3::new(
                    jitter.rng.gen_range(-m..=m),
                    jitter.rng.gen_range(-m..=m),
                    jitter.rng.gen_range(-m..=m),
                );
                agent.physics.position += noise;
            }
        }
    }
}

impl EnvironmentReader for SandboxEnvironment {
    fn snapshot(&mut self) -> Result<EnvSnapshot, EnvironmentError> {
        if self.failing_snapshots > 0 {
            self.failing_snapshots -= 1;
            return Err(EnvironmentError::SnapshotUnavailable("sandbox read failure".to_string()));
        }
        Ok(EnvSnapshot { time: self.time, agents: self.agents.clone() })
    }
}

impl EnvironmentWriter for SandboxEnvironment {
    fn apply_overrides(
        &mut self,
        agents: &BTreeMap<AgentId, PhysicsOverride>,
        global: Option<&PhysicsOverride>,
    ) -> Result<(), EnvironmentError> {
        // validate the whole batch before touching anything
        if let Some(unknown) = agents.keys().find(|id| self.agent(**id).is_none()) {
            return Err(EnvironmentError::UnknownAgent(*unknown));
        }

        for (id, state) in agents {
            if let Some(agent) = self.agent_mut(*id) {
                state.apply_to(&mut agent.physics);
            }
        }
        if let Some(ball) = global {
            ball.apply_to(&mut self.ball);
        }
        self.override_batches += 1;
        trace!(agents = agents.len(), global = global.is_some(), "sandbox overrides applied");
        Ok(())
    }
}

impl ActuationSink for SandboxEnvironment {
    fn send(&mut self, agent: AgentId, controls: &Controls) -> Result<(), EnvironmentError> {
        if self.agent(agent).is_none() {
            return Err(EnvironmentError::UnknownAgent(agent));
        }
        self.last_controls.insert(agent, *controls);
        self.sends += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_integrates_velocity() {
        let mut env = SandboxEnvironment::new(1).with_dt(0.5);
        if let Some(agent) = env.agent_mut(0) {
            agent.physics.velocity = Vector3::new(2.0, 0.0, 0.0);
        }
        env.advance();
        assert!((env.time() - 0.5).abs() < 1e-6);
        assert_eq!(env.agent(0).map(|a| a.physics.position.x), Some(1.0));
    }

    #[test]
    fn test_overrides_are_atomic() {
        let mut env = SandboxEnvironment::new(2);
        let mut batch = BTreeMap::new();
        batch.insert(0, PhysicsOverride { position: Some(Vector3::new(5.0, 0.0, 0.0)), ..Default::default() });
        batch.insert(7, PhysicsOverride::default());

        let err = env.apply_overrides(&batch, None).unwrap_err();
        assert!(matches!(err, EnvironmentError::UnknownAgent(7)));
        assert_eq!(env.agent(0).map(|a| a.physics.position.x), Some(0.0));
        assert_eq!(env.override_batches(), 0);

        batch.remove(&7);
        env.apply_overrides(&batch, None).unwrap();
        assert_eq!(env.agent(0).map(|a| a.physics.position.x), Some(5.0));
        assert_eq!(env.override_batches(), 1);
    }

    #[test]
    fn test_observer_add_remove() {
        let mut env = SandboxEnvironment::new(3);
        let id = env.add_observer(PhysicalState::default());
        assert_eq!(id, 3);
        assert_eq!(env.snapshot().unwrap().observer().map(|o| o.id), Some(3));
        env.remove_observer();
        assert!(env.snapshot().unwrap().observer().is_none());
    }

    #[test]
    fn test_jitter_is_deterministic() {
        let mut a = SandboxEnvironment::new(2).with_jitter(42, 3.0);
        let mut b = SandboxEnvironment::new(2).with_jitter(42, 3.0);
        for _ in 0..5 {
            a.advance();
            b.advance();
        }
        assert_eq!(a.agents(), b.agents());
        assert!(a.agents().iter().any(|s| s.physics.position.norm() > 0.0));
    }

    #[test]
    fn test_send_records_controls() {
        let mut env = SandboxEnvironment::new(1);
        let controls = Controls { jump: true, ..Default::default() };
        env.send(0, &controls).unwrap();
        assert_eq!(env.last_controls(0), Some(&controls));
        assert!(env.send(4, &controls).is_err());
        assert_eq!(env.sends(), 1);
    }

    #[test]
    fn test_failing_snapshots() {
        let mut env = SandboxEnvironment::new(1);
        env.fail_snapshots(1);
        assert!(env.snapshot().is_err());
        assert!(env.snapshot().is_ok());
    }
}
