//! Environment collaborators
//!
//! The runner reads one snapshot per tick, writes at most one batch of
//! physics overrides, then sends each agent's controls. Nothing else crosses
//! the boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agent::{AgentId, AgentSnapshot, Controls, PhysicsOverride};
use crate::error::EnvironmentError;

/// World state at the start of a tick.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnvSnapshot {
    /// Environment clock (seconds)
    pub time: f32,
    pub agents: Vec<AgentSnapshot>,
}

impl EnvSnapshot {
    /// First externally controlled agent, if one is connected.
    pub fn observer(&self) -> Option<&AgentSnapshot> {
        self.agents.iter().find(|a| a.external)
    }

    pub fn autonomous(&self) -> impl Iterator<Item = &AgentSnapshot> {
        self.agents.iter().filter(|a| !a.external)
    }

    pub fn agent(&self, id: AgentId) -> Option<&AgentSnapshot> {
        self.agents.iter().find(|a| a.id == id)
    }
}

pub trait EnvironmentReader {
    fn snapshot(&mut self) -> Result<EnvSnapshot, EnvironmentError>;
}

pub trait EnvironmentWriter {
    /// Apply every override in one atomic write.
    fn apply_overrides(
        &mut self,
        agents: &BTreeMap<AgentId, PhysicsOverride>,
        global: Option<&PhysicsOverride>,
    ) -> Result<(), EnvironmentError>;
}

pub trait ActuationSink {
    fn send(&mut self, agent: AgentId, controls: &Controls) -> Result<(), EnvironmentError>;
}

/// Everything the step runner needs from its host.
pub trait Environment: EnvironmentReader + EnvironmentWriter + ActuationSink {}

impl<T: EnvironmentReader + EnvironmentWriter + ActuationSink + ?Sized> Environment for T {}
