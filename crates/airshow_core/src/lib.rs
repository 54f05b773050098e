//! # airshow_core - Formation Choreography Engine
//!
//! Schedules synchronized maneuvers for a fleet of agents arranged on
//! concentric rings, keeps them in formation by snapping stragglers back to
//! the circular mean, and scores an externally controlled observer flying
//! along with the fleet.
//!
//! ## Features
//! - Composable step trees (sequence, parallel, scoped, scored)
//! - Compile-time rejection of conflicting parallel overrides
//! - Deterministic headless sandbox for runs and tests

// Method naming conventions - would require API changes
#![allow(clippy::should_implement_trait)]
// Maneuver structs are plain data with many knobs
#![allow(clippy::too_many_arguments)]

pub mod agent;
pub mod choreography;
pub mod config;
pub mod controller;
pub mod environment;
pub mod error;
pub mod formation;
pub mod maneuvers;
pub mod repair;
pub mod runner;
pub mod sandbox;
pub mod scorer;
pub mod step;

pub use agent::{look_at, Agent, AgentId, AgentSnapshot, Controls, PhysicalState, PhysicsOverride};
pub use choreography::AirshowChoreography;
pub use config::AirshowConfig;
pub use controller::{ControlTarget, ManeuverController, ProportionalController};
pub use environment::{ActuationSink, EnvSnapshot, Environment, EnvironmentReader, EnvironmentWriter};
pub use error::{ConfigError, EnvironmentError, ScheduleError, StepFault};
pub use formation::{FormationGeometry, Ring};
pub use repair::{formation_error, Grade, RepairFormation};
pub use runner::{ScheduleGenerator, StepRunner, TickOutcome, TickReport};
pub use sandbox::SandboxEnvironment;
pub use scorer::Scorer;
pub use step::{Maneuver, OverrideReach, Schedule, SlotSet, Step, StepContext, StepResult};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
