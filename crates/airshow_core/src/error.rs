use thiserror::Error;

use crate::agent::AgentId;

/// Malformed schedule definitions, caught when a step tree is compiled.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("Composite step has no children")]
    EmptyComposite,

    #[error("Parallel step has no children")]
    EmptyParallel,

    #[error("Scoped step selects no formation slots")]
    EmptyScope,

    #[error("Parallel siblings {first} and {second} can both override the same agents")]
    OverlappingScopes { first: usize, second: usize },

    #[error("Schedule generation failed: {0}")]
    Generation(String),
}

/// Faults raised while evaluating a single tick.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StepFault {
    #[error("Two parallel steps produced an override for agent {agent}")]
    OverlappingOverride { agent: AgentId },

    #[error("Two parallel steps produced a global override")]
    OverlappingGlobalOverride,

    #[error("Maneuver '{name}' failed: {reason}")]
    Maneuver { name: &'static str, reason: String },
}

/// Failures reported by environment collaborators.
#[derive(Error, Debug)]
pub enum EnvironmentError {
    #[error("Environment snapshot unavailable: {0}")]
    SnapshotUnavailable(String),

    #[error("Unknown agent {0}")]
    UnknownAgent(AgentId),

    #[error("State write rejected: {0}")]
    WriteRejected(String),

    #[error("Actuation failed for agent {agent}: {reason}")]
    Actuation { agent: AgentId, reason: String },
}

impl EnvironmentError {
    pub fn is_recoverable(&self) -> bool {
        match self {
            EnvironmentError::SnapshotUnavailable(_) => true,
            EnvironmentError::Actuation { .. } => true,
            EnvironmentError::UnknownAgent(_) => false,
            EnvironmentError::WriteRejected(_) => false,
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
