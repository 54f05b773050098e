//! # Airshow Configuration
//!
//! All tuning constants of the formation engine in one place.
//!
//! ## Usage
//! ```rust
//! use airshow_core::config::AirshowConfig;
//!
//! let config = AirshowConfig::default();
//! let relaxed = AirshowConfig::relaxed();
//! let from_env = AirshowConfig::from_env_or_default();
//! ```
//!
//! ## Environment Variables
//!
//! - `AIRSHOW_PROFILE`: Select preset (relaxed, strict, default)

mod formation_config;
mod repair_config;

pub use formation_config::FormationConfig;
pub use repair_config::{RepairConfig, ScoringConfig};

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Step runner parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Formation slot reserved for the externally controlled observer
    pub observer_slot: usize,
    /// Environment seconds to withhold actuation after an evaluation fault
    pub fault_backoff_s: f32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self { observer_slot: 40, fault_backoff_s: 1.0 }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AirshowConfig {
    #[serde(default)]
    pub formation: FormationConfig,
    #[serde(default)]
    pub repair: RepairConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
}

impl AirshowConfig {
    /// Looser repair, gentler scoring (rehearsals with new pilots)
    pub fn relaxed() -> Self {
        let mut cfg = Self::default();
        cfg.repair.agent_threshold = 2.0;
        cfg.repair.observer_threshold = 10.0;
        cfg.scoring.normalizer = 20.0;
        cfg
    }

    /// Tight repair, harsh scoring
    pub fn strict() -> Self {
        let mut cfg = Self::default();
        cfg.repair.agent_threshold = 0.5;
        cfg.repair.observer_threshold = 2.5;
        cfg.scoring.normalizer = 5.0;
        cfg
    }

    /// Load from environment variable AIRSHOW_PROFILE or use default
    pub fn from_env_or_default() -> Self {
        Self::from_profile(&env::var("AIRSHOW_PROFILE").unwrap_or_default())
    }

    pub fn from_profile(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "relaxed" => Self::relaxed(),
            "strict" => Self::strict(),
            _ => Self::default(),
        }
    }

    /// Load a JSON (`.json`) or YAML (`.yaml`/`.yml`) file. Missing sections take defaults.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg: Self = match ext.as_str() {
            "json" => serde_json::from_str(&text)?,
            "yaml" | "yml" => serde_yaml::from_str(&text)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Autonomous agents the formation holds: every slot but the observer's.
    pub fn agent_capacity(&self) -> usize {
        self.formation.total_slots.saturating_sub(1)
    }

    pub fn check_agent_count(&self, agents: usize) -> Result<(), ConfigError> {
        if agents > self.agent_capacity() {
            return Err(ConfigError::Invalid {
                field: "agents",
                reason: format!("{agents} agents exceed the {} free formation slots", self.agent_capacity()),
            });
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let f = &self.formation;
        if f.inner_ring_size == 0 {
            return Err(ConfigError::Invalid {
                field: "formation.inner_ring_size",
                reason: "must be at least 1".into(),
            });
        }
        if f.inner_ring_size > f.total_slots {
            return Err(ConfigError::Invalid {
                field: "formation.inner_ring_size",
                reason: format!("{} exceeds total_slots {}", f.inner_ring_size, f.total_slots),
            });
        }
        if self.runner.observer_slot >= f.total_slots {
            return Err(ConfigError::Invalid {
                field: "runner.observer_slot",
                reason: format!("{} is outside 0..{}", self.runner.observer_slot, f.total_slots),
            });
        }
        if self.scoring.normalizer <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "scoring.normalizer",
                reason: "must be positive".into(),
            });
        }
        if self.repair.agent_threshold < 0.0 || self.repair.observer_threshold < 0.0 {
            return Err(ConfigError::Invalid {
                field: "repair.threshold",
                reason: "thresholds must be non-negative".into(),
            });
        }
        Ok(())
    }
}
