//! Formation error weights and repair thresholds.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairConfig {
    /// Error per world unit of position offset
    pub position_weight: f32,
    /// Error per world unit/s of velocity offset
    pub velocity_weight: f32,
    /// Error per radian of the worse of forward/up misalignment
    pub orientation_weight: f32,
    /// Autonomous agents above this error are snapped back
    pub agent_threshold: f32,
    /// The observer above this error is snapped back (looser, it is not ours to steer)
    pub observer_threshold: f32,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            position_weight: 0.03,
            velocity_weight: 0.001,
            orientation_weight: 2.0,
            agent_threshold: 1.0,
            observer_threshold: 5.0,
        }
    }
}

/// Observer scoring parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Error at which a tick contributes zero to the score
    pub normalizer: f32,
    /// Scale applied to the mean per-tick score
    pub scale: f32,
    /// Grade boundaries: below `perfect` is "Perfect", below `okay` "Okay", below `bad` "Bad"
    pub perfect_below: f32,
    pub okay_below: f32,
    pub bad_below: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            normalizer: 10.0,
            scale: 1000.0,
            perfect_below: 0.5,
            okay_below: 5.0,
            bad_below: 10.0,
        }
    }
}
