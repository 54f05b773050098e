//! Formation layout parameters.
//!
//! Slots `0..inner_ring_size` form the inner ring, the remaining slots up to
//! `total_slots` form the outer ring.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormationConfig {
    /// Total number of formation slots (agents plus observer)
    pub total_slots: usize,
    /// Number of slots on the inner ring
    pub inner_ring_size: usize,
    /// Inner ring radius (world units)
    pub inner_radius: f32,
    /// Outer ring radius (world units)
    pub outer_radius: f32,
    /// Inner ring turns this many times faster than the outer ring
    pub inner_angular_multiplier: f32,
    /// Ground height used when placing agents on their ring
    pub ground_height: f32,
}

impl Default for FormationConfig {
    fn default() -> Self {
        Self {
            total_slots: 64,
            inner_ring_size: 20,
            inner_radius: 1200.0,
            outer_radius: 2000.0,
            inner_angular_multiplier: 2.0,
            ground_height: 17.0,
        }
    }
}

impl FormationConfig {
    /// Single ring holding every slot.
    pub fn single_ring(size: usize, radius: f32) -> Self {
        Self {
            total_slots: size,
            inner_ring_size: size,
            inner_radius: radius,
            outer_radius: radius,
            ..Self::default()
        }
    }

    pub fn outer_ring_size(&self) -> usize {
        self.total_slots.saturating_sub(self.inner_ring_size)
    }
}
