//! Observer scoring.
//!
//! Each scored tick adds `1 - error / normalizer`, floored at -1; the reported
//! score is the per-tick mean scaled to 1000 for a flawless run, so it always
//! lies in `-scale..=scale`.

use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorer {
    normalizer: f32,
    scale: f32,
    total: f64,
    frames: u32,
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
    }
}

impl Scorer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self { normalizer: config.normalizer, scale: config.scale, total: 0.0, frames: 0 }
    }

    pub fn record(&mut self, error: f32) {
        self.total += (1.0 - f64::from(error) / f64::from(self.normalizer)).max(-1.0);
        self.frames += 1;
    }

    pub fn reset(&mut self) {
        self.total = 0.0;
        self.frames = 0;
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Mean per-tick score scaled, rounded to the nearest integer.
    pub fn score(&self) -> i32 {
        let mean = self.total / f64::from(self.frames.max(1));
        (mean * f64::from(self.scale)).round() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_run_scores_1000() {
        let mut scorer = Scorer::default();
        for _ in 0..10 {
            scorer.record(0.0);
        }
        assert_eq!(scorer.frames(), 10);
        assert_eq!(scorer.score(), 1000);
    }

    #[test]
    fn test_saturated_error_scores_non_positive() {
        let mut scorer = Scorer::default();
        for _ in 0..10 {
            scorer.record(25.0);
        }
        assert!(scorer.score() <= 0);
    }

    #[test]
    fn test_far_observer_is_floored() {
        let mut scorer = Scorer::default();
        scorer.record(60_000.0);
        assert_eq!(scorer.score(), -1000);
        scorer.record(0.0);
        assert_eq!(scorer.score(), 0);
    }

    #[test]
    fn test_half_error_half_score() {
        let mut scorer = Scorer::default();
        scorer.record(5.0);
        assert_eq!(scorer.score(), 500);
    }

    #[test]
    fn test_empty_and_reset() {
        let mut scorer = Scorer::default();
        assert_eq!(scorer.score(), 0);
        scorer.record(1.0);
        scorer.reset();
        assert_eq!(scorer.frames(), 0);
        assert_eq!(scorer.score(), 0);
    }
}
