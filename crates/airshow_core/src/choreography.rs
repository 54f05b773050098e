//! The airshow program.
//!
//! Both rings fly the same routine. The inner ring flies it unscored; the
//! outer ring, which holds the observer's slot, flies it half a second later
//! under scoring.

use std::f32::consts::TAU;

use nalgebra::{Vector2, Vector3};

use crate::error::ScheduleError;
use crate::formation::{FormationGeometry, Ring};
use crate::maneuvers::{
    DisplayScore, DisplayText, GroundStop, JumpAndDodge, JumpAndFlyUp, JumpAndTurn, LandSmoothly,
    PolarDrive, PolarFlight, PolarReorient, SetCircle, TeleportBall, Wait,
};
use crate::runner::ScheduleGenerator;
use crate::step::Step;

const FLIGHT_ANGULAR_SPEED: f32 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AirshowChoreography {
    /// Seconds each countdown number is shown
    pub countdown_step: f32,
    pub score_display: f32,
}

impl Default for AirshowChoreography {
    fn default() -> Self {
        Self { countdown_step: 1.0, score_display: 10.0 }
    }
}

fn dir(x: f32, y: f32) -> Vector2<f32> {
    Vector2::new(x, y)
}

fn wait(duration: f32) -> Step {
    Step::maneuver(Wait::new(duration))
}

fn turn(x: f32, y: f32) -> Step {
    Step::maneuver(JumpAndTurn::new(dir(x, y)))
}

fn dodge(x: f32, y: f32) -> Step {
    Step::maneuver(JumpAndDodge::new(dir(x, y)))
}

fn land(duration: f32) -> Step {
    Step::maneuver(LandSmoothly::new(duration))
}

fn fly_up(duration: f32) -> Step {
    Step::maneuver(JumpAndFlyUp::new(duration))
}

fn reorient(duration: f32, forward: Vector3<f32>, up: Vector3<f32>) -> Step {
    Step::maneuver(PolarReorient::new(duration, forward, up))
}

fn flight(duration: f32, angular_speed: f32) -> Step {
    Step::maneuver(PolarFlight::turning(duration, angular_speed))
}

fn stop() -> Step {
    Step::maneuver(GroundStop::default())
}

/// Drive straight out (or back) across the ring.
fn drive_radial(radius_offset: f32) -> Step {
    Step::maneuver(PolarDrive {
        radius_offset,
        angular_direction: 0.0,
        boost: true,
        ..PolarDrive::new(1.0, 1000.0)
    })
}

fn drive_around(angular_direction: f32) -> Step {
    Step::maneuver(PolarDrive { angular_direction, ..PolarDrive::new(5.0, 1000.0) })
}

impl AirshowChoreography {
    /// The routine for one ring.
    pub fn routine(&self, include_observer: bool) -> Vec<Step> {
        let repair = || Step::composite(vec![Step::repair(0.5, include_observer), wait(0.5)]);
        let quick_repair = || Step::repair(0.1, include_observer);
        let x = Vector3::x();
        let down = -Vector3::z();

        let mut steps = Vec::new();

        // jump twice, then turn back and forth
        for (dx, dy) in [(1.0, 0.0), (1.0, 0.0), (-1.0, 0.0), (1.0, 0.0)] {
            steps.extend([turn(dx, dy), repair()]);
        }

        // dodges: forward/back twice, then left/right
        for (dx, dy) in [(1.0, 0.0), (-1.0, 0.0), (1.0, 0.0), (-1.0, 0.0), (0.0, -1.0), (0.0, 1.0)] {
            steps.extend([dodge(dx, dy), wait(2.0), repair()]);
        }

        // drive out and back
        steps.extend([turn(-1.0, 0.0), repair(), drive_radial(3000.0), stop(), repair()]);
        steps.extend([turn(1.0, 0.0), repair(), drive_radial(0.0), stop(), repair()]);

        let drive_both_ways = |steps: &mut Vec<Step>| {
            steps.extend([turn(0.0, 1.0), repair(), drive_around(1.0), stop(), repair()]);
            steps.extend([turn(0.0, -1.0), repair(), drive_around(-1.0), stop(), repair()]);
            steps.extend([turn(1.0, 0.0), repair()]);
        };
        drive_both_ways(&mut steps);

        // boost up, fall down
        for (up, fall) in [(1.5, 1.0), (2.0, 2.0)] {
            steps.extend([fly_up(up), wait(1.0), land(fall), repair()]);
        }

        // boost up, flip over and boost down
        for (up, dive, fall) in [(2.0, 0.5, 1.0), (2.5, 0.8, 2.0)] {
            steps.extend([
                fly_up(up),
                reorient(0.3, x, Vector3::z()),
                reorient(0.5, down, x),
                Step::maneuver(PolarReorient::new(dive, down, x).boosting()),
                land(fall),
                repair(),
            ]);
        }

        drive_both_ways(&mut steps);

        // final airshow
        let full_turn = TAU / FLIGHT_ANGULAR_SPEED;
        steps.extend([
            fly_up(1.5),
            flight(3.0, 0.0),
            quick_repair(),
            flight(20.0, 0.0),
            quick_repair(),
            flight(full_turn, FLIGHT_ANGULAR_SPEED),
            flight(5.0, 0.0),
            quick_repair(),
            flight(full_turn, -FLIGHT_ANGULAR_SPEED),
            flight(10.0, 0.0),
            quick_repair(),
            wait(0.5),
            land(3.0),
        ]);
        steps
    }

    /// Whole round: setup, countdown, both rings, score and next-round countdown.
    pub fn program(&self, geometry: &FormationGeometry) -> Step {
        let inner = geometry.ring_slots(Ring::Inner);
        let outer = geometry.ring_slots(Ring::Outer);

        let mut steps = vec![
            Step::maneuver(SetCircle::default()),
            Step::maneuver(TeleportBall { position: Vector3::new(0.0, 0.0, -100.0) }),
            wait(1.0),
        ];

        for n in (1..=3).rev() {
            steps.push(Step::parallel(vec![
                Step::maneuver(DisplayText::new(self.countdown_step, n.to_string())),
                Step::scoped(outer.clone(), Step::repair(1.0, true)),
            ]));
        }

        let mut scored = vec![wait(0.5)];
        scored.extend(self.routine(true));
        steps.push(Step::parallel(vec![
            Step::scoped(inner, Step::composite(self.routine(false))),
            Step::scoped(outer, Step::scored(Step::composite(scored))),
        ]));

        steps.push(Step::maneuver(DisplayScore { duration: self.score_display }));
        for n in (1..=3).rev() {
            steps.push(Step::maneuver(DisplayText::new(1.0, format!("Next round in {n}"))));
        }
        Step::composite(steps)
    }
}

impl ScheduleGenerator for AirshowChoreography {
    fn generate(&mut self, geometry: &FormationGeometry) -> Result<Step, ScheduleError> {
        Ok(self.program(geometry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormationConfig;
    use crate::step::Schedule;

    #[test]
    fn test_program_compiles() {
        let geometry = FormationGeometry::new(FormationConfig::default());
        let step = AirshowChoreography::default().program(&geometry);
        let schedule = Schedule::compile(step).unwrap();
        assert!(schedule.len() > 100);
    }

    #[test]
    fn test_routine_lengths_match_between_rings() {
        let show = AirshowChoreography::default();
        assert_eq!(show.routine(true).len(), show.routine(false).len());
    }
}
