//! Step runner driven by the in-memory sandbox.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use airshow_core::agent::{look_at, PhysicalState, PhysicsOverride};
use airshow_core::config::{AirshowConfig, FormationConfig, RunnerConfig};
use airshow_core::maneuvers::{DisplayScore, Wait};
use airshow_core::{
    AirshowChoreography, FormationGeometry, Maneuver, SandboxEnvironment, ScheduleError, Step,
    StepContext, StepFault, StepResult, StepRunner, TickOutcome,
};
use nalgebra::Vector3;

const DT: f32 = 0.125;

/// Four agents on a five-slot ring; the observer owns slot 4.
fn config() -> AirshowConfig {
    AirshowConfig {
        formation: FormationConfig::single_ring(5, 1000.0),
        runner: RunnerConfig { observer_slot: 4, fault_backoff_s: 1.0 },
        ..AirshowConfig::default()
    }
}

fn on_slot(geometry: &FormationGeometry, slot: usize) -> PhysicalState {
    let rot = geometry.rotation_for(slot);
    PhysicalState::at_rest(rot * Vector3::new(1000.0, 0.0, 17.0), look_at(rot * -Vector3::x(), Vector3::z()))
}

fn sandbox_in_formation(with_observer: bool) -> SandboxEnvironment {
    let geometry = FormationGeometry::new(config().formation);
    let mut env = SandboxEnvironment::new(4).with_dt(DT);
    for slot in 0..4 {
        if let Some(agent) = env.agent_mut(slot) {
            agent.physics = on_slot(&geometry, slot);
        }
    }
    if with_observer {
        env.add_observer(on_slot(&geometry, 4));
    }
    env
}

/// Counts generator calls; each schedule is a short scored wait.
fn counting_generator(calls: Arc<AtomicUsize>) -> impl FnMut(&FormationGeometry) -> Result<Step, ScheduleError> + Send {
    move |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Step::scored(Step::maneuver(Wait::new(0.25))))
    }
}

/// Writes an override for every agent while claiming it writes none.
#[derive(Debug)]
struct Grab;

impl Maneuver for Grab {
    fn name(&self) -> &'static str {
        "grab"
    }

    fn perform(&self, ctx: &mut StepContext<'_>, _t: f32) -> Result<StepResult, StepFault> {
        let overrides: BTreeMap<_, _> =
            ctx.agents.iter().map(|a| (a.id, PhysicsOverride::default())).collect();
        Ok(StepResult::pending().with_overrides(overrides))
    }
}

#[test]
fn test_perfect_observer_scores_1000_and_round_regenerates() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut runner = StepRunner::new(config(), counting_generator(calls.clone()));
    let mut env = sandbox_in_formation(true);

    let mut scores = Vec::new();
    for _ in 0..12 {
        let report = runner.tick(&mut env);
        assert!(matches!(report.outcome, TickOutcome::Advanced { .. }));
        assert_eq!(report.controls_sent, 4);
        scores.extend(report.round_score);
        env.advance();
    }

    // wait 0.25 finishes on its fourth tick (0.375 > 0.25)
    assert_eq!(scores, vec![1000, 1000, 1000]);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(runner.scorer().frames(), 4);

    runner.tick(&mut env);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(runner.scorer().frames(), 1, "scorer restarts with the fresh round");
}

#[test]
fn test_grades_are_annotated_at_the_observer() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut runner = StepRunner::new(config(), counting_generator(calls));
    let mut env = sandbox_in_formation(true);

    let report = runner.tick(&mut env);
    let grade = report.annotations.first().expect("grade annotation");
    assert_eq!(grade.text, "Perfect");
    assert!(grade.anchor.is_some());
}

#[test]
fn test_missing_observer_is_not_an_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut runner = StepRunner::new(config(), counting_generator(calls));
    let mut env = sandbox_in_formation(false);

    let mut scores = Vec::new();
    for _ in 0..4 {
        let report = runner.tick(&mut env);
        assert!(report.annotations.is_empty());
        scores.extend(report.round_score);
        env.advance();
    }
    assert_eq!(scores, vec![0]);
}

#[test]
fn test_observer_may_join_mid_round() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut runner = StepRunner::new(config(), counting_generator(calls));
    let mut env = sandbox_in_formation(false);

    runner.tick(&mut env);
    env.advance();
    let geometry = FormationGeometry::new(config().formation);
    env.add_observer(on_slot(&geometry, 4));
    let report = runner.tick(&mut env);
    assert_eq!(report.annotations.len(), 1);
    assert_eq!(runner.scorer().frames(), 1);
}

#[test]
fn test_evaluation_fault_backs_off_without_actuation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut runner = StepRunner::new(config(), move |_: &FormationGeometry| -> Result<Step, ScheduleError> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Step::parallel(vec![Step::maneuver(Grab), Step::maneuver(Grab)]))
    });
    let mut env = sandbox_in_formation(false);

    let first = runner.tick(&mut env);
    assert!(matches!(first.outcome, TickOutcome::EvaluationFault(_)));
    assert_eq!(env.override_batches(), 0);
    assert_eq!(env.sends(), 0);

    // 1.0 s backoff at 0.125 s per tick
    for _ in 0..7 {
        env.advance();
        assert_eq!(runner.tick(&mut env).outcome, TickOutcome::BackingOff);
    }
    env.advance();
    assert!(matches!(runner.tick(&mut env).outcome, TickOutcome::EvaluationFault(_)));

    assert_eq!(env.sends(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "faulting schedule is kept, not regenerated");
}

#[test]
fn test_faulted_tick_does_not_count_toward_score() {
    let mut runner = StepRunner::new(config(), |_: &FormationGeometry| -> Result<Step, ScheduleError> {
        Ok(Step::parallel(vec![
            Step::scored(Step::maneuver(Wait::new(100.0))),
            Step::maneuver(Grab),
            Step::maneuver(Grab),
        ]))
    });
    let mut env = sandbox_in_formation(true);

    let report = runner.tick(&mut env);
    assert!(matches!(report.outcome, TickOutcome::EvaluationFault(_)));
    assert_eq!(runner.scorer().frames(), 0);
}

#[test]
fn test_generation_failure_is_retried() {
    let mut attempts = 0;
    let mut runner = StepRunner::new(config(), move |_: &FormationGeometry| {
        attempts += 1;
        if attempts == 1 {
            Err(ScheduleError::Generation("warming up".into()))
        } else {
            Ok(Step::composite(vec![]))
        }
    });
    let mut env = sandbox_in_formation(false);

    let first = runner.tick(&mut env);
    assert_eq!(first.outcome, TickOutcome::GenerationFailed(ScheduleError::Generation("warming up".into())));
    let second = runner.tick(&mut env);
    assert_eq!(second.outcome, TickOutcome::GenerationFailed(ScheduleError::EmptyComposite));
    assert_eq!(env.sends(), 0);

    runner.replace_generator(|_: &FormationGeometry| -> Result<Step, ScheduleError> {
        Ok(Step::maneuver(DisplayScore { duration: 1.0 }))
    });
    let third = runner.tick(&mut env);
    assert_eq!(third.outcome, TickOutcome::Advanced { finished: false });
    assert_eq!(third.annotations[0].text, "Score: 0");
}

#[test]
fn test_snapshot_failure_skips_tick() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut runner = StepRunner::new(config(), counting_generator(calls.clone()));
    let mut env = sandbox_in_formation(false);
    env.fail_snapshots(1);

    assert_eq!(runner.tick(&mut env).outcome, TickOutcome::NoSnapshot);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(matches!(runner.tick(&mut env).outcome, TickOutcome::Advanced { .. }));
}

#[test]
fn test_roster_skips_observer_slot() {
    let calls = Arc::new(AtomicUsize::new(0));
    let config = AirshowConfig {
        runner: RunnerConfig { observer_slot: 1, fault_backoff_s: 1.0 },
        ..config()
    };
    let mut runner = StepRunner::new(config, counting_generator(calls));
    let mut env = sandbox_in_formation(false);
    runner.tick(&mut env);

    let slots: Vec<_> = runner.agents().iter().map(|a| (a.id, a.slot)).collect();
    assert_eq!(slots, vec![(0, 0), (1, 2), (2, 3), (3, 4)]);
}

#[test]
fn test_full_choreography_runs_without_faults() {
    let mut runner = StepRunner::new(AirshowConfig::default(), AirshowChoreography::default());
    let mut env = SandboxEnvironment::new(63).with_dt(1.0 / 30.0).with_jitter(11, 1.0);
    env.add_observer(PhysicalState::default());

    let mut overrides = 0;
    for _ in 0..600 {
        let report = runner.tick(&mut env);
        assert!(
            matches!(report.outcome, TickOutcome::Advanced { finished: false }),
            "unexpected outcome {:?} at {}",
            report.outcome,
            report.time
        );
        assert_eq!(report.controls_sent, 63);
        overrides += report.overrides;
        env.advance();
    }
    assert!(overrides >= 64, "circle setup and countdown repairs write overrides");
    assert!(runner.scorer().frames() > 0, "outer ring is scored once the airshow starts");
}
