//! Step runner
//!
//! Drives a schedule from the environment clock, one tick per call:
//!
//! 1. no active schedule → generate one, reset the scorer, restart the epoch
//! 2. refresh the roster (and the observer, if connected) from the snapshot
//! 3. evaluate at `env_time - epoch_start`
//! 4. write overrides in one batch, drop the schedule if it finished
//! 5. send every agent's controls
//!
//! A tick never panics. Generation failures are retried next tick; an
//! evaluation fault discards the tick and withholds actuation for
//! `fault_backoff_s` of environment time.

use std::collections::BTreeSet;

use tracing::{debug, error, info, warn};

use crate::agent::{Agent, AgentId};
use crate::config::AirshowConfig;
use crate::controller::{ManeuverController, ProportionalController};
use crate::environment::Environment;
use crate::error::ScheduleError;
use crate::formation::FormationGeometry;
use crate::scorer::Scorer;
use crate::step::{ActiveSchedule, Annotation, Schedule, Step, StepContext};

/// Builds a fresh step tree every time the previous one finishes.
pub trait ScheduleGenerator: Send {
    fn generate(&mut self, geometry: &FormationGeometry) -> Result<Step, ScheduleError>;
}

impl<F> ScheduleGenerator for F
where
    F: FnMut(&FormationGeometry) -> Result<Step, ScheduleError> + Send,
{
    fn generate(&mut self, geometry: &FormationGeometry) -> Result<Step, ScheduleError> {
        (*self)(geometry)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Schedule evaluated; effects applied and controls sent
    Advanced { finished: bool },
    /// Generator or compiler rejected the schedule; retried next tick
    GenerationFailed(ScheduleError),
    /// Evaluation faulted; nothing applied or sent
    EvaluationFault(String),
    /// Still inside the post-fault backoff window
    BackingOff,
    /// Environment could not be read
    NoSnapshot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub time: f32,
    /// Seconds since the active schedule started
    pub elapsed: f32,
    pub outcome: TickOutcome,
    pub annotations: Vec<Annotation>,
    pub overrides: usize,
    pub controls_sent: usize,
    /// Observer score, set on the tick a schedule finishes
    pub round_score: Option<i32>,
}

impl TickReport {
    fn idle(time: f32, outcome: TickOutcome) -> Self {
        Self {
            time,
            elapsed: 0.0,
            outcome,
            annotations: Vec::new(),
            overrides: 0,
            controls_sent: 0,
            round_score: None,
        }
    }
}

/// Autonomous agents take slots in id order, skipping the observer's slot.
pub fn assign_slots(ids: impl IntoIterator<Item = AgentId>, observer_slot: usize) -> Vec<(AgentId, usize)> {
    let mut ids: Vec<_> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();
    ids.into_iter()
        .enumerate()
        .map(|(i, id)| (id, if i < observer_slot { i } else { i + 1 }))
        .collect()
}

pub struct StepRunner {
    config: AirshowConfig,
    geometry: FormationGeometry,
    controller: Box<dyn ManeuverController>,
    generator: Box<dyn ScheduleGenerator>,
    active: Option<ActiveSchedule>,
    epoch_start: f32,
    roster: Vec<Agent>,
    scorer: Scorer,
    backoff_until: Option<f32>,
}

impl std::fmt::Debug for StepRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRunner")
            .field("config", &self.config)
            .field("active", &self.active.is_some())
            .field("epoch_start", &self.epoch_start)
            .field("roster", &self.roster.len())
            .field("scorer", &self.scorer)
            .field("backoff_until", &self.backoff_until)
            .finish()
    }
}

impl StepRunner {
    pub fn new(config: AirshowConfig, generator: impl ScheduleGenerator + 'static) -> Self {
        Self::with_controller(config, generator, ProportionalController::default())
    }

    pub fn with_controller(
        config: AirshowConfig,
        generator: impl ScheduleGenerator + 'static,
        controller: impl ManeuverController + 'static,
    ) -> Self {
        if let Err(e) = config.validate() {
            warn!(error = %e, "runner built from an invalid config");
        }
        let geometry = FormationGeometry::new(config.formation.clone());
        let scorer = Scorer::new(&config.scoring);
        Self {
            config,
            geometry,
            controller: Box::new(controller),
            generator: Box::new(generator),
            active: None,
            epoch_start: 0.0,
            roster: Vec::new(),
            scorer,
            backoff_until: None,
        }
    }

    pub fn config(&self) -> &AirshowConfig {
        &self.config
    }

    pub fn geometry(&self) -> &FormationGeometry {
        &self.geometry
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    pub fn agents(&self) -> &[Agent] {
        &self.roster
    }

    pub fn active(&self) -> Option<&ActiveSchedule> {
        self.active.as_ref()
    }

    /// Swap the generator; takes effect when the next schedule is built.
    pub fn replace_generator(&mut self, generator: impl ScheduleGenerator + 'static) {
        self.generator = Box::new(generator);
    }

    /// Drop the active schedule and roster; both are rebuilt on the next tick.
    pub fn reset(&mut self) {
        self.active = None;
        self.roster.clear();
        self.backoff_until = None;
    }

    fn install(&mut self, time: f32) -> Result<ActiveSchedule, ScheduleError> {
        let schedule = Schedule::compile(self.generator.generate(&self.geometry)?)?;
        debug!(nodes = schedule.len(), time, "schedule installed");
        self.scorer.reset();
        self.epoch_start = time;
        Ok(schedule.start())
    }

    pub fn tick<E: Environment + ?Sized>(&mut self, env: &mut E) -> TickReport {
        let snapshot = match env.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "environment snapshot unavailable");
                return TickReport::idle(self.epoch_start, TickOutcome::NoSnapshot);
            }
        };
        let time = snapshot.time;

        if let Some(until) = self.backoff_until {
            if time < until {
                return TickReport::idle(time, TickOutcome::BackingOff);
            }
            self.backoff_until = None;
        }

        let mut active = match self.active.take() {
            Some(active) => active,
            None => match self.install(time) {
                Ok(active) => active,
                Err(e) => {
                    error!(error = %e, "schedule generation failed");
                    return TickReport::idle(time, TickOutcome::GenerationFailed(e));
                }
            },
        };

        if self.roster.is_empty() {
            let slots = assign_slots(snapshot.autonomous().map(|a| a.id), self.config.runner.observer_slot);
            self.roster = slots
                .into_iter()
                .filter_map(|(id, slot)| snapshot.agent(id).map(|s| Agent::from_snapshot(s, slot, time)))
                .collect();
            debug!(agents = self.roster.len(), "roster built");
            if self.roster.len() > self.config.agent_capacity() {
                warn!(
                    agents = self.roster.len(),
                    capacity = self.config.agent_capacity(),
                    "more agents than formation slots, extra slots wrap onto occupied angles"
                );
            }
        }

        let mut missing = BTreeSet::new();
        for agent in &mut self.roster {
            match snapshot.agent(agent.id) {
                Some(live) => agent.refresh(live, time),
                None => {
                    warn!(agent = agent.id, "roster agent missing from snapshot");
                    missing.insert(agent.id);
                }
            }
        }
        let observer = snapshot
            .observer()
            .map(|o| Agent::from_snapshot(o, self.config.runner.observer_slot, time));

        let elapsed = time - self.epoch_start;
        let scorer_before = self.scorer.clone();

        let mut ctx = StepContext {
            agents: self.roster.iter_mut().filter(|a| !missing.contains(&a.id)).collect(),
            observer: observer.as_ref(),
            geometry: &self.geometry,
            controller: self.controller.as_ref(),
            scorer: &mut self.scorer,
            config: &self.config,
        };
        let result = match active.evaluate(&mut ctx, elapsed) {
            Ok(result) => result,
            Err(fault) => {
                warn!(error = %fault, elapsed, "step evaluation faulted, backing off");
                // the tick is discarded, so is anything it scored
                self.scorer = scorer_before;
                self.backoff_until = Some(time + self.config.runner.fault_backoff_s);
                self.active = Some(active);
                let mut report = TickReport::idle(time, TickOutcome::EvaluationFault(fault.to_string()));
                report.elapsed = elapsed;
                return report;
            }
        };

        let overrides = result.overrides.len();
        if result.has_overrides() {
            if let Err(e) = env.apply_overrides(&result.overrides, result.global_override.as_ref()) {
                warn!(error = %e, recoverable = e.is_recoverable(), "override write rejected");
            }
        }

        let mut round_score = None;
        if result.finished {
            let score = self.scorer.score();
            info!(score, frames = self.scorer.frames(), elapsed, "round finished");
            round_score = Some(score);
        } else {
            self.active = Some(active);
        }

        let mut controls_sent = 0;
        for agent in self.roster.iter().filter(|a| !missing.contains(&a.id)) {
            match env.send(agent.id, &agent.controls.clamped()) {
                Ok(()) => controls_sent += 1,
                Err(e) => warn!(agent = agent.id, error = %e, "actuation failed"),
            }
        }

        TickReport {
            time,
            elapsed,
            outcome: TickOutcome::Advanced { finished: result.finished },
            annotations: result.annotations,
            overrides,
            controls_sent,
            round_score,
        }
    }
}
