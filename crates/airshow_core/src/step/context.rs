//! Shared per-tick evaluation context.

use crate::agent::Agent;
use crate::config::AirshowConfig;
use crate::controller::ManeuverController;
use crate::formation::FormationGeometry;
use crate::scorer::Scorer;

use super::SlotSet;

/// Everything a step may read or write during one tick.
///
/// `agents` holds only the agents in the current scope; leaf steps write their
/// pending controls through it. The observer is never actuated.
pub struct StepContext<'a> {
    pub agents: Vec<&'a mut Agent>,
    pub observer: Option<&'a Agent>,
    pub geometry: &'a FormationGeometry,
    pub controller: &'a dyn ManeuverController,
    pub scorer: &'a mut Scorer,
    pub config: &'a AirshowConfig,
}

impl<'a> StepContext<'a> {
    /// Narrow the agent list to `slots`; everything else is shared.
    pub fn scoped(&mut self, slots: &SlotSet) -> StepContext<'_> {
        StepContext {
            agents: self
                .agents
                .iter_mut()
                .filter(|agent| slots.contains(agent.slot))
                .map(|agent| &mut **agent)
                .collect(),
            observer: self.observer,
            geometry: self.geometry,
            controller: self.controller,
            scorer: &mut *self.scorer,
            config: self.config,
        }
    }

    pub fn agent_refs(&self) -> Vec<&Agent> {
        self.agents.iter().map(|agent| &**agent).collect()
    }
}
