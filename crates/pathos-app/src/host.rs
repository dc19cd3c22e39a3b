//! The seam between a batch run and whatever actually simulates agents.

use pathos_core::{AgentTraits, HeuristicTarget};
use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use tracing::debug;

new_key_type! {
    /// Stable handle for batch-spawned agents backed by a generational slot map.
    pub struct AgentKey;
}

/// How a simulation cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Every agent reached the end of the level or timed out.
    Completed,
    /// The user stopped the simulation early.
    Aborted,
}

/// Spawns, exposes, and simulates agents on behalf of a batch run.
pub trait AgentHost {
    type Agent: HeuristicTarget + ?Sized;

    /// Instantiate one agent at the scene's start location.
    fn spawn_agent(&mut self, name: &str) -> AgentKey;

    /// Resolve a handle; `None` when the host has lost the agent.
    fn agent_mut(&mut self, key: AgentKey) -> Option<&mut Self::Agent>;

    fn despawn_agent(&mut self, key: AgentKey);

    /// Show or hide agents that were already placed in the scene.
    fn set_scene_agents_active(&mut self, active: bool);

    /// Simulate every live agent once, blocking until the cycle ends.
    fn run_cycle(&mut self, time_scale: f32) -> CycleOutcome;
}

/// Agent placed in the scene before the batch started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneAgent {
    pub name: String,
    pub active: bool,
}

/// In-memory host that records what each cycle would have simulated.
#[derive(Debug, Default)]
pub struct HeadlessHost {
    agents: SlotMap<AgentKey, AgentTraits>,
    start_location: [f32; 3],
    scene_agents: Vec<SceneAgent>,
    cycles: Vec<Vec<AgentTraits>>,
    abort_after: Option<usize>,
    spawned_total: usize,
}

impl HeadlessHost {
    #[must_use]
    pub fn new(start_location: [f32; 3]) -> Self {
        Self {
            start_location,
            ..Self::default()
        }
    }

    /// Pre-existing agents that must be hidden during the run.
    #[must_use]
    pub fn with_scene_agents<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scene_agents = names
            .into_iter()
            .map(|name| SceneAgent {
                name: name.into(),
                active: true,
            })
            .collect();
        self
    }

    /// Report [`CycleOutcome::Aborted`] from the `cycles`-th cycle onward.
    #[must_use]
    pub fn with_abort_after(mut self, cycles: usize) -> Self {
        self.abort_after = Some(cycles);
        self
    }

    #[must_use]
    pub fn live_agents(&self) -> usize {
        self.agents.len()
    }

    pub fn agent_keys(&self) -> impl Iterator<Item = AgentKey> + '_ {
        self.agents.keys()
    }

    #[must_use]
    pub fn scene_agents(&self) -> &[SceneAgent] {
        &self.scene_agents
    }

    /// Agent snapshots taken at the start of each simulated cycle.
    #[must_use]
    pub fn cycles(&self) -> &[Vec<AgentTraits>] {
        &self.cycles
    }

    #[must_use]
    pub fn spawned_total(&self) -> usize {
        self.spawned_total
    }
}

impl AgentHost for HeadlessHost {
    type Agent = AgentTraits;

    fn spawn_agent(&mut self, name: &str) -> AgentKey {
        let key = self.agents.insert(AgentTraits::default());
        self.spawned_total += 1;
        debug!(name, location = ?self.start_location, "spawned agent");
        key
    }

    fn agent_mut(&mut self, key: AgentKey) -> Option<&mut AgentTraits> {
        self.agents.get_mut(key)
    }

    fn despawn_agent(&mut self, key: AgentKey) {
        if self.agents.remove(key).is_some() {
            debug!(?key, "despawned agent");
        }
    }

    fn set_scene_agents_active(&mut self, active: bool) {
        for agent in &mut self.scene_agents {
            agent.active = active;
        }
    }

    fn run_cycle(&mut self, time_scale: f32) -> CycleOutcome {
        if self
            .abort_after
            .is_some_and(|limit| self.cycles.len() >= limit)
        {
            debug!(cycle = self.cycles.len(), "cycle aborted");
            return CycleOutcome::Aborted;
        }
        self.cycles.push(self.agents.values().cloned().collect());
        debug!(
            cycle = self.cycles.len(),
            agents = self.agents.len(),
            time_scale,
            "simulated cycle"
        );
        CycleOutcome::Completed
    }
}
