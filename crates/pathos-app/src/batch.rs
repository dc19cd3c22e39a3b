//! Batch run state machine.
//!
//! A run cycles `Idle → Spawning → Assigning → Running → Despawning → Idle`,
//! simulating at most `max_simultaneous` agents per wave until the requested
//! number of agents has been simulated or the user stops it. The pool of
//! spawned agents is reused between waves and only resized when the
//! remaining count drops below it.

use std::time::{SystemTime, UNIX_EPOCH};

use pathos_core::{
    AgentProfile, CombatProfile, CombatRanges, Heuristic, HeuristicMode, HeuristicRecord,
    HeuristicSampler, HeuristicTarget, SamplerError, assign,
};
use pathos_storage::{BatchSettings, HeuristicsError, SettingsError, load_heuristics};
use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::host::{AgentHost, AgentKey, CycleOutcome};

/// Errors raised before a batch run can start.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("load mode needs a valid heuristics file with at least one agent profile: {0}")]
    Heuristics(#[from] HeuristicsError),
    #[error(transparent)]
    Sampler(#[from] SamplerError),
}

/// Where a batch run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPhase {
    Idle,
    Spawning,
    Assigning,
    Running,
    Despawning,
}

/// Run-wide parameters fixed at start.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    pub num_agents: usize,
    pub max_simultaneous: usize,
    pub time_scale: f32,
    /// Combat tuning sampled per agent, when enabled.
    pub combat: Option<CombatRanges>,
}

impl BatchConfig {
    #[must_use]
    pub fn from_settings(settings: &BatchSettings) -> Self {
        Self {
            num_agents: settings.num_agents,
            max_simultaneous: settings.max_simultaneous.max(1),
            time_scale: settings.time_scale,
            combat: settings
                .use_combat_ranges
                .then(|| settings.combat.clone()),
        }
    }
}

/// One-off changes layered over stored settings for a single run.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub num_agents: Option<usize>,
    pub rng_seed: Option<u64>,
    pub profile: Option<AgentProfile>,
}

impl RunOverrides {
    /// Settings for this run; `stored` is left as it was.
    #[must_use]
    pub fn apply(&self, stored: &BatchSettings) -> BatchSettings {
        let mut settings = stored.clone();
        if let Some(num_agents) = self.num_agents {
            settings.num_agents = num_agents;
        }
        if let Some(seed) = self.rng_seed {
            settings.rng_seed = Some(seed);
        }
        if let Some(profile) = &self.profile {
            settings.ranges.apply_profile(profile);
        }
        settings
    }
}

/// Build the sampler matching the configured heuristic mode.
///
/// Load mode reads the heuristics file here, so a run never starts without
/// at least one record.
pub fn sampler_from_settings(
    settings: &BatchSettings,
    heuristics: &[Heuristic],
) -> Result<HeuristicSampler, BatchError> {
    let sampler = match settings.heuristic_mode {
        HeuristicMode::Fixed => HeuristicSampler::fixed(settings.fixed.clone()),
        HeuristicMode::Range => HeuristicSampler::range(settings.ranges.clone()),
        HeuristicMode::Load => {
            let path = settings
                .heuristics_file
                .as_deref()
                .ok_or(SettingsError::Invalid("load mode requires a heuristics_file"))?;
            let loaded = load_heuristics(path, heuristics, settings.load_combat)?;
            HeuristicSampler::load(loaded.records)?
        }
    };
    Ok(sampler)
}

/// One agent's assignment within a wave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub agent: String,
    pub record: HeuristicRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combat: Option<CombatProfile>,
}

/// Everything assigned before one simulation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveReport {
    pub index: usize,
    pub assignments: Vec<Assignment>,
    pub outcome: Option<CycleOutcome>,
}

/// Summary of a finished (or stopped) batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Shared log directory name for every agent in the run.
    pub log_directory: String,
    pub mode: HeuristicMode,
    pub requested_agents: usize,
    pub agents_simulated: usize,
    pub lost_references: usize,
    pub aborted: bool,
    pub waves: Vec<WaveReport>,
}

/// Millisecond wall-clock timestamp.
pub fn now_ms() -> u64 {
    let d = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    d.as_millis() as u64
}

/// Drives one batch run against an [`AgentHost`].
#[derive(Debug)]
pub struct BatchRun {
    config: BatchConfig,
    sampler: HeuristicSampler,
    rng: SmallRng,
    phase: BatchPhase,
    started: bool,
    finished: bool,
    stop_requested: bool,
    agents_left: usize,
    pool: Vec<AgentKey>,
    spawn_counter: usize,
    wave: Option<WaveReport>,
    report: BatchReport,
}

impl BatchRun {
    #[must_use]
    pub fn new(config: BatchConfig, sampler: HeuristicSampler, rng: SmallRng) -> Self {
        let report = BatchReport {
            log_directory: format!("Batch-{}", now_ms()),
            mode: sampler.mode(),
            requested_agents: config.num_agents,
            agents_simulated: 0,
            lost_references: 0,
            aborted: false,
            waves: Vec::new(),
        };
        Self {
            agents_left: config.num_agents,
            config,
            sampler,
            rng,
            phase: BatchPhase::Idle,
            started: false,
            finished: false,
            stop_requested: false,
            pool: Vec::new(),
            spawn_counter: 0,
            wave: None,
            report,
        }
    }

    /// Validate settings and prepare a run over every known heuristic.
    pub fn from_settings(settings: &BatchSettings) -> Result<Self, BatchError> {
        settings.validate()?;
        let sampler = sampler_from_settings(settings, &Heuristic::ALL)?;
        let rng = match settings.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        Ok(Self::new(BatchConfig::from_settings(settings), sampler, rng))
    }

    #[must_use]
    pub fn phase(&self) -> BatchPhase {
        self.phase
    }

    #[must_use]
    pub fn agents_left(&self) -> usize {
        self.agents_left
    }

    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[must_use]
    pub fn report(&self) -> &BatchReport {
        &self.report
    }

    #[must_use]
    pub fn into_report(self) -> BatchReport {
        self.report
    }

    /// Ask the run to wind down; spawned agents are cleaned up on the next
    /// [`advance`](Self::advance).
    pub fn stop(&mut self) {
        if self.started && !self.finished {
            self.stop_requested = true;
        }
    }

    /// Perform the work of the current phase and move to the next one.
    pub fn advance<H: AgentHost>(&mut self, host: &mut H) -> BatchPhase {
        self.phase = match self.phase {
            BatchPhase::Idle => self.start(host),
            BatchPhase::Spawning => self.spawn(host),
            BatchPhase::Assigning => self.assign_wave(host),
            BatchPhase::Running => self.run_wave(host),
            BatchPhase::Despawning => self.despawn(host),
        };
        self.phase
    }

    /// Advance until the run returns to idle.
    pub fn run_to_completion<H: AgentHost>(mut self, host: &mut H) -> BatchReport {
        while !self.finished {
            self.advance(host);
        }
        self.report
    }

    fn start<H: AgentHost>(&mut self, host: &mut H) -> BatchPhase {
        if self.started {
            return BatchPhase::Idle;
        }
        self.started = true;
        info!(
            agents = self.config.num_agents,
            max_simultaneous = self.config.max_simultaneous,
            mode = self.sampler.mode().label(),
            log_directory = %self.report.log_directory,
            "starting batch run"
        );
        host.set_scene_agents_active(false);
        if self.agents_left == 0 {
            BatchPhase::Despawning
        } else {
            BatchPhase::Spawning
        }
    }

    fn spawn<H: AgentHost>(&mut self, host: &mut H) -> BatchPhase {
        if self.stop_requested {
            return BatchPhase::Despawning;
        }
        let target = self.config.max_simultaneous.min(self.agents_left);
        while self.pool.len() < target {
            let name = format!("Temporary Batch Agent {}", self.spawn_counter);
            self.spawn_counter += 1;
            self.pool.push(host.spawn_agent(&name));
        }
        while self.pool.len() > target {
            if let Some(key) = self.pool.pop() {
                host.despawn_agent(key);
            }
        }
        debug!(pool = self.pool.len(), agents_left = self.agents_left, "wave pool ready");
        BatchPhase::Assigning
    }

    fn assign_wave<H: AgentHost>(&mut self, host: &mut H) -> BatchPhase {
        if self.stop_requested {
            return BatchPhase::Despawning;
        }
        let mut wave = WaveReport {
            index: self.report.waves.len(),
            assignments: Vec::with_capacity(self.pool.len()),
            outcome: None,
        };
        let mut lost = Vec::new();
        for (slot, &key) in self.pool.iter().enumerate() {
            let Some(agent) = host.agent_mut(key) else {
                error!(
                    slot,
                    "instantiated agent reference lost; heuristic values will not be updated"
                );
                lost.push(key);
                continue;
            };
            let record = self.sampler.sample(&mut self.rng);
            assign(agent, &record);
            let combat = self
                .config
                .combat
                .as_ref()
                .map(|ranges| ranges.sample(&mut self.rng));
            if let Some(profile) = &combat {
                agent.set_combat_profile(profile);
            }
            wave.assignments.push(Assignment {
                agent: format!("slot-{slot}"),
                record,
                combat,
            });
        }
        if !lost.is_empty() {
            // Lost slots are refilled by the next spawn.
            self.report.lost_references += lost.len();
            self.pool.retain(|key| !lost.contains(key));
        }
        self.agents_left = self.agents_left.saturating_sub(wave.assignments.len());
        self.wave = Some(wave);
        BatchPhase::Running
    }

    fn run_wave<H: AgentHost>(&mut self, host: &mut H) -> BatchPhase {
        let outcome = if self.stop_requested {
            CycleOutcome::Aborted
        } else {
            host.run_cycle(self.config.time_scale)
        };
        if let Some(mut wave) = self.wave.take() {
            wave.outcome = Some(outcome);
            if outcome == CycleOutcome::Completed {
                self.report.agents_simulated += wave.assignments.len();
            }
            self.report.waves.push(wave);
        }
        match outcome {
            CycleOutcome::Aborted => {
                warn!(agents_left = self.agents_left, "batch run stopped early");
                self.report.aborted = true;
                BatchPhase::Despawning
            }
            CycleOutcome::Completed if self.agents_left == 0 => BatchPhase::Despawning,
            CycleOutcome::Completed => BatchPhase::Spawning,
        }
    }

    fn despawn<H: AgentHost>(&mut self, host: &mut H) -> BatchPhase {
        for key in self.pool.drain(..) {
            host.despawn_agent(key);
        }
        host.set_scene_agents_active(true);
        if self.stop_requested {
            self.report.aborted = true;
        }
        self.agents_left = 0;
        self.finished = true;
        info!(
            simulated = self.report.agents_simulated,
            waves = self.report.waves.len(),
            aborted = self.report.aborted,
            "batch run finished"
        );
        BatchPhase::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HeadlessHost;
    use pathos_core::{CombatStats, RangeSpec};

    fn run(num_agents: usize, max_simultaneous: usize) -> BatchRun {
        BatchRun::new(
            BatchConfig {
                num_agents,
                max_simultaneous,
                time_scale: 1.0,
                combat: None,
            },
            HeuristicSampler::range(RangeSpec::default()),
            SmallRng::seed_from_u64(17),
        )
    }

    #[test]
    fn phases_follow_the_documented_cycle() {
        let mut host = HeadlessHost::new([0.0; 3]);
        let mut batch = run(3, 8);
        let phases: Vec<_> = (0..5).map(|_| batch.advance(&mut host)).collect();
        assert_eq!(
            phases,
            vec![
                BatchPhase::Spawning,
                BatchPhase::Assigning,
                BatchPhase::Running,
                BatchPhase::Despawning,
                BatchPhase::Idle,
            ]
        );
        assert!(batch.is_finished());
        assert_eq!(batch.advance(&mut host), BatchPhase::Idle);
    }

    #[test]
    fn zero_agents_finishes_without_spawning() {
        let mut host = HeadlessHost::new([0.0; 3]);
        let report = run(0, 8).run_to_completion(&mut host);
        assert!(report.waves.is_empty());
        assert_eq!(host.spawned_total(), 0);
    }

    #[test]
    fn pool_shrinks_for_the_final_wave() {
        let mut host = HeadlessHost::new([0.0; 3]);
        let mut batch = run(5, 2);
        let mut pool_sizes = Vec::new();
        while !batch.is_finished() {
            if batch.advance(&mut host) == BatchPhase::Assigning {
                pool_sizes.push(batch.pool_size());
            }
        }
        assert_eq!(pool_sizes, vec![2, 2, 1]);
        // The pool is reused, so only two agents were ever spawned.
        assert_eq!(host.spawned_total(), 2);
    }

    #[test]
    fn stop_request_cleans_up_before_next_cycle() {
        let mut host = HeadlessHost::new([0.0; 3]).with_scene_agents(["Player"]);
        let mut batch = run(10, 4);
        batch.advance(&mut host); // spawning
        batch.advance(&mut host); // assigning
        assert!(!host.scene_agents()[0].active);
        batch.stop();
        assert_eq!(batch.advance(&mut host), BatchPhase::Despawning);
        assert_eq!(batch.advance(&mut host), BatchPhase::Idle);
        let report = batch.into_report();
        assert!(report.aborted);
        assert_eq!(report.agents_simulated, 0);
        assert_eq!(host.live_agents(), 0);
        assert!(host.scene_agents()[0].active);
        assert!(host.cycles().is_empty());
    }

    #[test]
    fn lost_references_are_counted_and_skipped() {
        let mut host = HeadlessHost::new([0.0; 3]);
        let records = vec![
            HeuristicRecord::zeroed(&Heuristic::ALL, CombatStats::default());
            2
        ];
        let mut batch = BatchRun::new(
            BatchConfig {
                num_agents: 3,
                max_simultaneous: 3,
                time_scale: 1.0,
                combat: None,
            },
            HeuristicSampler::load(records).expect("sampler"),
            SmallRng::seed_from_u64(1),
        );
        batch.advance(&mut host);
        batch.advance(&mut host);
        let victim = host.agent_keys().next().expect("agent");
        host.despawn_agent(victim);
        batch.advance(&mut host);

        let report = batch.run_to_completion(&mut host);
        assert_eq!(report.lost_references, 1);
        assert_eq!(report.waves[0].assignments.len(), 2);
        assert_eq!(report.agents_simulated, 3);
    }

    #[test]
    fn lost_agents_are_replaced_in_later_waves() {
        let mut host = HeadlessHost::new([0.0; 3]);
        let mut batch = run(6, 3);
        batch.advance(&mut host); // spawning
        batch.advance(&mut host); // assigning
        let victim = host.agent_keys().next().expect("agent");
        host.despawn_agent(victim);

        let report = batch.run_to_completion(&mut host);

        let wave_sizes: Vec<_> = report
            .waves
            .iter()
            .map(|wave| wave.assignments.len())
            .collect();
        assert_eq!(wave_sizes, vec![2, 3, 1]);
        assert_eq!(report.lost_references, 1);
        assert_eq!(report.agents_simulated, 6);
        let simulated_by_host: usize = host.cycles().iter().map(Vec::len).sum();
        assert_eq!(simulated_by_host, report.agents_simulated);
        assert_eq!(host.spawned_total(), 4);
        assert_eq!(host.live_agents(), 0);
    }
}
