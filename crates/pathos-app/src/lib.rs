//! Headless batch-run plumbing for PathOS playtesting agents.

pub mod batch;
pub mod host;

pub use batch::{
    Assignment, BatchConfig, BatchError, BatchPhase, BatchReport, BatchRun, RunOverrides,
    WaveReport, sampler_from_settings,
};
pub use host::{AgentHost, AgentKey, CycleOutcome, HeadlessHost, SceneAgent};
