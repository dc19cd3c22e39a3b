//! Persisted batch settings.
//!
//! Settings live in one JSON document that callers load when a session opens
//! and save when it closes. Per-scene values such as the spawn location
//! are keyed by scene name.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use pathos_core::{
    CUSTOM_PROFILE, CombatRanges, CombatStats, Heuristic, HeuristicMode, HeuristicRecord,
    ProfileLibrary, RangeSpec, SamplerError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Upper bound on agents simulated in one wave.
pub const DEFAULT_MAX_SIMULTANEOUS: usize = 8;
/// Allowed simulation speed-up.
pub const TIME_SCALE_RANGE: (f32, f32) = (1.0, 8.0);

/// Errors raised while reading, writing, or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed settings json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid settings: {0}")]
    Invalid(&'static str),
    #[error("invalid range settings: {0}")]
    Ranges(#[from] SamplerError),
}

impl SettingsError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Parameters for one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Total agents to simulate across all waves.
    pub num_agents: usize,
    /// Simulation speed multiplier, within [`TIME_SCALE_RANGE`].
    pub time_scale: f32,
    /// Agents simulated together in one wave.
    pub max_simultaneous: usize,
    pub heuristic_mode: HeuristicMode,
    pub fixed: HeuristicRecord,
    pub ranges: RangeSpec,
    /// Profile last picked for range mode, or [`CUSTOM_PROFILE`].
    pub selected_profile: String,
    /// CSV consumed in load mode.
    pub heuristics_file: Option<PathBuf>,
    /// Combat stats given to file-loaded records.
    pub load_combat: CombatStats,
    /// Also randomise enemy and interaction-event tuning per agent.
    pub use_combat_ranges: bool,
    pub combat: CombatRanges,
    pub rng_seed: Option<u64>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            num_agents: 1,
            time_scale: 1.0,
            max_simultaneous: DEFAULT_MAX_SIMULTANEOUS,
            heuristic_mode: HeuristicMode::Fixed,
            fixed: HeuristicRecord::zeroed(
                &Heuristic::ALL,
                CombatStats {
                    accuracy: 0.0,
                    evasion: 0.0,
                },
            ),
            ranges: RangeSpec::default(),
            selected_profile: CUSTOM_PROFILE.to_string(),
            heuristics_file: None,
            load_combat: CombatStats::default(),
            use_combat_ranges: false,
            combat: CombatRanges::default(),
            rng_seed: None,
        }
    }
}

impl BatchSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        let (min_scale, max_scale) = TIME_SCALE_RANGE;
        if !(min_scale..=max_scale).contains(&self.time_scale) {
            return Err(SettingsError::Invalid("time_scale must be between 1 and 8"));
        }
        if self.max_simultaneous == 0 {
            return Err(SettingsError::Invalid("max_simultaneous must be positive"));
        }
        if self.heuristic_mode == HeuristicMode::Load && self.heuristics_file.is_none() {
            return Err(SettingsError::Invalid(
                "load mode requires a heuristics_file",
            ));
        }
        if !(0.0..=1.0).contains(&self.fixed.experience_scale) {
            return Err(SettingsError::Invalid(
                "fixed experience_scale must be between 0 and 1",
            ));
        }
        if !(0.0..=100.0).contains(&self.fixed.accuracy)
            || !(0.0..=100.0).contains(&self.fixed.evasion)
        {
            return Err(SettingsError::Invalid(
                "fixed accuracy and evasion must be between 0 and 100",
            ));
        }
        self.ranges.validate()?;
        if !self.combat.is_finite() {
            return Err(SettingsError::Invalid("combat ranges must be finite"));
        }
        Ok(())
    }
}

/// Values remembered separately for each scene.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    /// Where spawned agents are placed.
    pub start_location: [f32; 3],
}

/// Root settings document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsStore {
    pub batch: BatchSettings,
    pub scenes: BTreeMap<String, SceneSettings>,
}

impl SettingsStore {
    /// Read settings from `path`; a missing file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file; using defaults");
                return Ok(Self::default());
            }
            Err(err) => return Err(SettingsError::io(path, err)),
        };
        let store: Self = serde_json::from_slice(&bytes)?;
        info!(path = %path.display(), scenes = store.scenes.len(), "loaded settings");
        Ok(store)
    }

    /// Write settings to `path` via a temporary file and rename.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| SettingsError::io(parent, err))?;
        }
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(self)?;
        std::fs::write(&tmp, bytes).map_err(|err| SettingsError::io(&tmp, err))?;
        std::fs::rename(&tmp, path).map_err(|err| SettingsError::io(path, err))?;
        debug!(path = %path.display(), "saved settings");
        Ok(())
    }

    /// Settings for `scene`, or defaults if it has never been saved.
    #[must_use]
    pub fn scene(&self, scene: &str) -> SceneSettings {
        self.scenes.get(scene).cloned().unwrap_or_default()
    }

    pub fn scene_mut(&mut self, scene: &str) -> &mut SceneSettings {
        self.scenes.entry(scene.to_string()).or_default()
    }
}

/// Read a JSON array of agent profiles.
pub fn load_profiles(path: impl AsRef<Path>) -> Result<ProfileLibrary, SettingsError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|err| SettingsError::io(path, err))?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathos_core::FloatRange;

    #[test]
    fn defaults_are_valid() {
        BatchSettings::default().validate().expect("valid defaults");
    }

    #[test]
    fn validate_rejects_out_of_range_time_scale() {
        let settings = BatchSettings {
            time_scale: 9.0,
            ..BatchSettings::default()
        };
        assert!(matches!(settings.validate(), Err(SettingsError::Invalid(_))));
    }

    #[test]
    fn validate_requires_file_in_load_mode() {
        let settings = BatchSettings {
            heuristic_mode: HeuristicMode::Load,
            ..BatchSettings::default()
        };
        assert!(matches!(settings.validate(), Err(SettingsError::Invalid(_))));
    }

    #[test]
    fn validate_rejects_ranges_that_cannot_be_sampled() {
        let store: SettingsStore = serde_json::from_str(
            r#"{"batch":{"heuristic_mode":"range","ranges":{
                "experience":{"min":0.0,"max":1.0},
                "traits":[],
                "accuracy":{"min":-3e38,"max":3e38},
                "evasion":{"min":0.0,"max":40.0}}}}"#,
        )
        .expect("parse");
        assert!(matches!(
            store.batch.validate(),
            Err(SettingsError::Ranges(SamplerError::OutOfBounds { .. }))
        ));

        let mut settings = BatchSettings::default();
        settings.ranges.experience = FloatRange::new(0.2, 1.2);
        assert!(matches!(settings.validate(), Err(SettingsError::Ranges(_))));

        let mut settings = BatchSettings::default();
        settings.combat.enemies[0].accuracy = FloatRange::new(f32::NEG_INFINITY, 80.0);
        assert!(matches!(settings.validate(), Err(SettingsError::Invalid(_))));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let store: SettingsStore =
            serde_json::from_str(r#"{"batch":{"num_agents":12,"heuristic_mode":"range"}}"#)
                .expect("parse");
        assert_eq!(store.batch.num_agents, 12);
        assert_eq!(store.batch.heuristic_mode, HeuristicMode::Range);
        assert_eq!(store.batch.max_simultaneous, DEFAULT_MAX_SIMULTANEOUS);
        assert!(store.scenes.is_empty());
    }

    #[test]
    fn unknown_scene_reads_as_default() {
        let mut store = SettingsStore::default();
        assert_eq!(store.scene("Level1"), SceneSettings::default());
        store.scene_mut("Level1").start_location = [1.0, 2.0, 3.0];
        assert_eq!(store.scene("Level1").start_location, [1.0, 2.0, 3.0]);
    }
}
