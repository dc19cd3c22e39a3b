//! Writing heuristic records onto agents.

use serde::{Deserialize, Serialize};

use crate::{CombatProfile, CombatStats, Heuristic, HeuristicRecord, HeuristicScale};

/// Agent state that a batch run may overwrite.
///
/// Implementors must accept every [`Heuristic`]; the identifier set is shared
/// with the loader, so assignment never has to deal with unknown names.
pub trait HeuristicTarget {
    fn set_experience_scale(&mut self, value: f32);
    fn set_heuristic(&mut self, heuristic: Heuristic, scale: f32);
    fn set_accuracy(&mut self, value: f32);
    fn set_evasion(&mut self, value: f32);
    fn set_combat_profile(&mut self, profile: &CombatProfile);
}

/// Overwrite every field carried by `record` onto `target`.
///
/// Repeated calls simply replace the previous values.
pub fn assign<T: HeuristicTarget + ?Sized>(target: &mut T, record: &HeuristicRecord) {
    target.set_experience_scale(record.experience_scale);
    for entry in &record.traits {
        target.set_heuristic(entry.heuristic, entry.scale);
    }
    target.set_accuracy(record.accuracy);
    target.set_evasion(record.evasion);
}

/// Plain-data agent carrying every assignable field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTraits {
    pub experience_scale: f32,
    /// Indexed by [`Heuristic::index`].
    pub heuristics: [f32; Heuristic::COUNT],
    pub accuracy: f32,
    pub evasion: f32,
    pub combat: CombatProfile,
}

impl Default for AgentTraits {
    fn default() -> Self {
        let combat = CombatStats::default();
        Self {
            experience_scale: 0.5,
            heuristics: [0.5; Heuristic::COUNT],
            accuracy: combat.accuracy,
            evasion: combat.evasion,
            combat: CombatProfile::default(),
        }
    }
}

impl AgentTraits {
    #[must_use]
    pub fn heuristic(&self, heuristic: Heuristic) -> f32 {
        self.heuristics[heuristic.index()]
    }

    /// Snapshot the agent as a full record, e.g. to seed fixed mode.
    #[must_use]
    pub fn to_record(&self) -> HeuristicRecord {
        HeuristicRecord {
            experience_scale: self.experience_scale,
            traits: Heuristic::ALL
                .into_iter()
                .map(|heuristic| HeuristicScale::new(heuristic, self.heuristic(heuristic)))
                .collect(),
            accuracy: self.accuracy,
            evasion: self.evasion,
        }
    }
}

impl HeuristicTarget for AgentTraits {
    fn set_experience_scale(&mut self, value: f32) {
        self.experience_scale = value;
    }

    fn set_heuristic(&mut self, heuristic: Heuristic, scale: f32) {
        self.heuristics[heuristic.index()] = scale;
    }

    fn set_accuracy(&mut self, value: f32) {
        self.accuracy = value;
    }

    fn set_evasion(&mut self, value: f32) {
        self.evasion = value;
    }

    fn set_combat_profile(&mut self, profile: &CombatProfile) {
        self.combat = profile.clone();
    }
}
