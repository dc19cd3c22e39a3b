//! Named presets of heuristic ranges.

use serde::{Deserialize, Serialize};

use crate::{FloatRange, HeuristicRange, RangeSpec};

/// Selector entry meaning "ranges were edited by hand".
pub const CUSTOM_PROFILE: &str = "Custom...";

/// Reusable player archetype expressed as sampling intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub name: String,
    #[serde(default)]
    pub heuristic_ranges: Vec<HeuristicRange>,
    pub experience: FloatRange,
    pub accuracy: FloatRange,
    pub evasion: FloatRange,
}

impl RangeSpec {
    /// Copy the profile's intervals in. Heuristics the profile does not
    /// mention keep their current range.
    pub fn apply_profile(&mut self, profile: &AgentProfile) {
        for entry in &profile.heuristic_ranges {
            self.set_range(entry.heuristic, entry.range);
        }
        self.experience = profile.experience;
        self.accuracy = profile.accuracy;
        self.evasion = profile.evasion;
    }
}

/// Ordered collection of profiles offered to the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileLibrary {
    profiles: Vec<AgentProfile>,
}

impl ProfileLibrary {
    #[must_use]
    pub fn new(profiles: Vec<AgentProfile>) -> Self {
        Self { profiles }
    }

    #[must_use]
    pub fn profiles(&self) -> &[AgentProfile] {
        &self.profiles
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Profile names followed by [`CUSTOM_PROFILE`].
    #[must_use]
    pub fn selector_names(&self) -> Vec<&str> {
        self.profiles
            .iter()
            .map(|profile| profile.name.as_str())
            .chain(std::iter::once(CUSTOM_PROFILE))
            .collect()
    }

    /// Selector position of `selected`; unknown names map to the custom entry.
    #[must_use]
    pub fn selector_index(&self, selected: &str) -> usize {
        self.profiles
            .iter()
            .position(|profile| profile.name == selected)
            .unwrap_or(self.profiles.len())
    }

    /// Profile behind a selector entry; `None` for the custom entry.
    #[must_use]
    pub fn resolve(&self, selected: &str) -> Option<&AgentProfile> {
        self.profiles.get(self.selector_index(selected))
    }
}
