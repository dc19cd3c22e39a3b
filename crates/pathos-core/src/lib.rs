//! Core types shared across the PathOS batch workspace.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

pub mod assign;
pub mod combat;
pub mod profile;
pub mod sampler;

pub use assign::{AgentTraits, HeuristicTarget, assign};
pub use combat::{
    CombatProfile, CombatRanges, EnemyCombat, EnemyCombatRanges, EnemyTier, InteractionCost,
    InteractionCostRanges, InteractionLevel,
};
pub use profile::{AgentProfile, CUSTOM_PROFILE, ProfileLibrary};
pub use sampler::{HeuristicMode, HeuristicSampler, RangeSpec, SamplerError};

/// Behavioural weights that steer an agent's goal selection.
///
/// Declaration order is significant: CSV columns, record traits and range
/// tables all follow [`Heuristic::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Heuristic {
    Achievement,
    Adrenaline,
    Aggression,
    Caution,
    Completion,
    Curiosity,
    Efficiency,
}

impl Heuristic {
    /// Number of defined heuristics.
    pub const COUNT: usize = 7;

    /// Every heuristic in declaration order.
    pub const ALL: [Heuristic; Heuristic::COUNT] = [
        Heuristic::Achievement,
        Heuristic::Adrenaline,
        Heuristic::Aggression,
        Heuristic::Caution,
        Heuristic::Completion,
        Heuristic::Curiosity,
        Heuristic::Efficiency,
    ];

    /// Position of this heuristic within [`Heuristic::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Lower-case token used for CSV headers and JSON keys.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Heuristic::Achievement => "achievement",
            Heuristic::Adrenaline => "adrenaline",
            Heuristic::Aggression => "aggression",
            Heuristic::Caution => "caution",
            Heuristic::Completion => "completion",
            Heuristic::Curiosity => "curiosity",
            Heuristic::Efficiency => "efficiency",
        }
    }

    /// Human-facing label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Heuristic::Achievement => "Achievement",
            Heuristic::Adrenaline => "Adrenaline",
            Heuristic::Aggression => "Aggression",
            Heuristic::Caution => "Caution",
            Heuristic::Completion => "Completion",
            Heuristic::Curiosity => "Curiosity",
            Heuristic::Efficiency => "Efficiency",
        }
    }

}

impl fmt::Display for Heuristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Closed interval `[min, max]` used by range sampling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloatRange {
    pub min: f32,
    pub max: f32,
}

impl FloatRange {
    #[must_use]
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Zero-width interval that always samples `value`.
    #[must_use]
    pub const fn constant(value: f32) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    /// Bounds with `min <= max`; inverted ranges are swapped.
    #[must_use]
    pub fn ordered(self) -> (f32, f32) {
        if self.min > self.max {
            (self.max, self.min)
        } else {
            (self.min, self.max)
        }
    }

    /// Draw uniformly from the closed interval.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        let (lo, hi) = self.ordered();
        // Degenerate or NaN bounds, and spans that overflow f32, collapse to the lower value.
        if lo.partial_cmp(&hi) != Some(Ordering::Less) || !(hi - lo).is_finite() {
            return lo;
        }
        rng.random_range(lo..=hi)
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// Whether both bounds are finite and lie in `[lower, upper]`.
    #[must_use]
    pub fn is_within(&self, lower: f32, upper: f32) -> bool {
        self.is_finite()
            && (lower..=upper).contains(&self.min)
            && (lower..=upper).contains(&self.max)
    }

    #[must_use]
    pub fn contains(&self, value: f32) -> bool {
        let (lo, hi) = self.ordered();
        (lo..=hi).contains(&value)
    }
}

impl Default for FloatRange {
    fn default() -> Self {
        Self::new(0.0, 1.0)
    }
}

/// One heuristic paired with its weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeuristicScale {
    pub heuristic: Heuristic,
    pub scale: f32,
}

impl HeuristicScale {
    #[must_use]
    pub const fn new(heuristic: Heuristic, scale: f32) -> Self {
        Self { heuristic, scale }
    }
}

/// One heuristic paired with the interval its weight is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeuristicRange {
    pub heuristic: Heuristic,
    pub range: FloatRange,
}

impl HeuristicRange {
    #[must_use]
    pub const fn new(heuristic: Heuristic, range: FloatRange) -> Self {
        Self { heuristic, range }
    }
}

/// Accuracy and evasion percentages applied alongside heuristic weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombatStats {
    pub accuracy: f32,
    pub evasion: f32,
}

impl Default for CombatStats {
    fn default() -> Self {
        Self {
            accuracy: 100.0,
            evasion: 0.0,
        }
    }
}

/// Errors raised when building records by hand.
#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("expected {expected} heuristic values, got {actual}")]
    TraitCount { expected: usize, actual: usize },
}

/// Complete set of trait values for one simulated agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicRecord {
    /// Player experience in `[0, 1]`.
    pub experience_scale: f32,
    /// Heuristic weights in identifier order.
    pub traits: Vec<HeuristicScale>,
    /// Hit chance percentage in `[0, 100]`.
    pub accuracy: f32,
    /// Dodge chance percentage in `[0, 100]`.
    pub evasion: f32,
}

impl HeuristicRecord {
    /// Record with every listed heuristic at zero.
    #[must_use]
    pub fn zeroed(heuristics: &[Heuristic], combat: CombatStats) -> Self {
        Self {
            experience_scale: 0.0,
            traits: heuristics
                .iter()
                .map(|&heuristic| HeuristicScale::new(heuristic, 0.0))
                .collect(),
            accuracy: combat.accuracy,
            evasion: combat.evasion,
        }
    }

    /// Pair `values` with `heuristics` position by position.
    pub fn from_values(
        experience_scale: f32,
        heuristics: &[Heuristic],
        values: &[f32],
        combat: CombatStats,
    ) -> Result<Self, RecordError> {
        if heuristics.len() != values.len() {
            return Err(RecordError::TraitCount {
                expected: heuristics.len(),
                actual: values.len(),
            });
        }
        Ok(Self {
            experience_scale,
            traits: heuristics
                .iter()
                .zip(values)
                .map(|(&heuristic, &scale)| HeuristicScale::new(heuristic, scale))
                .collect(),
            accuracy: combat.accuracy,
            evasion: combat.evasion,
        })
    }

    /// Weight for `heuristic`, if the record carries it.
    #[must_use]
    pub fn scale(&self, heuristic: Heuristic) -> Option<f32> {
        self.traits
            .iter()
            .find(|entry| entry.heuristic == heuristic)
            .map(|entry| entry.scale)
    }

    /// Overwrite the weight for `heuristic`; returns false when absent.
    pub fn set_scale(&mut self, heuristic: Heuristic, scale: f32) -> bool {
        match self
            .traits
            .iter_mut()
            .find(|entry| entry.heuristic == heuristic)
        {
            Some(entry) => {
                entry.scale = scale;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn combat(&self) -> CombatStats {
        CombatStats {
            accuracy: self.accuracy,
            evasion: self.evasion,
        }
    }
}

impl Default for HeuristicRecord {
    fn default() -> Self {
        Self::zeroed(&Heuristic::ALL, CombatStats::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::SmallRng};

    #[test]
    fn heuristic_order_matches_indices() {
        for (idx, heuristic) in Heuristic::ALL.iter().enumerate() {
            assert_eq!(heuristic.index(), idx);
        }
        assert_eq!(Heuristic::ALL.len(), Heuristic::COUNT);
    }

    #[test]
    fn overflowing_range_falls_back_to_lower_bound() {
        let mut rng = SmallRng::seed_from_u64(13);
        let range = FloatRange::new(-3e38, 3e38);
        assert_eq!(range.sample(&mut rng), -3e38);
        let unbounded = FloatRange::new(0.0, f32::INFINITY);
        assert_eq!(unbounded.sample(&mut rng), 0.0);
        assert!(!unbounded.is_within(0.0, 100.0));
        assert!(FloatRange::new(60.0, 100.0).is_within(0.0, 100.0));
        assert!(!FloatRange::new(-1.0, 0.5).is_within(0.0, 1.0));
    }

    #[test]
    fn zero_width_range_is_constant() {
        let mut rng = SmallRng::seed_from_u64(7);
        let range = FloatRange::constant(0.42);
        for _ in 0..64 {
            assert_eq!(range.sample(&mut rng), 0.42);
        }
    }

    #[test]
    fn inverted_range_is_swapped() {
        let mut rng = SmallRng::seed_from_u64(11);
        let range = FloatRange::new(0.9, 0.1);
        assert_eq!(range.ordered(), (0.1, 0.9));
        for _ in 0..256 {
            let value = range.sample(&mut rng);
            assert!((0.1..=0.9).contains(&value), "{value} escaped [0.1, 0.9]");
        }
    }

    #[test]
    fn from_values_rejects_mismatched_lengths() {
        let err = HeuristicRecord::from_values(
            0.5,
            &[Heuristic::Achievement, Heuristic::Caution],
            &[1.0],
            CombatStats::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            RecordError::TraitCount {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn set_scale_only_touches_known_heuristics() {
        let mut record = HeuristicRecord::zeroed(&[Heuristic::Curiosity], CombatStats::default());
        assert!(record.set_scale(Heuristic::Curiosity, 0.75));
        assert!(!record.set_scale(Heuristic::Aggression, 0.25));
        assert_eq!(record.scale(Heuristic::Curiosity), Some(0.75));
        assert_eq!(record.scale(Heuristic::Aggression), None);
    }
}
