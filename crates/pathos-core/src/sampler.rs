//! Per-spawn heuristic selection.
//!
//! A batch run picks one [`HeuristicMode`] up front and builds a
//! [`HeuristicSampler`] for it; the sampler then hands out one
//! [`HeuristicRecord`] per spawned agent.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{FloatRange, Heuristic, HeuristicRange, HeuristicRecord, HeuristicScale};

/// How agent heuristics are chosen for a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeuristicMode {
    /// Every agent receives the same record.
    #[default]
    Fixed,
    /// Each value is drawn uniformly from a configured interval.
    Range,
    /// Records are replayed round-robin from a loaded file.
    Load,
}

impl HeuristicMode {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            HeuristicMode::Fixed => "Fixed Values",
            HeuristicMode::Range => "Random Within Range",
            HeuristicMode::Load => "Load from File",
        }
    }
}

/// Intervals used by [`HeuristicMode::Range`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeSpec {
    pub experience: FloatRange,
    pub traits: Vec<HeuristicRange>,
    pub accuracy: FloatRange,
    pub evasion: FloatRange,
}

impl Default for RangeSpec {
    fn default() -> Self {
        Self::for_heuristics(&Heuristic::ALL)
    }
}

impl RangeSpec {
    /// Unit intervals for every listed heuristic.
    #[must_use]
    pub fn for_heuristics(heuristics: &[Heuristic]) -> Self {
        Self {
            experience: FloatRange::new(0.0, 1.0),
            traits: heuristics
                .iter()
                .map(|&heuristic| HeuristicRange::new(heuristic, FloatRange::default()))
                .collect(),
            accuracy: FloatRange::new(60.0, 100.0),
            evasion: FloatRange::new(0.0, 40.0),
        }
    }

    #[must_use]
    pub fn range(&self, heuristic: Heuristic) -> Option<FloatRange> {
        self.traits
            .iter()
            .find(|entry| entry.heuristic == heuristic)
            .map(|entry| entry.range)
    }

    /// Overwrite the interval for `heuristic`; returns false when absent.
    pub fn set_range(&mut self, heuristic: Heuristic, range: FloatRange) -> bool {
        match self
            .traits
            .iter_mut()
            .find(|entry| entry.heuristic == heuristic)
        {
            Some(entry) => {
                entry.range = range;
                true
            }
            None => false,
        }
    }

    /// Check every interval against the domain of the value it produces:
    /// `[0, 1]` for experience and heuristics, `[0, 100]` for accuracy and
    /// evasion.
    pub fn validate(&self) -> Result<(), SamplerError> {
        let unit = |field: &str, range: &FloatRange| {
            if range.is_within(0.0, 1.0) {
                Ok(())
            } else {
                Err(SamplerError::OutOfBounds {
                    field: field.to_string(),
                    min: 0.0,
                    max: 1.0,
                })
            }
        };
        unit("experience", &self.experience)?;
        for entry in &self.traits {
            unit(entry.heuristic.key(), &entry.range)?;
        }
        for (field, range) in [("accuracy", &self.accuracy), ("evasion", &self.evasion)] {
            if !range.is_within(0.0, 100.0) {
                return Err(SamplerError::OutOfBounds {
                    field: field.to_string(),
                    min: 0.0,
                    max: 100.0,
                });
            }
        }
        Ok(())
    }

    /// Draw one record, each field independently.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> HeuristicRecord {
        let traits = self
            .traits
            .iter()
            .map(|entry| HeuristicScale::new(entry.heuristic, entry.range.sample(rng)))
            .collect();
        HeuristicRecord {
            experience_scale: self.experience.sample(rng),
            traits,
            accuracy: self.accuracy.sample(rng),
            evasion: self.evasion.sample(rng),
        }
    }
}

/// Errors raised when constructing a sampler.
#[derive(Debug, Error, PartialEq)]
pub enum SamplerError {
    #[error("load mode requires at least one heuristic record")]
    NoRecords,
    #[error("{field} range must be finite and within [{min}, {max}]")]
    OutOfBounds { field: String, min: f32, max: f32 },
}

#[derive(Debug, Clone)]
enum Source {
    Fixed(HeuristicRecord),
    Range(RangeSpec),
    Load {
        records: Vec<HeuristicRecord>,
        cursor: usize,
    },
}

/// Produces one heuristic record per agent spawn.
#[derive(Debug, Clone)]
pub struct HeuristicSampler {
    source: Source,
}

impl HeuristicSampler {
    #[must_use]
    pub fn fixed(record: HeuristicRecord) -> Self {
        Self {
            source: Source::Fixed(record),
        }
    }

    #[must_use]
    pub fn range(spec: RangeSpec) -> Self {
        Self {
            source: Source::Range(spec),
        }
    }

    /// Round-robin over `records`, starting from the first.
    pub fn load(records: Vec<HeuristicRecord>) -> Result<Self, SamplerError> {
        if records.is_empty() {
            return Err(SamplerError::NoRecords);
        }
        Ok(Self {
            source: Source::Load { records, cursor: 0 },
        })
    }

    #[must_use]
    pub fn mode(&self) -> HeuristicMode {
        match self.source {
            Source::Fixed(_) => HeuristicMode::Fixed,
            Source::Range(_) => HeuristicMode::Range,
            Source::Load { .. } => HeuristicMode::Load,
        }
    }

    pub fn sample<R: Rng + ?Sized>(&mut self, rng: &mut R) -> HeuristicRecord {
        match &mut self.source {
            Source::Fixed(record) => record.clone(),
            Source::Range(spec) => spec.sample(rng),
            Source::Load { records, cursor } => {
                let index = *cursor % records.len();
                *cursor += 1;
                debug!(index, total = records.len(), "replaying loaded heuristic record");
                records[index].clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CombatStats;
    use rand::{SeedableRng, rngs::SmallRng};

    fn record(experience: f32) -> HeuristicRecord {
        HeuristicRecord::from_values(
            experience,
            &[Heuristic::Curiosity],
            &[experience],
            CombatStats::default(),
        )
        .expect("record")
    }

    #[test]
    fn fixed_mode_repeats_record_verbatim() {
        let mut rng = SmallRng::seed_from_u64(1);
        let base = record(0.3);
        let mut sampler = HeuristicSampler::fixed(base.clone());
        for _ in 0..5 {
            assert_eq!(sampler.sample(&mut rng), base);
        }
        assert_eq!(sampler.mode(), HeuristicMode::Fixed);
    }

    #[test]
    fn load_mode_is_round_robin() {
        let mut rng = SmallRng::seed_from_u64(1);
        let records = vec![record(0.0), record(0.5), record(1.0)];
        let mut sampler = HeuristicSampler::load(records.clone()).expect("sampler");
        let drawn: Vec<_> = (0..7).map(|_| sampler.sample(&mut rng)).collect();
        let expected: Vec<_> = [0, 1, 2, 0, 1, 2, 0]
            .into_iter()
            .map(|idx| records[idx].clone())
            .collect();
        assert_eq!(drawn, expected);
    }

    #[test]
    fn load_mode_rejects_empty_list() {
        assert_eq!(
            HeuristicSampler::load(Vec::new()).unwrap_err(),
            SamplerError::NoRecords
        );
    }

    #[test]
    fn range_mode_stays_within_bounds() {
        let mut rng = SmallRng::seed_from_u64(99);
        let mut spec = RangeSpec::default();
        assert!(spec.set_range(Heuristic::Aggression, FloatRange::new(0.25, 0.5)));
        let mut sampler = HeuristicSampler::range(spec.clone());
        for _ in 0..200 {
            let drawn = sampler.sample(&mut rng);
            assert_eq!(drawn.traits.len(), Heuristic::COUNT);
            for entry in &drawn.traits {
                let bounds = spec.range(entry.heuristic).expect("range");
                assert!(bounds.contains(entry.scale));
            }
            assert!(spec.experience.contains(drawn.experience_scale));
            assert!(spec.accuracy.contains(drawn.accuracy));
            assert!(spec.evasion.contains(drawn.evasion));
        }
    }

    #[test]
    fn zero_width_ranges_reproduce_a_record() {
        let mut rng = SmallRng::seed_from_u64(5);
        let spec = RangeSpec {
            experience: FloatRange::constant(0.6),
            traits: vec![HeuristicRange::new(
                Heuristic::Efficiency,
                FloatRange::constant(0.8),
            )],
            accuracy: FloatRange::constant(72.5),
            evasion: FloatRange::constant(12.0),
        };
        let expected = HeuristicRecord {
            experience_scale: 0.6,
            traits: vec![HeuristicScale::new(Heuristic::Efficiency, 0.8)],
            accuracy: 72.5,
            evasion: 12.0,
        };
        let mut sampler = HeuristicSampler::range(spec);
        for _ in 0..10 {
            assert_eq!(sampler.sample(&mut rng), expected);
        }
    }

    #[test]
    fn validate_rejects_out_of_domain_ranges() {
        RangeSpec::default().validate().expect("default ranges");

        let mut spec = RangeSpec::default();
        spec.set_range(Heuristic::Caution, FloatRange::new(0.5, 1.5));
        assert_eq!(
            spec.validate(),
            Err(SamplerError::OutOfBounds {
                field: "caution".to_string(),
                min: 0.0,
                max: 1.0,
            })
        );

        let mut spec = RangeSpec::default();
        spec.accuracy = FloatRange::new(-3e38, 3e38);
        assert!(matches!(
            spec.validate(),
            Err(SamplerError::OutOfBounds { ref field, .. }) if field == "accuracy"
        ));
    }
}
