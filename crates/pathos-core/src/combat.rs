//! Combat and interaction-event tuning sampled per agent.
//!
//! Enemy encounters are bucketed into four tiers and interaction events into
//! three difficulty levels. A [`CombatRanges`] table describes the interval
//! each value is drawn from; [`CombatRanges::sample`] resolves it into a
//! concrete [`CombatProfile`] for one agent.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::FloatRange;

/// Enemy strength bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnemyTier {
    Low,
    Medium,
    High,
    Boss,
}

impl EnemyTier {
    pub const ALL: [EnemyTier; 4] = [
        EnemyTier::Low,
        EnemyTier::Medium,
        EnemyTier::High,
        EnemyTier::Boss,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Interaction-event difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionLevel {
    Low,
    Medium,
    High,
}

impl InteractionLevel {
    pub const ALL: [InteractionLevel; 3] = [
        InteractionLevel::Low,
        InteractionLevel::Medium,
        InteractionLevel::High,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Sampling intervals for one enemy tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnemyCombatRanges {
    /// Damage dealt per hit; copied onto the agent as a range.
    pub damage: FloatRange,
    pub accuracy: FloatRange,
    pub evasion: FloatRange,
}

/// Sampling intervals for one interaction-event level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InteractionCostRanges {
    pub challenge: FloatRange,
    /// Time penalty; sampled values are truncated to whole units.
    pub penalty: FloatRange,
}

/// Full combat tuning table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatRanges {
    pub enemies: [EnemyCombatRanges; 4],
    pub interactions: [InteractionCostRanges; 3],
}

impl Default for CombatRanges {
    fn default() -> Self {
        let enemy = |damage: (f32, f32), accuracy: (f32, f32), evasion: (f32, f32)| {
            EnemyCombatRanges {
                damage: FloatRange::new(damage.0, damage.1),
                accuracy: FloatRange::new(accuracy.0, accuracy.1),
                evasion: FloatRange::new(evasion.0, evasion.1),
            }
        };
        let interaction = |challenge: (f32, f32), penalty: (f32, f32)| InteractionCostRanges {
            challenge: FloatRange::new(challenge.0, challenge.1),
            penalty: FloatRange::new(penalty.0, penalty.1),
        };
        Self {
            enemies: [
                enemy((5.0, 10.0), (50.0, 80.0), (0.0, 10.0)),
                enemy((10.0, 20.0), (60.0, 90.0), (10.0, 20.0)),
                enemy((20.0, 25.0), (50.0, 100.0), (20.0, 30.0)),
                enemy((5.0, 50.0), (90.0, 100.0), (40.0, 50.0)),
            ],
            interactions: [
                interaction((20.0, 30.0), (2.0, 5.0)),
                interaction((30.0, 50.0), (5.0, 10.0)),
                interaction((50.0, 70.0), (10.0, 15.0)),
            ],
        }
    }
}

impl CombatRanges {
    #[must_use]
    pub fn enemy(&self, tier: EnemyTier) -> &EnemyCombatRanges {
        &self.enemies[tier.index()]
    }

    pub fn enemy_mut(&mut self, tier: EnemyTier) -> &mut EnemyCombatRanges {
        &mut self.enemies[tier.index()]
    }

    #[must_use]
    pub fn interaction(&self, level: InteractionLevel) -> &InteractionCostRanges {
        &self.interactions[level.index()]
    }

    /// Whether every interval has finite bounds.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        let enemies = self.enemies.iter().all(|enemy| {
            enemy.damage.is_finite() && enemy.accuracy.is_finite() && enemy.evasion.is_finite()
        });
        let interactions = self
            .interactions
            .iter()
            .all(|cost| cost.challenge.is_finite() && cost.penalty.is_finite());
        enemies && interactions
    }

    /// Resolve every interval into a concrete profile.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> CombatProfile {
        let enemies = self.enemies.map(|ranges| EnemyCombat {
            damage: ranges.damage,
            accuracy: ranges.accuracy.sample(rng),
            evasion: ranges.evasion.sample(rng),
        });
        let interactions = self.interactions.map(|ranges| InteractionCost {
            challenge: ranges.challenge.sample(rng),
            penalty: ranges.penalty.sample(rng) as i32,
        });
        CombatProfile {
            enemies,
            interactions,
        }
    }
}

/// Concrete tuning for one enemy tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnemyCombat {
    pub damage: FloatRange,
    pub accuracy: f32,
    pub evasion: f32,
}

/// Concrete tuning for one interaction-event level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InteractionCost {
    pub challenge: f32,
    pub penalty: i32,
}

/// Per-agent combat values produced by [`CombatRanges::sample`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatProfile {
    pub enemies: [EnemyCombat; 4],
    pub interactions: [InteractionCost; 3],
}

impl CombatProfile {
    #[must_use]
    pub fn enemy(&self, tier: EnemyTier) -> &EnemyCombat {
        &self.enemies[tier.index()]
    }

    #[must_use]
    pub fn interaction(&self, level: InteractionLevel) -> &InteractionCost {
        &self.interactions[level.index()]
    }
}

impl Default for CombatProfile {
    /// Lower bound of every default range.
    fn default() -> Self {
        let ranges = CombatRanges::default();
        Self {
            enemies: ranges.enemies.map(|r| EnemyCombat {
                damage: r.damage,
                accuracy: r.accuracy.min,
                evasion: r.evasion.min,
            }),
            interactions: ranges.interactions.map(|r| InteractionCost {
                challenge: r.challenge.min,
                penalty: r.penalty.min as i32,
            }),
        }
    }
}
