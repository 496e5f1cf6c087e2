//! Candidate sampling strategies
//!
//! Each strategy builds one combination group by group. Values already
//! picked for a group named in `distinct_from` are removed from the domain
//! before sampling; everything else (run limits, history) is checked by the
//! generator.

use clap::ValueEnum;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::draw::Combination;
use crate::game::{BallGroup, GameSchema};
use crate::stats::{FrequencyIndex, GroupStats};

/// Probability that a frequency slot is drawn from the hot pool
const HOT_PICK_PROBABILITY: f64 = 0.8;
/// Upper bound of the frequency strategy's hot pool
const HOT_POOL_CAP: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum StrategyKind {
    Random,
    Frequency,
    Balanced,
    #[value(name = "coldHot")]
    ColdHot,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::Random,
        StrategyKind::Frequency,
        StrategyKind::Balanced,
        StrategyKind::ColdHot,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            StrategyKind::Random => "random",
            StrategyKind::Frequency => "frequency",
            StrategyKind::Balanced => "balanced",
            StrategyKind::ColdHot => "coldHot",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.key() == key.trim())
    }

    pub fn strategy(&self) -> &'static dyn Strategy {
        match self {
            StrategyKind::Random => &RandomStrategy,
            StrategyKind::Frequency => &FrequencyStrategy,
            StrategyKind::Balanced => &BalancedStrategy,
            StrategyKind::ColdHot => &ColdHotStrategy,
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Every registered strategy, in listing order.
pub fn registry() -> impl Iterator<Item = &'static dyn Strategy> {
    StrategyKind::ALL.into_iter().map(|kind| kind.strategy())
}

pub trait Strategy: Sync {
    fn kind(&self) -> StrategyKind;

    /// Display name
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Sample one combination. The result may still violate candidate rules.
    fn generate(
        &self,
        schema: &GameSchema,
        stats: &FrequencyIndex,
        rng: &mut dyn RngCore,
    ) -> Combination {
        let mut groups: Vec<Vec<u8>> = Vec::with_capacity(schema.groups.len());
        for (index, group) in schema.groups.iter().enumerate() {
            let excluded: &[u8] = group
                .distinct_from
                .and_then(|other| schema.group_index(other))
                .and_then(|i| groups.get(i))
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let available: Vec<u8> = group.domain().filter(|v| !excluded.contains(v)).collect();

            let empty = GroupStats::empty(*group);
            let group_stats = stats.group(index).unwrap_or(&empty);

            let mut values = self.pick_group(group, group_stats, &available, rng);
            if group.sorted {
                values.sort_unstable();
            }
            groups.push(values);
        }
        Combination::new(groups)
    }

    /// Pick `group.count` values out of `available`.
    fn pick_group(
        &self,
        group: &BallGroup,
        stats: &GroupStats,
        available: &[u8],
        rng: &mut dyn RngCore,
    ) -> Vec<u8>;
}

// ============================================
// SAMPLING HELPERS
// ============================================

/// Choose one value from `pool`, falling back to `fallback` when every pool
/// value is already taken. Taken values only block unique groups.
fn pick_slot(
    pool: &[u8],
    fallback: &[u8],
    taken: &[u8],
    unique: bool,
    rng: &mut dyn RngCore,
) -> Option<u8> {
    let free = |values: &[u8]| -> Vec<u8> {
        values
            .iter()
            .copied()
            .filter(|v| !unique || !taken.contains(v))
            .collect()
    };

    let from_pool = free(pool);
    if let Some(&value) = from_pool.choose(rng) {
        return Some(value);
    }
    free(fallback).choose(rng).copied()
}

/// Fill every slot of `group`, asking `pool_for` for the preferred pool of
/// each position.
fn fill_slots(
    group: &BallGroup,
    available: &[u8],
    rng: &mut dyn RngCore,
    mut pool_for: impl FnMut(usize, &mut dyn RngCore) -> Vec<u8>,
) -> Vec<u8> {
    let mut values = Vec::with_capacity(group.count);
    for position in 0..group.count {
        let pool = pool_for(position, &mut *rng);
        match pick_slot(&pool, available, &values, group.unique, rng) {
            Some(value) => values.push(value),
            None => break,
        }
    }
    values
}

fn restrict(ranked: Vec<(u8, usize)>, available: &[u8], k: usize) -> Vec<u8> {
    ranked
        .into_iter()
        .map(|(v, _)| v)
        .filter(|v| available.contains(v))
        .take(k)
        .collect()
}

fn hot_pool(
    group: &BallGroup,
    stats: &GroupStats,
    position: usize,
    available: &[u8],
    k: usize,
) -> Vec<u8> {
    let ranked = if group.positional {
        stats.ranked_at(position)
    } else {
        stats.ranked()
    };
    restrict(ranked, available, k)
}

fn cold_pool(
    group: &BallGroup,
    stats: &GroupStats,
    position: usize,
    available: &[u8],
    k: usize,
) -> Vec<u8> {
    let ranked = if group.positional {
        stats.ranked_cold_at(position)
    } else {
        stats.ranked_cold()
    };
    restrict(ranked, available, k)
}

// ============================================
// STRATEGIES
// ============================================

/// Uniform sampling over the domain.
pub struct RandomStrategy;

impl Strategy for RandomStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Random
    }

    fn name(&self) -> &'static str {
        "随机策略"
    }

    fn description(&self) -> &'static str {
        "Uniformly random values, distinct where the game requires it"
    }

    fn pick_group(
        &self,
        group: &BallGroup,
        _stats: &GroupStats,
        available: &[u8],
        rng: &mut dyn RngCore,
    ) -> Vec<u8> {
        if group.unique {
            available.choose_multiple(rng, group.count).copied().collect()
        } else {
            (0..group.count)
                .filter_map(|_| available.choose(rng).copied())
                .collect()
        }
    }
}

/// Mostly the historically most frequent values.
pub struct FrequencyStrategy;

impl FrequencyStrategy {
    fn pool_size(group: &BallGroup) -> usize {
        HOT_POOL_CAP
            .min(group.domain_size().div_ceil(2))
            .max(group.count)
    }
}

impl Strategy for FrequencyStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Frequency
    }

    fn name(&self) -> &'static str {
        "频率策略"
    }

    fn description(&self) -> &'static str {
        "Favours the most frequent historical values, with some random picks"
    }

    fn pick_group(
        &self,
        group: &BallGroup,
        stats: &GroupStats,
        available: &[u8],
        rng: &mut dyn RngCore,
    ) -> Vec<u8> {
        let k = Self::pool_size(group);
        fill_slots(group, available, rng, |position, rng| {
            if rng.gen_bool(HOT_PICK_PROBABILITY) {
                hot_pool(group, stats, position, available, k)
            } else {
                available.to_vec()
            }
        })
    }
}

/// Even split between the low and high half of the domain.
pub struct BalancedStrategy;

impl Strategy for BalancedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Balanced
    }

    fn name(&self) -> &'static str {
        "平衡策略"
    }

    fn description(&self) -> &'static str {
        "Balances values between the low and high half of the range"
    }

    fn pick_group(
        &self,
        group: &BallGroup,
        _stats: &GroupStats,
        available: &[u8],
        rng: &mut dyn RngCore,
    ) -> Vec<u8> {
        let low_max = group.low_max();
        let (low, high): (Vec<u8>, Vec<u8>) = available.iter().partition(|&&v| v <= low_max);

        let low_count = if rng.gen_bool(0.5) {
            group.count / 2
        } else {
            group.count.div_ceil(2)
        };

        let mut values = fill_slots(group, available, rng, |position, _| {
            if position < low_count {
                low.clone()
            } else {
                high.clone()
            }
        });
        if group.positional {
            values.shuffle(rng);
        }
        values
    }
}

/// Coin flip per slot between the hottest and the coldest values.
pub struct ColdHotStrategy;

impl ColdHotStrategy {
    fn pool_size(group: &BallGroup) -> usize {
        (group.domain_size() / 3).max(1)
    }
}

impl Strategy for ColdHotStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ColdHot
    }

    fn name(&self) -> &'static str {
        "冷热号策略"
    }

    fn description(&self) -> &'static str {
        "Mixes the most frequent (hot) and least frequent (cold) values"
    }

    fn pick_group(
        &self,
        group: &BallGroup,
        stats: &GroupStats,
        available: &[u8],
        rng: &mut dyn RngCore,
    ) -> Vec<u8> {
        let k = Self::pool_size(group);
        fill_slots(group, available, rng, |position, rng| {
            if rng.gen_bool(0.5) {
                hot_pool(group, stats, position, available, k)
            } else {
                cold_pool(group, stats, position, available, k)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use proptest::prelude::{any, prop, prop_assert, proptest};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::draw::DrawRecord;
    use crate::game::GameId;

    fn history(schema: &GameSchema, seed: u64, draws: usize) -> Vec<DrawRecord> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let empty = FrequencyIndex::build(schema, &[]);
        (0..draws)
            .map(|i| DrawRecord {
                issue_id: format!("2024{:03}", i + 1),
                draw_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                numbers: RandomStrategy.generate(schema, &empty, &mut rng),
            })
            .collect()
    }

    #[test]
    fn test_keys_round_trip() {
        for kind in StrategyKind::ALL {
            assert_eq!(StrategyKind::from_key(kind.key()), Some(kind));
            assert_eq!(kind.strategy().kind(), kind);
        }
        assert_eq!(StrategyKind::from_key("coldHot"), Some(StrategyKind::ColdHot));
        assert_eq!(StrategyKind::from_key("hot"), None);
        assert_eq!(registry().count(), 4);
    }

    #[test]
    fn test_serde_keys() {
        let kinds: Vec<StrategyKind> = serde_yaml::from_str("[random, coldHot]").unwrap();
        assert_eq!(kinds, vec![StrategyKind::Random, StrategyKind::ColdHot]);
        assert!(serde_yaml::from_str::<StrategyKind>("lucky").is_err());
    }

    #[test]
    fn test_pool_sizes() {
        let dlt = GameId::Dlt.schema();
        assert_eq!(FrequencyStrategy::pool_size(&dlt.groups[0]), 15);
        assert_eq!(FrequencyStrategy::pool_size(&dlt.groups[1]), 6);
        assert_eq!(ColdHotStrategy::pool_size(&dlt.groups[0]), 11);

        let qxc = GameId::Qxc.schema();
        assert_eq!(FrequencyStrategy::pool_size(&qxc.groups[0]), 7);
        assert_eq!(ColdHotStrategy::pool_size(&qxc.groups[0]), 3);
    }

    #[test]
    fn test_balanced_splits_halves() {
        let schema = GameId::Dlt.schema();
        let stats = FrequencyIndex::build(&schema, &[]);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..50 {
            let numbers = BalancedStrategy.generate(&schema, &stats, &mut rng);
            let low = numbers.group(0).iter().filter(|&&v| v <= 17).count();
            assert!(low == 2 || low == 3, "{numbers:?}");
        }
    }

    #[test]
    fn test_qlc_special_never_in_basic() {
        let schema = GameId::Qlc.schema();
        let stats = FrequencyIndex::build(&schema, &history(&schema, 9, 40));
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for kind in StrategyKind::ALL {
            for _ in 0..50 {
                let numbers = kind.strategy().generate(&schema, &stats, &mut rng);
                assert!(!numbers.group(0).contains(&numbers.group(1)[0]));
            }
        }
    }

    fn any_game() -> impl proptest::strategy::Strategy<Value = GameId> {
        prop::sample::select(GameId::ALL.to_vec())
    }

    fn any_kind() -> impl proptest::strategy::Strategy<Value = StrategyKind> {
        prop::sample::select(StrategyKind::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_strategies_produce_structurally_valid_combinations(
            game in any_game(),
            kind in any_kind(),
            seed in any::<u64>(),
            draws in 0usize..30,
        ) {
            let schema = game.schema();
            let stats = FrequencyIndex::build(&schema, &history(&schema, seed, draws));
            let mut rng = ChaCha8Rng::seed_from_u64(seed);

            let numbers = kind.strategy().generate(&schema, &stats, &mut rng);
            prop_assert!(schema.check_structure(&numbers).is_ok(), "{:?}", numbers);
        }
    }
}
