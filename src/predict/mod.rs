//! Candidate generation
//!
//! The [`Generator`] asks each selected strategy for combinations and keeps
//! the ones that satisfy the schema's candidate rules, were never drawn, and
//! were not already produced in the same run. The search is bounded by an
//! attempt cap and a wall-clock budget; running out of either yields fewer
//! candidates, never an error.

mod history;
mod strategy;

pub use history::HistoricalIndex;
pub use strategy::{
    registry, BalancedStrategy, ColdHotStrategy, FrequencyStrategy, RandomStrategy, Strategy,
    StrategyKind,
};

use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use rand::RngCore;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::draw::Combination;
use crate::game::{GameId, GameSchema};
use crate::stats::FrequencyIndex;

/// Bounds of one strategy's search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    /// Attempts allowed per requested candidate
    pub per_candidate_attempts: usize,
    /// Hard cap on attempts for one strategy
    pub attempt_ceiling: usize,
    pub time_budget: Duration,
    /// Read the clock every this many attempts
    pub clock_check_every: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            per_candidate_attempts: 20,
            attempt_ceiling: 200,
            time_budget: Duration::from_secs(5),
            clock_check_every: 10,
        }
    }
}

impl SearchLimits {
    fn max_attempts(&self, wanted: usize) -> usize {
        wanted
            .saturating_mul(self.per_candidate_attempts)
            .min(self.attempt_ceiling)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionCandidate {
    pub rank: usize,
    pub numbers: Combination,
    pub strategy: StrategyKind,
    pub strategy_name: &'static str,
    pub generated_at: DateTime<Local>,
}

/// Per strategy accounting of one run.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyOutcome {
    pub strategy: StrategyKind,
    pub wanted: usize,
    pub accepted: usize,
    pub attempts: usize,
    pub timed_out: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationRun {
    pub id: Uuid,
    pub game: GameId,
    pub requested: usize,
    pub candidates: Vec<PredictionCandidate>,
    pub outcomes: Vec<StrategyOutcome>,
}

impl GenerationRun {
    /// How many requested candidates could not be found.
    pub fn shortfall(&self) -> usize {
        self.requested.saturating_sub(self.candidates.len())
    }
}

pub struct Generator<R> {
    limits: SearchLimits,
    rng: R,
}

impl<R: RngCore> Generator<R> {
    pub fn new(limits: SearchLimits, rng: R) -> Self {
        Self { limits, rng }
    }

    /// Generate up to `total` candidates, split evenly over `strategies`.
    pub fn generate(
        &mut self,
        schema: &GameSchema,
        stats: &FrequencyIndex,
        history: &HistoricalIndex,
        strategies: &[StrategyKind],
        total: usize,
    ) -> GenerationRun {
        let mut run = GenerationRun {
            id: Uuid::new_v4(),
            game: schema.id,
            requested: total,
            candidates: Vec::with_capacity(total),
            outcomes: Vec::with_capacity(strategies.len()),
        };
        if strategies.is_empty() || total == 0 {
            return run;
        }

        let quota = total.div_ceil(strategies.len());
        let mut seen: HashSet<String> = HashSet::with_capacity(total);

        for &kind in strategies {
            let missing = total - run.candidates.len();
            if missing == 0 {
                break;
            }
            let wanted = quota.min(missing);
            let outcome = self.search(
                schema,
                stats,
                history,
                kind,
                wanted,
                &mut seen,
                &mut run.candidates,
            );

            if outcome.accepted < wanted {
                warn!(
                    game = %schema.id,
                    strategy = %kind,
                    wanted,
                    accepted = outcome.accepted,
                    attempts = outcome.attempts,
                    timed_out = outcome.timed_out,
                    "strategy fell short"
                );
            }
            run.outcomes.push(outcome);
        }

        info!(
            game = %schema.id,
            run = %run.id,
            requested = total,
            generated = run.candidates.len(),
            "generation finished"
        );
        run
    }

    #[allow(clippy::too_many_arguments)]
    fn search(
        &mut self,
        schema: &GameSchema,
        stats: &FrequencyIndex,
        history: &HistoricalIndex,
        kind: StrategyKind,
        wanted: usize,
        seen: &mut HashSet<String>,
        candidates: &mut Vec<PredictionCandidate>,
    ) -> StrategyOutcome {
        let strategy = kind.strategy();
        let max_attempts = self.limits.max_attempts(wanted);
        let check_every = self.limits.clock_check_every.max(1);
        let started = Instant::now();

        let mut outcome = StrategyOutcome {
            strategy: kind,
            wanted,
            accepted: 0,
            attempts: 0,
            timed_out: false,
        };

        while outcome.accepted < wanted && outcome.attempts < max_attempts {
            outcome.attempts += 1;
            if outcome.attempts % check_every == 0 && started.elapsed() >= self.limits.time_budget {
                outcome.timed_out = true;
                break;
            }

            let numbers = strategy.generate(schema, stats, &mut self.rng);
            if !schema.accepts_candidate(&numbers) {
                continue;
            }
            let key = numbers.key(schema);
            if history.contains(&key) || !seen.insert(key) {
                continue;
            }

            candidates.push(PredictionCandidate {
                rank: candidates.len() + 1,
                numbers,
                strategy: kind,
                strategy_name: strategy.name(),
                generated_at: Local::now(),
            });
            outcome.accepted += 1;
        }

        outcome
    }
}
