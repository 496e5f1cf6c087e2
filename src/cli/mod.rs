//! Command implementations
//!
//! Each command prints its own report; `main` only maps outcomes to the
//! process exit code.

pub mod fetch;
pub mod list;
pub mod predict;
pub mod schedule;
pub mod stats;
pub mod strategies;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::game::GameId;
use crate::notify::{ErrorReporter, FileCache, TelegramNotifier};
use crate::pipeline::{GameOutcome, Pipeline};
use crate::source::HttpSource;

/// Pipeline wired to the real source, Telegram and the on-disk error cache.
pub type LivePipeline = Pipeline<HttpSource, TelegramNotifier, FileCache>;

pub fn build_pipeline(config: Config) -> Result<LivePipeline> {
    let source = HttpSource::new(config.http_options()).context("failed to build HTTP client")?;
    let notifier =
        TelegramNotifier::new(&config.notify.telegram).context("failed to build Telegram client")?;
    let reporter = ErrorReporter::new(FileCache::open(config.error_cache_path()));
    Ok(Pipeline::new(config, source, notifier, reporter))
}

/// The requested game, or every enabled game when none is given.
pub fn selected_games(config: &Config, game: Option<GameId>) -> Vec<GameId> {
    match game {
        Some(game) => vec![game],
        None => config.enabled_games(),
    }
}

/// One line per game, shared by `fetch`, `predict` and `schedule`.
pub fn print_outcomes(outcomes: &[GameOutcome]) {
    println!();
    for outcome in outcomes {
        let name = outcome.game.schema().name;
        match &outcome.error {
            None => println!(
                "✅ {} ({}): +{} new, {} skipped, {} duplicate, {} predictions",
                name,
                outcome.game,
                outcome.inserted,
                outcome.skipped,
                outcome.duplicate,
                outcome.predictions.len()
            ),
            Some(error) if outcome.success => {
                println!("⚠️  {} ({}): {}", name, outcome.game, error)
            }
            Some(error) => println!("❌ {} ({}): {}", name, outcome.game, error),
        }
    }
}
