//! Fetch command implementation

use anyhow::Result;
use chrono::{Datelike, Local};

use super::{print_outcomes, LivePipeline};
use crate::game::GameId;
use crate::pipeline::GameOutcome;
use crate::reconcile::FetchMode;

pub async fn run(
    pipeline: &mut LivePipeline,
    games: &[GameId],
    mode: FetchMode,
) -> Result<Vec<GameOutcome>> {
    let year = Local::now().year();
    let mut outcomes = Vec::with_capacity(games.len());

    for &game in games {
        let schema = pipeline.config().game_schema(game);
        match mode {
            FetchMode::Full => println!(
                "📥 {} ({}): {}..={}",
                schema.name, game, schema.start_year, year
            ),
            FetchMode::Latest => println!("📥 {} ({}): latest draws", schema.name, game),
        }

        let outcome = pipeline.fetch_game(game, mode, year).await;
        if let Some(latest) = &outcome.latest {
            println!(
                "   latest {} ({}): {}",
                latest.issue_id,
                latest.draw_date,
                latest.numbers.display()
            );
        }
        outcomes.push(outcome);
    }

    print_outcomes(&outcomes);
    Ok(outcomes)
}
