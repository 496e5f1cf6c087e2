//! Predict command implementation

use anyhow::Result;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::{print_outcomes, LivePipeline};
use crate::game::GameId;
use crate::pipeline::{GameOutcome, PredictRequest};

pub async fn run(
    pipeline: &mut LivePipeline,
    games: &[GameId],
    request: &PredictRequest,
) -> Result<Vec<GameOutcome>> {
    let strategies: Vec<&str> = request.strategies.iter().map(|s| s.key()).collect();
    println!(
        "🔮 {} candidates per game, strategies: {}\n",
        request.count,
        strategies.join(", ")
    );

    let mut outcomes = Vec::with_capacity(games.len());
    for &game in games {
        let outcome = pipeline
            .predict_game(game, request, ChaCha8Rng::from_entropy())
            .await;

        println!("{} ({})", game.schema().name, game);
        for candidate in &outcome.predictions {
            println!(
                "  {:>2}. {:<28} {}",
                candidate.rank,
                candidate.numbers.display(),
                candidate.strategy_name
            );
        }
        if let Some(next) = outcome.next_draw {
            println!("  next draw: {}", next.format("%Y-%m-%d (%a)"));
        }
        println!();
        outcomes.push(outcome);
    }

    print_outcomes(&outcomes);
    Ok(outcomes)
}
