//! List command implementation

use anyhow::{Context, Result};

use crate::config::Config;
use crate::game::GameId;
use crate::store::DrawStore;

pub fn run(config: &Config, games: &[GameId], limit: usize) -> Result<()> {
    for &game in games {
        let store = DrawStore::open(&config.database_path(), config.game_schema(game))
            .with_context(|| format!("failed to open store for {game}"))?;
        let draws = store.all(Some(limit))?;

        println!("{} ({}) - {} stored", store.schema().name, game, store.count()?);
        if draws.is_empty() {
            println!("No draws found. Run 'drawkeeper fetch {game}' first.\n");
            continue;
        }

        println!("{:<10} {:<12} {}", "Issue", "Date", "Numbers");
        println!("{}", "-".repeat(60));
        for draw in draws {
            println!(
                "{:<10} {:<12} {}",
                draw.issue_id,
                draw.draw_date.format("%Y-%m-%d").to_string(),
                draw.numbers.display()
            );
        }
        println!();
    }

    Ok(())
}
