//! Stats command implementation

use anyhow::{Context, Result};

use crate::config::Config;
use crate::game::GameId;
use crate::stats::{FrequencyIndex, GroupStats};
use crate::store::DrawStore;

/// Values shown per hot / cold list
const TOP: usize = 10;

pub fn run(config: &Config, games: &[GameId]) -> Result<()> {
    for &game in games {
        let schema = config.game_schema(game);
        let store = DrawStore::open(&config.database_path(), schema.clone())
            .with_context(|| format!("failed to open store for {game}"))?;
        let records = store.all(None)?;
        let index = FrequencyIndex::build(&schema, &records);

        println!("📊 {} ({}) - {} draws", schema.name, game, index.draws);
        if index.is_empty() {
            println!("No draws found. Run 'drawkeeper fetch {game}' first.\n");
            continue;
        }

        for stats in &index.groups {
            print_group(stats);
        }
        println!();
    }

    Ok(())
}

fn print_group(stats: &GroupStats) {
    let group = &stats.group;
    println!("\n  {} ({} x {}-{})", group.label, group.count, group.min, group.max);

    if group.positional {
        for position in 0..group.count {
            println!(
                "    #{}  hot {}  cold {}",
                position + 1,
                render(&stats.ranked_at(position)),
                render(&stats.ranked_cold_at(position))
            );
        }
    } else {
        println!("    hot   {}", render(&stats.ranked()));
        println!("    cold  {}", render(&stats.ranked_cold()));
    }

    if let Some(runs) = &stats.runs {
        let total = runs.total().max(1) as f64;
        let share = |n: usize| n as f64 * 100.0 / total;
        println!(
            "    runs  none {} ({:.1}%)  two {} ({:.1}%)  three {} ({:.1}%)  longer {} ({:.1}%)",
            runs.none,
            share(runs.none),
            runs.two,
            share(runs.two),
            runs.three,
            share(runs.three),
            runs.longer,
            share(runs.longer)
        );
    }
}

fn render(ranked: &[(u8, usize)]) -> String {
    ranked
        .iter()
        .take(TOP)
        .map(|(value, count)| format!("{value:02}:{count}"))
        .collect::<Vec<_>>()
        .join(" ")
}
