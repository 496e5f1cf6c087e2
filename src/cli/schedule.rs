//! Schedule command implementation
//!
//! Runs every enabled game once at start, then daily at the configured local
//! time until interrupted.

use std::time::Duration;

use anyhow::Result;
use chrono::{Datelike, Local, NaiveDateTime, NaiveTime};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use super::{print_outcomes, LivePipeline};
use crate::game::GameId;

pub async fn run(pipeline: &mut LivePipeline, games: &[GameId]) -> Result<()> {
    let at = pipeline.config().schedule_time()?;

    match pipeline.notifier().test_connection().await {
        Ok(Some(bot)) => println!(
            "🤖 Telegram bot @{} connected",
            bot.username.as_deref().unwrap_or("?")
        ),
        Ok(None) => println!("🤖 Telegram not available, messages will be skipped"),
        Err(err) => warn!(error = %err, "telegram connection check failed"),
    }

    let names: Vec<&str> = games.iter().map(|g| g.key()).collect();
    println!(
        "⏰ Daily run at {} for {}. Press Ctrl-C to stop.",
        at.format("%H:%M"),
        names.join(", ")
    );

    run_once(pipeline, games).await;

    loop {
        let now = Local::now().naive_local();
        let next = next_run(now, at);
        info!(next = %next, "next scheduled run");
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = tokio::time::sleep(wait) => run_once(pipeline, games).await,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, scheduler stopped");
                break;
            }
        }
    }

    Ok(())
}

async fn run_once(pipeline: &mut LivePipeline, games: &[GameId]) {
    info!(started = %Local::now().format("%Y-%m-%d %H:%M:%S"), "scheduled run");
    let mut rng = ChaCha8Rng::from_entropy();
    let outcomes = pipeline.run_games(games, Local::now().year(), &mut rng).await;
    print_outcomes(&outcomes);
}

/// First time-of-day `at` strictly after `now`.
fn next_run(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}
