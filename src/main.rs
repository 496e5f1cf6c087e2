use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use drawkeeper::cli::{self, fetch, list, predict, schedule, stats, strategies};
use drawkeeper::config::Config;
use drawkeeper::game::GameId;
use drawkeeper::pipeline::{GameOutcome, PredictRequest};
use drawkeeper::predict::StrategyKind;
use drawkeeper::reconcile::FetchMode;

#[derive(Parser)]
#[command(name = "drawkeeper")]
#[command(about = "Lottery draw ingestion, reconciliation and candidate generation tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "drawkeeper.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch draws into the local store
    Fetch {
        /// Game to fetch (all enabled games when omitted)
        game: Option<GameId>,

        /// Full backfill or current year only
        #[arg(short, long, value_enum, default_value = "latest")]
        mode: FetchMode,
    },

    /// Generate candidate combinations
    Predict {
        /// Game to predict (all enabled games when omitted)
        game: Option<GameId>,

        /// Number of candidates per game
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Strategy key, repeatable
        #[arg(short, long = "strategy", value_enum)]
        strategies: Vec<StrategyKind>,

        /// Do not send the prediction message
        #[arg(long)]
        no_notify: bool,
    },

    /// Fetch and predict every enabled game daily
    Schedule,

    /// List stored draws
    List {
        /// Game to list (all enabled games when omitted)
        game: Option<GameId>,

        /// Draws per game
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Show frequency statistics
    Stats {
        /// Game to analyse (all enabled games when omitted)
        game: Option<GameId>,
    },

    /// List available strategies
    Strategies,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = Cli::parse();

    // Load config, then let the environment override it
    let mut config = Config::load(&args.config).context("failed to load config")?;
    config
        .apply_env(|key| std::env::var(key).ok())
        .context("invalid environment override")?;

    let outcomes = match args.command {
        Commands::Fetch { game, mode } => {
            let games = cli::selected_games(&config, game);
            let mut pipeline = cli::build_pipeline(config)?;
            fetch::run(&mut pipeline, &games, mode).await?
        }
        Commands::Predict {
            game,
            count,
            strategies,
            no_notify,
        } => {
            let games = cli::selected_games(&config, game);
            let mut request = PredictRequest::from_config(&config);
            if let Some(count) = count {
                request.count = count;
            }
            if !strategies.is_empty() {
                request.strategies = strategies;
            }
            request.notify = !no_notify;

            let mut pipeline = cli::build_pipeline(config)?;
            predict::run(&mut pipeline, &games, &request).await?
        }
        Commands::Schedule => {
            let games = config.enabled_games();
            let mut pipeline = cli::build_pipeline(config)?;
            schedule::run(&mut pipeline, &games).await?;
            Vec::new()
        }
        Commands::List { game, limit } => {
            list::run(&config, &cli::selected_games(&config, game), limit)?;
            Vec::new()
        }
        Commands::Stats { game } => {
            stats::run(&config, &cli::selected_games(&config, game))?;
            Vec::new()
        }
        Commands::Strategies => {
            strategies::run();
            Vec::new()
        }
    };

    Ok(exit_code(&outcomes))
}

fn exit_code(outcomes: &[GameOutcome]) -> ExitCode {
    if outcomes.iter().all(|o| o.success) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
