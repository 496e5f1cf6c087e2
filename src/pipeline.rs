//! Per-game operations and multi-game runs
//!
//! A [`Pipeline`] composes source, store, generator and notifier for one
//! game at a time. Every operation returns a [`GameOutcome`] instead of an
//! error so that one game's failure never stops the others; failures are
//! also handed to the [`ErrorReporter`].

use chrono::{Local, NaiveDate};
use rand::RngCore;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::draw::DrawRecord;
use crate::error::{ConfigError, Result};
use crate::game::{GameId, GameSchema};
use crate::notify::{escape_html, CooldownCache, ErrorKind, ErrorReport, ErrorReporter, Notifier};
use crate::predict::{GenerationRun, Generator, HistoricalIndex, PredictionCandidate, StrategyKind};
use crate::reconcile::{FetchMode, ReconcileReport, Reconciler};
use crate::source::DrawSource;
use crate::stats::FrequencyIndex;
use crate::store::DrawStore;

const SUMMARY_RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━";

/// Candidates listed per game in the summary message
const SUMMARY_CANDIDATES: usize = 3;

/// Hot values logged per group before generating
const LOGGED_HOT: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct GameOutcome {
    pub game: GameId,
    pub success: bool,
    pub inserted: usize,
    pub duplicate: usize,
    pub skipped: usize,
    pub latest: Option<DrawRecord>,
    pub predictions: Vec<PredictionCandidate>,
    pub next_draw: Option<NaiveDate>,
    pub error: Option<String>,
}

impl GameOutcome {
    fn new(game: GameId) -> Self {
        Self {
            game,
            success: true,
            inserted: 0,
            duplicate: 0,
            skipped: 0,
            latest: None,
            predictions: Vec::new(),
            next_draw: None,
            error: None,
        }
    }

    fn failed(game: GameId, error: impl ToString) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Self::new(game)
        }
    }

    /// Combine the fetch and predict halves of one scheduled game run.
    fn merge(mut self, predicted: GameOutcome) -> Self {
        self.success &= predicted.success;
        self.error = self.error.or(predicted.error);
        self.predictions = predicted.predictions;
        self.next_draw = predicted.next_draw;
        self
    }
}

/// What `predict` asks for.
#[derive(Debug, Clone)]
pub struct PredictRequest {
    pub strategies: Vec<StrategyKind>,
    pub count: usize,
    /// Send the prediction message
    pub notify: bool,
}

impl PredictRequest {
    pub fn from_config(config: &Config) -> Self {
        Self {
            strategies: config.predict.strategies.clone(),
            count: config.predict.count,
            notify: true,
        }
    }
}

pub struct Pipeline<S, N, C> {
    config: Config,
    source: S,
    notifier: N,
    reporter: ErrorReporter<C>,
}

impl<S, N, C> Pipeline<S, N, C>
where
    S: DrawSource,
    N: Notifier,
    C: CooldownCache,
{
    pub fn new(config: Config, source: S, notifier: N, reporter: ErrorReporter<C>) -> Self {
        Self {
            config,
            source,
            notifier,
            reporter,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn open_store(&self, game: GameId) -> Result<DrawStore> {
        let store = DrawStore::open(&self.config.database_path(), self.config.game_schema(game))?;
        Ok(store.with_batch_size(self.config.fetch.batch_size))
    }

    async fn alert(&mut self, report: ErrorReport) {
        self.reporter.report(&self.notifier, &report).await;
    }

    // ============================================
    // FETCH
    // ============================================

    /// Reconcile `game` with the source. `Latest` falls back to the source's
    /// recent window when the current year's range yields nothing.
    pub async fn fetch_game(
        &mut self,
        game: GameId,
        mode: FetchMode,
        current_year: i32,
    ) -> GameOutcome {
        let report = match self.reconcile(game, mode, current_year).await {
            Ok(report) => report,
            Err(err) => {
                error!(%game, error = %err, "fetch aborted");
                self.alert(
                    ErrorReport::new(ErrorKind::classify(&err), err.to_string())
                        .with("game", game)
                        .with("operation", "fetch"),
                )
                .await;
                return GameOutcome::failed(game, err);
            }
        };

        for failure in &report.fetch_failures {
            self.alert(
                ErrorReport::new(ErrorKind::from_code(failure.kind), failure.error.clone())
                    .with("game", game)
                    .with("query", &failure.query),
            )
            .await;
        }
        for chunk in &report.insert.failed_chunks {
            self.alert(
                ErrorReport::new(ErrorKind::Database, chunk.error.clone())
                    .with("game", game)
                    .with("issues", format!("{}..{}", chunk.first_issue, chunk.last_issue)),
            )
            .await;
        }

        let mut outcome = GameOutcome::new(game);
        outcome.inserted = report.insert.inserted;
        outcome.duplicate = report.insert.duplicate;
        outcome.skipped = report.insert.skipped;
        outcome.latest = report.latest.clone();

        if let Some(chunk) = report.insert.failed_chunks.first() {
            outcome.success = false;
            outcome.error = Some(format!("insert failed: {}", chunk.error));
        } else if report.fetched == 0 {
            if let Some(failure) = report.fetch_failures.first() {
                outcome.success = false;
                outcome.error = Some(failure.error.clone());
            }
        }

        match &outcome.latest {
            Some(latest) => info!(
                %game,
                issue = %latest.issue_id,
                date = %latest.draw_date,
                numbers = %latest.numbers.display(),
                "latest draw"
            ),
            None => warn!(%game, "store is empty"),
        }
        outcome
    }

    async fn reconcile(
        &self,
        game: GameId,
        mode: FetchMode,
        current_year: i32,
    ) -> Result<ReconcileReport> {
        let latest_limit = self.config.fetch.latest_limit;
        let mut store = self.open_store(game)?;
        let mut reconciler = Reconciler::new(&self.source, &mut store);

        match mode {
            FetchMode::Full => reconciler.full(current_year).await,
            FetchMode::Latest => {
                let report = reconciler.incremental(current_year).await?;
                if report.fetched > 0 {
                    return Ok(report);
                }
                info!(
                    %game,
                    year = current_year,
                    "nothing fetched for current year, trying latest window"
                );
                let mut fallback = reconciler.latest(latest_limit).await?;
                let mut failures = report.fetch_failures;
                failures.append(&mut fallback.fetch_failures);
                fallback.fetch_failures = failures;
                Ok(fallback)
            }
        }
    }

    // ============================================
    // PREDICT
    // ============================================

    /// Generate candidates for `game` from everything stored.
    pub async fn predict_game<R: RngCore>(
        &mut self,
        game: GameId,
        request: &PredictRequest,
        rng: R,
    ) -> GameOutcome {
        let schema = self.config.game_schema(game);
        let (run, latest) = match self.generate(&schema, request, rng) {
            Ok(generated) => generated,
            Err(err) => {
                error!(%game, error = %err, "prediction aborted");
                self.alert(
                    ErrorReport::new(ErrorKind::classify(&err), err.to_string())
                        .with("game", game)
                        .with("operation", "predict"),
                )
                .await;
                return GameOutcome::failed(game, err);
            }
        };

        let mut outcome = GameOutcome::new(game);
        outcome.latest = latest;
        outcome.next_draw = schema.next_draw_after(Local::now().date_naive());
        if let Some(next) = outcome.next_draw {
            info!(%game, next_draw = %next, weekday = %next.format("%a"), "next draw");
        }

        if run.candidates.is_empty() {
            warn!(%game, requested = run.requested, "no candidate found");
            outcome.success = false;
            outcome.error = Some("no candidate found within the search limits".to_string());
            return outcome;
        }

        if request.notify && !self.notifier.send_prediction(&schema, &run.candidates).await {
            warn!(%game, "prediction notification not sent");
        }
        outcome.predictions = run.candidates;
        outcome
    }

    fn generate<R: RngCore>(
        &self,
        schema: &GameSchema,
        request: &PredictRequest,
        rng: R,
    ) -> Result<(GenerationRun, Option<DrawRecord>)> {
        if request.strategies.is_empty() {
            return Err(ConfigError::Missing("predict.strategies").into());
        }

        let store = self.open_store(schema.id)?;
        let records = store.all(None)?;
        if records.is_empty() {
            warn!(game = %schema.id, "no stored draws, generating without history");
        }

        let stats = FrequencyIndex::build(schema, &records);
        let history = HistoricalIndex::build(schema, &records);
        for (group, group_stats) in schema.groups.iter().zip(&stats.groups) {
            info!(
                game = %schema.id,
                group = group.name,
                draws = stats.draws,
                hot = ?group_stats.hot(LOGGED_HOT),
                runs = ?group_stats.runs,
                "frequency summary"
            );
        }

        let mut generator = Generator::new(self.config.search_limits(), rng);
        let run = generator.generate(schema, &stats, &history, &request.strategies, request.count);
        Ok((run, records.into_iter().next()))
    }

    // ============================================
    // MULTI-GAME
    // ============================================

    /// Incremental fetch then prediction for every game in `games`, followed
    /// by one summary message. Every game yields an outcome.
    pub async fn run_games<R: RngCore>(
        &mut self,
        games: &[GameId],
        current_year: i32,
        rng: &mut R,
    ) -> Vec<GameOutcome> {
        let request = PredictRequest {
            notify: false,
            ..PredictRequest::from_config(&self.config)
        };

        let mut outcomes = Vec::with_capacity(games.len());
        for &game in games {
            info!(%game, "processing game");
            let fetched = self.fetch_game(game, FetchMode::Latest, current_year).await;
            let predicted = self.predict_game(game, &request, &mut *rng).await;
            outcomes.push(fetched.merge(predicted));
        }

        let failed = outcomes.iter().filter(|o| !o.success).count();
        info!(games = outcomes.len(), failed, "run finished");

        if !outcomes.is_empty() && !self.notifier.send_message(&format_summary(&outcomes)).await {
            warn!("summary notification not sent");
        }
        outcomes
    }
}

/// HTML summary of one multi-game run.
pub fn format_summary(outcomes: &[GameOutcome]) -> String {
    let mut message = String::from("🎰 <b>彩票预测系统 - 每日更新</b>\n\n");

    for outcome in outcomes {
        let schema = outcome.game.schema();
        message.push_str(SUMMARY_RULE);
        message.push_str(&format!("\n<b>{}</b>\n\n", schema.name));

        if let Some(error) = &outcome.error {
            message.push_str(&format!("❌ {}\n", escape_html(error)));
        }

        match (&outcome.latest, outcome.inserted) {
            (Some(latest), n) if n > 0 => {
                message.push_str(&format!(
                    "📅 最新开奖: {} ({})\n🔴 号码: {}\n\n",
                    latest.issue_id,
                    latest.draw_date,
                    latest.numbers.display()
                ));
            }
            _ => message.push_str("✅ 暂无新数据\n"),
        }

        if !outcome.predictions.is_empty() {
            message.push_str(&format!(
                "🔮 <b>预测下一期（{} 组）</b>\n",
                outcome.predictions.len()
            ));
            for (i, candidate) in outcome.predictions.iter().take(SUMMARY_CANDIDATES).enumerate() {
                message.push_str(&format!("  {}. {}\n", i + 1, candidate.numbers.display()));
            }
            if outcome.predictions.len() > SUMMARY_CANDIDATES {
                message.push_str(&format!(
                    "  ... 还有 {} 组\n",
                    outcome.predictions.len() - SUMMARY_CANDIDATES
                ));
            }
        }
        message.push('\n');
    }

    message.push_str(SUMMARY_RULE);
    message.push_str(&format!(
        "\n⏰ 更新时间: {}\n",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    message
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use tempfile::TempDir;

    use super::*;
    use crate::notify::MemoryCache;
    use crate::reconcile::tests::{dlt_draw, ScriptedSource};
    use crate::source::FetchQuery;

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<String>>,
        alerts: Mutex<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        async fn send_message(&self, text: &str) -> bool {
            self.messages.lock().unwrap().push(text.to_string());
            true
        }

        async fn send_alert(&self, text: &str) -> bool {
            self.alerts.lock().unwrap().push(text.to_string());
            true
        }
    }

    fn pipeline(
        dir: &TempDir,
        source: ScriptedSource,
    ) -> Pipeline<ScriptedSource, RecordingNotifier, MemoryCache> {
        let mut config = Config::default();
        config.database.path = dir.path().join("draws.db").display().to_string();
        Pipeline::new(
            config,
            source,
            RecordingNotifier::default(),
            ErrorReporter::new(MemoryCache::default()),
        )
    }

    fn range(year: i32) -> FetchQuery {
        FetchQuery::Range {
            start: format!("{year}001"),
            end: format!("{year}200"),
        }
    }

    fn window() -> Vec<DrawRecord> {
        vec![
            dlt_draw("2025003", [4, 10, 16, 23, 31], [3, 5]),
            dlt_draw("2025002", [2, 6, 11, 27, 33], [1, 7]),
            dlt_draw("2025001", [3, 8, 15, 22, 30], [4, 9]),
        ]
    }

    #[tokio::test]
    async fn test_latest_falls_back_to_window() {
        let dir = TempDir::new().unwrap();
        let source = ScriptedSource::default()
            .with(range(2025), Vec::new())
            .with(FetchQuery::Latest { limit: 30 }, window());
        let mut pipeline = pipeline(&dir, source);

        let outcome = pipeline.fetch_game(GameId::Dlt, FetchMode::Latest, 2025).await;

        assert!(outcome.success);
        assert_eq!(outcome.inserted, 3);
        assert_eq!(outcome.latest.unwrap().issue_id, "2025003");
        assert!(pipeline.notifier().alerts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_source_fails_once_per_cooldown() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline(&dir, ScriptedSource::default());

        let first = pipeline.fetch_game(GameId::Dlt, FetchMode::Latest, 2025).await;
        assert!(!first.success);
        assert!(first.error.unwrap().contains("connection refused"));
        // current-year range and latest window failed with distinct messages
        let alerts = pipeline.notifier().alerts.lock().unwrap().len();
        assert_eq!(alerts, 2);

        let second = pipeline.fetch_game(GameId::Dlt, FetchMode::Latest, 2025).await;
        assert!(!second.success);
        assert_eq!(pipeline.notifier().alerts.lock().unwrap().len(), alerts);
    }

    #[tokio::test]
    async fn test_predict_avoids_stored_draws_and_notifies() {
        let dir = TempDir::new().unwrap();
        let source = ScriptedSource::default().with(range(2025), window());
        let mut pipeline = pipeline(&dir, source);
        pipeline.fetch_game(GameId::Dlt, FetchMode::Latest, 2025).await;

        let request = PredictRequest {
            strategies: vec![StrategyKind::Random, StrategyKind::Frequency],
            count: 5,
            notify: true,
        };
        let outcome = pipeline
            .predict_game(GameId::Dlt, &request, ChaCha8Rng::seed_from_u64(3))
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.predictions.len(), 5);
        assert!(outcome.next_draw.is_some());
        let schema = GameId::Dlt.schema();
        let stored: Vec<String> = window().iter().map(|r| r.numbers.key(&schema)).collect();
        for candidate in &outcome.predictions {
            assert!(!stored.contains(&candidate.numbers.key(&schema)));
        }

        let messages = pipeline.notifier().messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("大乐透预测"));
    }

    #[tokio::test]
    async fn test_predict_without_strategies_fails() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline(&dir, ScriptedSource::default());
        let request = PredictRequest {
            strategies: Vec::new(),
            count: 5,
            notify: true,
        };

        let outcome = pipeline
            .predict_game(GameId::Ssq, &request, ChaCha8Rng::seed_from_u64(1))
            .await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("predict.strategies"));
        assert!(pipeline.notifier().messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_games_reports_every_game() {
        let dir = TempDir::new().unwrap();
        let mut pipeline = pipeline(&dir, ScriptedSource::default());
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        let outcomes = pipeline
            .run_games(&[GameId::Ssq, GameId::Qxc], 2025, &mut rng)
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| !o.success));
        assert!(outcomes.iter().all(|o| o.predictions.len() == 5));

        let messages = pipeline.notifier().messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("<b>双色球</b>"));
        assert!(messages[0].contains("<b>七星彩</b>"));
        assert!(messages[0].contains("... 还有 2 组"));
    }

    #[test]
    fn test_summary_shows_new_draw() {
        let mut outcome = GameOutcome::new(GameId::Dlt);
        outcome.inserted = 1;
        outcome.latest = Some(dlt_draw("2025003", [4, 10, 16, 23, 31], [3, 5]));

        let message = format_summary(&[outcome]);

        assert!(message.starts_with("🎰 <b>彩票预测系统 - 每日更新</b>"));
        assert!(message.contains("📅 最新开奖: 2025003"));
        assert!(message.contains("🔴 号码: 04 10 16 23 31 + 03 05"));
        assert!(!message.contains("暂无新数据"));
    }
}
