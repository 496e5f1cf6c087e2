//! Configuration management with YAML support

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::game::{GameId, GameSchema};
use crate::predict::{SearchLimits, StrategyKind};
use crate::source::HttpSourceOptions;
use crate::store::DEFAULT_BATCH_SIZE;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub games: BTreeMap<GameId, GameConfig>,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub predict: PredictConfig,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

/// Per game switches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Overrides the first year of a full backfill
    #[serde(default)]
    pub start_year: Option<i32>,
}

/// Source fetching and batch insert settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Rows kept from the source's latest window
    #[serde(default = "default_latest_limit")]
    pub latest_limit: usize,
}

/// Candidate generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictConfig {
    #[serde(default = "default_strategies")]
    pub strategies: Vec<StrategyKind>,

    #[serde(default = "default_prediction_count")]
    pub count: usize,

    #[serde(default = "default_per_candidate_attempts")]
    pub per_candidate_attempts: usize,

    #[serde(default = "default_attempt_ceiling")]
    pub attempt_ceiling: usize,

    #[serde(default = "default_time_budget_secs")]
    pub time_budget_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default = "default_error_cache_path")]
    pub error_cache_path: String,
}

/// Telegram bot settings. Without a token every notification is skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Private chat or group the bot posts to
    #[serde(default)]
    pub chat_id: Option<String>,

    #[serde(default)]
    pub channel_id: Option<String>,

    #[serde(default = "default_enabled")]
    pub send_to_bot: bool,

    #[serde(default = "default_enabled")]
    pub send_to_channel: bool,

    #[serde(default)]
    pub proxy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Local time of the daily run, `HH:MM`
    #[serde(default = "default_schedule_time")]
    pub time: String,
}

// Default value functions
fn default_database_path() -> String {
    "~/.local/share/drawkeeper/drawkeeper.db".to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_retries() -> u32 {
    3
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_latest_limit() -> usize {
    30
}

fn default_strategies() -> Vec<StrategyKind> {
    vec![StrategyKind::Frequency]
}

fn default_prediction_count() -> usize {
    5
}

fn default_per_candidate_attempts() -> usize {
    20
}

fn default_attempt_ceiling() -> usize {
    200
}

fn default_time_budget_secs() -> u64 {
    5
}

fn default_error_cache_path() -> String {
    "logs/error_cache.json".to_string()
}

fn default_schedule_time() -> String {
    "21:30".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start_year: None,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            batch_size: default_batch_size(),
            latest_limit: default_latest_limit(),
        }
    }
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self {
            strategies: default_strategies(),
            count: default_prediction_count(),
            per_candidate_attempts: default_per_candidate_attempts(),
            attempt_ceiling: default_attempt_ceiling(),
            time_budget_secs: default_time_budget_secs(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig::default(),
            error_cache_path: default_error_cache_path(),
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            channel_id: None,
            send_to_bot: true,
            send_to_channel: true,
            proxy: None,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            time: default_schedule_time(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./drawkeeper.yaml (current directory)
    /// 3. <config dir>/drawkeeper/drawkeeper.yaml (~/.config on Linux)
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let mut search_paths = vec![
            PathBuf::from(shellexpand::tilde(path).to_string()),
            PathBuf::from("drawkeeper.yaml"),
        ];
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("drawkeeper").join("drawkeeper.yaml"));
        }

        for search_path in &search_paths {
            if search_path.exists() {
                return Self::from_file(&search_path.to_string_lossy());
            }
        }

        // No config file found, use defaults
        Ok(Config::default())
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    /// Apply environment overrides through `lookup` (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let telegram = &mut self.notify.telegram;
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
            telegram.bot_token = Some(token);
        }
        if let Some(chat) = lookup("TELEGRAM_CHAT_ID") {
            telegram.chat_id = Some(chat);
        }
        if let Some(channel) = lookup("TELEGRAM_CHANNEL_ID") {
            telegram.channel_id = Some(channel);
        }
        if let Some(proxy) = lookup("TELEGRAM_PROXY") {
            telegram.proxy = Some(proxy);
        }
        if let Some(flag) = lookup("TELEGRAM_SEND_TO_BOT") {
            telegram.send_to_bot = parse_flag("TELEGRAM_SEND_TO_BOT", &flag)?;
        }
        if let Some(flag) = lookup("TELEGRAM_SEND_TO_CHANNEL") {
            telegram.send_to_channel = parse_flag("TELEGRAM_SEND_TO_CHANNEL", &flag)?;
        }

        if let Some(keys) = lookup("DEFAULT_STRATEGIES") {
            self.predict.strategies = parse_strategies(&keys)?;
        }
        if let Some(count) = lookup("DEFAULT_PREDICTION_COUNT") {
            self.predict.count =
                count
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: "DEFAULT_PREDICTION_COUNT".to_string(),
                        value: count.clone(),
                    })?;
        }

        Ok(())
    }

    /// Get the database path, expanding ~ to home directory
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.database.path).to_string())
    }

    pub fn error_cache_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.notify.error_cache_path).to_string())
    }

    /// Games are enabled unless switched off explicitly
    pub fn is_game_enabled(&self, game: GameId) -> bool {
        self.games.get(&game).map_or(true, |g| g.enabled)
    }

    pub fn enabled_games(&self) -> Vec<GameId> {
        GameId::ALL
            .into_iter()
            .filter(|&g| self.is_game_enabled(g))
            .collect()
    }

    /// Built-in schema of `game` with configured overrides applied
    pub fn game_schema(&self, game: GameId) -> GameSchema {
        let schema = game.schema();
        match self.games.get(&game).and_then(|g| g.start_year) {
            Some(year) => schema.with_start_year(year),
            None => schema,
        }
    }

    pub fn search_limits(&self) -> SearchLimits {
        SearchLimits {
            per_candidate_attempts: self.predict.per_candidate_attempts,
            attempt_ceiling: self.predict.attempt_ceiling,
            time_budget: Duration::from_secs(self.predict.time_budget_secs),
            ..SearchLimits::default()
        }
    }

    pub fn http_options(&self) -> HttpSourceOptions {
        HttpSourceOptions {
            timeout: Duration::from_secs(self.fetch.timeout_secs),
            retries: self.fetch.retries,
            ..HttpSourceOptions::default()
        }
    }

    pub fn schedule_time(&self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::parse_from_str(self.schedule.time.trim(), "%H:%M").map_err(|_| {
            ConfigError::InvalidValue {
                key: "schedule.time".to_string(),
                value: self.schedule.time.clone(),
            }
        })
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Comma separated strategy keys, e.g. `frequency,coldHot`
pub fn parse_strategies(keys: &str) -> Result<Vec<StrategyKind>, ConfigError> {
    keys.split(',')
        .filter(|k| !k.trim().is_empty())
        .map(|k| {
            StrategyKind::from_key(k).ok_or_else(|| ConfigError::InvalidValue {
                key: "strategy".to_string(),
                value: k.trim().to_string(),
            })
        })
        .collect()
}
