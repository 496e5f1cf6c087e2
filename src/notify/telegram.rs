//! Telegram Bot API notifier

use std::time::Duration;

use reqwest::{Client, Proxy};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::Notifier;
use crate::config::TelegramConfig;
use crate::error::Result;

const API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetKind {
    Bot,
    Channel,
}

impl TargetKind {
    fn label(&self) -> &'static str {
        match self {
            TargetKind::Bot => "bot",
            TargetKind::Channel => "channel",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    kind: TargetKind,
    chat_id: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotInfo {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: Option<String>,
    targets: Vec<Target>,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let mut builder = Client::builder().timeout(Duration::from_secs(10));
        if let Some(proxy) = config.proxy.as_deref().filter(|p| !p.is_empty()) {
            info!(proxy, "telegram requests go through proxy");
            builder = builder.proxy(Proxy::all(proxy)?);
        }

        let token = config.bot_token.clone().filter(|t| !t.is_empty());
        if token.is_none() {
            warn!("telegram bot token not set, notifications disabled");
        }

        let targets = Self::targets(config);
        if targets.is_empty() {
            warn!("no telegram targets configured");
        }

        Ok(Self {
            client: builder.build()?,
            api_base: API_BASE.to_string(),
            token,
            targets,
        })
    }

    /// Point the notifier at another Bot API host.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn targets(config: &TelegramConfig) -> Vec<Target> {
        let mut targets = Vec::new();
        let configured = |id: &Option<String>| id.clone().filter(|s| !s.is_empty());
        if config.send_to_bot {
            if let Some(chat_id) = configured(&config.chat_id) {
                targets.push(Target {
                    kind: TargetKind::Bot,
                    chat_id,
                });
            }
        }
        if config.send_to_channel {
            if let Some(chat_id) = configured(&config.channel_id) {
                targets.push(Target {
                    kind: TargetKind::Channel,
                    chat_id,
                });
            }
        }
        targets
    }

    pub fn is_enabled(&self) -> bool {
        self.token.is_some() && !self.targets.is_empty()
    }

    fn method_url(&self, token: &str, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, token, method)
    }

    async fn send_to(&self, token: &str, target: &Target, text: &str) -> bool {
        let body = SendMessage {
            chat_id: &target.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        let result = self
            .client
            .post(self.method_url(token, "sendMessage"))
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        match result {
            Ok(_) => {
                info!(
                    to = target.kind.label(),
                    chat = %target.chat_id,
                    "telegram message sent"
                );
                true
            }
            Err(err) => {
                error!(
                    to = target.kind.label(),
                    chat = %target.chat_id,
                    error = %err,
                    "telegram send failed"
                );
                false
            }
        }
    }

    async fn send_to_targets(&self, text: &str, kinds: &[TargetKind]) -> bool {
        let Some(token) = self.token.as_deref() else {
            warn!("telegram bot token not set, message skipped");
            return false;
        };

        let mut sent = 0;
        let mut attempted = 0;
        for target in self.targets.iter().filter(|t| kinds.contains(&t.kind)) {
            attempted += 1;
            if self.send_to(token, target, text).await {
                sent += 1;
            }
        }

        if attempted == 0 {
            warn!("no telegram targets configured, message skipped");
            return false;
        }
        info!(sent, attempted, "telegram delivery finished");
        sent > 0
    }

    /// Check the token with `getMe`.
    pub async fn test_connection(&self) -> Result<Option<BotInfo>> {
        let Some(token) = self.token.as_deref() else {
            return Ok(None);
        };
        let response: ApiResponse<BotInfo> = self
            .client
            .get(self.method_url(token, "getMe"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !response.ok {
            warn!(description = ?response.description, "telegram getMe rejected");
            return Ok(None);
        }
        if let Some(bot) = &response.result {
            info!(username = ?bot.username, "telegram bot reachable");
        }
        Ok(response.result)
    }
}

impl Notifier for TelegramNotifier {
    async fn send_message(&self, text: &str) -> bool {
        self.send_to_targets(text, &[TargetKind::Bot, TargetKind::Channel])
            .await
    }

    /// Alerts only go to the bot chat, never to the public channel.
    async fn send_alert(&self, text: &str) -> bool {
        self.send_to_targets(text, &[TargetKind::Bot]).await
    }
}
