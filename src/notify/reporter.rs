//! Operator error reports with per-error cooldown
//!
//! Every report gets a short id derived from its kind and message. The id is
//! the dedup key: a report whose id was sent within the kind's cooldown is
//! dropped. Cooldown state lives in a [`CooldownCache`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Local};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::{escape_html, Notifier};

// ============================================================================
// Classification
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn icon(&self) -> &'static str {
        match self {
            Severity::Info => "ℹ️",
            Severity::Warning => "⚠️",
            Severity::Error => "❌",
            Severity::Critical => "🚨",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Parse,
    Database,
    Critical,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Network => "NETWORK_ERROR",
            ErrorKind::Parse => "PARSE_ERROR",
            ErrorKind::Database => "DATABASE_ERROR",
            ErrorKind::Critical => "CRITICAL_ERROR",
        }
    }

    /// Map a fetch failure code (`SourceError::kind`) back to a kind.
    pub fn from_code(code: &str) -> Self {
        match code {
            "NETWORK_ERROR" => ErrorKind::Network,
            "PARSE_ERROR" => ErrorKind::Parse,
            "DATABASE_ERROR" => ErrorKind::Database,
            _ => ErrorKind::Critical,
        }
    }

    pub fn classify(err: &crate::Error) -> Self {
        match err {
            crate::Error::Storage(_) | crate::Error::CorruptRow { .. } => ErrorKind::Database,
            crate::Error::Source(source) => Self::from_code(source.kind()),
            _ => ErrorKind::Critical,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ErrorKind::Network => Severity::Error,
            ErrorKind::Parse => Severity::Warning,
            ErrorKind::Database => Severity::Error,
            ErrorKind::Critical => Severity::Critical,
        }
    }

    pub fn cooldown(&self) -> Duration {
        match self {
            ErrorKind::Network => Duration::minutes(15),
            ErrorKind::Parse => Duration::minutes(20),
            ErrorKind::Database => Duration::minutes(10),
            ErrorKind::Critical => Duration::minutes(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub context: Vec<(String, String)>,
}

impl ErrorReport {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.push((key.into(), value.to_string()));
        self
    }

    /// Dedup key: first 8 hex chars of sha256("{code}:{message}").
    pub fn id(&self) -> String {
        let digest = Sha256::digest(format!("{}:{}", self.kind.code(), self.message).as_bytes());
        let mut id = hex::encode(digest);
        id.truncate(8);
        id
    }
}

// ============================================================================
// Cooldown caches
// ============================================================================

pub trait CooldownCache {
    fn last_sent(&self, id: &str) -> Option<DateTime<Local>>;
    fn record(&mut self, id: &str, at: DateTime<Local>);
}

#[derive(Debug, Default, Clone)]
pub struct MemoryCache {
    entries: BTreeMap<String, DateTime<Local>>,
}

impl CooldownCache for MemoryCache {
    fn last_sent(&self, id: &str) -> Option<DateTime<Local>> {
        self.entries.get(id).copied()
    }

    fn record(&mut self, id: &str, at: DateTime<Local>) {
        self.entries.insert(id.to_string(), at);
    }
}

/// JSON file of `id -> timestamp`, read once and rewritten on every record.
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    entries: BTreeMap<String, DateTime<Local>>,
}

impl FileCache {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|err| {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "error cache unreadable, starting empty"
                );
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self { path, entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn persist(&self) -> crate::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(&self.entries)?)?;
        Ok(())
    }
}

impl CooldownCache for FileCache {
    fn last_sent(&self, id: &str) -> Option<DateTime<Local>> {
        self.entries.get(id).copied()
    }

    fn record(&mut self, id: &str, at: DateTime<Local>) {
        self.entries.insert(id.to_string(), at);
        if let Err(err) = self.persist() {
            warn!(path = %self.path.display(), error = %err, "failed to save error cache");
        }
    }
}

// ============================================================================
// Reporter
// ============================================================================

pub struct ErrorReporter<C> {
    cache: C,
}

impl<C: CooldownCache> ErrorReporter<C> {
    pub fn new(cache: C) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Claim the send slot for `id`. The slot is recorded before sending, so
    /// a failed delivery still starts the cooldown.
    fn should_notify(&mut self, id: &str, cooldown: Duration, now: DateTime<Local>) -> bool {
        if let Some(last) = self.cache.last_sent(id) {
            if now - last < cooldown {
                return false;
            }
        }
        self.cache.record(id, now);
        true
    }

    pub async fn report<N: Notifier>(&mut self, notifier: &N, report: &ErrorReport) -> bool {
        self.report_at(notifier, report, Local::now()).await
    }

    pub async fn report_at<N: Notifier>(
        &mut self,
        notifier: &N,
        report: &ErrorReport,
        now: DateTime<Local>,
    ) -> bool {
        let id = report.id();
        if !self.should_notify(&id, report.kind.cooldown(), now) {
            debug!(kind = report.kind.code(), %id, "error report in cooldown, skipped");
            return false;
        }

        let sent = notifier.send_alert(&build_message(report, &id, now)).await;
        if sent {
            info!(kind = report.kind.code(), %id, "error report sent");
        } else {
            warn!(kind = report.kind.code(), %id, "error report not delivered");
        }
        sent
    }
}

fn build_message(report: &ErrorReport, id: &str, at: DateTime<Local>) -> String {
    let severity = report.kind.severity();
    let mut message = format!("{} <b>系统错误通知</b>\n\n", severity.icon());
    message.push_str(&format!("🔍 <b>错误类型:</b> {}\n", report.kind.code()));
    message.push_str(&format!("📝 <b>错误信息:</b> {}\n", escape_html(&report.message)));
    message.push_str(&format!("⚡ <b>严重程度:</b> {}\n", severity.label()));
    message.push_str(&format!(
        "🕐 <b>发生时间:</b> {}\n",
        at.format("%Y-%m-%d %H:%M:%S")
    ));

    if !report.context.is_empty() {
        message.push_str("\n📊 <b>上下文信息:</b>\n");
        for (key, value) in &report.context {
            message.push_str(&format!("  • {}: {}\n", escape_html(key), escape_html(value)));
        }
    }

    message.push_str(&format!("\n🏷️ <b>错误ID:</b> <code>{id}</code>"));
    message
}
