//! Error types for drawkeeper.
//!
//! Library code returns [`Result`]; the command layer wraps it in `anyhow`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("stored row for issue {issue_id} is corrupt: {reason}")]
    CorruptRow { issue_id: String, reason: String },

    #[error("unknown game: {0}")]
    UnknownGame(String),
}

/// Failures while fetching a source document.
///
/// The reconciler turns every variant into an empty fetch plus a recorded
/// failure; none of them abort a multi-game run.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("draw table not found ({locator})")]
    TableNotFound { locator: String },

    #[error("invalid selector {selector:?}: {message}")]
    Selector { selector: String, message: String },
}

impl SourceError {
    /// Short classification used by the error reporter.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Network { .. } | SourceError::Status { .. } => "NETWORK_ERROR",
            SourceError::TableNotFound { .. } | SourceError::Selector { .. } => "PARSE_ERROR",
        }
    }
}

/// Why a single table row was rejected by the parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("expected at least {expected} cells, found {found}")]
    CellCount { expected: usize, found: usize },

    #[error("malformed issue id {0:?}")]
    IssueId(String),

    #[error("non-numeric ball value {0:?}")]
    NonNumeric(String),

    #[error("group {group}: expected {expected} values, found {found}")]
    Cardinality {
        group: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("group {group}: value {value} outside [{min}, {max}]")]
    OutOfRange {
        group: &'static str,
        value: u8,
        min: u8,
        max: u8,
    },

    #[error("group {group}: value {value} repeated")]
    Repeated { group: &'static str, value: u8 },

    #[error("group {group}: value {value} also drawn in {other}")]
    Overlap {
        group: &'static str,
        other: &'static str,
        value: u8,
    },

    #[error("no date found in {0:?}")]
    Date(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("missing {0}")]
    Missing(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
