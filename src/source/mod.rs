//! Draw sources
//!
//! A [`DrawSource`] turns a [`FetchQuery`] into parsed draw records for one
//! game. [`HttpSource`] is the production implementation; tests substitute
//! in-memory sources.

mod http;
mod parser;

pub use http::{HttpSource, HttpSourceOptions};
pub use parser::{parse_document, ParsedDocument};

use crate::draw::DrawRecord;
use crate::error::SourceError;
use crate::game::GameSchema;

/// What to ask the source for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchQuery {
    /// Inclusive range of full issue ids
    Range { start: String, end: String },
    /// The source's own recent window, truncated to `limit` rows
    Latest { limit: usize },
}

impl FetchQuery {
    /// Every issue of one year, as the schema's issue format lays them out.
    pub fn year(schema: &GameSchema, year: i32) -> Self {
        let (start, end) = schema.issue.year_range(year);
        FetchQuery::Range { start, end }
    }
}

impl std::fmt::Display for FetchQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchQuery::Range { start, end } => write!(f, "{start}..{end}"),
            FetchQuery::Latest { limit } => write!(f, "latest({limit})"),
        }
    }
}

/// Source of published draws.
#[allow(async_fn_in_trait)]
pub trait DrawSource {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Fetch and parse the draws matching `query`, in source order.
    async fn fetch(
        &self,
        schema: &GameSchema,
        query: &FetchQuery,
    ) -> Result<Vec<DrawRecord>, SourceError>;
}
