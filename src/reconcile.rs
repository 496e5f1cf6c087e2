//! Source-to-store reconciliation
//!
//! Pulls draws from a [`DrawSource`] and writes them into a [`DrawStore`]
//! without duplicating anything already stored. Source failures are recorded
//! in the report and never abort the run; storage failures do.

use clap::ValueEnum;
use serde::Serialize;
use tracing::{info, warn};

use crate::draw::DrawRecord;
use crate::error::Result;
use crate::game::GameId;
use crate::source::{DrawSource, FetchQuery};
use crate::store::{DrawStore, InsertReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Backfill every year from the game's start year
    Full,
    /// Current year only, falling back to the source's latest window
    Latest,
}

/// A fetch that returned nothing because the source failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub query: String,
    /// `NETWORK_ERROR` or `PARSE_ERROR`
    pub kind: &'static str,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub game: GameId,
    pub mode: FetchMode,
    /// Years queried, empty for a latest-window fetch
    pub years: Vec<i32>,
    pub fetched: usize,
    pub insert: InsertReport,
    pub latest: Option<DrawRecord>,
    pub total: usize,
    pub fetch_failures: Vec<FetchFailure>,
}

pub struct Reconciler<'a, S> {
    source: &'a S,
    store: &'a mut DrawStore,
}

impl<'a, S: DrawSource> Reconciler<'a, S> {
    pub fn new(source: &'a S, store: &'a mut DrawStore) -> Self {
        Self { source, store }
    }

    /// Fetch every year from the start year to `current_year`, then insert
    /// everything in one batch.
    pub async fn full(&mut self, current_year: i32) -> Result<ReconcileReport> {
        let schema = self.store.schema().clone();
        let years: Vec<i32> = (schema.start_year..=current_year).collect();
        info!(game = %schema.id, from = schema.start_year, to = current_year, "full fetch");

        let mut records = Vec::new();
        let mut failures = Vec::new();
        for &year in &years {
            let query = FetchQuery::year(&schema, year);
            records.extend(self.fetch(&query, &mut failures).await);
        }

        self.finish(FetchMode::Full, years, records, failures)
    }

    /// Fetch the current year's range once.
    pub async fn incremental(&mut self, current_year: i32) -> Result<ReconcileReport> {
        let schema = self.store.schema().clone();
        let query = FetchQuery::year(&schema, current_year);

        let mut failures = Vec::new();
        let records = self.fetch(&query, &mut failures).await;
        self.finish(FetchMode::Latest, vec![current_year], records, failures)
    }

    /// Fetch the source's own recent window.
    pub async fn latest(&mut self, limit: usize) -> Result<ReconcileReport> {
        let query = FetchQuery::Latest { limit };

        let mut failures = Vec::new();
        let records = self.fetch(&query, &mut failures).await;
        self.finish(FetchMode::Latest, Vec::new(), records, failures)
    }

    async fn fetch(&self, query: &FetchQuery, failures: &mut Vec<FetchFailure>) -> Vec<DrawRecord> {
        let schema = self.store.schema();
        match self.source.fetch(schema, query).await {
            Ok(records) => records,
            Err(err) => {
                warn!(
                    game = %schema.id,
                    source = self.source.name(),
                    %query,
                    error = %err,
                    "fetch failed"
                );
                failures.push(FetchFailure {
                    query: query.to_string(),
                    kind: err.kind(),
                    error: err.to_string(),
                });
                Vec::new()
            }
        }
    }

    fn finish(
        &mut self,
        mode: FetchMode,
        years: Vec<i32>,
        records: Vec<DrawRecord>,
        fetch_failures: Vec<FetchFailure>,
    ) -> Result<ReconcileReport> {
        let fetched = records.len();
        let insert = self.store.insert_batch(&records, true)?;
        let latest = self.store.latest()?;
        let total = self.store.count()?;

        let game = self.store.schema().id;
        info!(
            %game,
            fetched,
            inserted = insert.inserted,
            skipped = insert.skipped,
            duplicate = insert.duplicate,
            total,
            "reconciled"
        );

        Ok(ReconcileReport {
            game,
            mode,
            years,
            fetched,
            insert,
            latest,
            total,
            fetch_failures,
        })
    }
}
