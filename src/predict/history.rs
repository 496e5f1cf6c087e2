//! Set of historically drawn combinations

use std::collections::HashSet;

use crate::draw::DrawRecord;
use crate::game::GameSchema;

/// Normalised keys of every stored draw, rebuilt per run.
#[derive(Debug, Default, Clone)]
pub struct HistoricalIndex {
    keys: HashSet<String>,
}

impl HistoricalIndex {
    pub fn build(schema: &GameSchema, records: &[DrawRecord]) -> Self {
        Self {
            keys: records.iter().map(|r| r.numbers.key(schema)).collect(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
