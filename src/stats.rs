//! Frequency statistics over stored draws

use serde::Serialize;

use crate::draw::DrawRecord;
use crate::game::{longest_run, BallGroup, GameSchema};

/// Draws classified by their longest run of adjacent integers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunBuckets {
    pub none: usize,
    pub two: usize,
    pub three: usize,
    pub longer: usize,
}

impl RunBuckets {
    fn record(&mut self, run: usize) {
        match run {
            0 | 1 => self.none += 1,
            2 => self.two += 1,
            3 => self.three += 1,
            _ => self.longer += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.none + self.two + self.three + self.longer
    }
}

/// Counts for one ball group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupStats {
    #[serde(skip)]
    pub group: BallGroup,
    /// Occurrences per value, indexed by `value - group.min`
    pub counts: Vec<usize>,
    /// Per position counts, only for positional groups
    pub positions: Vec<Vec<usize>>,
    /// Only for non-positional groups of two or more values
    pub runs: Option<RunBuckets>,
}

impl GroupStats {
    /// Zero counts over the full domain of `group`.
    pub fn empty(group: BallGroup) -> Self {
        let size = group.domain_size();
        Self {
            group,
            counts: vec![0; size],
            positions: if group.positional {
                vec![vec![0; size]; group.count]
            } else {
                Vec::new()
            },
            runs: (!group.positional && group.count >= 2).then(RunBuckets::default),
        }
    }

    pub fn count(&self, value: u8) -> usize {
        self.slot(value).map_or(0, |i| self.counts[i])
    }

    /// Every value with its count, most frequent first, ties by value.
    pub fn ranked(&self) -> Vec<(u8, usize)> {
        rank(&self.counts, self.group.min, true)
    }

    /// Every value with its count, least frequent first. Ties run from the
    /// highest value down, so with no history hot and cold pools sit at
    /// opposite ends of the domain.
    pub fn ranked_cold(&self) -> Vec<(u8, usize)> {
        rank(&self.counts, self.group.min, false)
    }

    pub fn ranked_at(&self, position: usize) -> Vec<(u8, usize)> {
        match self.positions.get(position) {
            Some(counts) => rank(counts, self.group.min, true),
            None => self.ranked(),
        }
    }

    pub fn ranked_cold_at(&self, position: usize) -> Vec<(u8, usize)> {
        match self.positions.get(position) {
            Some(counts) => rank(counts, self.group.min, false),
            None => self.ranked_cold(),
        }
    }

    pub fn hot(&self, k: usize) -> Vec<u8> {
        self.ranked().into_iter().take(k).map(|(v, _)| v).collect()
    }

    pub fn cold(&self, k: usize) -> Vec<u8> {
        self.ranked_cold().into_iter().take(k).map(|(v, _)| v).collect()
    }

    fn slot(&self, value: u8) -> Option<usize> {
        self.group
            .contains(value)
            .then(|| usize::from(value - self.group.min))
    }
}

fn rank(counts: &[usize], min: u8, descending: bool) -> Vec<(u8, usize)> {
    let mut ranked: Vec<(u8, usize)> = counts
        .iter()
        .enumerate()
        .map(|(i, &c)| (min + i as u8, c))
        .collect();
    if descending {
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    } else {
        ranked.sort_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)));
    }
    ranked
}

/// Per-group value frequencies over a set of draws.
#[derive(Debug, Clone, Serialize)]
pub struct FrequencyIndex {
    pub draws: usize,
    pub groups: Vec<GroupStats>,
}

impl FrequencyIndex {
    pub fn build(schema: &GameSchema, records: &[DrawRecord]) -> Self {
        let mut groups: Vec<GroupStats> = schema
            .groups
            .iter()
            .copied()
            .map(GroupStats::empty)
            .collect();

        for record in records {
            for (stats, values) in groups.iter_mut().zip(record.numbers.groups()) {
                for (position, &value) in values.iter().enumerate() {
                    let Some(slot) = stats.slot(value) else {
                        continue;
                    };
                    stats.counts[slot] += 1;
                    if let Some(per_position) = stats.positions.get_mut(position) {
                        per_position[slot] += 1;
                    }
                }
                if let Some(runs) = stats.runs.as_mut() {
                    runs.record(longest_run(values));
                }
            }
        }

        Self {
            draws: records.len(),
            groups,
        }
    }

    pub fn group(&self, index: usize) -> Option<&GroupStats> {
        self.groups.get(index)
    }

    pub fn is_empty(&self) -> bool {
        self.draws == 0
    }
}
