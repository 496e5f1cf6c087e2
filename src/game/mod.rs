//! Static game descriptions
//!
//! A [`GameSchema`] is everything the pipeline needs to know about one game:
//! its ball groups, how issue ids are formed, where the source table lives
//! and how its cells map onto groups. Parser, store and generator are written
//! once against this description.

mod catalog;

pub use catalog::GameId;

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::draw::Combination;
use crate::error::RowError;

/// A named, fixed-size group of numbers within one draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BallGroup {
    pub name: &'static str,
    /// Human-readable label for reports and messages
    pub label: &'static str,
    pub count: usize,
    pub min: u8,
    pub max: u8,
    /// Values within the group must be distinct
    pub unique: bool,
    /// Values are stored and emitted in ascending order
    pub sorted: bool,
    /// Position carries meaning (digit games): frequencies are tracked per
    /// position and the normalised form keeps the order
    pub positional: bool,
    /// Candidates may not contain a run of adjacent integers longer than this
    pub max_run: Option<usize>,
    /// Values may not appear in the named group of the same draw
    pub distinct_from: Option<&'static str>,
}

impl BallGroup {
    pub fn domain(&self) -> impl Iterator<Item = u8> {
        self.min..=self.max
    }

    pub fn domain_size(&self) -> usize {
        usize::from(self.max - self.min) + 1
    }

    pub fn contains(&self, value: u8) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Upper bound of the "low" half of the domain.
    pub fn low_max(&self) -> u8 {
        let half = (self.domain_size() / 2).max(1);
        self.min + (half - 1) as u8
    }

    /// Column name of the value at `index` (zero based).
    pub fn column(&self, index: usize) -> String {
        format!("{}{}", self.name, index + 1)
    }
}

/// How issue ids are written by the source and by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssueFormat {
    /// Prepended to short ids (`25001` -> `2025001`)
    pub era_prefix: &'static str,
    /// Length of the short form used in source query parameters
    pub short_len: usize,
    /// Highest sequence number queried when backfilling one year
    pub per_year: u32,
}

impl IssueFormat {
    pub fn full_len(&self) -> usize {
        self.era_prefix.len() + self.short_len
    }

    /// Normalise a raw issue id cell to the full form.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let full = if raw.len() == self.short_len {
            format!("{}{}", self.era_prefix, raw)
        } else {
            raw.to_string()
        };
        (full.len() == self.full_len()).then_some(full)
    }

    /// Short form of a full issue id, as the source expects it in queries.
    pub fn short<'a>(&self, issue_id: &'a str) -> &'a str {
        let cut = issue_id.len().saturating_sub(self.short_len);
        &issue_id[cut..]
    }

    /// First and last issue id queried for `year`.
    pub fn year_range(&self, year: i32) -> (String, String) {
        let seq_len = self.full_len() - 4;
        (
            format!("{year:04}{:0width$}", 1, width = seq_len),
            format!("{year:04}{:0width$}", self.per_year, width = seq_len),
        )
    }
}

/// Where the draw table sits in the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableLocator {
    /// Element carrying this `id` attribute (a `tbody` or `table`)
    ElementId(&'static str),
    /// N-th `<table>` of the page, zero based
    Ordinal(usize),
}

impl std::fmt::Display for TableLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableLocator::ElementId(id) => write!(f, "#{id}"),
            TableLocator::Ordinal(n) => write!(f, "table[{n}]"),
        }
    }
}

/// How ball values are laid out across the cells of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellLayout {
    /// One value per cell; groups consume consecutive cells from `first`
    Spread { first: usize },
    /// All values in one whitespace-separated cell. With `split_pairs`, a
    /// 4-digit token is two 2-digit values written without a separator.
    Packed { column: usize, split_pairs: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateCell {
    Last,
    Index(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseRules {
    pub locator: TableLocator,
    pub header_rows: usize,
    pub min_cells: usize,
    pub issue_cell: usize,
    pub layout: CellLayout,
    pub date: DateCell,
}

/// Immutable description of one game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSchema {
    pub id: GameId,
    pub name: &'static str,
    pub groups: &'static [BallGroup],
    pub issue: IssueFormat,
    pub rules: ParseRules,
    pub source_url: &'static str,
    pub start_year: i32,
    pub draw_days: &'static [Weekday],
}

impl GameSchema {
    pub fn with_start_year(mut self, year: i32) -> Self {
        self.start_year = year;
        self
    }

    pub fn group_index(&self, name: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.name == name)
    }

    /// Total number of values in one draw.
    pub fn ball_count(&self) -> usize {
        self.groups.iter().map(|g| g.count).sum()
    }

    pub fn table_name(&self) -> String {
        format!("{}_draws", self.id.key())
    }

    /// Validate the structural invariants every stored draw satisfies.
    pub fn check_structure(&self, numbers: &Combination) -> Result<(), RowError> {
        let groups = numbers.groups();
        if groups.len() != self.groups.len() {
            return Err(RowError::Cardinality {
                group: "*",
                expected: self.groups.len(),
                found: groups.len(),
            });
        }

        for (group, values) in self.groups.iter().zip(groups) {
            if values.len() != group.count {
                return Err(RowError::Cardinality {
                    group: group.name,
                    expected: group.count,
                    found: values.len(),
                });
            }
            if let Some(&value) = values.iter().find(|v| !group.contains(**v)) {
                return Err(RowError::OutOfRange {
                    group: group.name,
                    value,
                    min: group.min,
                    max: group.max,
                });
            }
            if group.unique {
                if let Some(value) = first_repeat(values) {
                    return Err(RowError::Repeated {
                        group: group.name,
                        value,
                    });
                }
            }
            if let Some(other) = group.distinct_from {
                if let Some(idx) = self.group_index(other) {
                    if let Some(&value) = values.iter().find(|v| groups[idx].contains(v)) {
                        return Err(RowError::Overlap {
                            group: group.name,
                            other,
                            value,
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Structural invariants plus the combinatorial rules that only apply to
    /// generated candidates.
    pub fn accepts_candidate(&self, numbers: &Combination) -> bool {
        if self.check_structure(numbers).is_err() {
            return false;
        }
        self.groups
            .iter()
            .zip(numbers.groups())
            .all(|(group, values)| match group.max_run {
                Some(limit) => longest_run(values) <= limit,
                None => true,
            })
    }

    /// First draw day strictly after `date`.
    pub fn next_draw_after(&self, date: NaiveDate) -> Option<NaiveDate> {
        (1..=7)
            .map(|offset| date + Duration::days(offset))
            .find(|d| self.draw_days.contains(&d.weekday()))
    }
}

/// Length of the longest run of adjacent integers in `values`, in any order.
///
/// `[3, 1, 2, 9]` has a run of 3; a single value is a run of 1.
pub fn longest_run(values: &[u8]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut best = usize::from(!sorted.is_empty());
    let mut current = best;
    for pair in sorted.windows(2) {
        if pair[1] == pair[0] + 1 {
            current += 1;
            best = best.max(current);
        } else {
            current = 1;
        }
    }
    best
}

fn first_repeat(values: &[u8]) -> Option<u8> {
    let mut seen = [false; 256];
    values.iter().copied().find(|&v| {
        let dup = seen[usize::from(v)];
        seen[usize::from(v)] = true;
        dup
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combo(groups: &[&[u8]]) -> Combination {
        Combination::new(groups.iter().map(|g| g.to_vec()).collect())
    }

    #[test]
    fn test_issue_normalization() {
        let format = GameId::Dlt.schema().issue;
        assert_eq!(format.normalize("25001").as_deref(), Some("2025001"));
        assert_eq!(format.normalize("2025001").as_deref(), Some("2025001"));
        assert_eq!(format.normalize(" 07123 ").as_deref(), Some("2007123"));
        assert_eq!(format.normalize("250011"), None);
        assert_eq!(format.normalize("25a01"), None);
        assert_eq!(format.normalize(""), None);
    }

    #[test]
    fn test_year_range_and_short_form() {
        let format = GameId::Ssq.schema().issue;
        let (start, end) = format.year_range(2025);
        assert_eq!(start, "2025001");
        assert_eq!(end, "2025200");
        assert_eq!(format.short(&start), "25001");
        assert_eq!(format.short(&end), "25200");
    }

    #[test]
    fn test_longest_run() {
        assert_eq!(longest_run(&[]), 0);
        assert_eq!(longest_run(&[7]), 1);
        assert_eq!(longest_run(&[1, 5, 9]), 1);
        assert_eq!(longest_run(&[4, 5, 9]), 2);
        assert_eq!(longest_run(&[3, 1, 2, 9]), 3);
        assert_eq!(longest_run(&[10, 11, 12, 13, 20]), 4);
    }

    #[test]
    fn test_check_structure() {
        let dlt = GameId::Dlt.schema();
        assert!(dlt.check_structure(&combo(&[&[1, 5, 9, 20, 35], &[2, 12]])).is_ok());
        assert!(matches!(
            dlt.check_structure(&combo(&[&[1, 5, 9, 20], &[2, 12]])),
            Err(RowError::Cardinality { group: "front", .. })
        ));
        assert!(matches!(
            dlt.check_structure(&combo(&[&[1, 5, 9, 20, 36], &[2, 12]])),
            Err(RowError::OutOfRange { value: 36, .. })
        ));
        assert!(matches!(
            dlt.check_structure(&combo(&[&[1, 5, 5, 20, 30], &[2, 12]])),
            Err(RowError::Repeated { value: 5, .. })
        ));
    }

    #[test]
    fn test_distinct_from_rule() {
        let qlc = GameId::Qlc.schema();
        let ok = combo(&[&[1, 4, 9, 15, 20, 23, 30], &[2]]);
        let clash = combo(&[&[1, 4, 9, 15, 20, 23, 30], &[9]]);
        assert!(qlc.check_structure(&ok).is_ok());
        assert!(matches!(
            qlc.check_structure(&clash),
            Err(RowError::Overlap { value: 9, .. })
        ));
    }

    #[test]
    fn test_candidate_run_rule_is_candidate_only() {
        let ssq = GameId::Ssq.schema();
        let three_run = combo(&[&[1, 2, 3, 10, 20, 30], &[5]]);
        assert!(ssq.check_structure(&three_run).is_ok());
        assert!(!ssq.accepts_candidate(&three_run));

        let two_run = combo(&[&[1, 2, 10, 11, 20, 30], &[5]]);
        assert!(ssq.accepts_candidate(&two_run));
    }

    #[test]
    fn test_positional_group_allows_repeats() {
        let qxc = GameId::Qxc.schema();
        assert!(qxc.accepts_candidate(&combo(&[&[9, 9, 0, 0, 1, 2, 3]])));
    }

    #[test]
    fn test_low_half() {
        let dlt = GameId::Dlt.schema();
        assert_eq!(dlt.groups[0].low_max(), 17);
        assert_eq!(dlt.groups[1].low_max(), 6);
        assert_eq!(GameId::Qxc.schema().groups[0].low_max(), 4);
    }

    #[test]
    fn test_next_draw_day() {
        let dlt = GameId::Dlt.schema();
        // 2025-06-02 is a Monday; dlt draws Mon/Wed/Sat
        let monday = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        assert_eq!(
            dlt.next_draw_after(monday),
            NaiveDate::from_ymd_opt(2025, 6, 4)
        );
        let saturday = NaiveDate::from_ymd_opt(2025, 6, 7).unwrap();
        assert_eq!(
            dlt.next_draw_after(saturday),
            NaiveDate::from_ymd_opt(2025, 6, 9)
        );
    }
}
