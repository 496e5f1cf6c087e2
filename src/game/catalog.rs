//! Built-in games

use chrono::Weekday;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::{BallGroup, CellLayout, DateCell, GameSchema, IssueFormat, ParseRules, TableLocator};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum GameId {
    /// Double Color Ball (双色球)
    Ssq,
    /// Super Lotto (大乐透)
    Dlt,
    /// Seven Happy (七乐彩)
    Qlc,
    /// Seven Star (七星彩)
    Qxc,
}

impl GameId {
    pub const ALL: [GameId; 4] = [GameId::Ssq, GameId::Dlt, GameId::Qlc, GameId::Qxc];

    pub fn key(&self) -> &'static str {
        match self {
            GameId::Ssq => "ssq",
            GameId::Dlt => "dlt",
            GameId::Qlc => "qlc",
            GameId::Qxc => "qxc",
        }
    }

    pub fn schema(&self) -> GameSchema {
        match self {
            GameId::Ssq => GameSchema {
                id: *self,
                name: "双色球",
                groups: SSQ_GROUPS,
                issue: STANDARD_ISSUE,
                rules: HISTORY_TBODY,
                source_url: "https://datachart.500.com/ssq/history/newinc/history.php",
                start_year: 2003,
                draw_days: &[Weekday::Tue, Weekday::Thu, Weekday::Sun],
            },
            GameId::Dlt => GameSchema {
                id: *self,
                name: "大乐透",
                groups: DLT_GROUPS,
                issue: STANDARD_ISSUE,
                rules: HISTORY_TBODY,
                source_url: "https://datachart.500.com/dlt/history/newinc/history.php",
                start_year: 2007,
                draw_days: &[Weekday::Mon, Weekday::Wed, Weekday::Sat],
            },
            GameId::Qlc => GameSchema {
                id: *self,
                name: "七乐彩",
                groups: QLC_GROUPS,
                issue: STANDARD_ISSUE,
                rules: ParseRules {
                    locator: TableLocator::Ordinal(2),
                    header_rows: 1,
                    min_cells: 6,
                    issue_cell: 0,
                    layout: CellLayout::Packed {
                        column: 1,
                        split_pairs: true,
                    },
                    date: DateCell::Index(5),
                },
                source_url: "https://datachart.500.com/qlc/history/newinc/history.php",
                start_year: 2007,
                draw_days: &[Weekday::Mon, Weekday::Wed, Weekday::Fri],
            },
            GameId::Qxc => GameSchema {
                id: *self,
                name: "七星彩",
                groups: QXC_GROUPS,
                issue: STANDARD_ISSUE,
                rules: ParseRules {
                    locator: TableLocator::Ordinal(2),
                    header_rows: 1,
                    min_cells: 5,
                    issue_cell: 0,
                    layout: CellLayout::Packed {
                        column: 1,
                        split_pairs: false,
                    },
                    date: DateCell::Index(4),
                },
                source_url: "https://datachart.500.com/qxc/history/inc/history.php",
                start_year: 2004,
                draw_days: &[Weekday::Tue, Weekday::Fri],
            },
        }
    }
}

impl std::fmt::Display for GameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for GameId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GameId::ALL
            .into_iter()
            .find(|g| g.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| crate::Error::UnknownGame(s.to_string()))
    }
}

const STANDARD_ISSUE: IssueFormat = IssueFormat {
    era_prefix: "20",
    short_len: 5,
    per_year: 200,
};

// 500.com "newinc" history pages: <tbody id="tdata">, one ball per cell,
// draw date in the last cell
const HISTORY_TBODY: ParseRules = ParseRules {
    locator: TableLocator::ElementId("tdata"),
    header_rows: 0,
    min_cells: 10,
    issue_cell: 0,
    layout: CellLayout::Spread { first: 1 },
    date: DateCell::Last,
};

const fn sorted_unique(
    name: &'static str,
    label: &'static str,
    count: usize,
    min: u8,
    max: u8,
) -> BallGroup {
    BallGroup {
        name,
        label,
        count,
        min,
        max,
        unique: true,
        sorted: true,
        positional: false,
        max_run: None,
        distinct_from: None,
    }
}

static SSQ_GROUPS: &[BallGroup] = &[
    BallGroup {
        max_run: Some(2),
        ..sorted_unique("red", "红球", 6, 1, 33)
    },
    sorted_unique("blue", "蓝球", 1, 1, 16),
];

static DLT_GROUPS: &[BallGroup] = &[
    BallGroup {
        max_run: Some(2),
        ..sorted_unique("front", "前区", 5, 1, 35)
    },
    sorted_unique("back", "后区", 2, 1, 12),
];

static QLC_GROUPS: &[BallGroup] = &[
    sorted_unique("basic", "基本号", 7, 1, 30),
    BallGroup {
        distinct_from: Some("basic"),
        ..sorted_unique("special", "特别号", 1, 1, 30)
    },
];

static QXC_GROUPS: &[BallGroup] = &[BallGroup {
    name: "numbers",
    label: "号码",
    count: 7,
    min: 0,
    max: 9,
    unique: false,
    sorted: false,
    positional: true,
    max_run: None,
    distinct_from: None,
}];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_game_has_consistent_schema() {
        for id in GameId::ALL {
            let schema = id.schema();
            assert_eq!(schema.id, id);
            assert!(!schema.groups.is_empty());
            for group in schema.groups {
                assert!(group.min <= group.max);
                if group.unique {
                    assert!(group.count <= group.domain_size());
                }
                if let Some(other) = group.distinct_from {
                    assert!(schema.group_index(other).is_some());
                }
            }
        }
    }

    #[test]
    fn test_game_id_from_str() {
        assert_eq!("DLT".parse::<GameId>().unwrap(), GameId::Dlt);
        assert_eq!(" qxc".parse::<GameId>().unwrap(), GameId::Qxc);
        assert!("pick3".parse::<GameId>().is_err());
    }

    #[test]
    fn test_table_names() {
        assert_eq!(GameId::Ssq.schema().table_name(), "ssq_draws");
        assert_eq!(GameId::Qlc.schema().table_name(), "qlc_draws");
    }
}
