//! Draw table parsing
//!
//! Turns a history page into ordered [`DrawRecord`]s using the schema's
//! [`ParseRules`](crate::game::ParseRules). Rows that do not satisfy the
//! schema are skipped one by one; only a missing table fails the document.

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::draw::{Combination, DrawRecord};
use crate::error::{RowError, SourceError};
use crate::game::{CellLayout, DateCell, GameSchema, TableLocator};

const DATE_PATTERN: &str = r"\d{4}-\d{2}-\d{2}";

/// Result of parsing one source document.
#[derive(Debug, Default)]
pub struct ParsedDocument {
    /// Accepted rows, in document order
    pub records: Vec<DrawRecord>,
    /// Number of rows skipped for structural reasons
    pub rejected: usize,
}

/// Parse every draw row of `html` for `schema`.
pub fn parse_document(schema: &GameSchema, html: &str) -> Result<ParsedDocument, SourceError> {
    let selectors = Selectors::new()?;
    let document = Html::parse_document(html);

    let table = locate_table(&document, &selectors, schema.rules.locator)?;
    let mut parsed = ParsedDocument::default();

    for (index, row) in table
        .select(&selectors.row)
        .skip(schema.rules.header_rows)
        .enumerate()
    {
        let cells: Vec<String> = row
            .select(&selectors.cell)
            .map(|cell| clean_cell(&cell.text().collect::<String>()))
            .collect();

        match parse_row(schema, &cells, &selectors.date) {
            Ok(record) => parsed.records.push(record),
            Err(reason) => {
                debug!(game = %schema.id, row = index, %reason, "skipping row");
                parsed.rejected += 1;
            }
        }
    }

    Ok(parsed)
}

struct Selectors {
    table: Selector,
    row: Selector,
    cell: Selector,
    date: Regex,
}

impl Selectors {
    fn new() -> Result<Self, SourceError> {
        Ok(Self {
            table: selector("table")?,
            row: selector("tr")?,
            cell: selector("td")?,
            date: Regex::new(DATE_PATTERN).map_err(|e| SourceError::Selector {
                selector: DATE_PATTERN.to_string(),
                message: e.to_string(),
            })?,
        })
    }
}

fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|e| SourceError::Selector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

fn locate_table<'a>(
    document: &'a Html,
    selectors: &Selectors,
    locator: TableLocator,
) -> Result<ElementRef<'a>, SourceError> {
    let found = match locator {
        TableLocator::ElementId(id) => {
            let by_id = selector(&format!("#{id}"))?;
            document.select(&by_id).next()
        }
        TableLocator::Ordinal(n) => document.select(&selectors.table).nth(n),
    };

    found.ok_or_else(|| SourceError::TableNotFound {
        locator: locator.to_string(),
    })
}

fn clean_cell(text: &str) -> String {
    text.replace('\u{a0}', " ").replace(',', "").trim().to_string()
}

/// Parse one row of cleaned cell texts.
pub(crate) fn parse_row(
    schema: &GameSchema,
    cells: &[String],
    date_pattern: &Regex,
) -> Result<DrawRecord, RowError> {
    let rules = &schema.rules;
    if cells.len() < rules.min_cells {
        return Err(RowError::CellCount {
            expected: rules.min_cells,
            found: cells.len(),
        });
    }

    let raw_issue = cell(cells, rules.issue_cell)?;
    let issue_id = schema
        .issue
        .normalize(raw_issue)
        .ok_or_else(|| RowError::IssueId(raw_issue.to_string()))?;

    let groups = match rules.layout {
        CellLayout::Spread { first } => spread_values(schema, cells, first)?,
        CellLayout::Packed {
            column,
            split_pairs,
        } => packed_values(schema, cell(cells, column)?, split_pairs)?,
    };

    let date_text = match rules.date {
        DateCell::Last => cells.last().map(String::as_str).unwrap_or_default(),
        DateCell::Index(i) => cell(cells, i)?,
    };
    let draw_date = date_pattern
        .find(date_text)
        .and_then(|m| NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok())
        .ok_or_else(|| RowError::Date(date_text.to_string()))?;

    let mut numbers = Combination::new(groups);
    numbers.sort_groups(schema);
    schema.check_structure(&numbers)?;

    Ok(DrawRecord {
        issue_id,
        draw_date,
        numbers,
    })
}

fn cell(cells: &[String], index: usize) -> Result<&str, RowError> {
    cells
        .get(index)
        .map(String::as_str)
        .ok_or(RowError::CellCount {
            expected: index + 1,
            found: cells.len(),
        })
}

fn ball(text: &str) -> Result<u8, RowError> {
    text.trim()
        .parse::<u8>()
        .map_err(|_| RowError::NonNumeric(text.to_string()))
}

fn spread_values(
    schema: &GameSchema,
    cells: &[String],
    first: usize,
) -> Result<Vec<Vec<u8>>, RowError> {
    let mut cursor = first;
    let mut groups = Vec::with_capacity(schema.groups.len());
    for group in schema.groups {
        let end = cursor + group.count;
        let slice = cells.get(cursor..end).ok_or(RowError::CellCount {
            expected: end,
            found: cells.len(),
        })?;
        groups.push(slice.iter().map(|s| ball(s)).collect::<Result<Vec<_>, _>>()?);
        cursor = end;
    }
    Ok(groups)
}

fn packed_values(
    schema: &GameSchema,
    text: &str,
    split_pairs: bool,
) -> Result<Vec<Vec<u8>>, RowError> {
    let mut values = Vec::with_capacity(schema.ball_count());
    for token in text.split_whitespace() {
        if split_pairs && token.len() == 4 && token.bytes().all(|b| b.is_ascii_digit()) {
            values.push(ball(&token[..2])?);
            values.push(ball(&token[2..])?);
        } else {
            values.push(ball(token)?);
        }
    }

    if values.len() != schema.ball_count() {
        return Err(RowError::Cardinality {
            group: "*",
            expected: schema.ball_count(),
            found: values.len(),
        });
    }

    let mut rest = values.as_slice();
    let mut groups = Vec::with_capacity(schema.groups.len());
    for group in schema.groups {
        let (head, tail) = rest.split_at(group.count);
        groups.push(head.to_vec());
        rest = tail;
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameId;

    fn ssq_row(issue: &str, balls: &str, date: &str) -> String {
        let cells: String = balls
            .split(' ')
            .map(|b| format!("<td class=\"t_cfont2\">{b}</td>"))
            .collect();
        format!(
            "<tr><td>{issue}</td>{cells}<td>&nbsp;</td><td>1,234,567</td><td>5</td>\
             <td>8,000,000</td><td>120</td><td>200,000</td><td>{date}</td></tr>"
        )
    }

    fn tdata_page(rows: &[String]) -> String {
        format!(
            "<html><body><table><thead><tr><th>期号</th></tr></thead>\
             <tbody id=\"tdata\">{}</tbody></table></body></html>",
            rows.concat()
        )
    }

    fn ordinal_page(header: &str, rows: &[String]) -> String {
        format!(
            "<html><body><table><tr><td>nav</td></tr></table>\
             <table><tr><td>filter</td></tr></table>\
             <table><tr>{header}</tr>{}</table></body></html>",
            rows.concat()
        )
    }

    #[test]
    fn test_parse_ssq_rows_in_document_order() {
        let html = tdata_page(&[
            ssq_row("25069", "33 02 15 07 21 09 04", "2025-06-17"),
            ssq_row("25068", "01 05 12 18 26 30 16", "2025-06-15"),
        ]);
        let parsed = parse_document(&GameId::Ssq.schema(), &html).unwrap();

        assert_eq!(parsed.rejected, 0);
        assert_eq!(parsed.records.len(), 2);
        let first = &parsed.records[0];
        assert_eq!(first.issue_id, "2025069");
        assert_eq!(first.draw_date, NaiveDate::from_ymd_opt(2025, 6, 17).unwrap());
        assert_eq!(first.numbers.group(0), &[2, 7, 9, 15, 21, 33]);
        assert_eq!(first.numbers.group(1), &[4]);
        assert_eq!(parsed.records[1].issue_id, "2025068");
    }

    #[test]
    fn test_bad_rows_are_skipped_without_affecting_siblings() {
        let html = tdata_page(&[
            ssq_row("25070", "01 02 03 04 05 06 07", "2025-06-19"),
            "<tr><td>25071</td><td>01</td><td>2025-06-20</td></tr>".to_string(),
            ssq_row("25072", "01 02 xx 04 05 06 07", "2025-06-22"),
            ssq_row("25073", "01 02 03 04 05 06 07", "soon"),
            ssq_row("25074", "01 02 03 04 05 34 07", "2025-06-26"),
            ssq_row("25075", "01 01 03 04 05 06 07", "2025-06-29"),
            ssq_row("abc", "01 02 03 04 05 06 07", "2025-07-01"),
            ssq_row("25077", "08 09 10 11 12 13 14", "2025-07-03"),
        ]);
        let parsed = parse_document(&GameId::Ssq.schema(), &html).unwrap();

        assert_eq!(parsed.rejected, 6);
        let ids: Vec<_> = parsed.records.iter().map(|r| r.issue_id.as_str()).collect();
        assert_eq!(ids, vec!["2025070", "2025077"]);
    }

    #[test]
    fn test_dlt_spread_layout() {
        let html = tdata_page(&[ssq_row("25068", "35 01 20 09 05 12 02", "2025-06-16")]);
        let parsed = parse_document(&GameId::Dlt.schema(), &html).unwrap();

        let record = &parsed.records[0];
        assert_eq!(record.numbers.group(0), &[1, 5, 9, 20, 35]);
        assert_eq!(record.numbers.group(1), &[2, 12]);
    }

    #[test]
    fn test_qlc_packed_cell_with_joined_special() {
        let html = ordinal_page(
            "<td>期号</td><td>号码</td><td>x</td><td>x</td><td>x</td><td>日期</td>",
            &[
                "<tr><td>25060</td><td>04 09 15 20 23 25 2721</td><td>1</td><td>2</td><td>3</td><td>2025-05-26</td></tr>".to_string(),
                "<tr><td>25061</td><td>04 09 15 20 23 25 2709</td><td>1</td><td>2</td><td>3</td><td>2025-05-28</td></tr>".to_string(),
            ],
        );
        let parsed = parse_document(&GameId::Qlc.schema(), &html).unwrap();

        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.rejected, 1);
        let record = &parsed.records[0];
        assert_eq!(record.issue_id, "2025060");
        assert_eq!(record.numbers.group(0), &[4, 9, 15, 20, 23, 25, 27]);
        assert_eq!(record.numbers.group(1), &[21]);
    }

    #[test]
    fn test_qxc_keeps_digit_positions() {
        let html = ordinal_page(
            "<td>期号</td><td>号码</td><td>x</td><td>x</td><td>日期</td>",
            &["<tr><td>25070</td><td>9 1 5 0 0 2 3</td><td>a</td><td>b</td><td>2025-06-20 (五)</td></tr>"
                .to_string()],
        );
        let parsed = parse_document(&GameId::Qxc.schema(), &html).unwrap();

        let record = &parsed.records[0];
        assert_eq!(record.numbers.group(0), &[9, 1, 5, 0, 0, 2, 3]);
        assert_eq!(record.draw_date, NaiveDate::from_ymd_opt(2025, 6, 20).unwrap());
    }

    #[test]
    fn test_missing_table_fails_document() {
        let err = parse_document(&GameId::Dlt.schema(), "<html><body></body></html>").unwrap_err();
        assert!(matches!(err, SourceError::TableNotFound { .. }));
        assert_eq!(err.kind(), "PARSE_ERROR");

        let err = parse_document(&GameId::Qxc.schema(), "<table></table>").unwrap_err();
        assert!(matches!(err, SourceError::TableNotFound { .. }));
    }

    #[test]
    fn test_parse_row_reports_reason() {
        let re = Regex::new(DATE_PATTERN).unwrap();
        let schema = GameId::Qlc.schema();
        let cells: Vec<String> = ["25060", "04 09 15", "1", "2", "3", "2025-05-26"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            parse_row(&schema, &cells, &re).unwrap_err(),
            RowError::Cardinality {
                group: "*",
                expected: 8,
                found: 3
            }
        );
    }
}
