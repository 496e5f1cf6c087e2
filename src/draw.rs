//! Draw records and number combinations

use chrono::NaiveDate;
use serde::Serialize;

use crate::game::GameSchema;

/// Ball values of one draw or candidate, one list per schema group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Combination(Vec<Vec<u8>>);

impl Combination {
    pub fn new(groups: Vec<Vec<u8>>) -> Self {
        Self(groups)
    }

    pub fn groups(&self) -> &[Vec<u8>] {
        &self.0
    }

    pub fn group(&self, index: usize) -> &[u8] {
        self.0.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sort every group the schema declares as sorted.
    pub fn sort_groups(&mut self, schema: &GameSchema) {
        for (group, values) in schema.groups.iter().zip(self.0.iter_mut()) {
            if group.sorted {
                values.sort_unstable();
            }
        }
    }

    /// Order-insensitive identity used for duplicate detection.
    ///
    /// Non-positional groups are sorted, positional groups keep their order:
    /// `01,05,09,20,35|02,12`.
    pub fn key(&self, schema: &GameSchema) -> String {
        self.0
            .iter()
            .enumerate()
            .map(|(i, values)| {
                let positional = schema.groups.get(i).is_some_and(|g| g.positional);
                let mut values = values.clone();
                if !positional {
                    values.sort_unstable();
                }
                join_padded(&values)
            })
            .collect::<Vec<_>>()
            .join("|")
    }

    /// Persisted display form: `01,05,09,20,35-02,12`.
    pub fn sorted_code(&self) -> String {
        self.0
            .iter()
            .map(|values| {
                let mut values = values.clone();
                values.sort_unstable();
                join_padded(&values)
            })
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Flattened values in column order.
    pub fn flatten(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.iter().flatten().copied()
    }

    /// Human form, groups separated by ` + `.
    pub fn display(&self) -> String {
        self.0
            .iter()
            .map(|values| {
                values
                    .iter()
                    .map(|v| format!("{v:02}"))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

fn join_padded(values: &[u8]) -> String {
    values
        .iter()
        .map(|v| format!("{v:02}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// One published draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrawRecord {
    /// Seven digit business key, e.g. `2025068`
    pub issue_id: String,
    pub draw_date: NaiveDate,
    pub numbers: Combination,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameId;

    #[test]
    fn test_key_sorts_non_positional_groups() {
        let dlt = GameId::Dlt.schema();
        let a = Combination::new(vec![vec![35, 1, 20, 9, 5], vec![12, 2]]);
        let b = Combination::new(vec![vec![1, 5, 9, 20, 35], vec![2, 12]]);
        assert_eq!(a.key(&dlt), "01,05,09,20,35|02,12");
        assert_eq!(a.key(&dlt), b.key(&dlt));
    }

    #[test]
    fn test_key_keeps_positional_order() {
        let qxc = GameId::Qxc.schema();
        let a = Combination::new(vec![vec![1, 2, 3, 4, 5, 6, 7]]);
        let b = Combination::new(vec![vec![7, 6, 5, 4, 3, 2, 1]]);
        assert_ne!(a.key(&qxc), b.key(&qxc));
        assert_eq!(a.key(&qxc), "01,02,03,04,05,06,07");
    }

    #[test]
    fn test_sorted_code() {
        let numbers = Combination::new(vec![vec![33, 2, 15, 7, 21, 9], vec![4]]);
        assert_eq!(numbers.sorted_code(), "02,07,09,15,21,33-04");
        assert_eq!(numbers.display(), "33 02 15 07 21 09 + 04");
    }

    #[test]
    fn test_sort_groups_respects_schema() {
        let mut qxc = Combination::new(vec![vec![9, 1, 5, 0, 0, 2, 3]]);
        qxc.sort_groups(&GameId::Qxc.schema());
        assert_eq!(qxc.group(0), &[9, 1, 5, 0, 0, 2, 3]);

        let mut ssq = Combination::new(vec![vec![9, 1, 5, 30, 22, 2], vec![3]]);
        ssq.sort_groups(&GameId::Ssq.schema());
        assert_eq!(ssq.group(0), &[1, 2, 5, 9, 22, 30]);
    }
}
