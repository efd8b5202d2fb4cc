use std::{collections::HashMap, path::Path};

use anyhow::Result;
use log::{info, warn};

use crate::{error::IngestError, io_utils, profile::round2, table::Table};

pub const NULL_LABEL: &str = "<empty>";

#[derive(Debug, Clone, PartialEq)]
pub struct DistinctValueRow {
    pub column: String,
    /// `None` for the null category.
    pub value: Option<String>,
    /// Share of the column's rows, in percent with two decimals.
    pub frequency: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistinctValueReport {
    pub rows: Vec<DistinctValueRow>,
    /// Stats-included columns that do not exist in the table.
    pub skipped: Vec<String>,
}

/// Percentage share of every distinct value for each included column.
///
/// Columns are reported in `included` order, values by descending frequency
/// with ties kept in first-seen order. Each percentage is rounded to two
/// decimals on its own, so a column's sum may drift slightly from 100.
pub fn distinct_value_frequencies(table: &Table, included: &[String]) -> DistinctValueReport {
    let mut report = DistinctValueReport::default();
    for name in included {
        let Some(column_index) = table.column_index(name) else {
            let err = IngestError::configuration(
                &table.source,
                format!("Stats column '{name}' does not exist; skipping it"),
            );
            warn!("{err}");
            report.skipped.push(name.clone());
            continue;
        };
        let mut counter = FrequencyCounter::default();
        for value in table.column_values(column_index) {
            counter.ingest(value.map(|v| v.as_display()));
        }
        report.rows.extend(counter.render_rows(name));
    }
    report
}

#[derive(Default)]
struct FrequencyCounter {
    total: usize,
    /// Distinct values in first-seen order with their counts.
    items: Vec<(Option<String>, usize)>,
    positions: HashMap<Option<String>, usize>,
}

impl FrequencyCounter {
    fn ingest(&mut self, value: Option<String>) {
        self.total += 1;
        match self.positions.get(&value) {
            Some(&pos) => self.items[pos].1 += 1,
            None => {
                self.positions.insert(value.clone(), self.items.len());
                self.items.push((value, 1));
            }
        }
    }

    fn render_rows(self, column: &str) -> Vec<DistinctValueRow> {
        if self.total == 0 {
            return Vec::new();
        }
        let total = self.total as f64;
        let mut items = self.items;
        // stable: equal counts keep first-seen order
        items.sort_by(|a, b| b.1.cmp(&a.1));
        items
            .into_iter()
            .map(|(value, count)| DistinctValueRow {
                column: column.to_string(),
                value,
                frequency: round2(count as f64 * 100.0 / total),
            })
            .collect()
    }
}

impl DistinctValueReport {
    pub fn headers() -> Vec<String> {
        vec![
            "column".to_string(),
            "value".to_string(),
            "frequency".to_string(),
        ]
    }

    pub fn render_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| {
                vec![
                    row.column.clone(),
                    row.value.clone().unwrap_or_else(|| NULL_LABEL.to_string()),
                    format!("{:.2}", row.frequency),
                ]
            })
            .collect()
    }

    /// Writes `<stem>_values.csv`; an empty report writes nothing.
    pub fn write_report(&self, dir: &Path, stem: &str, delimiter: u8) -> Result<bool> {
        if self.rows.is_empty() {
            return Ok(false);
        }
        let path = dir.join(format!("{stem}_values.csv"));
        io_utils::write_csv_file(&path, &Self::headers(), &self.render_rows(), delimiter, false)?;
        info!("Writing: {}", path.display());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::Value, table::Column};

    fn categories(values: &[Option<&str>]) -> Table {
        let mut table = Table::new("t.csv", vec![Column::new("tipo")]);
        for value in values {
            table
                .push_row(vec![value.map(|v| Value::Text(v.to_string()))])
                .unwrap();
        }
        table
    }

    #[test]
    fn frequencies_sorted_descending_with_first_seen_ties() {
        let table = categories(&[Some("b"), Some("a"), Some("a"), None, Some("c"), Some("a")]);
        let report = distinct_value_frequencies(&table, &["tipo".to_string()]);
        let values: Vec<_> = report.rows.iter().map(|r| r.value.clone()).collect();
        assert_eq!(
            values,
            vec![
                Some("a".to_string()),
                Some("b".to_string()),
                None,
                Some("c".to_string())
            ]
        );
        assert_eq!(report.rows[0].frequency, 50.0);
    }

    #[test]
    fn equal_counts_share_the_same_percentage() {
        let table = categories(&[Some("x"), Some("y"), Some("z")]);
        let report = distinct_value_frequencies(&table, &["tipo".to_string()]);
        let shares: Vec<f64> = report.rows.iter().map(|r| r.frequency).collect();
        assert_eq!(shares, vec![33.33, 33.33, 33.33]);
        let total: f64 = shares.iter().sum();
        assert!((total - 100.0).abs() <= 0.1);
    }

    #[test]
    fn unknown_columns_are_skipped() {
        let table = categories(&[Some("x")]);
        let report =
            distinct_value_frequencies(&table, &["missing".to_string(), "tipo".to_string()]);
        assert_eq!(report.skipped, vec!["missing"]);
        assert_eq!(report.rows.len(), 1);
    }

    #[test]
    fn empty_inclusion_list_is_a_no_op() {
        let table = categories(&[Some("x")]);
        let report = distinct_value_frequencies(&table, &[]);
        assert!(report.rows.is_empty());
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn render_rows_labels_nulls() {
        let table = categories(&[None]);
        let report = distinct_value_frequencies(&table, &["tipo".to_string()]);
        assert_eq!(
            report.render_rows(),
            vec![vec![
                "tipo".to_string(),
                NULL_LABEL.to_string(),
                "100.00".to_string()
            ]]
        );
    }
}
