//! Per-table profiling: missing values and duplicate rows.
//!
//! A [`ProfileSummary`] is computed once per table and written once as a CSV
//! file and an XLSX workbook with identical content. Missing-value counts are
//! flattened into one column per source column named `Missing_<column>`.

use std::{collections::HashSet, path::Path};

use anyhow::Result;
use log::info;

use crate::{
    io_utils,
    spreadsheet::{self, Cell},
    table::Table,
};

pub const MISSING_PREFIX: &str = "Missing_";

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSummary {
    pub file_name: String,
    pub rows_num: usize,
    pub cols_num: usize,
    pub duplicated_rows: usize,
    /// `duplicated_rows / rows_num`, 0 for an empty table.
    pub duplicated_rows_ratio: f64,
    /// Column name to count of empty cells, in column order.
    pub missing: Vec<(String, usize)>,
}

pub fn summarize(table: &Table) -> ProfileSummary {
    let rows_num = table.row_count();
    let missing = table
        .columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let count = table.column_values(idx).filter(Option::is_none).count();
            (column.name.clone(), count)
        })
        .collect();

    let duplicated_rows = count_duplicate_rows(table);
    let duplicated_rows_ratio = if rows_num > 0 {
        duplicated_rows as f64 / rows_num as f64
    } else {
        0.0
    };

    ProfileSummary {
        file_name: table.source.clone(),
        rows_num,
        cols_num: table.column_count(),
        duplicated_rows,
        duplicated_rows_ratio,
        missing,
    }
}

/// Rows identical, across every retained column, to an earlier row.
fn count_duplicate_rows(table: &Table) -> usize {
    let mut seen = HashSet::with_capacity(table.row_count());
    table
        .rows()
        .iter()
        .filter(|row| {
            let key: Vec<Option<String>> = row
                .iter()
                .map(|cell| cell.as_ref().map(|value| value.as_display()))
                .collect();
            !seen.insert(key)
        })
        .count()
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl ProfileSummary {
    pub fn headers(&self) -> Vec<String> {
        let mut headers = vec![
            "file_name".to_string(),
            "rows_num".to_string(),
            "cols_num".to_string(),
            "duplicated_rows".to_string(),
            "duplicated_rows_perc".to_string(),
        ];
        headers.extend(
            self.missing
                .iter()
                .map(|(column, _)| format!("{MISSING_PREFIX}{column}")),
        );
        headers
    }

    pub fn cells(&self) -> Vec<Cell> {
        let mut cells = vec![
            Cell::Text(self.file_name.clone()),
            Cell::from(self.rows_num),
            Cell::from(self.cols_num),
            Cell::from(self.duplicated_rows),
            Cell::Number(round2(self.duplicated_rows_ratio)),
        ];
        cells.extend(self.missing.iter().map(|(_, count)| Cell::from(*count)));
        cells
    }

    /// Writes `<stem>_stats.csv` and `<stem>_stats.xlsx` under `dir`.
    pub fn write_reports(&self, dir: &Path, stem: &str, sheet: &str, delimiter: u8) -> Result<()> {
        let headers = self.headers();
        let cells = self.cells();

        let csv_path = dir.join(format!("{stem}_stats.csv"));
        let rendered = vec![cells.iter().map(Cell::render).collect::<Vec<_>>()];
        io_utils::write_csv_file(&csv_path, &headers, &rendered, delimiter, false)?;
        info!("Writing: {}", csv_path.display());

        let xlsx_path = dir.join(format!("{stem}_stats.xlsx"));
        spreadsheet::write_workbook(&xlsx_path, sheet, &headers, &[cells])?;
        info!(
            "Writing: {} (sheet '{}')",
            xlsx_path.display(),
            spreadsheet::sheet_name_for(sheet)
        );
        Ok(())
    }
}
