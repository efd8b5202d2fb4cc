//! XLSX rendering for profile reports.

use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::Workbook;

use crate::io_utils;

/// Legacy spreadsheet formats cap sheet names; stay one below the 31 limit.
pub const SHEET_NAME_MAX: usize = 30;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
}

impl Cell {
    /// Text form used when the same report is written as CSV.
    pub fn render(&self) -> String {
        match self {
            Cell::Text(text) => text.clone(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{n:.0}"),
            Cell::Number(n) => n.to_string(),
        }
    }
}

impl From<usize> for Cell {
    fn from(value: usize) -> Self {
        Cell::Number(value as f64)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

pub fn sheet_name_for(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            other => other,
        })
        .take(SHEET_NAME_MAX)
        .collect();
    if cleaned.trim().is_empty() {
        "Sheet1".to_string()
    } else {
        cleaned
    }
}

pub fn write_workbook(
    path: &Path,
    sheet_name: &str,
    headers: &[String],
    rows: &[Vec<Cell>],
) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(sheet_name_for(sheet_name))
        .with_context(|| format!("Naming sheet '{sheet_name}'"))?;
    for (col, header) in headers.iter().enumerate() {
        worksheet.write_string(0, col as u16, header)?;
    }
    for (row_idx, row) in rows.iter().enumerate() {
        let excel_row = (row_idx + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            match cell {
                Cell::Text(text) => worksheet.write_string(excel_row, col as u16, text)?,
                Cell::Number(n) => worksheet.write_number(excel_row, col as u16, *n)?,
            };
        }
    }
    let buffer = workbook
        .save_to_buffer()
        .with_context(|| format!("Rendering workbook {path:?}"))?;
    io_utils::write_whole_file(path, &buffer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_names_are_truncated_and_sanitized() {
        let long = "aggiudicazioni_lotti_procedure_aperte_2023";
        let name = sheet_name_for(long);
        assert_eq!(name.chars().count(), SHEET_NAME_MAX);
        assert!(long.starts_with(&name));
        assert_eq!(sheet_name_for("a/b"), "a_b");
        assert_eq!(sheet_name_for(""), "Sheet1");
    }

    #[test]
    fn numbers_render_without_trailing_zero() {
        assert_eq!(Cell::from(12usize).render(), "12");
        assert_eq!(Cell::Number(0.25).render(), "0.25");
    }

    #[test]
    fn workbook_is_written_as_zip_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.xlsx");
        write_workbook(
            &path,
            "bandi",
            &["file_name".to_string(), "rows_num".to_string()],
            &[vec![Cell::from("bandi.csv"), Cell::from(3usize)]],
        )
        .unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }
}
