use log::{debug, warn};

use crate::{
    config::MainTenderConfig,
    data::{LogicalType, Value},
    error::{IngestError, IngestResult},
    source::SourceFile,
    table::{Column, Table},
};

/// Number of leading CPV characters that identify the division.
pub const CPV_DIVISION_LENGTH: usize = 2;

/// Adds the CPV division column when `source` is the configured main tender file.
///
/// Returns whether the column was added. Other files are left untouched.
pub fn apply_main_tender_columns(
    table: &mut Table,
    source: &SourceFile,
    rule: Option<&MainTenderConfig>,
) -> IngestResult<bool> {
    let Some(rule) = rule else {
        return Ok(false);
    };
    if !source.matches(&rule.file) {
        return Ok(false);
    }
    let Some(cpv_idx) = table.column_index(&rule.cpv_column) else {
        return Err(IngestError::configuration(
            &source.file_name,
            format!(
                "Main tender file has no '{}' column to derive '{}' from",
                rule.cpv_column, rule.division_column
            ),
        ));
    };

    let mut short_codes = 0usize;
    table
        .add_column(
            Column::declared(&rule.division_column, LogicalType::Categorical),
            |row| {
                let code = row[cpv_idx].as_ref().map(Value::as_display)?;
                let division = cpv_division(&code);
                if division.is_none() {
                    short_codes += 1;
                }
                division.map(Value::Text)
            },
        )
        .map_err(|err| IngestError::configuration(&source.file_name, err.to_string()))?;

    if short_codes > 0 {
        warn!(
            "{short_codes} value(s) of '{}' in '{}' are too short for a CPV division",
            rule.cpv_column, source.file_name
        );
    }
    debug!(
        "Derived '{}' from '{}' in '{}'",
        rule.division_column, rule.cpv_column, source.file_name
    );
    Ok(true)
}

/// First two characters of a CPV code, e.g. `45` for `45233140-2`.
pub fn cpv_division(code: &str) -> Option<String> {
    let division: String = code.trim().chars().take(CPV_DIVISION_LENGTH).collect();
    (division.chars().count() == CPV_DIVISION_LENGTH).then_some(division)
}
