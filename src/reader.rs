//! Typed table reader.
//!
//! Loads one delimited file into a [`Table`], dropping excluded columns and
//! coercing columns that carry a declared [`LogicalType`]. Cells are trimmed;
//! empty cells become `None`.

use std::path::Path;

use encoding_rs::Encoding;
use log::{debug, warn};

use crate::{
    data::{LogicalType, Value, parse_typed_value},
    error::{IngestError, IngestResult},
    io_utils,
    table::{Column, Table},
};

/// Everything the reader needs to know about one file.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions<'a> {
    pub excluded_columns: &'a [String],
    pub type_overrides: &'a [(String, LogicalType)],
    /// Stop after this many data rows (schema-only reads).
    pub row_limit: Option<usize>,
    pub delimiter: u8,
    pub encoding: &'static Encoding,
}

pub fn load(source_dir: &Path, file_name: &str, options: &ReadOptions<'_>) -> IngestResult<Table> {
    let path = source_dir.join(file_name);
    if !path.is_file() {
        return Err(IngestError::io(
            &path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "source file not found"),
        ));
    }
    let csv_error = |source: csv::Error| IngestError::Csv {
        path: path.clone(),
        source,
    };

    let mut reader = io_utils::open_csv_reader_from_path(&path, options.delimiter)?;
    let headers = io_utils::reader_headers(&mut reader, options.encoding).map_err(|err| {
        IngestError::configuration(file_name, format!("Unreadable header row: {err:#}"))
    })?;

    let plan = ColumnPlan::build(file_name, &headers, options);
    let mut table = Table::new(file_name, plan.columns.clone());

    let mut record = csv::ByteRecord::new();
    let mut row_idx = 0usize;
    while reader.read_byte_record(&mut record).map_err(csv_error)? {
        if options.row_limit.is_some_and(|limit| row_idx >= limit) {
            table.mark_truncated();
            break;
        }
        row_idx += 1;
        let decoded = io_utils::decode_record(&record, options.encoding).map_err(|err| {
            IngestError::configuration(file_name, format!("Row {}: {err:#}", row_idx + 1))
        })?;
        let mut row = Vec::with_capacity(plan.retained.len());
        for (slot, &source_idx) in plan.retained.iter().enumerate() {
            let raw = decoded.get(source_idx).map(|s| s.trim()).unwrap_or("");
            if raw.is_empty() {
                row.push(None);
                continue;
            }
            let column = &plan.columns[slot];
            let value = match column.declared {
                Some(ty) => parse_typed_value(raw, ty).map_err(|_| IngestError::TypeCoercion {
                    file: file_name.to_string(),
                    column: column.name.clone(),
                    value: raw.to_string(),
                    expected: ty.to_string(),
                    // +1 for the header line, 1-based
                    row: row_idx + 1,
                })?,
                None => Value::Text(raw.to_string()),
            };
            row.push(Some(value));
        }
        table
            .push_row(row)
            .map_err(|err| IngestError::configuration(file_name, err.to_string()))?;
    }

    debug!(
        "Loaded '{}' with {} row(s) and {} column(s)",
        file_name,
        table.row_count(),
        table.column_count()
    );
    Ok(table)
}

/// Column layout after exclusion, with declared types attached.
struct ColumnPlan {
    /// Source field index for each retained column.
    retained: Vec<usize>,
    columns: Vec<Column>,
}

impl ColumnPlan {
    fn build(file_name: &str, headers: &[String], options: &ReadOptions<'_>) -> Self {
        for excluded in options.excluded_columns {
            if !headers.contains(excluded) {
                warn!("Excluded column '{excluded}' is not present in '{file_name}'");
            }
        }
        for (name, ty) in options.type_overrides {
            if options.excluded_columns.contains(name) {
                debug!("Skipping {ty} override for excluded column '{name}' in '{file_name}'");
            } else if !headers.contains(name) {
                warn!("Type override for unknown column '{name}' in '{file_name}'");
            }
        }

        let mut retained = Vec::new();
        let mut columns = Vec::new();
        for (idx, header) in headers.iter().enumerate() {
            if options.excluded_columns.contains(header) {
                continue;
            }
            let declared = options
                .type_overrides
                .iter()
                .find(|(name, _)| name == header)
                .map(|(_, ty)| *ty);
            retained.push(idx);
            columns.push(Column {
                name: header.clone(),
                declared,
            });
        }
        Self { retained, columns }
    }
}

/// Applies ordered column renames; unknown sources are configuration errors.
pub fn apply_column_renames(table: &mut Table, renames: &[(String, String)]) -> IngestResult<()> {
    for (from, to) in renames {
        if table.column_index(from).is_none() {
            return Err(IngestError::configuration(
                &table.source,
                format!("Rename source column '{from}' does not exist"),
            ));
        }
        table
            .rename_column(from, to)
            .map_err(|err| IngestError::configuration(&table.source, err.to_string()))?;
    }
    Ok(())
}
