use std::path::{Path, PathBuf};

use anyhow::Result;
use log::info;

use crate::{
    data::{Value, normalize_identifier, parse_boolean, parse_naive_date, parse_naive_datetime},
    io_utils,
    schema::{SqlType, infer_table_column},
    table::Table,
};

/// Bulk-load input delimiter; `LOAD DATA` commands expect commas.
pub const EXPORT_DELIMITER: u8 = b',';

const SQL_DATE: &str = "%Y-%m-%d";
const SQL_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

/// Writes the cleaned table as `<canonical_name>.csv` under `dir`.
///
/// Every field is double-quoted and empty cells are written as empty strings,
/// matching the `ENCLOSED BY '"'` layout of the generated load commands.
/// Cells are rendered in the form MySQL accepts for the column's SQL type:
/// ISO dates and `1`/`0` booleans.
pub fn export_table(table: &Table, dir: &Path, canonical_name: &str) -> Result<PathBuf> {
    let path = dir.join(format!("{}.csv", normalize_identifier(canonical_name)));
    let headers = table
        .headers()
        .iter()
        .map(|header| normalize_identifier(header))
        .collect::<Vec<_>>();
    let column_types = (0..table.column_count())
        .map(|idx| infer_table_column(table, idx).sql_type)
        .collect::<Vec<_>>();
    let rows = table
        .rows()
        .iter()
        .map(|row| {
            row.iter()
                .zip(&column_types)
                .map(|(cell, sql_type)| {
                    cell.as_ref()
                        .map(|value| render_cell(value, *sql_type))
                        .unwrap_or_default()
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    io_utils::write_csv_file(&path, &headers, &rows, EXPORT_DELIMITER, true)?;
    info!(
        "Exported {} row(s) of '{}' to {}",
        table.row_count(),
        table.source,
        path.display()
    );
    Ok(path)
}

/// Renders one cell for a column declared as `sql_type`.
pub fn render_cell(value: &Value, sql_type: SqlType) -> String {
    match (value, sql_type) {
        (Value::Boolean(b), _) => bool_flag(*b),
        (Value::Date(date), _) => date.format(SQL_DATE).to_string(),
        (Value::DateTime(datetime), _) => datetime.format(SQL_DATETIME).to_string(),
        (Value::Text(text), SqlType::Boolean) => parse_boolean(text)
            .map(bool_flag)
            .unwrap_or_else(|| text.clone()),
        (Value::Text(text), SqlType::Date) => parse_naive_date(text)
            .map(|date| date.format(SQL_DATE).to_string())
            .unwrap_or_else(|_| text.clone()),
        (Value::Text(text), SqlType::DateTime) => parse_naive_datetime(text)
            .map(|datetime| datetime.format(SQL_DATETIME).to_string())
            .or_else(|_| parse_naive_date(text).map(|date| date.format(SQL_DATE).to_string()))
            .unwrap_or_else(|_| text.clone()),
        (other, _) => other.as_display(),
    }
}

fn bool_flag(value: bool) -> String {
    String::from(if value { "1" } else { "0" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::LogicalType, table::Column};
    use chrono::NaiveDate;
    use std::fs;

    #[test]
    fn export_quotes_fields_and_uses_canonical_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = Table::new(
            "tabella_uno_csv.csv",
            vec![Column::new("id"), Column::new("nome-ente")],
        );
        table
            .push_row(vec![Some(Value::Integer(1)), Some(Value::Text("Comune, Roma".into()))])
            .unwrap();
        table.push_row(vec![Some(Value::Integer(2)), None]).unwrap();

        let path = export_table(&table, dir.path(), "table_one").unwrap();
        assert_eq!(path.file_name().unwrap(), "table_one.csv");
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "\"id\",\"nome_ente\"\n\"1\",\"Comune, Roma\"\n\"2\",\"\"\n"
        );
    }

    #[test]
    fn inferred_dates_and_booleans_use_sql_forms() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = Table::new(
            "bandi.csv",
            vec![
                Column::new("pubblicazione"),
                Column::new("attivo"),
                Column::declared("chiuso", LogicalType::Boolean),
                Column::new("aggiornato"),
            ],
        );
        let text = |v: &str| Some(Value::Text(v.to_string()));
        table
            .push_row(vec![
                text("06/05/2024"),
                text("si"),
                Some(Value::Boolean(false)),
                text("31/12/2023 10:30:00"),
            ])
            .unwrap();
        table
            .push_row(vec![
                text("2024-05-07"),
                text("no"),
                Some(Value::Boolean(true)),
                text("01/01/2024"),
            ])
            .unwrap();

        let path = export_table(&table, dir.path(), "bandi").unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "\"pubblicazione\",\"attivo\",\"chiuso\",\"aggiornato\"\n\
             \"2024-05-06\",\"1\",\"0\",\"2023-12-31 10:30:00\"\n\
             \"2024-05-07\",\"0\",\"1\",\"2024-01-01\"\n"
        );
    }

    #[test]
    fn text_columns_are_left_untouched() {
        let date = Value::Text("06/05/2024".to_string());
        assert_eq!(render_cell(&date, SqlType::Text), "06/05/2024");
        assert_eq!(render_cell(&date, SqlType::Varchar(10)), "06/05/2024");
        let typed = Value::Date(NaiveDate::from_ymd_opt(2024, 5, 6).unwrap());
        assert_eq!(render_cell(&typed, SqlType::Date), "2024-05-06");
    }
}
