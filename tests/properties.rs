mod common;

use common::TestWorkspace;
use encoding_rs::UTF_8;
use od_catalogue::{
    data::{LogicalType, Value},
    error::IngestError,
    frequency::distinct_value_frequencies,
    profile::summarize,
    reader::{self, ReadOptions},
    schema::build_create_table,
    table::{Column, Table},
};
use proptest::prelude::*;

fn table_from(rows: &[Vec<Option<String>>], width: usize) -> Table {
    let columns = (0..width).map(|i| Column::new(format!("c{i}"))).collect();
    let mut table = Table::new("prop.csv", columns);
    for row in rows {
        table
            .push_row(row.iter().map(|cell| cell.clone().map(Value::Text)).collect())
            .expect("row width");
    }
    table
}

fn rows_strategy() -> impl Strategy<Value = (usize, Vec<Vec<Option<String>>>)> {
    (1usize..4).prop_flat_map(|width| {
        let cell = proptest::option::of("[a-c0-9]{1,3}");
        let row = proptest::collection::vec(cell, width);
        (Just(width), proptest::collection::vec(row, 0..40))
    })
}

proptest! {
    #[test]
    fn duplicate_ratio_stays_within_unit_interval((width, rows) in rows_strategy()) {
        let summary = summarize(&table_from(&rows, width));
        prop_assert!(summary.duplicated_rows <= summary.rows_num);
        prop_assert!((0.0..=1.0).contains(&summary.duplicated_rows_ratio));
        if rows.is_empty() {
            prop_assert_eq!(summary.duplicated_rows_ratio, 0.0);
        }
    }

    #[test]
    fn column_frequencies_stay_close_to_one_hundred((width, rows) in rows_strategy()) {
        prop_assume!(!rows.is_empty());
        let table = table_from(&rows, width);
        let included = table.headers();
        let report = distinct_value_frequencies(&table, &included);
        for column in &included {
            let shares: Vec<f64> = report
                .rows
                .iter()
                .filter(|row| &row.column == column)
                .map(|row| row.frequency)
                .collect();
            let total: f64 = shares.iter().sum();
            let drift = 0.005 * shares.len() as f64 + 1e-9;
            prop_assert!((total - 100.0).abs() <= drift, "{column}: {total}");
            if shares.len() <= 20 {
                prop_assert!((total - 100.0).abs() <= 0.1 + 1e-9, "{column}: {total}");
            }
        }
    }

    #[test]
    fn create_table_is_deterministic((width, rows) in rows_strategy()) {
        let table = table_from(&rows, width);
        let first = build_create_table(&table, true, &[], "prop").expect("ddl");
        let second = build_create_table(&table, true, &[], "prop").expect("ddl");
        prop_assert_eq!(first, second);
    }

    #[test]
    fn integer_override_accepts_plain_integers(values in proptest::collection::vec(any::<i32>(), 1..20)) {
        let workspace = TestWorkspace::new();
        let body = values.iter().map(i32::to_string).collect::<Vec<_>>().join("\n");
        workspace.source("numeri.csv", &format!("n\n{body}\n"));
        let overrides = vec![("n".to_string(), LogicalType::Integer)];
        let options = ReadOptions {
            excluded_columns: &[],
            type_overrides: &overrides,
            row_limit: None,
            delimiter: b',',
            encoding: UTF_8,
        };
        let table = reader::load(&workspace.path().join("data"), "numeri.csv", &options)
            .expect("load");
        let loaded: Vec<_> = table.column_values(0).map(|value| value.cloned()).collect();
        let expected: Vec<_> = values.iter().map(|v| Some(Value::Integer(i64::from(*v)))).collect();
        prop_assert_eq!(loaded, expected);
    }
}

#[test]
fn rows_differing_only_in_excluded_columns_are_duplicates() {
    let workspace = TestWorkspace::new();
    workspace.source("righe.csv", "id,ts\n1,2024-01-01\n1,2024-02-01\n");
    let excluded = vec!["ts".to_string()];
    let options = ReadOptions {
        excluded_columns: &excluded,
        type_overrides: &[],
        row_limit: None,
        delimiter: b',',
        encoding: UTF_8,
    };
    let table = reader::load(&workspace.path().join("data"), "righe.csv", &options).expect("load");
    let summary = summarize(&table);
    assert_eq!(summary.cols_num, 1);
    assert_eq!(summary.duplicated_rows, 1);
}

#[test]
fn integer_override_rejects_text_while_inference_degrades() {
    let workspace = TestWorkspace::new();
    workspace.source("misto.csv", "n\n1\nabc\n");
    let overrides = vec![("n".to_string(), LogicalType::Integer)];
    let dir = workspace.path().join("data");
    let declared = ReadOptions {
        excluded_columns: &[],
        type_overrides: &overrides,
        row_limit: None,
        delimiter: b',',
        encoding: UTF_8,
    };
    let err = reader::load(&dir, "misto.csv", &declared).unwrap_err();
    assert!(matches!(err, IngestError::TypeCoercion { ref value, row: 3, .. } if value == "abc"));

    let inferred = ReadOptions {
        type_overrides: &[],
        ..declared
    };
    let table = reader::load(&dir, "misto.csv", &inferred).expect("load");
    let ddl = build_create_table(&table, false, &[], "misto").expect("ddl");
    assert!(ddl.sql.contains("    n TEXT\n"), "{}", ddl.sql);
}
