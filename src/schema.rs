//! Schema synthesis: SQL type inference and DDL assembly.
//!
//! This module owns the [`SqlType`] enum, the per-column inference engine
//! and the generators for `CREATE TABLE` and `ALTER TABLE ... ADD FOREIGN KEY`
//! statements.
//!
//! ## Inference
//!
//! A declared logical type (from a column-type rule) always wins. Otherwise
//! every non-empty value is classified and the column is typed only when all
//! of them agree. Inference never fails: a column with no values, or with
//! typed and untyped content mixed together, degrades to `TEXT` and the
//! degradation is logged at warn level. Classification counts are order
//! independent, so the same content always yields the same type.
//!
//! ## Identifiers
//!
//! Table and column names go through [`normalize_identifier`], so the emitted
//! SQL never needs quoting.

use std::{collections::HashSet, fmt, str::FromStr};

use anyhow::{Result, anyhow};
use itertools::Itertools;
use log::{debug, warn};
use serde::Deserialize;

use crate::{
    data::{LogicalType, Value, normalize_identifier, parse_naive_date, parse_naive_datetime},
    error::{IngestError, IngestResult},
    table::{Column, Table},
};

/// Longest string stored as `VARCHAR`; longer columns become `TEXT`.
pub const VARCHAR_MAX_LENGTH: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Int,
    BigInt,
    Double,
    Boolean,
    Date,
    DateTime,
    Varchar(usize),
    Text,
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Int => f.write_str("INT"),
            SqlType::BigInt => f.write_str("BIGINT"),
            SqlType::Double => f.write_str("DOUBLE"),
            SqlType::Boolean => f.write_str("BOOLEAN"),
            SqlType::Date => f.write_str("DATE"),
            SqlType::DateTime => f.write_str("DATETIME"),
            SqlType::Varchar(len) => write!(f, "VARCHAR({len})"),
            SqlType::Text => f.write_str("TEXT"),
        }
    }
}

/// Why inference fell back to `TEXT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Degradation {
    NoValues,
    MixedContent { typed: usize, untyped: usize },
    ConflictingKinds,
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degradation::NoValues => f.write_str("no non-empty values to inspect"),
            Degradation::MixedContent { typed, untyped } => write!(
                f,
                "{typed} typed value(s) mixed with {untyped} untyped value(s)"
            ),
            Degradation::ConflictingKinds => f.write_str("values of conflicting kinds"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredType {
    pub sql_type: SqlType,
    pub degradation: Option<Degradation>,
}

impl InferredType {
    fn precise(sql_type: SqlType) -> Self {
        Self {
            sql_type,
            degradation: None,
        }
    }

    fn degraded(reason: Degradation) -> Self {
        Self {
            sql_type: SqlType::Text,
            degradation: Some(reason),
        }
    }
}

#[derive(Debug, Default)]
struct TypeCandidate {
    non_empty: usize,
    boolean_matches: usize,
    integer_matches: usize,
    integer_exceeds_32bit: bool,
    float_matches: usize,
    date_matches: usize,
    datetime_matches: usize,
    unclassified: usize,
    max_length: usize,
}

impl TypeCandidate {
    fn update(&mut self, value: &Value) {
        self.non_empty += 1;
        match value {
            Value::Text(text) => {
                self.max_length = self.max_length.max(text.chars().count());
                self.classify_text(text);
            }
            Value::Integer(i) => self.record_integer(*i),
            Value::Float(_) => self.float_matches += 1,
            Value::Boolean(_) => self.boolean_matches += 1,
            Value::Date(_) => self.date_matches += 1,
            Value::DateTime(_) => self.datetime_matches += 1,
        }
    }

    fn record_integer(&mut self, value: i64) {
        self.integer_matches += 1;
        if i32::try_from(value).is_err() {
            self.integer_exceeds_32bit = true;
        }
    }

    fn classify_text(&mut self, text: &str) {
        let lowered = text.to_ascii_lowercase();
        if matches!(
            lowered.as_str(),
            "true" | "false" | "t" | "f" | "yes" | "no" | "y" | "n" | "si"
        ) {
            self.boolean_matches += 1;
        } else if let Some(i) = parse_plain_integer(text) {
            self.record_integer(i);
        } else if is_float_literal(text) {
            self.float_matches += 1;
        } else if parse_naive_date(text).is_ok() {
            self.date_matches += 1;
        } else if parse_naive_datetime(text).is_ok() {
            self.datetime_matches += 1;
        } else {
            self.unclassified += 1;
        }
    }

    fn decide(&self) -> InferredType {
        if self.non_empty == 0 {
            return InferredType::degraded(Degradation::NoValues);
        }
        if self.unclassified == self.non_empty {
            return InferredType::precise(varchar_for(self.max_length));
        }
        if self.unclassified > 0 {
            return InferredType::degraded(Degradation::MixedContent {
                typed: self.non_empty - self.unclassified,
                untyped: self.unclassified,
            });
        }
        let all = |count: usize| count == self.non_empty;
        if all(self.boolean_matches) {
            InferredType::precise(SqlType::Boolean)
        } else if all(self.integer_matches) {
            InferredType::precise(self.integer_type())
        } else if all(self.integer_matches + self.float_matches) {
            InferredType::precise(SqlType::Double)
        } else if all(self.date_matches) {
            InferredType::precise(SqlType::Date)
        } else if all(self.date_matches + self.datetime_matches) {
            InferredType::precise(SqlType::DateTime)
        } else {
            InferredType::degraded(Degradation::ConflictingKinds)
        }
    }

    fn integer_type(&self) -> SqlType {
        if self.integer_exceeds_32bit {
            SqlType::BigInt
        } else {
            SqlType::Int
        }
    }
}

/// True for zero-padded codes such as `007` or `00123.5`.
fn is_zero_padded(text: &str) -> bool {
    let mut digits = text.trim_start_matches(['-', '+']).chars();
    digits.next() == Some('0') && digits.next().is_some_and(|c| c.is_ascii_digit())
}

/// Integers without leading zeros; `007` stays a code, not a number.
fn parse_plain_integer(text: &str) -> Option<i64> {
    if is_zero_padded(text) {
        return None;
    }
    text.parse::<i64>().ok()
}

fn is_float_literal(text: &str) -> bool {
    !is_zero_padded(text)
        && text.chars().any(|c| c.is_ascii_digit())
        && text.parse::<f64>().is_ok_and(|parsed| parsed.is_finite())
}

fn varchar_for(max_length: usize) -> SqlType {
    if max_length > VARCHAR_MAX_LENGTH {
        SqlType::Text
    } else {
        SqlType::Varchar(max_length.max(1))
    }
}

/// Picks the SQL type for one column from its declared type or its values.
pub fn infer_column_type<'a, I>(column: &Column, values: I) -> InferredType
where
    I: IntoIterator<Item = Option<&'a Value>>,
{
    let mut candidate = TypeCandidate::default();
    for value in values.into_iter().flatten() {
        candidate.update(value);
    }
    match column.declared {
        None => candidate.decide(),
        Some(LogicalType::Integer) => InferredType::precise(candidate.integer_type()),
        Some(LogicalType::Float) => InferredType::precise(SqlType::Double),
        Some(LogicalType::Boolean) => InferredType::precise(SqlType::Boolean),
        Some(LogicalType::Date) => InferredType::precise(SqlType::Date),
        Some(LogicalType::DateTime) => InferredType::precise(SqlType::DateTime),
        Some(LogicalType::Text | LogicalType::Categorical) => {
            if candidate.non_empty == 0 {
                InferredType::degraded(Degradation::NoValues)
            } else {
                InferredType::precise(varchar_for(candidate.max_length))
            }
        }
    }
}

/// Infers column `idx` of `table`, sizing text conservatively for samples.
///
/// A truncated read may not have seen the longest value, so a `VARCHAR`
/// inferred from a sample widens to `TEXT`.
pub fn infer_table_column(table: &Table, idx: usize) -> InferredType {
    let mut inferred = infer_column_type(&table.columns[idx], table.column_values(idx));
    if table.is_truncated() && matches!(inferred.sql_type, SqlType::Varchar(_)) {
        debug!(
            "Column '{}' of '{}' widened to TEXT: type inferred from a sample",
            table.columns[idx].name, table.source
        );
        inferred.sql_type = SqlType::Text;
    }
    inferred
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "ForeignKeyRepr")]
pub struct ForeignKey {
    pub column: String,
    pub references: String,
    pub referenced_column: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ForeignKeyRepr {
    Full {
        column: String,
        #[serde(alias = "ref_table", alias = "table")]
        references: String,
        #[serde(alias = "ref_column")]
        referenced_column: String,
    },
    Short(String),
}

impl TryFrom<ForeignKeyRepr> for ForeignKey {
    type Error = anyhow::Error;

    fn try_from(value: ForeignKeyRepr) -> Result<Self, Self::Error> {
        match value {
            ForeignKeyRepr::Full {
                column,
                references,
                referenced_column,
            } => Ok(ForeignKey {
                column,
                references,
                referenced_column,
            }),
            ForeignKeyRepr::Short(spec) => spec.parse(),
        }
    }
}

impl FromStr for ForeignKey {
    type Err = anyhow::Error;

    /// Parses `column -> table(column)`.
    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let invalid = || anyhow!("Foreign key '{spec}' must use the form column -> table(column)");
        let (column, target) = spec.split_once("->").ok_or_else(invalid)?;
        let target = target.trim();
        let (table, rest) = target.split_once('(').ok_or_else(invalid)?;
        let referenced = rest.strip_suffix(')').ok_or_else(invalid)?;
        let (column, table, referenced) = (column.trim(), table.trim(), referenced.trim());
        if column.is_empty() || table.is_empty() || referenced.is_empty() {
            return Err(invalid());
        }
        Ok(ForeignKey {
            column: column.to_string(),
            references: table.to_string(),
            referenced_column: referenced.to_string(),
        })
    }
}

/// Primary and foreign keys attached to one logical table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySpec {
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDdl {
    pub table_name: String,
    /// Normalized column names with their SQL types, in table order.
    pub columns: Vec<(String, SqlType)>,
    pub sql: String,
}

impl TableDdl {
    pub fn has_column(&self, name: &str) -> bool {
        let normalized = normalize_identifier(name);
        self.columns.iter().any(|(column, _)| *column == normalized)
    }
}

/// Builds the `CREATE TABLE` statement for `table`.
///
/// Fails with a configuration error when a primary key column is not part of
/// the table (for instance because it was excluded) or when two columns
/// collapse to the same identifier.
pub fn build_create_table(
    table: &Table,
    drop_table: bool,
    primary_key: &[String],
    table_name: &str,
) -> IngestResult<TableDdl> {
    let name = normalize_identifier(table_name);

    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(table.column_count());
    for (idx, column) in table.columns.iter().enumerate() {
        let identifier = normalize_identifier(&column.name);
        if !seen.insert(identifier.clone()) {
            return Err(IngestError::configuration(
                &table.source,
                format!(
                    "Column '{}' collides with another column as identifier '{identifier}'",
                    column.name
                ),
            ));
        }
        let inferred = infer_table_column(table, idx);
        if let Some(reason) = &inferred.degradation {
            warn!(
                "Column '{}' of '{}' typed as {}: {reason}",
                column.name, table.source, inferred.sql_type
            );
        } else {
            debug!(
                "Column '{}' of '{}' typed as {}",
                column.name, table.source, inferred.sql_type
            );
        }
        columns.push((identifier, inferred.sql_type));
    }

    let mut key_columns = Vec::with_capacity(primary_key.len());
    for key in primary_key {
        let identifier = normalize_identifier(key);
        if !columns.iter().any(|(column, _)| *column == identifier) {
            return Err(IngestError::configuration(
                &table.source,
                format!("Primary key column '{key}' is not among the retained columns"),
            ));
        }
        key_columns.push(identifier);
    }

    let mut definitions = columns
        .iter()
        .map(|(column, sql_type)| {
            if key_columns.contains(column) {
                format!("    {column} {sql_type} NOT NULL")
            } else {
                format!("    {column} {sql_type}")
            }
        })
        .collect::<Vec<_>>();
    if !key_columns.is_empty() {
        definitions.push(format!("    PRIMARY KEY ({})", key_columns.iter().join(", ")));
    }

    let mut sql = String::new();
    if drop_table {
        sql.push_str(&format!("DROP TABLE IF EXISTS {name};\n"));
    }
    sql.push_str(&format!("CREATE TABLE {name} (\n"));
    sql.push_str(&definitions.join(",\n"));
    sql.push_str("\n);\n\n");

    Ok(TableDdl {
        table_name: name,
        columns,
        sql,
    })
}

/// One `ALTER TABLE ... ADD FOREIGN KEY` statement per spec; empty for none.
pub fn build_foreign_keys(table_name: &str, foreign_keys: &[ForeignKey]) -> String {
    let table = normalize_identifier(table_name);
    foreign_keys
        .iter()
        .map(|fk| {
            format!(
                "ALTER TABLE {table} ADD FOREIGN KEY ({}) REFERENCES {}({});\n",
                normalize_identifier(&fk.column),
                normalize_identifier(&fk.references),
                normalize_identifier(&fk.referenced_column)
            )
        })
        .collect()
}
