//! In-memory tabular structure produced by the reader.
//!
//! A [`Table`] is owned by the pipeline run that loaded it and is dropped once
//! profiling, synthesis and export have consumed it. Only derived artifacts
//! outlive it.

use anyhow::{Result, anyhow, ensure};

use crate::data::{LogicalType, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    /// Type forced by a column-type rule; `None` means inferred.
    pub declared: Option<LogicalType>,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared: None,
        }
    }

    pub fn declared(name: impl Into<String>, ty: LogicalType) -> Self {
        Self {
            name: name.into(),
            declared: Some(ty),
        }
    }
}

pub type Row = Vec<Option<Value>>;

#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Source file name the table was loaded from.
    pub source: String,
    pub columns: Vec<Column>,
    rows: Vec<Row>,
    /// Set when a row limit stopped the read before the end of the file.
    truncated: bool,
}

impl Table {
    pub fn new(source: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            source: source.into(),
            columns,
            rows: Vec::new(),
            truncated: false,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn mark_truncated(&mut self) {
        self.truncated = true;
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn push_row(&mut self, row: Row) -> Result<()> {
        ensure!(
            row.len() == self.columns.len(),
            "Row has {} field(s) but table '{}' has {} column(s)",
            row.len(),
            self.source,
            self.columns.len()
        );
        self.rows.push(row);
        Ok(())
    }

    pub fn column_values(&self, index: usize) -> impl Iterator<Item = Option<&Value>> + '_ {
        self.rows.iter().map(move |row| row[index].as_ref())
    }

    /// Appends a column whose cells are computed from each existing row.
    pub fn add_column<F>(&mut self, column: Column, mut compute: F) -> Result<()>
    where
        F: FnMut(&Row) -> Option<Value>,
    {
        ensure!(
            self.column_index(&column.name).is_none(),
            "Column '{}' already exists in '{}'",
            column.name,
            self.source
        );
        for row in &mut self.rows {
            let value = compute(row);
            row.push(value);
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        if from == to {
            return Ok(());
        }
        ensure!(
            self.column_index(to).is_none(),
            "Cannot rename '{from}' to '{to}': column already exists"
        );
        let index = self
            .column_index(from)
            .ok_or_else(|| anyhow!("Column '{from}' not found in '{}'", self.source))?;
        self.columns[index].name = to.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut table = Table::new("sample.csv", vec![Column::new("id"), Column::new("name")]);
        table
            .push_row(vec![Some(Value::Integer(1)), Some(Value::Text("a".into()))])
            .unwrap();
        table
            .push_row(vec![Some(Value::Integer(2)), None])
            .unwrap();
        table
    }

    #[test]
    fn push_row_rejects_ragged_rows() {
        let mut table = sample();
        let err = table.push_row(vec![None]).unwrap_err();
        assert!(err.to_string().contains("1 field(s)"));
    }

    #[test]
    fn add_column_computes_from_rows() {
        let mut table = sample();
        table
            .add_column(Column::new("has_name"), |row| {
                Some(Value::Boolean(row[1].is_some()))
            })
            .unwrap();
        assert_eq!(table.column_count(), 3);
        let flags: Vec<_> = table.column_values(2).collect();
        assert_eq!(
            flags,
            vec![Some(&Value::Boolean(true)), Some(&Value::Boolean(false))]
        );
    }

    #[test]
    fn rename_column_refuses_collisions() {
        let mut table = sample();
        assert!(table.rename_column("name", "id").is_err());
        table.rename_column("name", "label").unwrap();
        assert_eq!(table.headers(), vec!["id", "label"]);
    }
}
