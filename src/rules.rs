//! Config registry: per-file column rules and key specifications.
//!
//! Every rule document maps a source file name (or logical table name) to a
//! value. Two shapes are accepted, in JSON or YAML:
//!
//! ```json
//! { "bandi_csv.csv": ["col_a", "col_b"] }
//! [ { "bandi_csv.csv": ["col_a", "col_b"] }, { "other.csv": [] } ]
//! ```
//!
//! A key that is absent from a document means "no special handling" and
//! yields an empty result. Declaration order is preserved throughout.

use std::{fs, path::Path};

use anyhow::{Context, Result, anyhow, bail};
use log::debug;
use serde_json::Value as JsonValue;

use crate::{
    config::RulePaths,
    data::LogicalType,
    error::{IngestError, IngestResult},
    schema::ForeignKey,
};

#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    origin: String,
    entries: Vec<(String, JsonValue)>,
}

impl RuleBook {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("Reading rule file {path:?}"))?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"));
        let value: JsonValue = if is_yaml {
            serde_yaml::from_str(&raw).with_context(|| format!("Parsing YAML rules {path:?}"))?
        } else {
            serde_json::from_str(&raw).with_context(|| format!("Parsing JSON rules {path:?}"))?
        };
        let book = Self::from_value(value, &path.display().to_string())?;
        debug!("Loaded {} rule entr(ies) from {path:?}", book.len());
        Ok(book)
    }

    pub fn from_value(value: JsonValue, origin: &str) -> Result<Self> {
        let entries = keyed_entries(&value)
            .map_err(|err| anyhow!("Rule document {origin}: {err}"))?
            .into_iter()
            .map(|(key, value)| (key, value.clone()))
            .collect();
        Ok(Self {
            origin: origin.to_string(),
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Returns the first entry matching any of `keys`, tried in order.
    fn lookup(&self, keys: &[&str]) -> Option<(&str, &JsonValue)> {
        keys.iter().find_map(|candidate| {
            self.entries
                .iter()
                .find(|(key, _)| key == candidate)
                .map(|(key, value)| (key.as_str(), value))
        })
    }

    fn invalid(&self, key: &str, message: impl Into<String>) -> IngestError {
        IngestError::configuration(
            key,
            format!("{} (rule document {})", message.into(), self.origin),
        )
    }

    /// Column list for exclusion or stats inclusion.
    pub fn columns(&self, keys: &[&str]) -> IngestResult<Vec<String>> {
        let Some((key, value)) = self.lookup(keys) else {
            return Ok(Vec::new());
        };
        match value {
            JsonValue::Null => Ok(Vec::new()),
            JsonValue::String(single) => Ok(vec![single.clone()]),
            JsonValue::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| self.invalid(key, format!("expected column name, got {item}")))
                })
                .collect(),
            other => Err(self.invalid(key, format!("expected a list of columns, got {other}"))),
        }
    }

    pub fn column_types(&self, keys: &[&str]) -> IngestResult<Vec<(String, LogicalType)>> {
        let Some((key, value)) = self.lookup(keys) else {
            return Ok(Vec::new());
        };
        let pairs = keyed_entries(value).map_err(|err| self.invalid(key, err.to_string()))?;
        pairs
            .into_iter()
            .map(|(column, raw)| {
                let token = raw.as_str().ok_or_else(|| {
                    self.invalid(key, format!("type for column '{column}' must be a string"))
                })?;
                let ty = token
                    .parse::<LogicalType>()
                    .map_err(|err| self.invalid(key, format!("column '{column}': {err}")))?;
                Ok((column, ty))
            })
            .collect()
    }

    /// Ordered `source -> target` pairs for one key.
    pub fn renames(&self, keys: &[&str]) -> IngestResult<Vec<(String, String)>> {
        let Some((key, value)) = self.lookup(keys) else {
            return Ok(Vec::new());
        };
        let pairs = keyed_entries(value).map_err(|err| self.invalid(key, err.to_string()))?;
        pairs
            .into_iter()
            .map(|(from, raw)| {
                let to = raw.as_str().ok_or_else(|| {
                    self.invalid(key, format!("rename target for '{from}' must be a string"))
                })?;
                Ok((from, to.to_string()))
            })
            .collect()
    }

    pub fn foreign_keys(&self, keys: &[&str]) -> IngestResult<Vec<ForeignKey>> {
        let Some((key, value)) = self.lookup(keys) else {
            return Ok(Vec::new());
        };
        match value {
            JsonValue::Null => Ok(Vec::new()),
            JsonValue::Array(items) => items
                .iter()
                .map(|item| {
                    serde_json::from_value::<ForeignKey>(item.clone())
                        .map_err(|err| self.invalid(key, format!("foreign key {item}: {err}")))
                })
                .collect(),
            other => Err(self.invalid(key, format!("expected a list of foreign keys, got {other}"))),
        }
    }

    /// The whole document read as an ordered `source -> target` map.
    pub fn string_map(&self) -> IngestResult<Vec<(String, String)>> {
        self.entries
            .iter()
            .map(|(key, value)| {
                value
                    .as_str()
                    .map(|target| (key.clone(), target.to_string()))
                    .ok_or_else(|| self.invalid(key, format!("expected a string, got {value}")))
            })
            .collect()
    }
}

/// Flattens a mapping or a list of single-key mappings into ordered pairs.
fn keyed_entries(value: &JsonValue) -> Result<Vec<(String, &JsonValue)>> {
    match value {
        JsonValue::Null => Ok(Vec::new()),
        JsonValue::Object(map) => Ok(map.iter().map(|(k, v)| (k.clone(), v)).collect()),
        JsonValue::Array(items) => {
            let mut pairs = Vec::new();
            for item in items {
                let JsonValue::Object(map) = item else {
                    bail!("list entries must be mappings, got {item}");
                };
                pairs.extend(map.iter().map(|(k, v)| (k.clone(), v)));
            }
            Ok(pairs)
        }
        other => bail!("expected a mapping or a list of mappings, got {other}"),
    }
}

/// All rule documents of a run. Documents not configured are empty.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    pub excluded_columns: RuleBook,
    pub column_types: RuleBook,
    pub column_renames: RuleBook,
    pub primary_keys: RuleBook,
    pub foreign_keys: RuleBook,
    pub stats_columns: RuleBook,
    pub table_renames: RuleBook,
}

impl RuleRegistry {
    pub fn load(paths: &RulePaths) -> Result<Self> {
        let load = |path: &Option<std::path::PathBuf>| -> Result<RuleBook> {
            match path {
                Some(path) => RuleBook::load(path),
                None => Ok(RuleBook::empty()),
            }
        };
        Ok(Self {
            excluded_columns: load(&paths.excluded_columns)?,
            column_types: load(&paths.column_types)?,
            column_renames: load(&paths.column_renames)?,
            primary_keys: load(&paths.primary_keys)?,
            foreign_keys: load(&paths.foreign_keys)?,
            stats_columns: load(&paths.stats_columns)?,
            table_renames: load(&paths.table_renames)?,
        })
    }

    /// Canonical (target-language) name for a table, when one is configured.
    pub fn canonical_table_name(&self, table_name: &str) -> IngestResult<Option<String>> {
        Ok(self
            .table_renames
            .string_map()?
            .into_iter()
            .find(|(from, _)| from == table_name)
            .map(|(_, to)| to))
    }
}
