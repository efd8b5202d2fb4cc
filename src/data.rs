use std::{fmt, str::FromStr, sync::LazyLock};

use anyhow::{Result, anyhow, bail};
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

static NON_IDENTIFIER_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("valid identifier pattern"));

/// Semantic type of a column, independent of its textual form in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LogicalType {
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Text,
    Categorical,
}

impl LogicalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalType::Integer => "integer",
            LogicalType::Float => "float",
            LogicalType::Boolean => "boolean",
            LogicalType::Date => "date",
            LogicalType::DateTime => "datetime",
            LogicalType::Text => "string",
            LogicalType::Categorical => "categorical",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &[
            "integer",
            "float",
            "boolean",
            "date",
            "datetime",
            "string",
            "categorical",
        ]
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "integer" | "int" | "int64" | "int32" => Ok(LogicalType::Integer),
            "float" | "double" | "float64" | "number" => Ok(LogicalType::Float),
            "boolean" | "bool" => Ok(LogicalType::Boolean),
            "date" => Ok(LogicalType::Date),
            "datetime" | "datetime64" | "timestamp" => Ok(LogicalType::DateTime),
            "string" | "str" | "text" | "object" => Ok(LogicalType::Text),
            "categorical" | "category" => Ok(LogicalType::Categorical),
            _ => Err(anyhow!(
                "Unknown column type '{value}'. Supported types: {}",
                LogicalType::variants().join(", ")
            )),
        }
    }
}

impl TryFrom<String> for LogicalType {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        LogicalType::from_str(&value)
    }
}

impl From<LogicalType> for String {
    fn from(value: LogicalType) -> Self {
        value.as_str().to_string()
    }
}

/// A realized cell. Empty cells are represented as `None` by the table.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < 1e15 {
                    format!("{f:.1}")
                } else {
                    f.to_string()
                }
            }
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y", "%d.%m.%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%d/%m/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%d/%m/%Y %H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

pub fn parse_boolean(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "si" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Parses a trimmed, non-empty cell as the declared logical type.
pub fn parse_typed_value(value: &str, ty: LogicalType) -> Result<Value> {
    let parsed = match ty {
        LogicalType::Text | LogicalType::Categorical => Value::Text(value.to_string()),
        LogicalType::Integer => {
            let parsed: i64 = value
                .parse()
                .map_err(|_| anyhow!("Failed to parse '{value}' as integer"))?;
            Value::Integer(parsed)
        }
        LogicalType::Float => {
            let parsed: f64 = value
                .parse()
                .map_err(|_| anyhow!("Failed to parse '{value}' as float"))?;
            if !parsed.is_finite() {
                bail!("Failed to parse '{value}' as a finite float");
            }
            Value::Float(parsed)
        }
        LogicalType::Boolean => match parse_boolean(value) {
            Some(b) => Value::Boolean(b),
            None => bail!("Failed to parse '{value}' as boolean"),
        },
        LogicalType::Date => Value::Date(parse_naive_date(value)?),
        LogicalType::DateTime => Value::DateTime(parse_naive_datetime(value)?),
    };
    Ok(parsed)
}

/// Rewrites a name into an identifier that SQL accepts without quoting.
pub fn normalize_identifier(name: &str) -> String {
    let trimmed = name.trim();
    let mut normalized = NON_IDENTIFIER_CHARS.replace_all(trimmed, "_").into_owned();
    if normalized.is_empty() || normalized.starts_with(|c: char| c.is_ascii_digit()) {
        normalized.insert(0, '_');
    }
    normalized
}
