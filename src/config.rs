//! Pipeline configuration loaded once per run from a YAML document.
//!
//! The resulting [`PipelineConfig`] is passed by reference into every stage;
//! nothing reads configuration from global state.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

pub const DEFAULT_TABLE_SUFFIX: &str = "_csv";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub source_dir: PathBuf,
    #[serde(default = "default_extension")]
    pub file_extension: String,
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default = "default_table_suffix")]
    pub table_suffix: String,
    #[serde(default)]
    pub rules: RulePaths,
    #[serde(default = "default_stats_dir")]
    pub stats_dir: PathBuf,
    #[serde(default)]
    pub sql: SqlConfig,
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
    #[serde(default)]
    pub bulk_load: BulkLoadConfig,
    #[serde(default)]
    pub main_tender: Option<MainTenderConfig>,
    /// Skip files with values that fail their declared type instead of aborting.
    #[serde(default)]
    pub skip_invalid_files: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulePaths {
    pub excluded_columns: Option<PathBuf>,
    pub column_types: Option<PathBuf>,
    pub column_renames: Option<PathBuf>,
    pub primary_keys: Option<PathBuf>,
    pub foreign_keys: Option<PathBuf>,
    pub stats_columns: Option<PathBuf>,
    pub table_renames: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqlConfig {
    #[serde(default = "default_tables_dir")]
    pub tables_dir: PathBuf,
    #[serde(default = "default_database_dir")]
    pub database_dir: PathBuf,
    #[serde(default = "default_database_name")]
    pub database_name: String,
    #[serde(default = "default_true")]
    pub drop_table: bool,
    #[serde(default)]
    pub drop_database: bool,
    /// Rows read per file for type inference; 0 (the default) reads the whole
    /// file. Text columns inferred from a sample are declared as `TEXT`.
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            tables_dir: default_tables_dir(),
            database_dir: default_database_dir(),
            database_name: default_database_name(),
            drop_table: true,
            drop_database: false,
            sample_rows: default_sample_rows(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BulkLoadConfig {
    /// Directory the database server reads the cleaned CSVs from.
    pub import_dir: Option<PathBuf>,
    #[serde(default = "default_script_file")]
    pub script_file: PathBuf,
    #[serde(default = "default_extension")]
    pub file_extension: String,
}

impl Default for BulkLoadConfig {
    fn default() -> Self {
        Self {
            import_dir: None,
            script_file: default_script_file(),
            file_extension: default_extension(),
        }
    }
}

/// Identifies the procurement file that receives the CPV division column.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MainTenderConfig {
    pub file: String,
    #[serde(default = "default_cpv_column")]
    pub cpv_column: String,
    #[serde(default = "default_division_column")]
    pub division_column: String,
}

fn default_extension() -> String {
    "csv".to_string()
}

fn default_separator() -> String {
    ",".to_string()
}

fn default_table_suffix() -> String {
    DEFAULT_TABLE_SUFFIX.to_string()
}

fn default_stats_dir() -> PathBuf {
    PathBuf::from("out/stats")
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("out/import")
}

fn default_tables_dir() -> PathBuf {
    PathBuf::from("out/sql/tables")
}

fn default_database_dir() -> PathBuf {
    PathBuf::from("out/sql")
}

fn default_database_name() -> String {
    "od_catalogue".to_string()
}

fn default_script_file() -> PathBuf {
    PathBuf::from("out/load_data.sql")
}

fn default_cpv_column() -> String {
    "cod_cpv".to_string()
}

fn default_division_column() -> String {
    "cpv_division".to_string()
}

const fn default_sample_rows() -> usize {
    0
}

const fn default_true() -> bool {
    true
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("Reading config {path:?}"))?;
        let mut config: PipelineConfig =
            serde_yaml::from_str(&raw).with_context(|| format!("Parsing config {path:?}"))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(raw: &str, base: &Path) -> Result<Self> {
        let mut config: PipelineConfig = serde_yaml::from_str(raw).context("Parsing config")?;
        config.resolve_paths(base);
        config.validate()?;
        Ok(config)
    }

    /// Row limit for schema inference, or `None` for a full scan.
    pub fn sample_limit(&self, full_scan: bool) -> Option<usize> {
        match self.sql.sample_rows {
            _ if full_scan => None,
            0 => None,
            rows => Some(rows),
        }
    }

    /// Single delimiter byte for reading source files.
    pub fn delimiter(&self) -> Result<u8> {
        crate::cli::parse_delimiter(&self.separator)
            .map_err(|err| anyhow::anyhow!("Invalid separator '{}': {err}", self.separator))
    }

    fn validate(&self) -> Result<()> {
        self.delimiter()?;
        ensure!(
            !self.sql.database_name.trim().is_empty(),
            "sql.database_name cannot be empty"
        );
        ensure!(
            !self.file_extension.trim().is_empty(),
            "file_extension cannot be empty"
        );
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        resolve(&mut self.source_dir);
        resolve(&mut self.stats_dir);
        resolve(&mut self.export_dir);
        resolve(&mut self.sql.tables_dir);
        resolve(&mut self.sql.database_dir);
        resolve(&mut self.bulk_load.script_file);
        for path in [
            &mut self.rules.excluded_columns,
            &mut self.rules.column_types,
            &mut self.rules.column_renames,
            &mut self.rules.primary_keys,
            &mut self.rules.foreign_keys,
            &mut self.rules.stats_columns,
            &mut self.rules.table_renames,
        ]
        .into_iter()
        .flatten()
        {
            resolve(path);
        }
        // import_dir is a server-side location and is kept verbatim.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_takes_defaults() {
        let config = PipelineConfig::from_yaml_str("source_dir: data\n", Path::new("/base"))
            .expect("config");
        assert_eq!(config.source_dir, PathBuf::from("/base/data"));
        assert_eq!(config.file_extension, "csv");
        assert_eq!(config.delimiter().unwrap(), b',');
        assert_eq!(config.table_suffix, DEFAULT_TABLE_SUFFIX);
        assert!(config.sql.drop_table);
        assert!(!config.sql.drop_database);
        assert!(config.main_tender.is_none());
        assert_eq!(config.sql.sample_rows, 0);
        assert_eq!(config.sample_limit(false), None);
        assert!(!config.skip_invalid_files);
    }

    #[test]
    fn rule_paths_resolve_against_config_dir() {
        let raw = "\
source_dir: /abs/data
separator: ';'
rules:
  excluded_columns: conf/excluded.json
bulk_load:
  import_dir: /var/lib/mysql-files
";
        let config = PipelineConfig::from_yaml_str(raw, Path::new("/etc/od")).expect("config");
        assert_eq!(config.source_dir, PathBuf::from("/abs/data"));
        assert_eq!(
            config.rules.excluded_columns,
            Some(PathBuf::from("/etc/od/conf/excluded.json"))
        );
        assert_eq!(
            config.bulk_load.import_dir,
            Some(PathBuf::from("/var/lib/mysql-files"))
        );
        assert_eq!(config.delimiter().unwrap(), b';');
    }

    #[test]
    fn multi_character_separator_is_rejected() {
        let err = PipelineConfig::from_yaml_str("source_dir: d\nseparator: ';;'\n", Path::new("."))
            .unwrap_err();
        assert!(err.to_string().contains("separator"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(PipelineConfig::from_yaml_str("source_dir: d\nbogus: 1\n", Path::new(".")).is_err());
    }
}
