//! Batch driver stringing the components together for each command.
//!
//! Sources are discovered once, in name order, and every stage walks that
//! list. Each file is read and processed to completion before the next one.
//! Configuration errors only skip the affected file; a type coercion failure
//! aborts the run unless `skip_invalid_files` is set; I/O failures always
//! abort.

use std::path::Path;

use anyhow::{Context, Result, bail};
use encoding_rs::Encoding;
use log::{error, info, warn};

use crate::{
    catalogue::{self, Catalogue},
    config::PipelineConfig,
    derive,
    error::{IngestError, IngestResult},
    export,
    frequency::distinct_value_frequencies,
    io_utils,
    profile,
    reader::{self, ReadOptions},
    rules::RuleRegistry,
    schema::{self, KeySpec},
    source::{self, SourceFile},
    table::Table,
};

#[derive(Debug)]
pub struct FileFailure {
    pub file: String,
    pub error: IngestError,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub processed: usize,
    pub failures: Vec<FileFailure>,
}

impl RunReport {
    fn log_outcome(&self, stage: &str) {
        info!(
            "{stage}: {} file(s) processed, {} skipped",
            self.processed,
            self.failures.len()
        );
        for failure in &self.failures {
            warn!("{stage}: skipped '{}': {}", failure.file, failure.error);
        }
    }
}

pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    rules: &'a RuleRegistry,
    encoding: &'static Encoding,
    sources: Vec<SourceFile>,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a PipelineConfig, rules: &'a RuleRegistry) -> Result<Self> {
        let encoding = io_utils::resolve_encoding(config.encoding.as_deref())?;
        let delimiter = config.delimiter()?;
        info!("Scanning Open Data catalogue in {}", config.source_dir.display());
        let sources = source::discover(
            &config.source_dir,
            &config.file_extension,
            &config.table_suffix,
            delimiter,
        )?;
        info!(
            "Files '{}' found: {} (separator '{}')",
            config.file_extension,
            sources.len(),
            io_utils::printable_delimiter(delimiter)
        );
        Ok(Self {
            config,
            rules,
            encoding,
            sources,
        })
    }

    pub fn sources(&self) -> &[SourceFile] {
        &self.sources
    }

    /// Reads one source with its exclusion, type, derivation and rename rules.
    pub fn load_table(&self, source: &SourceFile, row_limit: Option<usize>) -> IngestResult<Table> {
        let keys = source.lookup_keys();
        let excluded = self.rules.excluded_columns.columns(&keys)?;
        let overrides = self.rules.column_types.column_types(&keys)?;
        info!(
            "Reading '{}' ({} column(s) excluded, {} type override(s))",
            source.file_name,
            excluded.len(),
            overrides.len()
        );
        let options = ReadOptions {
            excluded_columns: &excluded,
            type_overrides: &overrides,
            row_limit,
            delimiter: source.delimiter,
            encoding: self.encoding,
        };
        let mut table = reader::load(&source.dir, &source.file_name, &options)?;
        derive::apply_main_tender_columns(&mut table, source, self.config.main_tender.as_ref())?;
        let renames = self.rules.column_renames.renames(&keys)?;
        reader::apply_column_renames(&mut table, &renames)?;
        Ok(table)
    }

    /// Sorts a per-file failure into skip or abort.
    fn handle_failure(&self, report: &mut RunReport, source: &SourceFile, err: IngestError) -> Result<()> {
        let skippable = match &err {
            IngestError::TypeCoercion { .. } => self.config.skip_invalid_files,
            other => other.is_file_scoped(),
        };
        if !skippable {
            return Err(err).with_context(|| format!("Processing '{}'", source.file_name));
        }
        error!("{err}");
        report.failures.push(FileFailure {
            file: source.file_name.clone(),
            error: err,
        });
        Ok(())
    }

    pub fn profile(&self) -> Result<RunReport> {
        let stats_dir = &self.config.stats_dir;
        io_utils::ensure_dir(stats_dir)?;
        let mut report = RunReport::default();
        for source in &self.sources {
            if let Err(err) = self.profile_one(source, stats_dir) {
                match err.downcast::<IngestError>() {
                    Ok(ingest) => self.handle_failure(&mut report, source, ingest)?,
                    Err(other) => return Err(other),
                }
                continue;
            }
            report.processed += 1;
        }
        report.log_outcome("profile");
        Ok(report)
    }

    fn profile_one(&self, source: &SourceFile, stats_dir: &Path) -> Result<()> {
        let table = self.load_table(source, None)?;
        let summary = profile::summarize(&table);
        info!(
            "'{}': {} row(s), {} column(s), {} duplicate row(s)",
            source.file_name, summary.rows_num, summary.cols_num, summary.duplicated_rows
        );
        summary.write_reports(stats_dir, &source.stem, &source.table_name, source.delimiter)?;

        let included = self.rules.stats_columns.columns(&source.lookup_keys())?;
        let values = distinct_value_frequencies(&table, &included);
        values.write_report(stats_dir, &source.stem, source.delimiter)?;
        Ok(())
    }

    fn key_spec(&self, source: &SourceFile) -> IngestResult<KeySpec> {
        let keys = source.lookup_keys();
        let spec = KeySpec {
            primary_key: self.rules.primary_keys.columns(&keys)?,
            foreign_keys: self.rules.foreign_keys.foreign_keys(&keys)?,
        };
        // keys use final column names, exclusions use source names
        let renames = self.rules.column_renames.renames(&keys)?;
        let excluded = self
            .rules
            .excluded_columns
            .columns(&keys)?
            .into_iter()
            .flat_map(|name| {
                let renamed = renames
                    .iter()
                    .find(|(from, _)| *from == name)
                    .map(|(_, to)| to.clone());
                std::iter::once(name).chain(renamed)
            })
            .collect::<Vec<_>>();
        let key_columns = spec
            .primary_key
            .iter()
            .chain(spec.foreign_keys.iter().map(|fk| &fk.column));
        for column in key_columns {
            if excluded.contains(column) {
                return Err(IngestError::configuration(
                    &source.file_name,
                    format!("Key column '{column}' is excluded; exclusion takes precedence"),
                ));
            }
        }
        Ok(spec)
    }

    /// Writes one `CREATE TABLE` file per source and the full database script.
    pub fn synthesize(&self, sample_rows: Option<usize>) -> Result<RunReport> {
        let sql = &self.config.sql;
        io_utils::ensure_dir(&sql.tables_dir)?;
        io_utils::ensure_dir(&sql.database_dir)?;

        let mut catalogue = Catalogue::default();
        let mut report = RunReport::default();
        for source in &self.sources {
            match self.synthesize_one(source, sample_rows) {
                Ok((ddl, foreign_keys)) => {
                    let path = sql.tables_dir.join(format!("{}.sql", ddl.table_name));
                    io_utils::write_whole_file(&path, ddl.sql.as_bytes())?;
                    info!("Writing: {}", path.display());
                    catalogue.add_table(ddl, foreign_keys);
                    report.processed += 1;
                }
                Err(err) => self.handle_failure(&mut report, source, err)?,
            }
        }

        let renames = self
            .rules
            .table_renames
            .string_map()
            .context("Reading table rename map")?;
        let (script, rejected) = catalogue.assemble(&renames, &sql.database_name, sql.drop_database);
        let path = sql
            .database_dir
            .join(format!("_{}.sql", sql.database_name));
        script
            .write_to(&path)
            .with_context(|| format!("Writing database script {path:?}"))?;
        info!(
            "Database script with {} table(s) written to {} ({} key/rename rule(s) rejected)",
            catalogue.tables().len(),
            path.display(),
            rejected.len()
        );
        report.log_outcome("sql");
        Ok(report)
    }

    fn synthesize_one(
        &self,
        source: &SourceFile,
        sample_rows: Option<usize>,
    ) -> IngestResult<(schema::TableDdl, Vec<schema::ForeignKey>)> {
        let keys = self.key_spec(source)?;
        let table = self.load_table(source, sample_rows)?;
        info!(
            "Table '{}' primary key: {:?}",
            source.table_name, keys.primary_key
        );
        let ddl = schema::build_create_table(
            &table,
            self.config.sql.drop_table,
            &keys.primary_key,
            &source.table_name,
        )?;
        Ok((ddl, keys.foreign_keys))
    }

    /// Writes one cleaned CSV per source under its canonical table name.
    pub fn export(&self) -> Result<RunReport> {
        io_utils::ensure_dir(&self.config.export_dir)?;
        let mut report = RunReport::default();
        for source in &self.sources {
            let outcome = self.load_table(source, None).and_then(|table| {
                let canonical = self
                    .rules
                    .canonical_table_name(&source.table_name)?
                    .unwrap_or_else(|| source.table_name.clone());
                Ok((table, canonical))
            });
            match outcome {
                Ok((table, canonical)) => {
                    export::export_table(&table, &self.config.export_dir, &canonical)?;
                    report.processed += 1;
                }
                Err(err) => self.handle_failure(&mut report, source, err)?,
            }
        }
        report.log_outcome("export");
        Ok(report)
    }

    /// Generates the bulk-load script for the exported CSV files.
    pub fn load_script(&self, input_dir: Option<&Path>, output: Option<&Path>) -> Result<String> {
        let local_dir = input_dir.unwrap_or(&self.config.export_dir);
        if !local_dir.is_dir() {
            bail!(
                "Import directory {local_dir:?} does not exist; run the export command first"
            );
        }
        let output = output.unwrap_or(&self.config.bulk_load.script_file);
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            io_utils::ensure_dir(parent)?;
        }
        catalogue::emit_bulk_load_commands(
            local_dir,
            self.config.bulk_load.import_dir.as_deref(),
            output,
            &self.config.bulk_load.file_extension,
        )
    }
}
