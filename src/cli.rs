use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Profile open-data CSV catalogues and synthesize SQL schemas",
    long_about = None
)]
pub struct Cli {
    /// Pipeline configuration file (YAML)
    #[arg(short, long, global = true, default_value = "config.yml")]
    pub config: PathBuf,
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Profile every source file: missing values, duplicates, distinct values
    Profile,
    /// Generate one CREATE TABLE script per source file and the full database script
    Sql(SqlArgs),
    /// Write cleaned CSV copies named after their canonical tables
    Export,
    /// Generate LOAD DATA commands for the cleaned CSV exports
    LoadScript(LoadScriptArgs),
    /// Run profile, sql, export and load-script in sequence
    All,
}

#[derive(Debug, Args)]
pub struct SqlArgs {
    /// Read every row instead of the configured sample when inferring types
    #[arg(long = "full-scan")]
    pub full_scan: bool,
}

#[derive(Debug, Args)]
pub struct LoadScriptArgs {
    /// Directory holding the CSV files to load (defaults to the export directory)
    #[arg(long = "input-dir")]
    pub input_dir: Option<PathBuf>,
    /// Destination of the generated script (defaults to bulk_load.script_file)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" | "\\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
