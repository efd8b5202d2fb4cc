use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

use crate::{data::normalize_identifier, io_utils};

/// One discovered input table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub dir: PathBuf,
    /// File name including extension, e.g. `bandi-gara_csv.csv`.
    pub file_name: String,
    /// File name without extension.
    pub stem: String,
    /// Identifier used for DDL: stem minus suffix, normalized.
    pub table_name: String,
    pub delimiter: u8,
}

impl SourceFile {
    pub fn new(path: &Path, suffix: &str, delimiter: u8) -> Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("Source path {path:?} has no UTF-8 file name"))?
            .to_string();
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&file_name)
            .to_string();
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self {
            table_name: table_name_for(&stem, suffix),
            dir,
            file_name,
            stem,
            delimiter,
        })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    /// Keys tried, in order, against rule documents.
    pub fn lookup_keys(&self) -> [&str; 3] {
        [
            self.file_name.as_str(),
            self.stem.as_str(),
            self.table_name.as_str(),
        ]
    }

    /// True when `identity` names this file by file name, stem or table name.
    pub fn matches(&self, identity: &str) -> bool {
        self.lookup_keys().contains(&identity)
    }
}

pub fn table_name_for(stem: &str, suffix: &str) -> String {
    let base = if suffix.is_empty() {
        stem
    } else {
        stem.strip_suffix(suffix).unwrap_or(stem)
    };
    normalize_identifier(base)
}

/// Captures the ordered list of source files once per run.
pub fn discover(dir: &Path, extension: &str, suffix: &str, delimiter: u8) -> Result<Vec<SourceFile>> {
    io_utils::list_files_by_type(dir, extension)?
        .iter()
        .map(|path| SourceFile::new(path, suffix, delimiter))
        .collect()
}
