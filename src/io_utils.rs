//! I/O utilities for CSV reading, whole-file writing, and source discovery.
//!
//! All file I/O in od-catalogue flows through this module:
//!
//! - **Discovery**: files are listed once per run and sorted by name so every
//!   downstream stage sees the same order.
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8.
//! - **Whole-file writes**: artifacts are rendered in memory, written to a
//!   sibling temporary file, then renamed over the destination.

use std::{
    fs::{self, File},
    io::{BufReader, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

use crate::error::{IngestError, IngestResult};

const UTF8_BOM: char = '\u{feff}';

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(
    path: &Path,
    delimiter: u8,
) -> IngestResult<csv::Reader<BufReader<File>>> {
    let file = File::open(path).map_err(|err| IngestError::io(path, err))?;
    Ok(open_csv_reader(BufReader::new(file), delimiter))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn reader_headers<R>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>>
where
    R: Read,
{
    let headers = reader.byte_headers()?.clone();
    let mut decoded = decode_record(&headers, encoding)?;
    if let Some(first) = decoded.first_mut()
        && first.starts_with(UTF8_BOM)
    {
        *first = first.trim_start_matches(UTF8_BOM).to_string();
    }
    Ok(decoded
        .into_iter()
        .map(|header| header.trim().to_string())
        .collect())
}

/// Lists the files of `dir` whose extension matches `extension`, sorted by name.
pub fn list_files_by_type(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let wanted = extension.trim_start_matches('.');
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Listing directory {dir:?}"))? {
        let path = entry
            .with_context(|| format!("Reading entry of {dir:?}"))?
            .path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted));
        if matches {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Creating directory {dir:?}"))
}

/// Replaces `path` with `contents` without exposing a half-written file.
pub fn write_whole_file(path: &Path, contents: &[u8]) -> IngestResult<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{file_name}.partial"));
    let result = (|| {
        let mut file = File::create(&temp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&temp, path)
    })();
    result.map_err(|err| {
        let _ = fs::remove_file(&temp);
        IngestError::io(path, err)
    })
}

/// Renders rows as CSV text in memory.
pub fn render_csv(
    headers: &[String],
    rows: &[Vec<String>],
    delimiter: u8,
    quote_all: bool,
) -> Result<Vec<u8>> {
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(if quote_all {
            QuoteStyle::Always
        } else {
            QuoteStyle::Necessary
        })
        .double_quote(true);
    let mut writer = builder.from_writer(Vec::new());
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|err| anyhow!("Flushing CSV buffer: {}", err.error()))
}

pub fn write_csv_file(
    path: &Path,
    headers: &[String],
    rows: &[Vec<String>],
    delimiter: u8,
    quote_all: bool,
) -> Result<()> {
    let bytes = render_csv(headers, rows, delimiter, quote_all)?;
    write_whole_file(path, &bytes)?;
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn list_files_by_type_sorts_and_filters() {
        let dir = tempdir().unwrap();
        for name in ["b.csv", "a.CSV", "c.txt"] {
            fs::write(dir.path().join(name), "x\n").unwrap();
        }
        fs::create_dir(dir.path().join("nested.csv")).unwrap();
        let files = list_files_by_type(dir.path(), ".csv").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.CSV", "b.csv"]);
    }

    #[test]
    fn reader_headers_strip_bom_and_whitespace() {
        let data = "\u{feff}id ; nome\n1;x\n";
        let mut reader = open_csv_reader(data.as_bytes(), b';');
        let headers = reader_headers(&mut reader, UTF_8).unwrap();
        assert_eq!(headers, vec!["id", "nome"]);
    }

    #[test]
    fn write_whole_file_replaces_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.sql");
        fs::write(&path, "old").unwrap();
        write_whole_file(&path, b"new").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert!(!dir.path().join(".out.sql.partial").exists());
    }

    #[test]
    fn render_csv_quotes_every_field_when_requested() {
        let bytes = render_csv(
            &["a".to_string()],
            &[vec!["x".to_string()]],
            b',',
            true,
        )
        .unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "\"a\"\n\"x\"\n");
    }

    #[test]
    fn resolve_encoding_defaults_to_utf8() {
        assert_eq!(resolve_encoding(None).unwrap(), UTF_8);
        assert_eq!(
            resolve_encoding(Some("latin1")).unwrap().name(),
            "windows-1252"
        );
        assert!(resolve_encoding(Some("klingon")).is_err());
    }
}
