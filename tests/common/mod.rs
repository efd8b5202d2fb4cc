#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Scratch catalogue: a `data/` source directory, a `conf/` rules directory
/// and a `config.yml` at the root. Cleaned up on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` to `name` (relative, parents created) and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    pub fn source(&self, file_name: &str, contents: &str) -> PathBuf {
        self.write(&format!("data/{file_name}"), contents)
    }

    pub fn rule(&self, file_name: &str, json: serde_json::Value) -> PathBuf {
        self.write(
            &format!("conf/{file_name}"),
            &serde_json::to_string_pretty(&json).expect("serialize rule"),
        )
    }

    /// Writes `config.yml` with `source_dir: data` followed by `extra`.
    pub fn config(&self, extra: &str) -> PathBuf {
        self.write("config.yml", &format!("source_dir: data\n{extra}"))
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.path().join(name))
            .unwrap_or_else(|err| panic!("read {name}: {err}"))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path().join(name).exists()
    }
}
