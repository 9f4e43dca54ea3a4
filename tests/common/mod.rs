#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use rust_xlsxwriter::Workbook;
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path of the SQLite database used by commands run in this workspace.
    pub fn database(&self) -> PathBuf {
        self.temp_dir.path().join("revenue.db")
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes a single-sheet workbook; every value is stored as a string
    /// except those that parse as numbers.
    pub fn write_xlsx(&self, name: &str, rows: &[&[&str]]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let (r, c) = (r as u32, c as u16);
                if value.is_empty() {
                    continue;
                }
                match value.parse::<f64>() {
                    Ok(number) => sheet.write_number(r, c, number).expect("write number"),
                    Err(_) => sheet.write_string(r, c, *value).expect("write string"),
                };
            }
        }
        workbook.save(&path).expect("save workbook");
        path
    }

    /// The binary, pointed at this workspace's database with prompts disabled.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("revenue-ingest").expect("binary exists");
        cmd.env_remove("REVENUE_INGEST_CONFIG")
            .env("REVENUE_INGEST_DB", self.database())
            .current_dir(self.path());
        cmd
    }
}
