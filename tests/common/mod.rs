#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rust_xlsxwriter::Workbook;
use tabload::db::{Connection, DbError, LiveSchema, SqlValue};
use tabload::progress::ImportSink;
use tabload::sql::{InsertStatement, SchemaStatement};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
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

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }

    /// Builds an `.xlsx` workbook under the workspace.
    pub fn write_workbook(&self, name: &str, build: impl FnOnce(&mut Workbook)) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut workbook = Workbook::new();
        build(&mut workbook);
        workbook.save(&path).expect("save workbook");
        path
    }
}

/// CSV text with an `id,name` header and `rows` data lines.
pub fn numbered_csv(rows: usize) -> String {
    let mut out = String::from("id,name\n");
    for i in 1..=rows {
        out.push_str(&format!("{i},name{i}\n"));
    }
    out
}

/// Sink that keeps everything it receives.
#[derive(Default)]
pub struct RecordingSink {
    pub progress: Mutex<Vec<u8>>,
    pub lines: Mutex<Vec<(String, bool)>>,
}

impl RecordingSink {
    pub fn errors(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, is_error)| *is_error)
            .map(|(line, _)| line.clone())
            .collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .any(|(line, _)| line.contains(needle))
    }
}

impl ImportSink for RecordingSink {
    fn progress(&self, percent: u8, _message: &str) {
        self.progress.lock().unwrap().push(percent);
    }

    fn log(&self, message: &str, is_error: bool) {
        self.lines.lock().unwrap().push((message.to_string(), is_error));
    }
}

/// Wraps a connection and runs a hook after every successful commit.
pub struct CommitHook<C, F> {
    inner: C,
    pub commits: usize,
    hook: F,
}

impl<C: Connection, F: FnMut(usize)> CommitHook<C, F> {
    pub fn new(inner: C, hook: F) -> Self {
        Self {
            inner,
            commits: 0,
            hook,
        }
    }
}

impl<C: Connection, F: FnMut(usize)> Connection for CommitHook<C, F> {
    fn table_exists(&mut self, table: &str) -> Result<bool, DbError> {
        self.inner.table_exists(table)
    }

    fn live_schema(&mut self, table: &str) -> Result<LiveSchema, DbError> {
        self.inner.live_schema(table)
    }

    fn execute(&mut self, statement: &SchemaStatement) -> Result<(), DbError> {
        self.inner.execute(statement)
    }

    fn begin(&mut self) -> Result<(), DbError> {
        self.inner.begin()
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.inner.commit()?;
        self.commits += 1;
        (self.hook)(self.commits);
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        self.inner.rollback()
    }

    fn insert(&mut self, statement: &InsertStatement, values: &[SqlValue]) -> Result<(), DbError> {
        self.inner.insert(statement, values)
    }
}
