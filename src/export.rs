use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::record::sites::{SiteRow, SITE_COLUMNS};
use crate::record::{Row, COLUMNS};

/// Header-first CSV writer that flushes after every row, so an interrupted
/// export leaves a readable prefix. The header is written up front, so an
/// empty result still produces a well-formed table.
pub struct TableWriter<W: Write> {
    inner: csv::Writer<W>,
    rows: u64,
}

impl TableWriter<File> {
    pub fn create(path: &Path, header: &[&str]) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        TableWriter::new(file, header)
    }
}

impl<W: Write> TableWriter<W> {
    pub fn new(out: W, header: &[&str]) -> Result<Self> {
        let mut inner = csv::WriterBuilder::new().has_headers(false).from_writer(out);
        inner.write_record(header)?;
        inner.flush()?;
        Ok(TableWriter { inner, rows: 0 })
    }

    pub fn write<T: Serialize>(&mut self, row: &T) -> Result<()> {
        self.inner.serialize(row)?;
        self.inner.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn into_inner(self) -> Result<W> {
        self.inner
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush table: {}", e))
    }
}

/// Read every record of a CSV table written by [`TableWriter`].
pub fn read_table<T: DeserializeOwned, R: Read>(input: R) -> Result<Vec<T>> {
    csv::Reader::from_reader(input)
        .into_deserialize()
        .collect::<Result<Vec<T>, _>>()
        .context("Malformed table row")
}

/// Read a trial export, rejecting files whose header is not [`COLUMNS`].
pub fn read_rows(path: &Path) -> Result<Vec<Row>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = csv::Reader::from_reader(file);
    let headers = reader.headers()?.clone();
    anyhow::ensure!(
        headers.iter().eq(COLUMNS.iter().copied()),
        "{} is not a trial export (unexpected header)",
        path.display()
    );
    reader
        .into_deserialize()
        .collect::<Result<Vec<Row>, _>>()
        .context("Malformed table row")
}

pub fn read_sites(path: &Path) -> Result<Vec<SiteRow>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    read_table(file)
}

// ── Tests ──
