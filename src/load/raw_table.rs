// src/load/raw_table.rs

use csv::ReaderBuilder;
use std::path::{Path, PathBuf};
use tracing::trace;

use crate::error::{PipelineError, Result};

#[derive(Debug)]
pub struct RawTable {
    /// Column names as the file claims them (before standardization).
    pub headers: Vec<String>,
    /// Each data row, one String per field. Rows may be shorter than `headers`.
    pub rows: Vec<Vec<String>>,
    /// File the table was read from.
    pub source: PathBuf,
}

impl RawTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell at `(row, col)`; `None` for short rows.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row).and_then(|r| r.get(col)).map(String::as_str)
    }
}

/// Read a whole header-first CSV file into memory.
pub fn read_csv(path: &Path, year: i32) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // trailing footnote rows carry fewer fields
        .from_path(path)
        .map_err(|source| PipelineError::Read {
            year,
            path: path.to_path_buf(),
            source,
        })?;

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|source| PipelineError::Read {
            year,
            path: path.to_path_buf(),
            source,
        })?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(PipelineError::Malformed {
            year,
            path: path.to_path_buf(),
            reason: "no header row".into(),
        });
    }

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.map_err(|source| PipelineError::Read {
            year,
            path: path.to_path_buf(),
            source,
        })?;
        if record.iter().all(|f| f.trim().is_empty()) {
            trace!(row = idx, "skipping blank row");
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawTable {
        headers,
        rows,
        source: path.to_path_buf(),
    })
}
