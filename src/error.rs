// src/error.rs

use arrow::error::ArrowError;
use std::path::PathBuf;

/// Fatal conditions that abort pipeline construction.
///
/// Each variant carries the year and/or file that triggered it so the input
/// data can be fixed. Non-fatal conditions (unparseable employment counts,
/// occupations with too little history) never surface here.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("file not found for year {year}: {}", .path.display())]
    MissingFile { year: i32, path: PathBuf },

    #[error("failed to read {} (year {year}): {source}", .path.display())]
    Read {
        year: i32,
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed file {} (year {year}): {reason}", .path.display())]
    Malformed {
        year: i32,
        path: PathBuf,
        reason: String,
    },

    #[error("no data loaded: zero year files were read")]
    EmptyDataset,

    #[error("no detailed-level data found: zero rows have {column} == {label:?}")]
    EmptyFilter { column: &'static str, label: String },

    #[error("invalid configuration{}: {reason}", config_location(.path))]
    Config {
        path: Option<PathBuf>,
        reason: String,
    },

    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

impl PipelineError {
    /// Year the error is attributed to, if any.
    pub fn year(&self) -> Option<i32> {
        match self {
            Self::MissingFile { year, .. }
            | Self::Read { year, .. }
            | Self::Malformed { year, .. } => Some(*year),
            _ => None,
        }
    }

    /// Pipeline stage that failed, for diagnostics.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::MissingFile { .. } | Self::Read { .. } | Self::Malformed { .. } => "load",
            Self::EmptyDataset | Self::EmptyFilter { .. } => "aggregate",
            Self::Config { .. } => "config",
            Self::Arrow(_) => "table",
        }
    }
}

fn config_location(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" in {}", p.display()))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, PipelineError>;
