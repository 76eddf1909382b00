// src/config.rs

use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::error::{PipelineError, Result};

pub const DEFAULT_DATA_DIR: &str = "base_dados";
pub const DEFAULT_FIRST_YEAR: i32 = 2015;
pub const DEFAULT_LAST_YEAR: i32 = 2024;
pub const DEFAULT_DETAILED_LABEL: &str = "detailed";

/// One entry of the column-rename table.
///
/// A rename fires when the source header `from` is present in a year's file
/// and the year falls inside the optional `[first_year, last_year]` window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRename {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_year: Option<i32>,
}

impl ColumnRename {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            first_year: None,
            last_year: None,
        }
    }

    pub fn applies_to(&self, year: i32) -> bool {
        self.first_year.map_or(true, |y| year >= y) && self.last_year.map_or(true, |y| year <= y)
    }
}

/// Everything the pipeline needs to locate and interpret the yearly files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding one file per year.
    pub data_dir: PathBuf,
    pub first_year: i32,
    pub last_year: i32,
    /// File name is `{file_prefix}{year}{file_suffix}.{extension}`.
    pub file_prefix: String,
    pub file_suffix: String,
    pub extension: String,
    pub renames: Vec<ColumnRename>,
    /// Group label that marks fine-grained occupation rows.
    pub detailed_label: String,
    /// When false, missing or unreadable year files are skipped with a warning.
    pub strict: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            first_year: DEFAULT_FIRST_YEAR,
            last_year: DEFAULT_LAST_YEAR,
            file_prefix: "national_M".into(),
            file_suffix: "_dl".into(),
            extension: "csv".into(),
            renames: vec![ColumnRename::new("O_GROUP", "OCC_GROUP")],
            detailed_label: DEFAULT_DETAILED_LABEL.into(),
            strict: true,
        }
    }
}

impl PipelineConfig {
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_years(mut self, first_year: i32, last_year: i32) -> Self {
        self.first_year = first_year;
        self.last_year = last_year;
        self
    }

    /// Inclusive list of requested years, ascending.
    pub fn years(&self) -> Vec<i32> {
        (self.first_year..=self.last_year).collect()
    }

    pub fn file_name(&self, year: i32) -> String {
        format!(
            "{}{}{}.{}",
            self.file_prefix, year, self.file_suffix, self.extension
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.first_year > self.last_year {
            return Err(PipelineError::Config {
                path: None,
                reason: format!(
                    "first_year {} is after last_year {}",
                    self.first_year, self.last_year
                ),
            });
        }
        if self.detailed_label.is_empty() {
            return Err(PipelineError::Config {
                path: None,
                reason: "detailed_label must not be empty".into(),
            });
        }
        if let Some(r) = self.renames.iter().find(|r| r.from.is_empty() || r.to.is_empty()) {
            return Err(PipelineError::Config {
                path: None,
                reason: format!("rename entry {:?} -> {:?} has an empty column name", r.from, r.to),
            });
        }
        Ok(())
    }
}

/// Read a YAML config file; absent keys fall back to defaults.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| PipelineError::Config {
        path: Some(path.to_path_buf()),
        reason: e.to_string(),
    })?;
    let config: PipelineConfig =
        serde_yaml::from_str(&text).map_err(|e| PipelineError::Config {
            path: Some(path.to_path_buf()),
            reason: e.to_string(),
        })?;
    config.validate().map_err(|e| match e {
        PipelineError::Config { reason, .. } => PipelineError::Config {
            path: Some(path.to_path_buf()),
            reason,
        },
        other => other,
    })?;
    debug!(path = %path.display(), ?config, "loaded config");
    Ok(config)
}
