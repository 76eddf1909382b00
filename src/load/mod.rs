// src/load/mod.rs
//! Per-year ingestion: locate each year's file, standardize its headers and
//! project it onto the retained columns, tagged with the source year.

pub mod raw_table;
pub mod rename;

use arrow::{
    array::{ArrayRef, Int32Array, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use glob::{glob, Pattern};
use rayon::prelude::*;
use regex::Regex;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};
use tracing::{debug, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::table::{OCC_GROUP, SOURCE_COLUMNS, YEAR};

use self::raw_table::{read_csv, RawTable};
use self::rename::{apply_renames, normalize_header};

/// One year's projected table.
#[derive(Debug, Clone)]
pub struct YearTable {
    pub year: i32,
    pub source: PathBuf,
    /// `YEAR` (Int32) followed by whichever of the source columns the file had (Utf8).
    pub batch: RecordBatch,
    /// Retained columns the file did not provide.
    pub missing_columns: Vec<&'static str>,
}

impl YearTable {
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema().index_of(name).is_ok()
    }
}

pub fn year_file_path(config: &PipelineConfig, year: i32) -> PathBuf {
    config.data_dir.join(config.file_name(year))
}

/// Load and project a single year's file.
#[instrument(level = "debug", skip(config), fields(dir = %config.data_dir.display()))]
pub fn load_year(config: &PipelineConfig, year: i32) -> Result<YearTable> {
    let path = year_file_path(config, year);
    if !path.is_file() {
        return Err(PipelineError::MissingFile { year, path });
    }

    let start = Instant::now();
    let mut raw = read_csv(&path, year)?;
    raw.headers = raw.headers.iter().map(|h| normalize_header(h)).collect();
    let renamed = apply_renames(&mut raw.headers, year, &config.renames);

    let table = project(raw, year)?;
    if !table.missing_columns.is_empty() {
        warn!(
            year,
            file = %table.source.display(),
            missing = ?table.missing_columns,
            "year file lacks retained columns; continuing without them"
        );
    }
    debug!(
        year,
        rows = table.num_rows(),
        renamed = renamed.len(),
        elapsed = ?start.elapsed(),
        "loaded year"
    );
    Ok(table)
}

/// Build the projected Arrow batch from a standardized raw table.
fn project(raw: RawTable, year: i32) -> Result<YearTable> {
    let n = raw.rows.len();
    let mut fields = vec![Field::new(YEAR, DataType::Int32, false)];
    let mut columns: Vec<ArrayRef> = vec![Arc::new(Int32Array::from(vec![year; n]))];
    let mut missing_columns = Vec::new();

    for name in SOURCE_COLUMNS {
        let Some(col) = raw.column_index(name) else {
            missing_columns.push(name);
            continue;
        };
        // Group labels are matched exactly downstream, so they stay as written.
        let trim = name != OCC_GROUP;
        let values: StringArray = (0..n)
            .map(|row| {
                raw.cell(row, col)
                    .map(|s| if trim { s.trim() } else { s })
                    .filter(|s| !s.trim().is_empty())
            })
            .collect();
        fields.push(Field::new(name, DataType::Utf8, true));
        columns.push(Arc::new(values));
    }

    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
    Ok(YearTable {
        year,
        source: raw.source,
        batch,
        missing_columns,
    })
}

/// Load every configured year, in ascending year order.
///
/// Years are read in parallel; the result order does not depend on scheduling.
/// In strict mode the first failing year (by year order) aborts the load.
/// Otherwise failing years are logged and skipped.
#[instrument(level = "info", skip(config), fields(dir = %config.data_dir.display()))]
pub fn load_years(config: &PipelineConfig) -> Result<Vec<YearTable>> {
    config.validate()?;
    let years = config.years();
    let start = Instant::now();

    let results: Vec<Result<YearTable>> = years
        .par_iter()
        .map(|&year| load_year(config, year))
        .collect();

    let mut tables = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(t) => tables.push(t),
            Err(e) if config.strict => return Err(e),
            Err(e) => warn!(year = ?e.year(), error = %e, "skipping year"),
        }
    }

    info!(
        requested = years.len(),
        loaded = tables.len(),
        rows = tables.iter().map(YearTable::num_rows).sum::<usize>(),
        elapsed = ?start.elapsed(),
        "loaded year files"
    );
    Ok(tables)
}

/// Years for which a file matching the naming pattern exists in `data_dir`.
pub fn discover_years(config: &PipelineConfig) -> Result<Vec<i32>> {
    let pattern = Path::new(&Pattern::escape(&config.data_dir.to_string_lossy()))
        .join(format!(
            "{}*{}.{}",
            Pattern::escape(&config.file_prefix),
            Pattern::escape(&config.file_suffix),
            Pattern::escape(&config.extension)
        ))
        .to_string_lossy()
        .into_owned();
    let paths = glob(&pattern).map_err(|e| PipelineError::Config {
        path: None,
        reason: format!("invalid file pattern {pattern:?}: {e}"),
    })?;
    let name_re = file_name_regex(config)?;

    let mut years: Vec<i32> = paths
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .filter_map(|p| year_from_path(&name_re, &p))
        .collect();
    years.sort_unstable();
    years.dedup();
    Ok(years)
}

fn file_name_regex(config: &PipelineConfig) -> Result<Regex> {
    let pattern = format!(
        r"^{}(\d{{4}}){}\.{}$",
        regex::escape(&config.file_prefix),
        regex::escape(&config.file_suffix),
        regex::escape(&config.extension)
    );
    Regex::new(&pattern).map_err(|e| PipelineError::Config {
        path: None,
        reason: format!("invalid file name pattern: {e}"),
    })
}

fn year_from_path(re: &Regex, path: &Path) -> Option<i32> {
    let name = path.file_name()?.to_str()?;
    re.captures(name)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{OCC_CODE, TOT_EMP};
    use arrow::array::Array;
    use anyhow::Result;
    use std::fs;
    use tempfile::tempdir;

    fn config_for(dir: &Path, first: i32, last: i32) -> PipelineConfig {
        PipelineConfig::default()
            .with_data_dir(dir)
            .with_years(first, last)
    }

    #[test]
    fn projects_and_tags_year() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("national_M2024_dl.csv"),
            "AREA,occ_code,occ_title,o_group,tot_emp,H_MEAN\n\
             99,11-1011,Chief Executives,detailed,\"211,230\",120.5\n",
        )?;
        let cfg = config_for(dir.path(), 2024, 2024);
        let t = load_year(&cfg, 2024)?;
        assert_eq!(t.year, 2024);
        assert!(t.missing_columns.is_empty());
        let names: Vec<String> = t
            .batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(names, vec!["YEAR", "OCC_CODE", "OCC_TITLE", "OCC_GROUP", "TOT_EMP"]);
        let years = t.batch.column(0).as_any().downcast_ref::<Int32Array>().unwrap();
        assert_eq!(years.value(0), 2024);
        let emp = t
            .batch
            .column_by_name(TOT_EMP)
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(emp.value(0), "211,230");
        Ok(())
    }

    #[test]
    fn missing_column_degrades_gracefully() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("national_M2015_dl.csv"),
            "OCC_CODE,OCC_TITLE,TOT_EMP\n11-1011,Chief Executives,100\n",
        )?;
        let t = load_year(&config_for(dir.path(), 2015, 2015), 2015)?;
        assert_eq!(t.missing_columns, vec![OCC_GROUP]);
        assert!(!t.has_column(OCC_GROUP));
        assert!(t.has_column(TOT_EMP));
        Ok(())
    }

    #[test]
    fn missing_file_is_fatal_in_strict_mode() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("national_M2015_dl.csv"),
            "OCC_CODE,OCC_GROUP,TOT_EMP\nX,detailed,1\n",
        )?;
        let err = load_years(&config_for(dir.path(), 2015, 2016)).unwrap_err();
        match err {
            PipelineError::MissingFile { year, path } => {
                assert_eq!(year, 2016);
                assert!(path.ends_with("national_M2016_dl.csv"));
            }
            other => panic!("unexpected error: {other}"),
        }
        Ok(())
    }

    #[test]
    fn lenient_mode_skips_missing_years() -> Result<()> {
        let dir = tempdir()?;
        for year in [2015, 2017] {
            fs::write(
                dir.path().join(format!("national_M{year}_dl.csv")),
                "OCC_CODE,OCC_GROUP,TOT_EMP\nX,detailed,1\n",
            )?;
        }
        let mut cfg = config_for(dir.path(), 2015, 2017);
        cfg.strict = false;
        let tables = load_years(&cfg)?;
        let years: Vec<i32> = tables.iter().map(|t| t.year).collect();
        assert_eq!(years, vec![2015, 2017]);
        Ok(())
    }

    #[test]
    fn discovers_only_matching_files() -> Result<()> {
        let dir = tempdir()?;
        for name in [
            "national_M2019_dl.csv",
            "national_M2016_dl.csv",
            "national_M2016_dl.csv.bak",
            "national_Mxxxx_dl.csv",
            "state_M2017_dl.csv",
        ] {
            fs::write(dir.path().join(name), "OCC_CODE\n")?;
        }
        let years = discover_years(&config_for(dir.path(), 2015, 2024))?;
        assert_eq!(years, vec![2016, 2019]);
        Ok(())
    }

    #[test]
    fn discovery_escapes_glob_characters_in_data_dir() -> Result<()> {
        let root = tempdir()?;
        let odd = root.path().join("oes[1]*");
        let decoy = root.path().join("oes1x");
        fs::create_dir(&odd)?;
        fs::create_dir(&decoy)?;
        fs::write(odd.join("national_M2018_dl.csv"), "OCC_CODE\n")?;
        fs::write(decoy.join("national_M2020_dl.csv"), "OCC_CODE\n")?;

        let years = discover_years(&config_for(&odd, 2015, 2024))?;
        assert_eq!(years, vec![2018]);
        Ok(())
    }

    #[test]
    fn group_label_keeps_surrounding_whitespace() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("national_M2015_dl.csv"),
            "OCC_CODE,OCC_GROUP,TOT_EMP\n 11-1011 , detailed ,100\n11-1021,   ,5\n",
        )?;
        let t = load_year(&config_for(dir.path(), 2015, 2015), 2015)?;
        let col = |name: &str| {
            t.batch
                .column_by_name(name)
                .unwrap()
                .as_any()
                .downcast_ref::<StringArray>()
                .unwrap()
                .clone()
        };
        assert_eq!(col(OCC_CODE).value(0), "11-1011");
        let groups = col(OCC_GROUP);
        assert_eq!(groups.value(0), " detailed ");
        assert!(groups.is_null(1));
        Ok(())
    }
}
