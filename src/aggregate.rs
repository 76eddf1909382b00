// src/aggregate.rs
//! Merge the per-year tables into one unified table, coerce employment counts
//! and keep only detailed-level occupation rows.

use arrow::{
    array::{new_null_array, Array, ArrayRef, BooleanArray, StringArray},
    compute::{concat_batches, filter_record_batch},
    datatypes::DataType,
    record_batch::RecordBatch,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::error::{PipelineError, Result};
use crate::load::YearTable;
use crate::table::{
    convert::coerce_employment, typed_column, unified_schema, DetailedTable, OCC_CODE, OCC_GROUP,
    OCC_TITLE, TOT_EMP, YEAR,
};

/// Concatenate, coerce and filter.
///
/// Fails with [`PipelineError::EmptyDataset`] when `years` is empty and with
/// [`PipelineError::EmptyFilter`] when no row carries `detailed_label`.
#[instrument(level = "info", skip(years), fields(years = years.len()))]
pub fn aggregate(years: &[YearTable], detailed_label: &str) -> Result<DetailedTable> {
    if years.is_empty() {
        return Err(PipelineError::EmptyDataset);
    }

    let schema = unified_schema();
    let mut fallbacks = 0usize;
    let widened = years
        .iter()
        .map(|t| {
            let (batch, n) = widen(t)?;
            fallbacks += n;
            Ok(batch)
        })
        .collect::<Result<Vec<RecordBatch>>>()?;
    let unified = concat_batches(&schema, &widened)?;

    let groups = typed_column::<StringArray>(&unified, OCC_GROUP)?;
    let keep: BooleanArray = groups
        .iter()
        .map(|g| Some(g == Some(detailed_label)))
        .collect();
    let detailed = filter_record_batch(&unified, &keep)?;

    debug!(
        unified_rows = unified.num_rows(),
        coercion_fallbacks = fallbacks,
        "coerced employment counts"
    );
    if detailed.num_rows() == 0 {
        return Err(PipelineError::EmptyFilter {
            column: OCC_GROUP,
            label: detailed_label.to_string(),
        });
    }
    info!(
        unified_rows = unified.num_rows(),
        detailed_rows = detailed.num_rows(),
        "filtered to detailed occupations"
    );

    Ok(DetailedTable::try_new(detailed)?)
}

/// Bring one year's batch to the unified layout: absent columns become
/// all-null, `TOT_EMP` is coerced to Float64. Also returns the coercion
/// fallback count.
fn widen(table: &YearTable) -> Result<(RecordBatch, usize)> {
    let batch = &table.batch;
    let n = batch.num_rows();
    let utf8 = |name: &str| -> ArrayRef {
        batch
            .column_by_name(name)
            .cloned()
            .unwrap_or_else(|| new_null_array(&DataType::Utf8, n))
    };

    let (emp, fallbacks) = match batch.column_by_name(TOT_EMP) {
        Some(col) => {
            let strings = col
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| PipelineError::Malformed {
                    year: table.year,
                    path: table.source.clone(),
                    reason: format!("{TOT_EMP} is not a text column"),
                })?;
            coerce_employment(strings)
        }
        None => (new_null_array(&DataType::Float64, n), 0),
    };

    let year = batch
        .column_by_name(YEAR)
        .cloned()
        .ok_or_else(|| PipelineError::Malformed {
            year: table.year,
            path: table.source.clone(),
            reason: format!("{YEAR} tag missing"),
        })?;

    let widened = RecordBatch::try_new(
        unified_schema(),
        vec![year, utf8(OCC_CODE), utf8(OCC_TITLE), utf8(OCC_GROUP), emp],
    )?;
    debug_assert_eq!(widened.num_rows(), n);
    Ok((widened, fallbacks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::load::load_years;
    use anyhow::Result;
    use std::{fs, path::Path};
    use tempfile::tempdir;

    fn write_year(dir: &Path, year: i32, body: &str) -> Result<()> {
        fs::write(dir.join(format!("national_M{year}_dl.csv")), body)?;
        Ok(())
    }

    fn load(dir: &Path, first: i32, last: i32) -> Result<Vec<YearTable>> {
        let cfg = PipelineConfig::default()
            .with_data_dir(dir)
            .with_years(first, last);
        Ok(load_years(&cfg)?)
    }

    #[test]
    fn empty_input_is_fatal() {
        let err = aggregate(&[], "detailed").unwrap_err();
        assert!(matches!(err, PipelineError::EmptyDataset));
    }

    #[test]
    fn keeps_only_exact_detailed_rows() -> Result<()> {
        let dir = tempdir()?;
        write_year(
            dir.path(),
            2015,
            "OCC_CODE,OCC_TITLE,OCC_GROUP,TOT_EMP\n\
             00-0000,All Occupations,total,1000\n\
             11-0000,Management,major,300\n\
             11-1011,Chief Executives,detailed,100\n\
             11-1021,General Managers,Detailed,50\n\
             11-1031,Legislators, detailed ,20\n",
        )?;
        let table = aggregate(&load(dir.path(), 2015, 2015)?, "detailed")?;
        assert_eq!(table.len(), 1);
        let rec = table.records().next().unwrap();
        assert_eq!(rec.occupation_code.as_deref(), Some("11-1011"));
        assert_eq!(rec.total_employment, Some(100.0));
        Ok(())
    }

    #[test]
    fn suppression_marker_is_missing_not_zero() -> Result<()> {
        let dir = tempdir()?;
        write_year(
            dir.path(),
            2015,
            "OCC_CODE,OCC_TITLE,OCC_GROUP,TOT_EMP\n45-3031,Fishing Workers,detailed,**\n",
        )?;
        write_year(
            dir.path(),
            2016,
            "OCC_CODE,OCC_TITLE,OCC_GROUP,TOT_EMP\n45-3031,Fishing Workers,detailed,#\n",
        )?;
        let table = aggregate(&load(dir.path(), 2015, 2016)?, "detailed")?;
        assert_eq!(table.len(), 2);
        assert!(table.records().all(|r| r.total_employment.is_none()));
        Ok(())
    }

    #[test]
    fn alias_and_canonical_group_column_filter_identically() -> Result<()> {
        let rows = "11-1011,Chief Executives,detailed,100\n11-0000,Management,major,300\n";
        let dir = tempdir()?;
        write_year(
            dir.path(),
            2015,
            &format!("OCC_CODE,OCC_TITLE,OCC_GROUP,TOT_EMP\n{rows}"),
        )?;
        write_year(
            dir.path(),
            2016,
            &format!("OCC_CODE,OCC_TITLE,O_GROUP,TOT_EMP\n{rows}"),
        )?;
        let canonical = aggregate(&load(dir.path(), 2015, 2015)?, "detailed")?;
        let alias = aggregate(&load(dir.path(), 2016, 2016)?, "detailed")?;
        assert_eq!(canonical.len(), alias.len());
        assert_eq!(canonical.len(), 1);
        Ok(())
    }

    #[test]
    fn no_detailed_rows_is_fatal() -> Result<()> {
        let dir = tempdir()?;
        write_year(
            dir.path(),
            2015,
            "OCC_CODE,OCC_TITLE,TOT_EMP\n11-1011,Chief Executives,100\n",
        )?;
        let err = aggregate(&load(dir.path(), 2015, 2015)?, "detailed").unwrap_err();
        assert!(matches!(err, PipelineError::EmptyFilter { .. }));
        assert!(err.to_string().contains("detailed"));
        Ok(())
    }

    #[test]
    fn years_missing_columns_are_null_filled() -> Result<()> {
        let dir = tempdir()?;
        write_year(
            dir.path(),
            2015,
            "OCC_CODE,OCC_GROUP,TOT_EMP\n11-1011,detailed,100\n",
        )?;
        write_year(
            dir.path(),
            2016,
            "OCC_CODE,OCC_TITLE,OCC_GROUP,TOT_EMP\n11-1011,Chief Executives,detailed,110\n",
        )?;
        let table = aggregate(&load(dir.path(), 2015, 2016)?, "detailed")?;
        let recs: Vec<_> = table.records().collect();
        assert_eq!(recs[0].year, 2015);
        assert_eq!(recs[0].occupation_title, None);
        assert_eq!(recs[1].occupation_title.as_deref(), Some("Chief Executives"));
        Ok(())
    }
}
