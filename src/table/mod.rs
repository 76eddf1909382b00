// src/table/mod.rs
//! Canonical column layout and typed views over the in-memory Arrow tables.
//!
//! Per-year tables keep every source column as `Utf8` (plus the `YEAR` tag).
//! The unified table produced by the aggregator has the fixed layout from
//! [`unified_schema`], with `TOT_EMP` coerced to `Float64`.

pub mod convert;

use arrow::{
    array::{Array, Float64Array, Int32Array, StringArray},
    datatypes::{DataType, Field, Schema},
    error::ArrowError,
    record_batch::RecordBatch,
};
use serde::Serialize;
use std::{collections::BTreeSet, sync::Arc};

pub const YEAR: &str = "YEAR";
pub const OCC_CODE: &str = "OCC_CODE";
pub const OCC_TITLE: &str = "OCC_TITLE";
pub const OCC_GROUP: &str = "OCC_GROUP";
pub const TOT_EMP: &str = "TOT_EMP";

/// Source columns retained by the loader, in output order (`YEAR` comes first).
pub const SOURCE_COLUMNS: [&str; 4] = [OCC_CODE, OCC_TITLE, OCC_GROUP, TOT_EMP];

/// Layout of the unified, coerced table.
pub fn unified_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(YEAR, DataType::Int32, false),
        Field::new(OCC_CODE, DataType::Utf8, true),
        Field::new(OCC_TITLE, DataType::Utf8, true),
        Field::new(OCC_GROUP, DataType::Utf8, true),
        Field::new(TOT_EMP, DataType::Float64, true),
    ]))
}

/// One row of the unified table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyRecord {
    pub year: i32,
    pub occupation_code: Option<String>,
    pub occupation_title: Option<String>,
    pub occupation_group: Option<String>,
    pub total_employment: Option<f64>,
}

/// A single `(year, employment)` point of an occupation's history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub year: i32,
    pub total_employment: f64,
}

/// The unified table restricted to detailed-level rows.
///
/// Built once per load cycle by the aggregator and read-only afterwards.
#[derive(Debug, Clone)]
pub struct DetailedTable {
    batch: RecordBatch,
    year: Int32Array,
    code: StringArray,
    title: StringArray,
    group: StringArray,
    emp: Float64Array,
}

impl DetailedTable {
    /// Wrap a batch with the [`unified_schema`] layout.
    pub fn try_new(batch: RecordBatch) -> Result<Self, ArrowError> {
        if batch.schema().fields() != unified_schema().fields() {
            return Err(ArrowError::SchemaError(format!(
                "expected unified layout, got {:?}",
                batch.schema()
            )));
        }
        Ok(Self {
            year: typed_column::<Int32Array>(&batch, YEAR)?,
            code: typed_column::<StringArray>(&batch, OCC_CODE)?,
            title: typed_column::<StringArray>(&batch, OCC_TITLE)?,
            group: typed_column::<StringArray>(&batch, OCC_GROUP)?,
            emp: typed_column::<Float64Array>(&batch, TOT_EMP)?,
            batch,
        })
    }

    pub fn len(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    fn record(&self, i: usize) -> YearlyRecord {
        YearlyRecord {
            year: self.year.value(i),
            occupation_code: opt_str(&self.code, i),
            occupation_title: opt_str(&self.title, i),
            occupation_group: opt_str(&self.group, i),
            total_employment: self.emp.is_valid(i).then(|| self.emp.value(i)),
        }
    }

    /// Iterate the rows in table order (chronological, then source order).
    pub fn records(&self) -> impl Iterator<Item = YearlyRecord> + '_ {
        (0..self.len()).map(move |i| self.record(i))
    }

    /// Distinct non-null occupation codes, ascending.
    pub fn codes(&self) -> BTreeSet<String> {
        self.code.iter().flatten().map(str::to_string).collect()
    }

    /// Valid employment points for `code`, sorted by year.
    /// Empty when the code is unknown or every count is missing.
    pub fn history(&self, code: &str) -> Vec<HistoryPoint> {
        let mut points: Vec<HistoryPoint> = (0..self.len())
            .filter(|&i| self.code.is_valid(i) && self.code.value(i) == code)
            .filter(|&i| self.emp.is_valid(i))
            .map(|i| HistoryPoint {
                year: self.year.value(i),
                total_employment: self.emp.value(i),
            })
            .collect();
        points.sort_by_key(|p| p.year);
        points
    }
}

/// Downcast a named column, cloning the (Arc-backed) array.
pub fn typed_column<T: Array + Clone + 'static>(
    batch: &RecordBatch,
    name: &str,
) -> Result<T, ArrowError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| ArrowError::SchemaError(format!("missing column {name}")))?
        .as_any()
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| ArrowError::SchemaError(format!("column {name} has an unexpected type")))
}

fn opt_str(arr: &StringArray, i: usize) -> Option<String> {
    arr.is_valid(i).then(|| arr.value(i).to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use arrow::array::ArrayRef;

    /// Build a unified batch from `(year, code, title, emp)` tuples, all "detailed".
    pub(crate) fn detailed_batch(rows: &[(i32, Option<&str>, Option<&str>, Option<f64>)]) -> RecordBatch {
        let year: ArrayRef = Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.0)));
        let code: ArrayRef = Arc::new(StringArray::from(rows.iter().map(|r| r.1).collect::<Vec<_>>()));
        let title: ArrayRef = Arc::new(StringArray::from(rows.iter().map(|r| r.2).collect::<Vec<_>>()));
        let group: ArrayRef = Arc::new(StringArray::from(vec![Some("detailed"); rows.len()]));
        let emp: ArrayRef = Arc::new(Float64Array::from(rows.iter().map(|r| r.3).collect::<Vec<_>>()));
        RecordBatch::try_new(unified_schema(), vec![year, code, title, group, emp]).unwrap()
    }

    #[test]
    fn history_drops_missing_and_sorts() {
        let table = DetailedTable::try_new(detailed_batch(&[
            (2017, Some("11-1011"), Some("Chief Executives"), Some(120.0)),
            (2015, Some("11-1011"), Some("Chief Executives"), Some(100.0)),
            (2016, Some("11-1011"), Some("Chief Executives"), None),
            (2016, Some("29-1141"), Some("Registered Nurses"), Some(5.0)),
        ]))
        .unwrap();
        let h = table.history("11-1011");
        assert_eq!(
            h,
            vec![
                HistoryPoint { year: 2015, total_employment: 100.0 },
                HistoryPoint { year: 2017, total_employment: 120.0 },
            ]
        );
        assert!(table.history("99-9999").is_empty());
    }

    #[test]
    fn all_missing_history_is_empty_not_error() {
        let table = DetailedTable::try_new(detailed_batch(&[
            (2015, Some("45-3031"), Some("Fishing Workers"), None),
            (2016, Some("45-3031"), Some("Fishing Workers"), None),
        ]))
        .unwrap();
        assert!(table.history("45-3031").is_empty());
    }

    #[test]
    fn records_and_codes() {
        let table = DetailedTable::try_new(detailed_batch(&[
            (2015, Some("B"), None, Some(1.0)),
            (2015, None, Some("orphan"), Some(2.0)),
            (2016, Some("A"), Some("a"), None),
        ]))
        .unwrap();
        let recs: Vec<_> = table.records().collect();
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[1].occupation_code, None);
        assert_eq!(recs[2].total_employment, None);
        assert_eq!(recs[0].occupation_group.as_deref(), Some("detailed"));
        let codes: Vec<_> = table.codes().into_iter().collect();
        assert_eq!(codes, vec!["A".to_string(), "B".to_string()]);
    }
}
