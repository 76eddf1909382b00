// src/trend.rs
//! Per-occupation employment trend via ordinary least squares.

use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

use crate::table::{DetailedTable, YearlyRecord};

/// All detailed-level records sharing one occupation code, in table order.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupationSeries {
    pub occupation_code: String,
    pub records: Vec<YearlyRecord>,
}

impl OccupationSeries {
    /// `(year, employment)` pairs with missing values dropped.
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.records
            .iter()
            .filter_map(|r| r.total_employment.map(|y| (f64::from(r.year), y)))
            .collect()
    }
}

/// A fitted slope for one occupation, before ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct Trend {
    pub occupation_code: String,
    /// Persons per year; positive means growing.
    pub slope: f64,
}

/// Least-squares slope of `y` on `x`.
///
/// `None` with fewer than two points, zero variance in `x`, or a non-finite result.
pub fn ols_slope(points: &[(f64, f64)]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

    let (sxy, sxx) = points.iter().fold((0.0, 0.0), |(sxy, sxx), &(x, y)| {
        let dx = x - mean_x;
        (sxy + dx * (y - mean_y), sxx + dx * dx)
    });
    if sxx == 0.0 {
        return None;
    }
    Some(sxy / sxx).filter(|s| s.is_finite())
}

/// Group detailed rows by occupation code, codes ascending.
/// Rows without a code are dropped.
pub fn group_series(table: &DetailedTable) -> Vec<OccupationSeries> {
    let mut groups: BTreeMap<String, Vec<YearlyRecord>> = BTreeMap::new();
    for rec in table.records() {
        if let Some(code) = rec.occupation_code.clone() {
            groups.entry(code).or_default().push(rec);
        }
    }
    groups
        .into_iter()
        .map(|(occupation_code, records)| OccupationSeries {
            occupation_code,
            records,
        })
        .collect()
}

/// Fit every occupation; those with insufficient history are left out.
///
/// Output follows grouping order (ascending code) regardless of how the fits
/// are scheduled across threads.
#[instrument(level = "info", skip(table), fields(rows = table.len()))]
pub fn estimate_trends(table: &DetailedTable) -> Vec<Trend> {
    let series = group_series(table);
    let trends: Vec<Trend> = series
        .par_iter()
        .filter_map(|s| {
            let slope = ols_slope(&s.points())?;
            Some(Trend {
                occupation_code: s.occupation_code.clone(),
                slope,
            })
        })
        .collect();

    let dropped = series.len() - trends.len();
    if dropped > 0 {
        debug!(dropped, "occupations without enough history to fit");
    }
    info!(occupations = series.len(), fitted = trends.len(), "estimated trends");
    trends
}
