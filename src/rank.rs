// src/rank.rs
//! Join fitted slopes with display titles and order them.

use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::info;

use crate::table::DetailedTable;
use crate::trend::Trend;

/// One ranked occupation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendResult {
    pub rank: usize,
    pub occupation_code: String,
    pub occupation_title: Option<String>,
    /// Persons per year.
    pub slope: f64,
}

/// All fitted occupations, slope descending, rank `1..=len()`.
#[derive(Debug, Clone, Default)]
pub struct RankedTable {
    rows: Vec<TrendResult>,
    titles: OnceCell<Vec<String>>,
}

impl PartialEq for RankedTable {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows
    }
}

impl RankedTable {
    pub fn rows(&self) -> &[TrendResult] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The `n` fastest-growing occupations, rank order.
    pub fn top(&self, n: usize) -> &[TrendResult] {
        &self.rows[..n.min(self.rows.len())]
    }

    /// The `n` fastest-shrinking occupations, steepest decline first.
    pub fn bottom(&self, n: usize) -> Vec<&TrendResult> {
        let start = self.rows.len().saturating_sub(n);
        self.rows[start..].iter().rev().collect()
    }

    pub fn by_code(&self, code: &str) -> Option<&TrendResult> {
        self.rows.iter().find(|r| r.occupation_code == code)
    }

    /// First row (in rank order) whose title equals `title`.
    pub fn by_title(&self, title: &str) -> Option<&TrendResult> {
        self.rows
            .iter()
            .find(|r| r.occupation_title.as_deref() == Some(title))
    }

    /// Distinct titles in rank order. Built on first use and reused afterwards.
    pub fn titles(&self) -> &[String] {
        self.titles.get_or_init(|| {
            let mut seen = HashSet::new();
            self.rows
                .iter()
                .filter_map(|r| r.occupation_title.as_ref())
                .filter(|t| seen.insert(t.as_str()))
                .cloned()
                .collect()
        })
    }
}

/// Most recent non-null title per code, scanning the table chronologically.
pub fn latest_titles(table: &DetailedTable) -> HashMap<String, String> {
    let mut titles = HashMap::new();
    for rec in table.records() {
        if let (Some(code), Some(title)) = (rec.occupation_code, rec.occupation_title) {
            titles.insert(code, title);
        }
    }
    titles
}

/// Attach titles, sort by slope descending and number the rows.
///
/// The sort is stable: equal slopes keep the order of `trends`.
pub fn rank(trends: Vec<Trend>, table: &DetailedTable) -> RankedTable {
    let mut titles = latest_titles(table);
    let mut rows: Vec<TrendResult> = trends
        .into_iter()
        .map(|t| TrendResult {
            rank: 0,
            occupation_title: titles.remove(&t.occupation_code),
            occupation_code: t.occupation_code,
            slope: t.slope,
        })
        .collect();

    rows.sort_by(|a, b| b.slope.total_cmp(&a.slope));
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i + 1;
    }

    info!(ranked = rows.len(), "ranked occupations");
    RankedTable {
        rows,
        titles: OnceCell::new(),
    }
}
