// src/query.rs
//! Read-only lookups the presentation layer consumes.

use serde::Serialize;

use crate::pipeline::PipelineOutput;
use crate::rank::{RankedTable, TrendResult};
use crate::table::{DetailedTable, HistoryPoint};

/// Titles listed when the search box is empty.
pub const DEFAULT_TITLE_LIMIT: usize = 100;

/// Case-insensitive substring search over the ranked titles.
///
/// A blank query returns the first `default_limit` titles in rank order.
pub fn search_titles<'a>(ranked: &'a RankedTable, query: &str, default_limit: usize) -> Vec<&'a str> {
    let titles = ranked.titles();
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return titles.iter().take(default_limit).map(String::as_str).collect();
    }
    titles
        .iter()
        .filter(|t| t.to_lowercase().contains(&needle))
        .map(String::as_str)
        .collect()
}

/// Employment history for charting; empty when nothing valid is on record.
pub fn chart_data(detailed: &DetailedTable, code: &str) -> Vec<HistoryPoint> {
    detailed.history(code)
}

/// Everything the detail view shows for one occupation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OccupationDetail {
    pub result: TrendResult,
    /// Size of the ranking, for "k of N".
    pub total_ranked: usize,
    pub history: Vec<HistoryPoint>,
}

/// Look up a ranked occupation by code, falling back to an exact title match.
pub fn lookup(output: &PipelineOutput, code_or_title: &str) -> Option<OccupationDetail> {
    let ranked = &output.ranked;
    let result = ranked
        .by_code(code_or_title)
        .or_else(|| ranked.by_title(code_or_title))?
        .clone();
    let history = chart_data(&output.detailed, &result.occupation_code);
    Some(OccupationDetail {
        total_ranked: ranked.len(),
        history,
        result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank::rank;
    use crate::table::tests::detailed_batch;
    use crate::trend::estimate_trends;

    fn ranked_from(rows: &[(i32, Option<&str>, Option<&str>, Option<f64>)]) -> (RankedTable, DetailedTable) {
        let table = DetailedTable::try_new(detailed_batch(rows)).unwrap();
        (rank(estimate_trends(&table), &table), table)
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let (ranked, _) = ranked_from(&[
            (2015, Some("29-1141"), Some("Registered Nurses"), Some(10.0)),
            (2016, Some("29-1141"), Some("Registered Nurses"), Some(20.0)),
            (2015, Some("29-1171"), Some("Nurse Practitioners"), Some(10.0)),
            (2016, Some("29-1171"), Some("Nurse Practitioners"), Some(15.0)),
            (2015, Some("43-9022"), Some("Word Processors and Typists"), Some(10.0)),
            (2016, Some("43-9022"), Some("Word Processors and Typists"), Some(5.0)),
        ]);
        assert_eq!(
            search_titles(&ranked, "NURSE", DEFAULT_TITLE_LIMIT),
            vec!["Registered Nurses", "Nurse Practitioners"]
        );
        assert!(search_titles(&ranked, "astronaut", DEFAULT_TITLE_LIMIT).is_empty());
        assert_eq!(search_titles(&ranked, "  ", 2).len(), 2);
    }

    #[test]
    fn chart_for_all_missing_code_is_empty() {
        let (_, table) = ranked_from(&[
            (2015, Some("45-3031"), Some("Fishing Workers"), None),
            (2016, Some("45-3031"), Some("Fishing Workers"), None),
        ]);
        assert!(chart_data(&table, "45-3031").is_empty());
    }
}
