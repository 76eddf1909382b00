// src/load/rename.rs
//! Header standardization across survey years.
//!
//! Early and late files disagree on some column names (the group label was
//! published as `O_GROUP` in some years and `OCC_GROUP` in others). Rather than
//! special-casing years, every header goes through the rename table from
//! [`PipelineConfig::renames`](crate::config::PipelineConfig).

use tracing::{debug, warn};

use crate::config::ColumnRename;
use crate::table::convert::clean_str;

/// Trim, strip quotes/BOM and ASCII-uppercase a header name.
pub fn normalize_header(raw: &str) -> String {
    clean_str(raw).to_ascii_uppercase()
}

/// Apply the rename table in place. Returns the `(from, to)` pairs that fired.
///
/// A rename is skipped when its target already exists, so a file carrying both
/// spellings keeps the canonical column and never ends up with duplicates.
pub fn apply_renames(
    headers: &mut [String],
    year: i32,
    renames: &[ColumnRename],
) -> Vec<(String, String)> {
    let mut applied = Vec::new();
    for rename in renames.iter().filter(|r| r.applies_to(year)) {
        let from = normalize_header(&rename.from);
        let to = normalize_header(&rename.to);
        let Some(pos) = headers.iter().position(|h| *h == from) else {
            continue;
        };
        if headers.iter().any(|h| *h == to) {
            warn!(year, %from, %to, "both spellings present; keeping existing column");
            continue;
        }
        debug!(year, %from, %to, "renaming column");
        headers[pos] = to.clone();
        applied.push((from, to));
    }
    applied
}
