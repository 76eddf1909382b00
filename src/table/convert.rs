// src/table/convert.rs

use arrow::array::{Array, ArrayRef, Float64Builder, StringArray};
use std::sync::Arc;

/// Trim whitespace + strip outer quotes and a leading BOM if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('\u{feff}').trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Lenient employment parse: suppression markers (`*`, `**`, `#`), blanks and
/// anything else that is not a finite number map to `None`.
/// Comma thousands separators are accepted.
pub fn parse_employment(raw: &str) -> Option<f64> {
    let cleaned = clean_str(raw);
    if cleaned.is_empty() {
        return None;
    }
    let digits: String = cleaned.chars().filter(|c| *c != ',').collect();
    digits.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Convert a Utf8 employment column into Float64, nulling anything unparseable.
/// Returns the new array plus the number of non-null inputs that fell back to null.
pub fn coerce_employment(arr: &StringArray) -> (ArrayRef, usize) {
    let mut b = Float64Builder::with_capacity(arr.len());
    let mut fallbacks = 0usize;
    for opt in arr.iter() {
        let v = opt.and_then(parse_employment);
        if v.is_none() && opt.is_some_and(|s| !s.trim().is_empty()) {
            fallbacks += 1;
        }
        b.append_option(v);
    }
    (Arc::new(b.finish()) as ArrayRef, fallbacks)
}
