//! File-name to table-name resolution.
//!
//! The table name is the leading alphanumeric/underscore run of a file's base name, bounded by
//! the first dot. A trailing date stamp (`_2024-06-01`, `_20240601`, `_2024_06_01`, optionally
//! followed by a time or part suffix) is not part of the table name, so daily drops of
//! `edm_entity_2024-06-01.csv` all land in `edm_entity`.

use once_cell::sync::Lazy;
use regex::Regex;

static LEADING_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z0-9_]+)[^.]*\.").expect("leading-run pattern is valid")
});

// Year 19xx/20xx, month 01-12, day 01-31, joined by `-`, `_` or nothing.
static DATE_STAMPED: Lazy<Regex> = Lazy::new(|| {
    let (y, m, d) = (r"(?:19|20)\d{2}", r"(?:0[1-9]|1[0-2])", r"(?:0[1-9]|[12]\d|3[01])");
    Regex::new(&format!(
        r"^([A-Za-z0-9_]+?)_(?:{y}-{m}-{d}|{y}{m}{d}|{y}_{m}_{d})(?:[T_\-].*)?$"
    ))
    .expect("date-stamp pattern is valid")
});

/// Resolve the destination table for `path`.
///
/// Returns `None` when the base name has no extension, does not start with an
/// alphanumeric/underscore character, or is empty (e.g. a directory entry ending in `/`).
/// The result is returned exactly as captured; no case normalization is applied.
pub fn resolve_table_name(path: &str) -> Option<String> {
    let base = base_name(path);
    let run = LEADING_RUN.captures(base)?.get(1)?.as_str();

    // LEADING_RUN guarantees a dot, so the stem is everything before the first one.
    let stem = base.split('.').next().unwrap_or(base);
    if let Some(table) = DATE_STAMPED.captures(stem).and_then(|c| c.get(1)) {
        return Some(table.as_str().to_string());
    }
    Some(run.to_string())
}

/// The segment after the final path separator.
pub fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
