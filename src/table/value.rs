//! Cell value classification and conversion.
//!
//! The scanners here decide what a single cell looks like; the column-level
//! decision lives in [`crate::table::infer`].

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Padding value for cells a row never had
pub const MISSING: &str = "NaN";

/// Values treated as empty during sampling and conversion
const NA_VALUES: [&str; 5] = ["", "NA", "N/A", "NaN", "null"];

/// Column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ColumnType {
    #[default]
    String,
    Numeric,
    Date,
}

impl ColumnType {
    /// Whether ordered comparisons (`>`, `<`, ...) apply
    pub fn is_ordered(self) -> bool {
        matches!(self, ColumnType::Numeric | ColumnType::Date)
    }
}

#[derive(Debug, Clone, Copy)]
enum Layout {
    Date(&'static str),
    DateTime(&'static str),
    Rfc3339,
}

/// Date layouts, most common first
const DATE_LAYOUTS: [Layout; 12] = [
    Layout::Date("%Y-%m-%d"),
    Layout::DateTime("%Y-%m-%d %H:%M:%S"),
    Layout::Date("%m/%d/%Y"),
    Layout::Date("%d/%m/%Y"),
    Layout::Date("%Y/%m/%d"),
    Layout::Rfc3339,
    Layout::DateTime("%Y-%m-%dT%H:%M:%S"),
    Layout::Date("%b %d, %Y"),
    Layout::Date("%B %d, %Y"),
    Layout::Date("%d-%b-%Y"),
    Layout::Date("%d %b %Y"),
    Layout::Date("%Y.%m.%d"),
];

/// Empty or NA-sentinel value
pub fn is_missing(value: &str) -> bool {
    NA_VALUES.contains(&value)
}

/// Whether `value` parses with one of the known date layouts
pub fn is_date(value: &str) -> bool {
    parse_date(value).is_some()
}

/// Seconds since the Unix epoch for a recognised date
pub fn parse_date(value: &str) -> Option<i64> {
    let value = value.trim();
    if !looks_like_date(value) {
        return None;
    }

    DATE_LAYOUTS.iter().find_map(|layout| match *layout {
        Layout::Date(fmt) => NaiveDate::parse_from_str(value, fmt)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().timestamp()),
        Layout::DateTime(fmt) => NaiveDateTime::parse_from_str(value, fmt)
            .ok()
            .map(|dt| dt.and_utc().timestamp()),
        Layout::Rfc3339 => DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| dt.timestamp()),
    })
}

/// Cheap rejection before trying every layout
fn looks_like_date(value: &str) -> bool {
    (8..=30).contains(&value.len())
        && value.contains(['-', '/', '.', ':', 'T', ' '])
        && value.bytes().any(|b| b.is_ascii_digit())
}

/// Single-pass numeric check.
///
/// Accepts an optional sign, digits, one decimal point and one exponent
/// (itself optionally signed) after at least one digit. Grouping
/// separators `,` and `_` are tolerated anywhere.
pub fn is_numeric(value: &str) -> bool {
    let bytes = value.as_bytes();
    let mut i = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
        if i >= bytes.len() {
            return false;
        }
    }

    let mut has_digit = false;
    let mut has_dot = false;
    let mut has_exp = false;

    while i < bytes.len() {
        match bytes[i] {
            b'0'..=b'9' => has_digit = true,
            b'.' => {
                if has_dot || has_exp {
                    return false;
                }
                has_dot = true;
            }
            b'e' | b'E' => {
                if !has_digit || has_exp {
                    return false;
                }
                has_exp = true;
                // the exponent needs digits of its own
                has_digit = false;
                if matches!(bytes.get(i + 1), Some(b'+' | b'-')) {
                    i += 1;
                }
            }
            b',' | b'_' => {}
            _ => return false,
        }
        i += 1;
    }

    has_digit
}

/// Numeric value of a cell; unparseable and missing cells are `0.0`
pub fn parse_numeric(value: &str) -> f64 {
    parse_numeric_strict(value).unwrap_or(0.0)
}

/// Numeric value of a cell, `None` if it is not a number
pub fn parse_numeric_strict(value: &str) -> Option<f64> {
    let cleaned: String = value.chars().filter(|c| !matches!(c, ',' | '_')).collect();
    let cleaned = cleaned.trim();
    if is_missing(cleaned) {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| !v.is_nan())
}
