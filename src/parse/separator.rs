//! Field separator detection.
//!
//! Common separators are tried first, in priority order; a candidate wins if
//! it occurs the same non-zero number of times on every sampled line. When
//! none qualifies, every other punctuation character of the first line is
//! scored and the best consistent one is returned.

use crate::error::{Result, TableError};
use ahash::AHashSet;
use std::path::Path;

/// Number of lines read up front to detect the separator
pub const SAMPLE_LINES: usize = 10;

/// Common separators, highest priority first
const PREFERRED: [char; 4] = [',', '\t', '|', ';'];

/// Column counts in this range look like a real table
const PLAUSIBLE_COLUMNS: std::ops::RangeInclusive<usize> = 2..=100;

/// Detect the separator used by `sample`
pub fn detect_separator<S: AsRef<str>>(sample: &[S]) -> Result<char> {
    if sample.is_empty() {
        return Err(TableError::SeparatorUndetermined);
    }

    for candidate in PREFERRED {
        if consistent_count(sample, candidate).is_some() {
            return Ok(candidate);
        }
    }

    fallback_candidates(sample[0].as_ref())
        .into_iter()
        .filter_map(|c| consistent_count(sample, c).map(|count| (c, score(c, count + 1))))
        // max_by_key keeps the last maximum; reverse so earlier characters win ties
        .rev()
        .max_by_key(|&(_, score)| score)
        .map(|(c, _)| c)
        .ok_or(TableError::SeparatorUndetermined)
}

/// Separator implied by a file name: `.csv` is comma, `.tsv` is tab.
/// A trailing `.gz` is looked through.
pub fn separator_from_extension(path: &Path) -> Option<char> {
    let name = path.file_name()?.to_str()?.to_ascii_lowercase();
    let name = name.strip_suffix(".gz").unwrap_or(&name);

    if name.ends_with(".csv") {
        Some(',')
    } else if name.ends_with(".tsv") {
        Some('\t')
    } else {
        None
    }
}

/// Per-line occurrence count of `c`, if it is identical and non-zero on every line
fn consistent_count<S: AsRef<str>>(sample: &[S], c: char) -> Option<usize> {
    let mut lines = sample.iter();
    let first = lines.next()?.as_ref().matches(c).count();
    if first == 0 {
        return None;
    }
    lines
        .all(|line| line.as_ref().matches(c).count() == first)
        .then_some(first)
}

/// Distinct non-alphanumeric, non-quote characters of `line`, in order of appearance
fn fallback_candidates(line: &str) -> Vec<char> {
    let mut seen = AHashSet::new();
    line.chars()
        .filter(|c| !c.is_alphanumeric())
        .filter(|c| !matches!(*c, '"' | '\'' | '`' | '\r' | '\n'))
        .filter(|c| seen.insert(*c))
        .collect()
}

fn score(c: char, columns: usize) -> u32 {
    let priority = match c {
        ',' => 100,
        '\t' => 90,
        '|' => 80,
        ';' => 70,
        ':' => 40,
        ' ' => 30,
        '^' | '~' => 20,
        _ => 10,
    };
    let shape = if PLAUSIBLE_COLUMNS.contains(&columns) { 50 } else { 0 };
    priority + shape
}
