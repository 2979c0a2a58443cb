//! Cell search.
//!
//! Columns are scanned independently on the rayon pool and the hits are
//! concatenated column by column. Sort the result if row-major order is
//! needed; [`SearchResult`] orders by row, then column.

use crate::table::buffer::TableBuffer;
use rayon::prelude::*;
use regex::RegexBuilder;
use serde::Serialize;

/// Coordinates of a matching cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SearchResult {
    pub row: usize,
    pub col: usize,
}

enum Needle {
    Plain { text: String, case_sensitive: bool },
    Pattern(regex::Regex),
}

impl Needle {
    fn matches(&self, cell: &str) -> bool {
        match self {
            Needle::Plain {
                text,
                case_sensitive: true,
            } => cell.contains(text.as_str()),
            Needle::Plain { text, .. } => cell.to_lowercase().contains(text.as_str()),
            Needle::Pattern(re) => re.is_match(cell),
        }
    }
}

impl TableBuffer {
    /// Every cell containing `query` (or matching it, with `use_regex`).
    ///
    /// Header rows are searched too. An empty query or an invalid pattern
    /// finds nothing.
    pub fn search(&self, query: &str, use_regex: bool, case_sensitive: bool) -> Vec<SearchResult> {
        if query.is_empty() {
            return Vec::new();
        }

        let needle = if use_regex {
            match RegexBuilder::new(query)
                .case_insensitive(!case_sensitive)
                .build()
            {
                Ok(re) => Needle::Pattern(re),
                Err(e) => {
                    tracing::debug!(error = %e, "search pattern rejected");
                    return Vec::new();
                }
            }
        } else {
            Needle::Plain {
                text: if case_sensitive {
                    query.to_string()
                } else {
                    query.to_lowercase()
                },
                case_sensitive,
            }
        };

        let state = self.read();
        let rows = &state.rows;
        let needle = &needle;
        (0..state.column_count)
            .into_par_iter()
            .flat_map_iter(move |col| {
                rows.iter()
                    .enumerate()
                    .filter(move |(_, row)| needle.matches(&row[col]))
                    .map(move |(row, _)| SearchResult { row, col })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> TableBuffer {
        let rows: Vec<Vec<String>> = [
            ["Name", "Age", "City"],
            ["John", "25", "New York"],
            ["Jane", "30", "Los Angeles"],
            ["Bob", "35", "Chicago"],
        ]
        .iter()
        .map(|r| r.iter().map(|s| s.to_string()).collect())
        .collect();
        TableBuffer::from_rows(rows, true).unwrap()
    }

    #[test]
    fn test_plain_search_case_handling() {
        let b = people();
        assert_eq!(b.search("john", false, false), vec![SearchResult { row: 1, col: 0 }]);
        assert_eq!(b.search("John", false, true).len(), 1);
        assert!(b.search("john", false, true).is_empty());
        assert!(b.search("xyz", false, false).is_empty());
    }

    #[test]
    fn test_partial_matches() {
        let b = people();
        let hits = b.search("an", false, false);
        assert_eq!(
            hits,
            vec![SearchResult { row: 2, col: 0 }, SearchResult { row: 2, col: 2 }]
        );
    }

    #[test]
    fn test_results_are_column_major() {
        let b = people();
        let hits = b.search("o", false, false);
        // Bob, John (col 0) come before New York, Los Angeles, Chicago (col 2)
        assert_eq!(
            hits,
            vec![
                SearchResult { row: 1, col: 0 },
                SearchResult { row: 3, col: 0 },
                SearchResult { row: 1, col: 2 },
                SearchResult { row: 2, col: 2 },
                SearchResult { row: 3, col: 2 },
            ]
        );
        let mut row_major = hits.clone();
        row_major.sort();
        assert_eq!(row_major[1], SearchResult { row: 1, col: 2 });
    }

    #[test]
    fn test_regex_search() {
        let b = people();
        assert_eq!(b.search(r"^\d+$", true, false).len(), 3);
        assert_eq!(b.search("^j", true, false).len(), 2);
        assert!(b.search("^j", true, true).is_empty());
        assert!(b.search("([", true, false).is_empty());
    }

    #[test]
    fn test_header_is_searched() {
        let b = people();
        assert_eq!(b.search("city", false, false), vec![SearchResult { row: 0, col: 2 }]);
        assert!(b.search("", false, false).is_empty());
    }
}
