//! Column type inference.
//!
//! A column is sampled (everything for small tables, a stratified head /
//! middle / tail sample otherwise) and each non-empty value is classified
//! as a date, a number, or neither. The column takes the first type that
//! covers at least 90% of the sampled values.

use crate::table::buffer::{TableBuffer, TableState};
use crate::table::value::{is_date, is_missing, is_numeric, ColumnType};
use rayon::prelude::*;

/// Data rows at or below this count are scanned in full
const FULL_SCAN_ROWS: usize = 100;

const HEAD_SAMPLE: usize = 50;
const MIDDLE_SAMPLE: usize = 25;
const TAIL_SAMPLE: usize = 25;

/// Share of sampled values a type must reach
const TYPE_THRESHOLD: f64 = 0.90;

/// Above this many columns, columns are classified in parallel
const PARALLEL_COLUMNS: usize = 4;

/// Row indices sampled for a table whose data rows are `start..end`
pub fn sample_rows(start: usize, end: usize) -> Vec<usize> {
    if end <= start {
        return Vec::new();
    }
    if end - start <= FULL_SCAN_ROWS {
        return (start..end).collect();
    }

    let middle = (start + end) / 2;
    let mut rows: Vec<usize> = (start..start + HEAD_SAMPLE).collect();
    rows.extend(middle..(middle + MIDDLE_SAMPLE).min(end));
    rows.extend((end - TAIL_SAMPLE).max(start)..end);
    rows.dedup();
    rows
}

/// Classify a sequence of raw values
pub fn classify_values<'a, I>(values: I) -> ColumnType
where
    I: IntoIterator<Item = &'a str>,
{
    let mut total = 0usize;
    let mut dates = 0usize;
    let mut numbers = 0usize;

    for value in values {
        let value = value.trim();
        if is_missing(value) {
            continue;
        }
        total += 1;
        if is_date(value) {
            dates += 1;
        } else if is_numeric(value) {
            numbers += 1;
        }
    }

    if total == 0 {
        return ColumnType::String;
    }

    let threshold = total as f64 * TYPE_THRESHOLD;
    if dates as f64 >= threshold {
        ColumnType::Date
    } else if numbers as f64 >= threshold {
        ColumnType::Numeric
    } else {
        ColumnType::String
    }
}

fn classify_locked(state: &TableState, column: usize) -> ColumnType {
    if column >= state.column_count {
        return ColumnType::String;
    }
    let rows = sample_rows(state.data_start(), state.rows.len());
    classify_values(rows.iter().map(|&r| state.rows[r][column].as_ref()))
}

/// Samples columns of a table and assigns their types
pub struct TypeInferencer<'a> {
    buffer: &'a TableBuffer,
}

impl<'a> TypeInferencer<'a> {
    pub fn new(buffer: &'a TableBuffer) -> Self {
        Self { buffer }
    }

    /// Type of one column; out-of-range columns are String
    pub fn classify(&self, column: usize) -> ColumnType {
        classify_locked(&self.buffer.read(), column)
    }

    /// Classify every column and store the result on the buffer
    pub fn infer_all(&self) -> Vec<ColumnType> {
        let types: Vec<ColumnType> = {
            let state = self.buffer.read();
            if state.column_count > PARALLEL_COLUMNS {
                (0..state.column_count)
                    .into_par_iter()
                    .map(|column| classify_locked(&state, column))
                    .collect()
            } else {
                (0..state.column_count)
                    .map(|column| classify_locked(&state, column))
                    .collect()
            }
        };

        for (column, column_type) in types.iter().enumerate() {
            self.buffer.set_column_type(column, *column_type);
        }
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_buffer(header: &str, values: &[&str]) -> TableBuffer {
        let b = TableBuffer::new();
        b.append(vec![header.to_string()], false).unwrap();
        for v in values {
            b.append(vec![v.to_string()], false).unwrap();
        }
        b
    }

    #[test]
    fn test_numeric_column() {
        let b = column_buffer("Age", &["30", "25", "35"]);
        assert_eq!(TypeInferencer::new(&b).classify(0), ColumnType::Numeric);
    }

    #[test]
    fn test_date_column() {
        let b = column_buffer("When", &["2024-01-15", "2024-02-20", "2024-03-10"]);
        assert_eq!(TypeInferencer::new(&b).classify(0), ColumnType::Date);
    }

    #[test]
    fn test_mixed_column_is_string() {
        let b = column_buffer("X", &["100", "abc", "200"]);
        assert_eq!(TypeInferencer::new(&b).classify(0), ColumnType::String);
    }

    #[test]
    fn test_missing_values_do_not_count() {
        let b = column_buffer("X", &["1", "NA", "", "null", "2", "NaN", "3.5"]);
        assert_eq!(TypeInferencer::new(&b).classify(0), ColumnType::Numeric);
    }

    #[test]
    fn test_all_missing_is_string() {
        let b = column_buffer("X", &["NA", "", "N/A"]);
        assert_eq!(TypeInferencer::new(&b).classify(0), ColumnType::String);
    }

    #[test]
    fn test_header_excluded_from_sample() {
        // the header "Score" would push the ratio below 90% if sampled
        let values: Vec<String> = (0..5).map(|i| i.to_string()).collect();
        let refs: Vec<&str> = values.iter().map(|s| s.as_str()).collect();
        let b = column_buffer("Score", &refs);
        assert_eq!(TypeInferencer::new(&b).classify(0), ColumnType::Numeric);
    }

    #[test]
    fn test_ninety_percent_threshold() {
        let mut values = vec!["x"; 1];
        values.extend(vec!["7"; 9]);
        assert_eq!(classify_values(values.iter().copied()), ColumnType::Numeric);

        let mut values = vec!["x"; 2];
        values.extend(vec!["7"; 8]);
        assert_eq!(classify_values(values.iter().copied()), ColumnType::String);
    }

    #[test]
    fn test_sample_rows_small() {
        assert_eq!(sample_rows(1, 5), vec![1, 2, 3, 4]);
        assert!(sample_rows(1, 1).is_empty());
    }

    #[test]
    fn test_sample_rows_stratified() {
        let rows = sample_rows(1, 1001);
        assert_eq!(rows.len(), 100);
        assert_eq!(rows[0], 1);
        assert_eq!(rows[49], 50);
        assert_eq!(rows[50], 501);
        assert_eq!(rows[75], 976);
        assert_eq!(*rows.last().unwrap(), 1000);
    }

    #[test]
    fn test_infer_all_parallel_columns() {
        let b = TableBuffer::new();
        b.append(
            ["name", "n", "d", "s", "f", "z"].iter().map(|s| s.to_string()).collect(),
            false,
        )
        .unwrap();
        for i in 0..200 {
            b.append(
                vec![
                    format!("user{i}"),
                    i.to_string(),
                    format!("2024-01-{:02}", i % 28 + 1),
                    "x".to_string(),
                    format!("{}.5", i),
                    "NA".to_string(),
                ],
                false,
            )
            .unwrap();
        }
        let types = TypeInferencer::new(&b).infer_all();
        assert_eq!(
            types,
            vec![
                ColumnType::String,
                ColumnType::Numeric,
                ColumnType::Date,
                ColumnType::String,
                ColumnType::Numeric,
                ColumnType::String,
            ]
        );
        assert_eq!(b.column_types(), types);
    }
}
