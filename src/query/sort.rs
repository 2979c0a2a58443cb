//! In-place, type-aware row sorting.

use crate::table::buffer::{Cell, TableBuffer};
use crate::table::value::{parse_date, parse_numeric, ColumnType};
use rayon::prelude::*;
use std::cmp::Ordering;

/// Data rows above this count are sorted on the rayon pool
const PARALLEL_SORT_ROWS: usize = 10_000;

type Row = Vec<Cell>;

impl TableBuffer {
    /// Stable sort of the data rows by `column`.
    ///
    /// Frozen header rows stay where they are. String columns compare
    /// byte-wise, Numeric columns by value (unparseable cells count as 0),
    /// Date columns by timestamp (unparseable cells count as the epoch).
    /// Returns false if the column does not exist.
    pub fn sort_by_column(&self, column: usize, descending: bool) -> bool {
        let mut state = self.write();
        if column >= state.column_count {
            return false;
        }

        let start = state.data_start();
        let column_type = state.column_type(column);
        let mut data = state.rows.split_off(start);

        match column_type {
            ColumnType::String => sort_rows(&mut data, |a, b| {
                directed(a[column].as_bytes().cmp(b[column].as_bytes()), descending)
            }),
            ColumnType::Numeric => sort_keyed(
                &mut data,
                |row| parse_numeric(&row[column]),
                |a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal),
                descending,
            ),
            ColumnType::Date => sort_keyed(
                &mut data,
                |row| parse_date(&row[column]).unwrap_or(0),
                Ord::cmp,
                descending,
            ),
        }

        state.rows.append(&mut data);
        tracing::debug!(column, descending, ?column_type, "sorted");
        true
    }
}

fn directed(ordering: Ordering, descending: bool) -> Ordering {
    if descending {
        ordering.reverse()
    } else {
        ordering
    }
}

fn sort_rows<T, F>(rows: &mut [T], compare: F)
where
    T: Send,
    F: Fn(&T, &T) -> Ordering + Sync,
{
    if rows.len() > PARALLEL_SORT_ROWS {
        rows.par_sort_by(compare);
    } else {
        rows.sort_by(compare);
    }
}

/// Sort by a key computed once per row
fn sort_keyed<K, KF, CF>(rows: &mut Vec<Row>, key: KF, compare: CF, descending: bool)
where
    K: Send,
    KF: Fn(&Row) -> K,
    CF: Fn(&K, &K) -> Ordering + Sync,
{
    let mut keyed: Vec<(K, Row)> = rows.drain(..).map(|row| (key(&row), row)).collect();
    sort_rows(&mut keyed, |a, b| directed(compare(&a.0, &b.0), descending));
    rows.extend(keyed.into_iter().map(|(_, row)| row));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(rows: &[&[&str]]) -> TableBuffer {
        TableBuffer::from_rows(
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect::<Vec<Vec<String>>>(),
            true,
        )
        .unwrap()
    }

    fn column(b: &TableBuffer, i: usize) -> Vec<String> {
        b.column(i).unwrap().iter().map(|c| c.to_string()).collect()
    }

    fn sample() -> TableBuffer {
        buffer(&[
            &["Name", "Score", "Joined"],
            &["carol", "10", "2024-03-01"],
            &["alice", "9.5", "2023-12-31"],
            &["bob", "100", "N/A"],
            &["dave", "oops", "2024-01-15"],
            &["erin", "-3", "2024-01-15"],
        ])
    }

    #[test]
    fn test_string_sort_keeps_header() {
        let b = sample();
        assert!(b.sort_by_column(0, false));
        assert_eq!(column(&b, 0), vec!["Name", "alice", "bob", "carol", "dave", "erin"]);
        b.sort_by_column(0, true);
        assert_eq!(column(&b, 0), vec!["Name", "erin", "dave", "carol", "bob", "alice"]);
    }

    #[test]
    fn test_numeric_sort_unparseable_is_zero() {
        let b = sample();
        b.set_column_type(1, ColumnType::Numeric);
        b.sort_by_column(1, false);
        assert_eq!(column(&b, 1), vec!["Score", "-3", "oops", "9.5", "10", "100"]);
    }

    #[test]
    fn test_string_sort_of_numbers_is_lexicographic() {
        let b = sample();
        b.sort_by_column(1, false);
        assert_eq!(column(&b, 1), vec!["Score", "-3", "10", "100", "9.5", "oops"]);
    }

    #[test]
    fn test_date_sort_missing_is_epoch_and_stable() {
        let b = sample();
        b.set_column_type(2, ColumnType::Date);
        b.sort_by_column(2, false);
        assert_eq!(column(&b, 0), vec!["Name", "bob", "alice", "dave", "erin", "carol"]);
        // equal dates keep their relative order when descending too
        b.sort_by_column(2, true);
        assert_eq!(column(&b, 0), vec!["Name", "carol", "dave", "erin", "alice", "bob"]);
    }

    #[test]
    fn test_sort_idempotence() {
        let b = sample();
        b.set_column_type(2, ColumnType::Date);
        b.sort_by_column(2, false);
        let first = b.rows_snapshot();
        b.sort_by_column(2, true);
        b.sort_by_column(2, false);
        assert_eq!(b.rows_snapshot(), first);
        assert_eq!(b.row(0).unwrap()[0].as_ref(), "Name");
    }

    #[test]
    fn test_no_frozen_rows_sorts_everything() {
        let b = buffer(&[&["b"], &["c"], &["a"]]);
        b.set_frozen(0, 0);
        b.sort_by_column(0, false);
        assert_eq!(column(&b, 0), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_out_of_range_column() {
        let b = sample();
        let before = b.rows_snapshot();
        assert!(!b.sort_by_column(7, false));
        assert_eq!(b.rows_snapshot(), before);
    }

    #[test]
    fn test_parallel_path_matches_sequential_order() {
        let b = TableBuffer::new();
        b.append(vec!["k".into(), "i".into()], false).unwrap();
        for i in 0..(PARALLEL_SORT_ROWS + 500) {
            b.append(vec![(i % 7).to_string(), i.to_string()], false).unwrap();
        }
        b.set_column_type(0, ColumnType::Numeric);
        b.sort_by_column(0, false);

        let keys = column(&b, 0);
        let ids: Vec<usize> = column(&b, 1)[1..].iter().map(|s| s.parse().unwrap()).collect();
        for w in 1..ids.len() {
            let (ka, kb) = (&keys[w], &keys[w + 1]);
            assert!(ka <= kb);
            if ka == kb {
                assert!(ids[w - 1] < ids[w], "sort must be stable");
            }
        }
    }
}
