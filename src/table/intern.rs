//! String interning for low-cardinality columns.
//!
//! Run once after loading. Each qualifying String column gets its own
//! deduplication table and every cell is swapped for the canonical copy, so
//! repeated values share one allocation. Readers see the same text as
//! before. Rows appended afterwards to an interned column go through the
//! same table.

use crate::table::buffer::{Cell, TableBuffer};
use crate::table::value::ColumnType;
use ahash::AHashSet;
use std::sync::Arc;

/// Fewer sampled rows than this and a column is left alone
pub const MIN_SAMPLE_ROWS: usize = 100;

/// Rows sampled to estimate cardinality
pub const MAX_SAMPLE_ROWS: usize = 1_000;

/// Unique-value ratio below which a column is interned
pub const CARDINALITY_THRESHOLD: f64 = 0.30;

/// Canonical copies of one column's values
#[derive(Debug, Default, Clone)]
pub(crate) struct Interner {
    values: AHashSet<Cell>,
}

impl Interner {
    pub(crate) fn intern(&mut self, value: &str) -> Cell {
        if let Some(existing) = self.values.get(value) {
            return Arc::clone(existing);
        }
        let cell: Cell = Arc::from(value);
        self.values.insert(Arc::clone(&cell));
        cell
    }

    /// Canonical copy of `cell`, and whether it replaced a distinct allocation
    fn canonicalize(&mut self, cell: &Cell) -> (Cell, bool) {
        match self.values.get(cell.as_ref()) {
            Some(existing) => {
                let replaced = !Arc::ptr_eq(existing, cell);
                (Arc::clone(existing), replaced)
            }
            None => {
                self.values.insert(Arc::clone(cell));
                (Arc::clone(cell), false)
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }
}

/// Outcome of an interning pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InternReport {
    /// Columns that were interned
    pub columns: Vec<usize>,
    /// String bytes no longer held twice
    pub bytes_saved: u64,
}

/// Whether a column with these sampled values is worth interning
pub fn should_intern<S: AsRef<str>>(sample: &[S]) -> bool {
    if sample.len() < MIN_SAMPLE_ROWS {
        return false;
    }
    let unique: AHashSet<&str> = sample.iter().map(|s| s.as_ref()).collect();
    (unique.len() as f64) / (sample.len() as f64) < CARDINALITY_THRESHOLD
}

impl TableBuffer {
    /// Intern every low-cardinality String column.
    ///
    /// Columns already interned are skipped, so calling this twice is harmless.
    pub fn intern_low_cardinality(&self) -> InternReport {
        let mut state = self.write();
        let start = state.data_start();
        let mut report = InternReport::default();

        for column in 0..state.column_count {
            if state.column_type(column) != ColumnType::String {
                continue;
            }
            if matches!(state.interners.get(column), Some(Some(_))) {
                continue;
            }

            let end = state.rows.len().min(start + MAX_SAMPLE_ROWS);
            let sample: Vec<&str> = state.rows[start..end]
                .iter()
                .map(|row| row[column].as_ref())
                .collect();
            if !should_intern(&sample) {
                continue;
            }

            let mut interner = Interner::default();
            let mut saved = 0u64;
            for row in state.rows[start..].iter_mut() {
                let (canonical, replaced) = interner.canonicalize(&row[column]);
                if replaced {
                    saved += canonical.len() as u64;
                }
                row[column] = canonical;
            }

            tracing::debug!(
                column,
                unique = interner.len(),
                bytes_saved = saved,
                "interned column"
            );

            if state.interners.len() <= column {
                state.interners.resize_with(column + 1, || None);
            }
            state.interners[column] = Some(interner);
            state.memory_usage = state.memory_usage.saturating_sub(saved);
            report.columns.push(column);
            report.bytes_saved += saved;
        }

        report
    }

    /// Whether column `i` has an interning table
    pub fn is_interned(&self, i: usize) -> bool {
        matches!(self.read().interners.get(i), Some(Some(_)))
    }
}
