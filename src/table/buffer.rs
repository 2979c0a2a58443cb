//! Thread-safe row store.
//!
//! All state sits behind one reader/writer lock. Appends and column
//! resizes take the write side; column snapshots, type lookups and memory
//! stats take the read side and may run concurrently with each other.

use crate::error::{Result, TableError};
use crate::table::intern::Interner;
use crate::table::value::{ColumnType, MISSING};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A single cell. Shared so interned columns can point many rows at one value.
pub type Cell = Arc<str>;

/// Estimated per-cell overhead on top of the string bytes
const CELL_OVERHEAD: u64 = 16;

/// Estimated per-row overhead for the row vector itself
const ROW_OVERHEAD: u64 = 24;

/// Initial row capacity, sized for large files
const DEFAULT_ROW_CAPACITY: usize = 10_000;

/// Estimated footprint of a padding cell
const MISSING_CELL_BYTES: u64 = MISSING.len() as u64 + CELL_OVERHEAD;

/// Lock-protected table contents
#[derive(Debug)]
pub(crate) struct TableState {
    pub(crate) separator: Option<char>,
    pub(crate) rows: Vec<Vec<Cell>>,
    pub(crate) column_count: usize,
    pub(crate) column_types: Vec<ColumnType>,
    pub(crate) frozen_rows: usize,
    pub(crate) frozen_cols: usize,
    pub(crate) memory_usage: u64,
    pub(crate) memory_limit: u64,
    pub(crate) interners: Vec<Option<Interner>>,
}

impl Default for TableState {
    fn default() -> Self {
        Self {
            separator: None,
            rows: Vec::new(),
            column_count: 0,
            column_types: Vec::new(),
            frozen_rows: 1,
            frozen_cols: 1,
            memory_usage: 0,
            memory_limit: 0,
            interners: Vec::new(),
        }
    }
}

impl TableState {
    /// First row that takes part in sorting, filtering and type sampling
    pub(crate) fn data_start(&self) -> usize {
        self.frozen_rows.min(self.rows.len())
    }

    pub(crate) fn column_type(&self, column: usize) -> ColumnType {
        self.column_types.get(column).copied().unwrap_or_default()
    }

    /// Grow every row to `width` cells, padding with the missing marker
    fn widen(&mut self, width: usize) {
        if width <= self.column_count {
            return;
        }
        let missing: Cell = Arc::from(MISSING);
        for row in &mut self.rows {
            row.resize(width, missing.clone());
        }
        self.column_count = width;
        if self.column_types.len() < width {
            self.column_types.resize(width, ColumnType::String);
        }
        if self.interners.len() < width {
            self.interners.resize_with(width, || None);
        }
    }

    fn to_cell(&mut self, column: usize, value: String) -> Cell {
        match self.interners.get_mut(column) {
            Some(Some(interner)) => interner.intern(&value),
            _ => Arc::from(value),
        }
    }
}

/// Memory accounting snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemoryStats {
    pub current_bytes: u64,
    /// 0 means unlimited
    pub limit_bytes: u64,
    /// Usage as a percentage of the limit, 0 when unlimited
    pub percent: f64,
}

impl MemoryStats {
    pub fn is_limited(&self) -> bool {
        self.limit_bytes > 0
    }
}

impl fmt::Display for MemoryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_limited() {
            write!(
                f,
                "{} / {} ({:.1}%)",
                format_bytes(self.current_bytes),
                format_bytes(self.limit_bytes),
                self.percent
            )
        } else {
            write!(f, "{} (unlimited)", format_bytes(self.current_bytes))
        }
    }
}

/// Human-readable byte count
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Estimated footprint of a row's own cells
fn estimate_row(row: &[String]) -> u64 {
    ROW_OVERHEAD
        + row
            .iter()
            .map(|cell| cell.len() as u64 + CELL_OVERHEAD)
            .sum::<u64>()
}

/// Estimated footprint of an already stored row
pub(crate) fn estimate_cells(row: &[Cell]) -> u64 {
    ROW_OVERHEAD
        + row
            .iter()
            .map(|cell| cell.len() as u64 + CELL_OVERHEAD)
            .sum::<u64>()
}

/// The table: rows of cells plus column metadata
#[derive(Debug, Default)]
pub struct TableBuffer {
    state: RwLock<TableState>,
}

impl TableBuffer {
    /// Empty buffer with one frozen header row and one frozen label column
    pub fn new() -> Self {
        let state = TableState {
            rows: Vec::with_capacity(DEFAULT_ROW_CAPACITY),
            ..TableState::default()
        };
        Self {
            state: RwLock::new(state),
        }
    }

    /// Build a buffer from already-split rows
    pub fn from_rows<I>(rows: I, strict: bool) -> Result<Self>
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        let buffer = Self::new();
        for row in rows {
            buffer.append(row, strict)?;
        }
        Ok(buffer)
    }

    pub(crate) fn from_state(state: TableState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, TableState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, TableState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one row.
    ///
    /// The first row fixes the column count. A wider row later grows every
    /// existing row; a narrower one is padded. With `strict`, any width
    /// other than the established one is rejected. The memory limit is
    /// checked before anything changes, so a rejected row leaves the buffer
    /// exactly as it was.
    pub fn append(&self, row: Vec<String>, strict: bool) -> Result<()> {
        let mut state = self.write();

        let expected = if state.rows.is_empty() {
            row.len()
        } else {
            state.column_count
        };

        if strict && row.len() != expected {
            return Err(TableError::SchemaMismatch {
                row: state.rows.len(),
                expected,
                found: row.len(),
            });
        }

        let width = row.len().max(state.column_count);
        let padding = (width - row.len()) as u64;
        let backfill = state.rows.len() as u64 * (width - state.column_count) as u64;
        let estimate = estimate_row(&row) + (padding + backfill) * MISSING_CELL_BYTES;

        if state.memory_limit > 0 && state.memory_usage + estimate > state.memory_limit {
            return Err(TableError::MemoryLimitExceeded {
                limit: state.memory_limit,
                current: state.memory_usage,
            });
        }

        state.widen(width);

        let mut cells = Vec::with_capacity(width);
        for (column, value) in row.into_iter().enumerate() {
            cells.push(state.to_cell(column, value));
        }
        if cells.len() < width {
            cells.resize(width, Arc::from(MISSING));
        }

        state.rows.push(cells);
        state.memory_usage += estimate;
        Ok(())
    }

    /// Grow the column count to `n`; never shrinks. Fails without widening
    /// when the padding cells would cross the memory limit.
    pub fn resize_columns(&self, n: usize) -> Result<()> {
        let mut state = self.write();
        if n <= state.column_count {
            return Ok(());
        }
        let added = state.rows.len() as u64 * (n - state.column_count) as u64;
        let cost = added * MISSING_CELL_BYTES;
        if state.memory_limit > 0 && state.memory_usage + cost > state.memory_limit {
            return Err(TableError::MemoryLimitExceeded {
                limit: state.memory_limit,
                current: state.memory_usage,
            });
        }
        state.widen(n);
        state.memory_usage += cost;
        Ok(())
    }

    /// Snapshot of column `i` across all rows
    pub fn column(&self, i: usize) -> Option<Vec<Cell>> {
        let state = self.read();
        if i >= state.column_count {
            return None;
        }
        Some(state.rows.iter().map(|row| row[i].clone()).collect())
    }

    /// Copy of row `i`
    pub fn row(&self, i: usize) -> Option<Vec<Cell>> {
        self.read().rows.get(i).cloned()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<Cell> {
        self.read().rows.get(row)?.get(column).cloned()
    }

    /// Copy of every row
    pub fn rows_snapshot(&self) -> Vec<Vec<Cell>> {
        self.read().rows.clone()
    }

    pub fn row_count(&self) -> usize {
        self.read().rows.len()
    }

    /// Rows after the frozen header
    pub fn data_row_count(&self) -> usize {
        let state = self.read();
        state.rows.len() - state.data_start()
    }

    pub fn column_count(&self) -> usize {
        self.read().column_count
    }

    pub fn is_empty(&self) -> bool {
        self.read().rows.is_empty()
    }

    pub fn separator(&self) -> Option<char> {
        self.read().separator
    }

    pub fn set_separator(&self, separator: char) {
        self.write().separator = Some(separator);
    }

    pub fn column_type(&self, i: usize) -> ColumnType {
        self.read().column_type(i)
    }

    pub fn set_column_type(&self, i: usize, column_type: ColumnType) {
        let mut state = self.write();
        if state.column_types.len() <= i {
            state.column_types.resize(i + 1, ColumnType::String);
        }
        state.column_types[i] = column_type;
    }

    pub fn column_types(&self) -> Vec<ColumnType> {
        let state = self.read();
        state.column_types[..state.column_count].to_vec()
    }

    pub fn frozen_rows(&self) -> usize {
        self.read().frozen_rows
    }

    pub fn frozen_cols(&self) -> usize {
        self.read().frozen_cols
    }

    /// Set header row/label column counts; each is clamped to 0 or 1
    pub fn set_frozen(&self, rows: usize, cols: usize) {
        let mut state = self.write();
        state.frozen_rows = rows.min(1);
        state.frozen_cols = cols.min(1);
    }

    pub fn memory_usage(&self) -> u64 {
        self.read().memory_usage
    }

    pub fn memory_limit(&self) -> u64 {
        self.read().memory_limit
    }

    /// Set the memory budget in bytes; 0 removes the limit
    pub fn set_memory_limit(&self, bytes: u64) {
        self.write().memory_limit = bytes;
    }

    pub fn memory_stats(&self) -> MemoryStats {
        let state = self.read();
        let percent = if state.memory_limit > 0 {
            state.memory_usage as f64 * 100.0 / state.memory_limit as f64
        } else {
            0.0
        };
        MemoryStats {
            current_bytes: state.memory_usage,
            limit_bytes: state.memory_limit,
            percent,
        }
    }
}
