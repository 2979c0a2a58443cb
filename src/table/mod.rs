//! In-memory table storage and column typing.
//!
//! - [`buffer`] - the lock-protected row store
//! - [`value`] - cell classification (numbers, dates, missing values)
//! - [`infer`] - per-column type inference
//! - [`intern`] - deduplication of repeated strings in low-cardinality columns

pub mod buffer;
pub mod infer;
pub mod intern;
pub mod value;

pub use buffer::{format_bytes, Cell, MemoryStats, TableBuffer};
pub use infer::TypeInferencer;
pub use intern::InternReport;
pub use value::{ColumnType, MISSING};
