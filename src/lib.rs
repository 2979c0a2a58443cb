//! # FTV - Fast Table Viewer core
//!
//! FTV loads delimited text (CSV, TSV, pipe- or semicolon-separated, and
//! anything else a separator can be guessed for) into a typed, thread-safe
//! table that can be sorted, filtered and searched while it is still
//! loading.
//!
//! ## Architecture
//!
//! - [`parse`] - separator detection and line splitting
//! - [`table`] - the row store, memory accounting, type inference, interning
//! - [`ingest`] - input opening and the sync / two-phase concurrent loaders
//! - [`query`] - sort, filter and search
//! - [`config`] - load options (config file, environment, CLI)
//! - [`output`] - plain terminal rendering
//!
//! ## Quick Start
//!
//! ```no_run
//! use ftv::config::LoadOptions;
//! use ftv::ingest::{spawn_load, Input};
//! use ftv::query::{FilterOperator, FilterSpec};
//! use ftv::table::TableBuffer;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let buffer = Arc::new(TableBuffer::new());
//! let input = Input::open(Path::new("people.csv")).unwrap();
//! let handle = spawn_load(input, LoadOptions::default(), Arc::clone(&buffer)).unwrap();
//!
//! // the first rows can be shown before the rest arrives
//! if handle.wait_ready() {
//!     println!("{} rows so far", buffer.row_count());
//! }
//! handle.wait().unwrap();
//!
//! let adults = buffer.filter(1, &FilterSpec::new(FilterOperator::GreaterOrEqual, "18"));
//! adults.sort_by_column(0, false);
//! ```

pub mod config;
pub mod error;
pub mod ingest;
pub mod output;
pub mod parse;
pub mod query;
pub mod table;

pub use error::{Result, TableError};
