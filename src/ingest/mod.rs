//! Getting rows from bytes into a table.
//!
//! - [`source`] - opening files, gzip and stdin; skip rules
//! - [`pipeline`] - synchronous and two-phase concurrent loaders
//! - [`progress`] - throttled progress tracking

pub mod pipeline;
pub mod progress;
pub mod source;

pub use pipeline::{load, spawn_load, LoadHandle, LoadSummary, ParsedLine};
pub use progress::{LoadProgress, ProgressSnapshot};
pub use source::{Input, LineSource, RawLine};
