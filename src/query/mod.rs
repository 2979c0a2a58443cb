//! Queries over a loaded table.
//!
//! - [`sort`] - in-place, type-aware, stable row sort
//! - [`filter`] - column filters producing new, independent tables
//! - [`search`] - cell search returning coordinates

pub mod filter;
pub mod search;
pub mod sort;

pub use filter::{CompiledFilter, FilterOperator, FilterSet, FilterSpec};
pub use search::SearchResult;
