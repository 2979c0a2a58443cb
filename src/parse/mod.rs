//! Line-level parsing: separator detection and field splitting.
//!
//! - [`separator`] - infers the field separator from a sample of lines
//! - [`line`] - splits one line into fields (fast scan or RFC4180 fallback)

pub mod line;
pub mod separator;

pub use line::{LineParser, QuoteError};
pub use separator::{detect_separator, separator_from_extension, SAMPLE_LINES};
