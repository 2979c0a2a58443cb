//! Splitting a single text line into fields.
//!
//! Lines without a quote character take a direct byte scan. Anything quoted
//! goes through the `csv` reader, which is lenient about stray quotes inside
//! unquoted fields. The one shape we reject is a quoted field that never
//! closes: it means the record continues on the next line, which a
//! line-oriented loader cannot reassemble.

use csv::{ReaderBuilder, StringRecord};
use memchr::{memchr, memchr_iter};
use thiserror::Error;

const QUOTE: char = '"';

/// Malformed quoting in a line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (field {field})")]
pub struct QuoteError {
    /// Zero-based index of the offending field
    pub field: usize,
    pub message: String,
}

/// Parses lines for a fixed separator
#[derive(Debug, Clone, Copy)]
pub struct LineParser {
    separator: char,
}

impl LineParser {
    pub fn new(separator: char) -> Self {
        Self { separator }
    }

    /// Split `line` into fields
    pub fn parse(&self, line: &str) -> Result<Vec<String>, QuoteError> {
        if memchr(b'"', line.as_bytes()).is_none() {
            return Ok(self.split_plain(line));
        }

        check_quotes_closed(line, self.separator)?;

        if self.separator.is_ascii() {
            parse_quoted(line, self.separator as u8)
        } else {
            // The csv reader only takes single-byte delimiters
            Ok(self.split_plain(line))
        }
    }

    fn split_plain(&self, line: &str) -> Vec<String> {
        if !self.separator.is_ascii() {
            return line.split(self.separator).map(String::from).collect();
        }

        let sep = self.separator as u8;
        let bytes = line.as_bytes();
        let mut fields = Vec::with_capacity(memchr_iter(sep, bytes).count() + 1);
        let mut start = 0;
        for pos in memchr_iter(sep, bytes) {
            fields.push(line[start..pos].to_string());
            start = pos + 1;
        }
        fields.push(line[start..].to_string());
        fields
    }
}

fn parse_quoted(line: &str, sep: u8) -> Result<Vec<String>, QuoteError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(sep)
        .from_reader(line.as_bytes());

    let mut record = StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => Ok(record.iter().map(String::from).collect()),
        // A line holding only a separator-free empty quoted value
        Ok(false) => Ok(vec![String::new()]),
        Err(e) => Err(QuoteError {
            field: record.len(),
            message: e.to_string(),
        }),
    }
}

/// Reject a field that opens with a quote and never closes it.
fn check_quotes_closed(line: &str, sep: char) -> Result<(), QuoteError> {
    let mut field = 0;
    let mut at_field_start = true;
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == QUOTE {
                if chars.peek() == Some(&QUOTE) {
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            continue;
        }

        if c == sep {
            field += 1;
            at_field_start = true;
            continue;
        }

        if at_field_start && c == QUOTE {
            in_quotes = true;
        }
        at_field_start = false;
    }

    if in_quotes {
        return Err(QuoteError {
            field,
            message: "quoted field is not terminated".to_string(),
        });
    }
    Ok(())
}
