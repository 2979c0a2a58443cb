//! Row filtering.
//!
//! Every filter reads its source and builds a new, independent buffer: the
//! header rows are copied, then each data row whose cell in the filtered
//! column matches. Bad user input (an invalid regex, a threshold that is not
//! a number) yields a header-only result rather than an error;
//! [`FilterSpec::compile`] exposes the reason for callers that want it.

use crate::error::{Result, TableError};
use crate::table::buffer::{estimate_cells, Cell, TableBuffer, TableState};
use crate::table::value::{parse_date, parse_numeric, parse_numeric_strict, ColumnType};
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How a cell is compared against the query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterOperator {
    Contains,
    Equals,
    StartsWith,
    EndsWith,
    Regex,
    Greater,
    Less,
    GreaterOrEqual,
    LessOrEqual,
}

impl FilterOperator {
    /// Ordered comparison, only valid on Numeric and Date columns
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            FilterOperator::Greater
                | FilterOperator::Less
                | FilterOperator::GreaterOrEqual
                | FilterOperator::LessOrEqual
        )
    }

    fn compare(self, value: f64, threshold: f64) -> bool {
        match self {
            FilterOperator::Greater => value > threshold,
            FilterOperator::Less => value < threshold,
            FilterOperator::GreaterOrEqual => value >= threshold,
            FilterOperator::LessOrEqual => value <= threshold,
            _ => false,
        }
    }
}

impl FromStr for FilterOperator {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "contains" | "" => Ok(FilterOperator::Contains),
            "equals" | "eq" | "=" | "==" => Ok(FilterOperator::Equals),
            "starts-with" | "starts with" | "prefix" => Ok(FilterOperator::StartsWith),
            "ends-with" | "ends with" | "suffix" => Ok(FilterOperator::EndsWith),
            "regex" | "~" => Ok(FilterOperator::Regex),
            ">" | "gt" => Ok(FilterOperator::Greater),
            "<" | "lt" => Ok(FilterOperator::Less),
            ">=" | "ge" => Ok(FilterOperator::GreaterOrEqual),
            "<=" | "le" => Ok(FilterOperator::LessOrEqual),
            other => Err(TableError::InvalidFilterQuery(format!("unknown operator '{other}'"))),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FilterOperator::Contains => "contains",
            FilterOperator::Equals => "equals",
            FilterOperator::StartsWith => "starts-with",
            FilterOperator::EndsWith => "ends-with",
            FilterOperator::Regex => "regex",
            FilterOperator::Greater => ">",
            FilterOperator::Less => "<",
            FilterOperator::GreaterOrEqual => ">=",
            FilterOperator::LessOrEqual => "<=",
        };
        f.write_str(s)
    }
}

/// A filter on one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub operator: FilterOperator,
    pub query: String,
    /// Applies to the four text operators; regexes carry their own flags
    #[serde(default)]
    pub case_sensitive: bool,
}

impl FilterSpec {
    pub fn new(operator: FilterOperator, query: impl Into<String>) -> Self {
        Self {
            operator,
            query: query.into(),
            case_sensitive: false,
        }
    }

    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }

    /// Validate against a column type and build the matcher
    pub fn compile(&self, column_type: ColumnType) -> Result<CompiledFilter> {
        let matcher = match self.operator {
            FilterOperator::Regex => Matcher::Regex(
                Regex::new(&self.query).map_err(|e| TableError::InvalidFilterQuery(e.to_string()))?,
            ),
            op if op.is_comparison() => {
                if !column_type.is_ordered() {
                    return Err(TableError::InvalidFilterQuery(format!(
                        "'{op}' needs a numeric or date column"
                    )));
                }
                let threshold = if column_type == ColumnType::Date {
                    date_threshold(&self.query)
                } else {
                    parse_numeric_strict(&self.query)
                }
                .ok_or_else(|| {
                    TableError::InvalidFilterQuery(format!(
                        "'{}' is not a valid threshold",
                        self.query.trim()
                    ))
                })?;
                Matcher::Compare {
                    op,
                    threshold,
                    dates: column_type == ColumnType::Date,
                }
            }
            op => Matcher::Text {
                op,
                needle: if self.case_sensitive {
                    self.query.clone()
                } else {
                    self.query.to_lowercase()
                },
                case_sensitive: self.case_sensitive,
            },
        };
        Ok(CompiledFilter { matcher })
    }
}

/// A date threshold is either a date in a known layout or raw epoch seconds
fn date_threshold(query: &str) -> Option<f64> {
    let query = query.trim();
    parse_date(query)
        .map(|ts| ts as f64)
        .or_else(|| query.parse::<f64>().ok().filter(|v| v.is_finite()))
}

#[derive(Debug)]
enum Matcher {
    Text {
        op: FilterOperator,
        needle: String,
        case_sensitive: bool,
    },
    Regex(Regex),
    Compare {
        op: FilterOperator,
        threshold: f64,
        dates: bool,
    },
}

/// A filter ready to test cells
#[derive(Debug)]
pub struct CompiledFilter {
    matcher: Matcher,
}

impl CompiledFilter {
    pub fn matches(&self, cell: &str) -> bool {
        match &self.matcher {
            Matcher::Text {
                op,
                needle,
                case_sensitive,
            } => {
                let lowered;
                let cell = if *case_sensitive {
                    cell
                } else {
                    lowered = cell.to_lowercase();
                    lowered.as_str()
                };
                match op {
                    FilterOperator::Equals => cell == needle.as_str(),
                    FilterOperator::StartsWith => cell.starts_with(needle.as_str()),
                    FilterOperator::EndsWith => cell.ends_with(needle.as_str()),
                    _ => cell.contains(needle.as_str()),
                }
            }
            Matcher::Regex(re) => re.is_match(cell),
            Matcher::Compare {
                op,
                threshold,
                dates,
            } => {
                let value = if *dates {
                    parse_date(cell).unwrap_or(0) as f64
                } else {
                    parse_numeric(cell)
                };
                op.compare(value, *threshold)
            }
        }
    }
}

/// Independent copy of the matching rows
fn copy_rows<'a, I>(source: &TableState, rows: I) -> TableBuffer
where
    I: IntoIterator<Item = &'a Vec<Cell>>,
{
    let rows: Vec<Vec<Cell>> = rows
        .into_iter()
        .map(|row| row.iter().map(|cell| Cell::from(cell.as_ref())).collect())
        .collect();
    let memory_usage = rows.iter().map(|row| estimate_cells(row)).sum();

    TableBuffer::from_state(TableState {
        separator: source.separator,
        rows,
        column_count: source.column_count,
        column_types: source.column_types.clone(),
        frozen_rows: source.frozen_rows,
        frozen_cols: source.frozen_cols,
        memory_usage,
        memory_limit: source.memory_limit,
        interners: vec![None; source.column_count],
    })
}

impl TableBuffer {
    /// Header rows plus every data row for which `keep` holds
    fn select_rows<F>(&self, keep: F) -> TableBuffer
    where
        F: Fn(&[Cell]) -> bool + Sync,
    {
        let state = self.read();
        let start = state.data_start();
        let kept: Vec<&Vec<Cell>> = state.rows[start..]
            .par_iter()
            .filter(|row| keep(row.as_slice()))
            .collect();
        copy_rows(&state, state.rows[..start].iter().chain(kept))
    }

    /// Header-only copy
    fn header_only(&self) -> TableBuffer {
        self.select_rows(|_| false)
    }

    /// Independent copy of the whole table
    pub fn deep_copy(&self) -> TableBuffer {
        self.select_rows(|_| true)
    }

    /// Rows whose cell in `column` satisfies `spec`, as a new buffer.
    ///
    /// An out-of-range column, an invalid regex, or an unusable threshold
    /// produce a header-only result.
    pub fn filter(&self, column: usize, spec: &FilterSpec) -> TableBuffer {
        if column >= self.column_count() {
            return self.header_only();
        }
        let compiled = match spec.compile(self.column_type(column)) {
            Ok(compiled) => compiled,
            Err(e) => {
                tracing::debug!(column, error = %e, "filter matches nothing");
                return self.header_only();
            }
        };
        self.select_rows(|row| compiled.matches(&row[column]))
    }

    /// Free-text filter with ` AND `, ` OR ` and ` ROR ` combinators.
    ///
    /// `a AND b OR c` keeps rows whose cell in `column` contains both `a`
    /// and `b`, or contains `c`. ` ROR ` instead keeps a row when any of its
    /// cells contains any of the terms. Matching is substring-based.
    pub fn filter_text(&self, column: usize, query: &str, case_sensitive: bool) -> TableBuffer {
        if column >= self.column_count() {
            return self.header_only();
        }
        let fold = |s: &str| {
            if case_sensitive {
                s.to_string()
            } else {
                s.to_lowercase()
            }
        };

        if query.contains(" ROR ") {
            let terms: Vec<String> = query.split(" ROR ").map(fold).collect();
            return self.select_rows(|row| {
                row.iter().any(|cell| {
                    let cell = fold(cell.as_ref());
                    terms.iter().any(|t| cell.contains(t.as_str()))
                })
            });
        }

        let groups: Vec<Vec<String>> = query
            .split(" OR ")
            .map(|group| group.split(" AND ").map(fold).collect())
            .collect();
        self.select_rows(|row| {
            let cell = fold(row[column].as_ref());
            groups
                .iter()
                .any(|all| all.iter().all(|t| cell.contains(t.as_str())))
        })
    }
}

/// Active filters keyed by column.
///
/// Applying always starts from the unfiltered table, so editing or removing
/// one filter restores rows that only it excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    filters: BTreeMap<usize, FilterSpec>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the filter on `column`
    pub fn set(&mut self, column: usize, spec: FilterSpec) -> Option<FilterSpec> {
        self.filters.insert(column, spec)
    }

    pub fn remove(&mut self, column: usize) -> Option<FilterSpec> {
        self.filters.remove(&column)
    }

    pub fn get(&self, column: usize) -> Option<&FilterSpec> {
        self.filters.get(&column)
    }

    pub fn clear(&mut self) {
        self.filters.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &FilterSpec)> {
        self.filters.iter().map(|(col, spec)| (*col, spec))
    }

    /// Apply every filter, in column order, to `original`
    pub fn apply(&self, original: &TableBuffer) -> TableBuffer {
        let mut filters = self.iter();
        let Some((column, spec)) = filters.next() else {
            return original.deep_copy();
        };
        filters.fold(original.filter(column, spec), |acc, (column, spec)| {
            acc.filter(column, spec)
        })
    }
}
