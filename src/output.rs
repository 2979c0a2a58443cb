//! Plain-terminal rendering of tables and search hits

use crate::query::SearchResult;
use crate::table::TableBuffer;
use ahash::AHashSet;
use std::io;
use termcolor::{Color, ColorChoice, ColorSpec, WriteColor};

/// Cells wider than this are cut and marked with an ellipsis
pub const MAX_CELL_WIDTH: usize = 40;

const COLUMN_GAP: &str = "  ";

pub fn color_choice(color: bool) -> ColorChoice {
    if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

/// Cut `value` to at most `width` characters
fn clip(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        value.to_string()
    } else {
        let mut clipped: String = value.chars().take(width.saturating_sub(1)).collect();
        clipped.push('…');
        clipped
    }
}

/// Print up to `limit` rows as aligned columns.
///
/// Frozen header rows are bold, the frozen label column is cyan, and cells
/// listed in `highlights` are black on yellow.
pub fn print_table<W: WriteColor>(
    out: &mut W,
    table: &TableBuffer,
    limit: Option<usize>,
    highlights: &[SearchResult],
) -> io::Result<()> {
    let rows = table.rows_snapshot();
    let shown = limit.map_or(rows.len(), |n| n.min(rows.len()));
    let rows = &rows[..shown];
    let frozen_rows = table.frozen_rows();
    let frozen_cols = table.frozen_cols();
    let highlights: AHashSet<SearchResult> = highlights.iter().copied().collect();

    let mut widths = vec![0usize; table.column_count()];
    for row in rows {
        for (col, cell) in row.iter().enumerate() {
            widths[col] = widths[col].max(cell.chars().count().min(MAX_CELL_WIDTH));
        }
    }

    for (r, row) in rows.iter().enumerate() {
        for (col, cell) in row.iter().enumerate() {
            if col > 0 {
                write!(out, "{COLUMN_GAP}")?;
            }

            let mut spec = ColorSpec::new();
            if r < frozen_rows {
                spec.set_bold(true);
            }
            if col < frozen_cols {
                spec.set_fg(Some(Color::Cyan));
            }
            if highlights.contains(&SearchResult { row: r, col }) {
                spec.set_fg(Some(Color::Black)).set_bg(Some(Color::Yellow));
            }

            let text = clip(cell, MAX_CELL_WIDTH);
            out.set_color(&spec)?;
            write!(out, "{text}")?;
            out.reset()?;

            if col + 1 < row.len() {
                let pad = widths[col].saturating_sub(text.chars().count());
                write!(out, "{:pad$}", "")?;
            }
        }
        writeln!(out)?;
    }

    if shown < table.row_count() {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
        writeln!(out, "-- {} more rows", table.row_count() - shown)?;
        out.reset()?;
    }
    Ok(())
}

/// Print one line per hit: `row:column-name:value`
pub fn print_search_results<W: WriteColor>(
    out: &mut W,
    table: &TableBuffer,
    results: &[SearchResult],
) -> io::Result<()> {
    let header = if table.frozen_rows() > 0 { table.row(0) } else { None };

    for hit in results {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        write!(out, "{}", hit.row)?;
        out.reset()?;
        write!(out, ":")?;

        out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
        match header.as_ref().and_then(|h| h.get(hit.col)) {
            Some(name) => write!(out, "{name}")?,
            None => write!(out, "{}", hit.col + 1)?,
        }
        out.reset()?;

        let value = table.cell(hit.row, hit.col).unwrap_or_default();
        writeln!(out, ":{value}")?;
    }
    Ok(())
}

/// Print an error line in red
pub fn print_error<W: WriteColor>(out: &mut W, message: &str) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
    write!(out, "error")?;
    out.reset()?;
    writeln!(out, ": {message}")
}

/// Print a warning line in yellow
pub fn print_warning<W: WriteColor>(out: &mut W, message: &str) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true))?;
    write!(out, "warning")?;
    out.reset()?;
    writeln!(out, ": {message}")
}
