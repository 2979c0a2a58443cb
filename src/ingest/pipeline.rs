//! Loading rows into a [`TableBuffer`].
//!
//! [`load`] is a single synchronous pass. [`spawn_load`] runs in two phases
//! on a background thread:
//!
//! 1. The first [`SAMPLE_LINES`] lines are read, the separator is settled,
//!    and those rows are appended directly. The handle's ready signal fires.
//! 2. A producer thread feeds raw lines through a bounded channel to a pool
//!    of parser workers. Parsed lines come back on a second bounded channel
//!    to one consumer, which restores file order and appends.
//!
//! Both channels block when full, so parsing never runs far ahead of
//! appending. Redraw hints are best-effort and dropped when nobody reads them.

use crate::config::{ColumnSelector, LoadOptions};
use crate::error::{Result, TableError};
use crate::ingest::progress::{LoadProgress, ProgressSnapshot, ProgressTracker};
use crate::ingest::source::{Input, LineSource, RawLine};
use crate::parse::{detect_separator, separator_from_extension, LineParser, SAMPLE_LINES};
use crate::table::{TableBuffer, TypeInferencer};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Channel slots per worker
const CHANNEL_SLOTS_PER_WORKER: usize = 10;

/// Rows appended between redraw hints
const REDRAW_EVERY_ROWS: usize = 500;

/// Queued redraw hints before new ones are dropped
const REDRAW_QUEUE: usize = 10;

/// One line after parsing, tagged with its position among kept lines
#[derive(Debug)]
pub struct ParsedLine {
    pub index: usize,
    pub fields: Vec<String>,
    /// Input bytes this line accounts for
    pub bytes: u64,
    pub err: Option<TableError>,
}

impl ParsedLine {
    fn parse(parser: &LineParser, index: usize, raw: RawLine) -> Self {
        match parser.parse(&raw.text) {
            Ok(fields) => Self {
                index,
                fields,
                bytes: raw.bytes,
                err: None,
            },
            Err(e) => Self::failed(
                index,
                TableError::Parse {
                    line: index + 1,
                    message: e.to_string(),
                },
            ),
        }
    }

    fn failed(index: usize, err: TableError) -> Self {
        Self {
            index,
            fields: Vec::new(),
            bytes: 0,
            err: Some(err),
        }
    }
}

/// What a finished load did
#[derive(Debug, Clone, PartialEq)]
pub struct LoadSummary {
    pub separator: char,
    /// Rows now in the buffer, header included
    pub rows: usize,
    /// Input bytes consumed
    pub bytes: u64,
    pub elapsed: Duration,
    /// Stopped early through [`LoadHandle::cancel`]
    pub cancelled: bool,
}

impl LoadSummary {
    pub fn rows_per_sec(&self) -> f64 {
        self.rows as f64 / self.elapsed.as_secs_f64().max(0.001)
    }
}

/// Appends projected rows and enforces the row cap
struct RowSink<'a> {
    buffer: &'a TableBuffer,
    selector: ColumnSelector,
    strict: bool,
    max_rows: Option<usize>,
    rows: usize,
}

impl<'a> RowSink<'a> {
    fn new(buffer: &'a TableBuffer, options: &LoadOptions) -> Result<Self> {
        Ok(Self {
            buffer,
            selector: options.column_selector()?,
            strict: options.strict,
            max_rows: options.max_rows.filter(|&n| n > 0),
            rows: 0,
        })
    }

    fn is_full(&self) -> bool {
        self.max_rows.is_some_and(|max| self.rows >= max)
    }

    /// Lines still wanted, `None` if uncapped
    fn remaining(&self) -> Option<usize> {
        self.max_rows.map(|max| max.saturating_sub(self.rows))
    }

    fn push(&mut self, fields: Vec<String>) -> Result<()> {
        let row = self.selector.project(fields)?;
        self.buffer.append(row, self.strict)?;
        self.rows += 1;
        Ok(())
    }
}

/// Configure the buffer and settle the separator from the leading lines
fn prepare(
    input: Input,
    options: &LoadOptions,
    buffer: &TableBuffer,
) -> Result<(LineSource, Vec<RawLine>, char)> {
    options.validate()?;

    let path = input.path().map(|p| p.to_path_buf());
    let mut lines = LineSource::new(input, options.skip_lines, options.skip_prefixes.clone());
    let sample = lines.take_lines(SAMPLE_LINES)?;

    let separator = match options
        .separator
        .or_else(|| path.as_deref().and_then(separator_from_extension))
    {
        Some(separator) => separator,
        None => {
            let texts: Vec<&str> = sample.iter().map(|l| l.text.as_str()).collect();
            detect_separator(&texts)?
        }
    };
    tracing::debug!(?separator, sampled = sample.len(), "separator settled");

    let (frozen_rows, frozen_cols) = options.freeze.frozen();
    buffer.set_separator(separator);
    buffer.set_frozen(frozen_rows, frozen_cols);
    buffer.set_memory_limit(options.memory_limit_bytes());

    Ok((lines, sample, separator))
}

/// Post-load passes: type inference, then interning
fn finalize(buffer: &TableBuffer, options: &LoadOptions) {
    if options.infer_types {
        let types = TypeInferencer::new(buffer).infer_all();
        tracing::debug!(?types, "column types inferred");
    }
    if options.intern_strings {
        let report = buffer.intern_low_cardinality();
        tracing::debug!(
            columns = ?report.columns,
            bytes_saved = report.bytes_saved,
            "interned low-cardinality columns"
        );
    }
}

/// Run post-load passes and shape the result.
///
/// A memory limit error still gets types inferred: the rows already
/// accepted stay usable.
fn conclude(
    outcome: Result<bool>,
    buffer: &TableBuffer,
    options: &LoadOptions,
    separator: char,
    tracker: &mut ProgressTracker,
) -> Result<LoadSummary> {
    tracker.finish();
    match outcome {
        Ok(cancelled) => {
            finalize(buffer, options);
            let summary = LoadSummary {
                separator,
                rows: buffer.row_count(),
                bytes: tracker.loaded_bytes(),
                elapsed: tracker.elapsed(),
                cancelled,
            };
            tracing::info!(
                rows = summary.rows,
                bytes = summary.bytes,
                elapsed_ms = summary.elapsed.as_millis() as u64,
                rows_per_sec = summary.rows_per_sec() as u64,
                cancelled,
                "load complete"
            );
            Ok(summary)
        }
        Err(e) => {
            if e.is_recoverable() {
                tracing::warn!(error = %e, rows = buffer.row_count(), "load stopped early");
                finalize(buffer, options);
            }
            Err(e)
        }
    }
}

/// Load `input` into `buffer` on the calling thread
pub fn load(input: Input, options: &LoadOptions, buffer: &TableBuffer) -> Result<LoadSummary> {
    let progress = Arc::new(LoadProgress::new(input.total_bytes()));
    let (mut lines, sample, separator) = prepare(input, options, buffer)?;

    let parser = LineParser::new(separator);
    let mut sink = RowSink::new(buffer, options)?;
    let mut tracker = ProgressTracker::new(progress, options.show_progress);

    let run = || -> Result<bool> {
        let mut index = 0;
        for raw in sample.into_iter().map(Ok).chain(&mut lines) {
            if sink.is_full() {
                break;
            }
            let raw = raw?;
            let bytes = raw.bytes;
            let parsed = ParsedLine::parse(&parser, index, raw);
            if let Some(e) = parsed.err {
                return Err(e);
            }
            sink.push(parsed.fields)?;
            tracker.record(bytes);
            index += 1;
        }
        Ok(false)
    };
    let outcome = run();

    conclude(outcome, buffer, options, separator, &mut tracker)
}

/// A load running in the background
pub struct LoadHandle {
    buffer: Arc<TableBuffer>,
    progress: Arc<LoadProgress>,
    cancel: Arc<AtomicBool>,
    ready: Receiver<()>,
    updates: Receiver<()>,
    done: Receiver<Result<LoadSummary>>,
    finished: bool,
    thread: Option<JoinHandle<()>>,
}

impl LoadHandle {
    /// The table being filled; readable at any time
    pub fn buffer(&self) -> &Arc<TableBuffer> {
        &self.buffer
    }

    /// Block until the leading rows are in the buffer.
    ///
    /// Returns false if the load ended before that point, in which case
    /// [`wait`](Self::wait) reports why.
    pub fn wait_ready(&self) -> bool {
        self.ready.recv().is_ok()
    }

    /// Redraw hints: a message means new rows arrived since the last one
    pub fn updates(&self) -> &Receiver<()> {
        &self.updates
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Ask the loader to stop; rows accepted so far are kept
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Final result if the load has finished; `None` while it is running
    /// or after the result has been taken
    pub fn try_finished(&mut self) -> Option<Result<LoadSummary>> {
        if self.finished {
            return None;
        }
        let result = match self.done.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(TableError::LoaderDisconnected),
        };
        self.finished = true;
        self.join();
        Some(result)
    }

    /// Block until the load finishes
    pub fn wait(mut self) -> Result<LoadSummary> {
        if self.finished {
            return Err(TableError::LoaderDisconnected);
        }
        self.finished = true;
        let result = self.done.recv().unwrap_or(Err(TableError::LoaderDisconnected));
        self.join();
        result
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("loader thread panicked");
            }
        }
    }
}

impl Drop for LoadHandle {
    fn drop(&mut self) {
        self.cancel();
        self.join();
    }
}

/// Start loading `input` into `buffer` on a background thread
pub fn spawn_load(
    input: Input,
    options: LoadOptions,
    buffer: Arc<TableBuffer>,
) -> Result<LoadHandle> {
    options.validate()?;

    let progress = Arc::new(LoadProgress::new(input.total_bytes()));
    let cancel = Arc::new(AtomicBool::new(false));
    let (ready_tx, ready) = mpsc::sync_channel(1);
    let (update_tx, updates) = mpsc::sync_channel(REDRAW_QUEUE);
    let (done_tx, done) = mpsc::sync_channel(1);

    let thread = {
        let buffer = Arc::clone(&buffer);
        let progress = Arc::clone(&progress);
        let cancel = Arc::clone(&cancel);
        thread::Builder::new()
            .name("ftv-loader".to_string())
            .spawn(move || {
                let signals = Signals {
                    ready: ready_tx,
                    update: update_tx,
                    cancel,
                };
                let result = run_two_phase(input, &options, &buffer, progress, signals);
                // the handle may already be gone
                let _ = done_tx.send(result);
            })?
    };

    Ok(LoadHandle {
        buffer,
        progress,
        cancel,
        ready,
        updates,
        done,
        finished: false,
        thread: Some(thread),
    })
}

struct Signals {
    ready: SyncSender<()>,
    update: SyncSender<()>,
    cancel: Arc<AtomicBool>,
}

impl Signals {
    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

fn run_two_phase(
    input: Input,
    options: &LoadOptions,
    buffer: &TableBuffer,
    progress: Arc<LoadProgress>,
    signals: Signals,
) -> Result<LoadSummary> {
    let (lines, sample, separator) = prepare(input, options, buffer)?;
    let parser = LineParser::new(separator);
    let mut sink = RowSink::new(buffer, options)?;
    let mut tracker = ProgressTracker::new(progress, false);

    // phase 1
    let phase_one = || -> Result<usize> {
        let mut index = 0;
        for raw in sample {
            if sink.is_full() {
                break;
            }
            let bytes = raw.bytes;
            let parsed = ParsedLine::parse(&parser, index, raw);
            if let Some(e) = parsed.err {
                return Err(e);
            }
            sink.push(parsed.fields)?;
            tracker.record(bytes);
            index += 1;
        }
        Ok(index)
    };
    let next_index = match phase_one() {
        Ok(next_index) => next_index,
        Err(e) => return conclude(Err(e), buffer, options, separator, &mut tracker),
    };
    tracing::debug!(rows = sink.rows, "initial rows ready");
    let _ = signals.ready.send(());

    // phase 2
    let outcome = if sink.is_full() || signals.cancelled() {
        Ok(signals.cancelled())
    } else {
        let workers = options.effective_workers();
        parse_concurrently(lines, parser, next_index, workers, &mut sink, &mut tracker, &signals)
    };

    conclude(outcome, buffer, options, separator, &mut tracker)
}

/// Phase two. Returns whether the load was cancelled.
fn parse_concurrently(
    mut lines: LineSource,
    parser: LineParser,
    first_index: usize,
    workers: usize,
    sink: &mut RowSink<'_>,
    tracker: &mut ProgressTracker,
    signals: &Signals,
) -> Result<bool> {
    let workers = workers.max(1);
    let slots = workers * CHANNEL_SLOTS_PER_WORKER;
    let (line_tx, line_rx) = mpsc::sync_channel::<(usize, RawLine)>(slots);
    let (result_tx, result_rx) = mpsc::sync_channel::<ParsedLine>(slots);
    tracing::debug!(workers, slots, "starting parser pool");

    let producer = {
        let result_tx = result_tx.clone();
        let cancel = Arc::clone(&signals.cancel);
        let limit = sink.remaining();
        thread::spawn(move || {
            let mut index = first_index;
            let mut sent = 0usize;
            while !cancel.load(Ordering::SeqCst) && limit.is_none_or(|limit| sent < limit) {
                match lines.next_line() {
                    Ok(Some(raw)) => {
                        if line_tx.send((index, raw)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = result_tx.send(ParsedLine::failed(index, e));
                        break;
                    }
                }
                index += 1;
                sent += 1;
            }
        })
    };

    let line_rx = Arc::new(Mutex::new(line_rx));
    let pool: Vec<JoinHandle<()>> = (0..workers)
        .map(|_| {
            let line_rx = Arc::clone(&line_rx);
            let result_tx = result_tx.clone();
            thread::spawn(move || loop {
                let next = line_rx
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .recv();
                let Ok((index, raw)) = next else {
                    break;
                };
                if result_tx.send(ParsedLine::parse(&parser, index, raw)).is_err() {
                    break;
                }
            })
        })
        .collect();
    // only the producer and the workers hold these now
    drop(line_rx);
    drop(result_tx);

    let outcome = consume(result_rx, first_index, sink, tracker, signals);

    // `consume` dropped the result receiver, so blocked senders wake up and exit
    for handle in pool.into_iter().chain(std::iter::once(producer)) {
        if handle.join().is_err() {
            tracing::error!("parser thread panicked");
        }
    }
    outcome
}

/// Drain parsed lines in index order into the sink
fn consume(
    results: Receiver<ParsedLine>,
    first_index: usize,
    sink: &mut RowSink<'_>,
    tracker: &mut ProgressTracker,
    signals: &Signals,
) -> Result<bool> {
    let mut pending: BTreeMap<usize, ParsedLine> = BTreeMap::new();
    let mut next = first_index;
    let mut since_hint = 0usize;

    for parsed in results.iter() {
        if signals.cancelled() {
            tracing::debug!(rows = sink.rows, "load cancelled");
            return Ok(true);
        }
        pending.insert(parsed.index, parsed);

        while let Some(parsed) = pending.remove(&next) {
            next += 1;
            if let Some(e) = parsed.err {
                return Err(e);
            }
            sink.push(parsed.fields)?;
            tracker.record(parsed.bytes);

            since_hint += 1;
            if since_hint >= REDRAW_EVERY_ROWS && signals.update.try_send(()).is_ok() {
                since_hint = 0;
            }
            if sink.is_full() {
                return Ok(false);
            }
        }
    }

    Ok(signals.cancelled())
}
