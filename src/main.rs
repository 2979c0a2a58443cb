use anyhow::{bail, Context, Result};
use clap::Parser;
use ftv::config::{FreezeMode, LoadOptions};
use ftv::ingest::{load, spawn_load, Input};
use ftv::output;
use ftv::query::{FilterOperator, FilterSet, FilterSpec};
use ftv::table::TableBuffer;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use termcolor::StandardStream;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ftv")]
#[command(about = "Fast viewer for delimited text tables")]
struct Cli {
    /// File to read; stdin when omitted or "-"
    file: Option<PathBuf>,

    /// Field separator ("\t" or "tab" for tabs); detected when omitted
    #[arg(short, long)]
    separator: Option<String>,

    /// Stop after this many rows, header included
    #[arg(short = 'n', long = "lines")]
    lines: Option<usize>,

    /// Drop lines starting with this prefix (repeatable)
    #[arg(long = "skip-prefix")]
    skip_prefix: Vec<String>,

    /// Drop this many leading lines
    #[arg(long = "skip-lines")]
    skip_lines: Option<usize>,

    /// Only keep these 1-based columns (comma separated)
    #[arg(short = 'c', long = "columns", value_delimiter = ',')]
    columns: Vec<usize>,

    /// Drop these 1-based columns (comma separated)
    #[arg(long = "hide-columns", value_delimiter = ',')]
    hide_columns: Vec<usize>,

    /// Header mode: -1 none, 0 row and column, 1 row, 2 column
    #[arg(short, long, allow_hyphen_values = true)]
    freeze: Option<i32>,

    /// Reject rows whose column count differs from the first row
    #[arg(long)]
    strict: bool,

    /// Load in a single pass on the main thread
    #[arg(long)]
    sync: bool,

    /// Memory budget in MiB
    #[arg(short, long)]
    memory: Option<u64>,

    /// Intern repeated values in low-cardinality text columns
    #[arg(long)]
    intern: bool,

    /// Keep every column typed as text
    #[arg(long = "no-infer")]
    no_infer: bool,

    /// Sort by this 1-based column
    #[arg(long)]
    sort: Option<usize>,

    /// Sort descending
    #[arg(long, requires = "sort")]
    desc: bool,

    /// Column filter COL:OP:QUERY, e.g. 2:equals:Boston or 4:>=:1000 (repeatable)
    #[arg(long = "filter")]
    filters: Vec<String>,

    /// Free-text filter COL:QUERY supporting AND, OR and ROR
    #[arg(long = "match")]
    text_filter: Option<String>,

    /// List cells matching this query instead of printing the table
    #[arg(long)]
    search: Option<String>,

    /// Print the table with search hits highlighted instead of listing them
    #[arg(long, requires = "search")]
    highlight: bool,

    /// Treat the search query as a regular expression
    #[arg(long, requires = "search")]
    regex: bool,

    /// Case-sensitive filters and search
    #[arg(long = "case-sensitive")]
    case_sensitive: bool,

    /// Print at most this many rows
    #[arg(long)]
    head: Option<usize>,

    /// Print load and memory statistics to stderr
    #[arg(long)]
    stats: bool,

    /// Show a progress bar while loading
    #[arg(long)]
    progress: bool,

    /// Disable colored output
    #[arg(long = "no-color")]
    no_color: bool,
}

impl Cli {
    /// Config file and environment, then flags on top
    fn load_options(&self) -> Result<LoadOptions> {
        let mut options = LoadOptions::load();
        self.overlay(&mut options)?;
        options.validate()?;
        Ok(options)
    }

    fn overlay(&self, options: &mut LoadOptions) -> Result<()> {
        if let Some(sep) = &self.separator {
            options.separator = Some(parse_separator(sep)?);
        }
        if let Some(n) = self.lines {
            options.max_rows = Some(n);
        }
        if !self.skip_prefix.is_empty() {
            options.skip_prefixes = self.skip_prefix.clone();
        }
        if let Some(n) = self.skip_lines {
            options.skip_lines = n;
        }
        if !self.columns.is_empty() {
            options.show_columns = self.columns.clone();
        }
        if !self.hide_columns.is_empty() {
            options.hide_columns = self.hide_columns.clone();
        }
        if let Some(flag) = self.freeze {
            options.freeze = FreezeMode::from_flag(flag)
                .with_context(|| format!("invalid header mode {flag}, expected -1, 0, 1 or 2"))?;
        }
        if let Some(mb) = self.memory {
            options.memory_mb = mb;
        }
        options.strict |= self.strict;
        options.async_load &= !self.sync;
        options.intern_strings |= self.intern;
        options.infer_types &= !self.no_infer;
        // the bar is only driven by the single-pass loader
        options.show_progress |= self.progress && !options.async_load;
        Ok(())
    }

    fn filter_set(&self) -> Result<FilterSet> {
        let mut set = FilterSet::new();
        for raw in &self.filters {
            let mut parts = raw.splitn(3, ':');
            let (Some(col), Some(op), Some(query)) = (parts.next(), parts.next(), parts.next()) else {
                bail!("filter '{raw}' must look like COL:OP:QUERY");
            };
            let column = parse_column(col)?;
            let operator: FilterOperator = op.parse()?;
            let spec = FilterSpec::new(operator, query).case_sensitive(self.case_sensitive);
            set.set(column, spec);
        }
        Ok(set)
    }
}

fn parse_separator(raw: &str) -> Result<char> {
    match raw {
        "\\t" | "tab" | "\t" => Ok('\t'),
        _ => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => bail!("separator must be a single character, got '{raw}'"),
            }
        }
    }
}

/// 1-based column on the command line to a 0-based index
fn parse_column(raw: &str) -> Result<usize> {
    let n: usize = raw
        .trim()
        .parse()
        .with_context(|| format!("'{raw}' is not a column number"))?;
    if n == 0 {
        bail!("columns are numbered from 1");
    }
    Ok(n - 1)
}

fn init_tracing() {
    let filter = std::env::var("FTV_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let choice = output::color_choice(!cli.no_color);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let mut stderr = StandardStream::stderr(choice);
            let _ = output::print_error(&mut stderr, &format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let options = cli.load_options()?;
    let filters = cli.filter_set()?;
    let choice = output::color_choice(!cli.no_color);

    let input = match &cli.file {
        Some(path) if path.as_os_str() != "-" => {
            Input::open(path).with_context(|| format!("failed to open {}", path.display()))?
        }
        _ => Input::stdin(),
    };

    let buffer = Arc::new(TableBuffer::new());
    let loaded = if options.async_load {
        let handle = spawn_load(input, options.clone(), Arc::clone(&buffer))?;
        if handle.wait_ready() {
            tracing::debug!(rows = buffer.row_count(), "first rows ready");
        }
        handle.wait()
    } else {
        load(input, &options, &buffer)
    };

    let summary = match loaded {
        Ok(summary) => Some(summary),
        Err(e) if e.is_recoverable() => {
            let mut stderr = StandardStream::stderr(choice);
            output::print_warning(
                &mut stderr,
                &format!("{e}; showing the {} rows loaded", buffer.row_count()),
            )?;
            None
        }
        Err(e) => return Err(e).context("failed to load table"),
    };

    let mut table = if filters.is_empty() {
        None
    } else {
        Some(filters.apply(&buffer))
    };
    if let Some(raw) = &cli.text_filter {
        let (col, query) = raw
            .split_once(':')
            .with_context(|| format!("text filter '{raw}' must look like COL:QUERY"))?;
        let column = parse_column(col)?;
        let source = table.as_ref().unwrap_or(buffer.as_ref());
        table = Some(source.filter_text(column, query, cli.case_sensitive));
    }
    let table: &TableBuffer = table.as_ref().unwrap_or(buffer.as_ref());

    if let Some(col) = cli.sort {
        let column = col.checked_sub(1).context("columns are numbered from 1")?;
        if !table.sort_by_column(column, cli.desc) {
            bail!("cannot sort by column {col}: the table has {} columns", table.column_count());
        }
    }

    let mut stdout = StandardStream::stdout(choice);
    match &cli.search {
        Some(query) => {
            let mut hits = table.search(query, cli.regex, cli.case_sensitive);
            hits.sort();
            if cli.highlight {
                output::print_table(&mut stdout, table, cli.head, &hits)?;
            } else {
                output::print_search_results(&mut stdout, table, &hits)?;
            }
        }
        None => output::print_table(&mut stdout, table, cli.head, &[])?,
    }

    if cli.stats {
        if let Some(summary) = summary {
            eprintln!(
                "loaded {} rows ({}) in {:.2}s, {:.0} rows/sec, separator {:?}",
                summary.rows,
                ftv::table::format_bytes(summary.bytes),
                summary.elapsed.as_secs_f64(),
                summary.rows_per_sec(),
                summary.separator,
            );
        }
        eprintln!("columns: {:?}", table.column_types());
        eprintln!("memory: {}", buffer.memory_stats());
    }

    Ok(())
}
