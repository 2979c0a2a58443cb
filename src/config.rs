//! Load options.
//!
//! Options are layered, lowest priority first: built-in defaults, the JSON
//! config file in the per-user config directory, `FTV_*` environment
//! variables, and finally whatever the caller (usually the CLI) sets on the
//! returned value.

use crate::error::{Result, TableError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const APP_NAME: &str = "ftv";
const CONFIG_FILE: &str = "config.json";

/// Upper bound on parser workers
pub const MAX_WORKERS: usize = 8;

/// Which leading row/column stay fixed as header and label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FreezeMode {
    /// Nothing frozen
    None,
    /// Header row and label column
    #[default]
    RowAndColumn,
    /// Header row only
    Row,
    /// Label column only
    Column,
}

impl FreezeMode {
    /// Map the numeric header flag: -1 none, 0 both, 1 row, 2 column
    pub fn from_flag(flag: i32) -> Option<Self> {
        match flag {
            -1 => Some(FreezeMode::None),
            0 => Some(FreezeMode::RowAndColumn),
            1 => Some(FreezeMode::Row),
            2 => Some(FreezeMode::Column),
            _ => None,
        }
    }

    /// Frozen (rows, columns)
    pub fn frozen(self) -> (usize, usize) {
        match self {
            FreezeMode::None => (0, 0),
            FreezeMode::RowAndColumn => (1, 1),
            FreezeMode::Row => (1, 0),
            FreezeMode::Column => (0, 1),
        }
    }
}

/// Column projection applied to every parsed row before it is stored.
///
/// Indices are 1-based, as users type them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ColumnSelector {
    #[default]
    All,
    Show(Vec<usize>),
    Hide(Vec<usize>),
}

impl ColumnSelector {
    /// Build a selector from show/hide lists; both non-empty is an error
    pub fn new(show: &[usize], hide: &[usize]) -> Result<Self> {
        match (show.is_empty(), hide.is_empty()) {
            (true, true) => Ok(ColumnSelector::All),
            (false, true) => Ok(ColumnSelector::Show(show.to_vec())),
            (true, false) => Ok(ColumnSelector::Hide(hide.to_vec())),
            (false, false) => Err(TableError::InvalidColumnSelector(
                "only one of shown or hidden columns can be set".to_string(),
            )),
        }
    }

    /// Project one row. Kept columns stay in file order.
    pub fn project(&self, row: Vec<String>) -> Result<Vec<String>> {
        let listed = match self {
            ColumnSelector::All => return Ok(row),
            ColumnSelector::Show(cols) | ColumnSelector::Hide(cols) => cols,
        };

        if let Some(&bad) = listed.iter().find(|&&c| c == 0 || c > row.len()) {
            return Err(TableError::InvalidColumnSelector(format!(
                "column {bad} does not exist (row has {} columns)",
                row.len()
            )));
        }

        let keep_listed = matches!(self, ColumnSelector::Show(_));
        Ok(row
            .into_iter()
            .enumerate()
            .filter(|(i, _)| listed.contains(&(i + 1)) == keep_listed)
            .map(|(_, value)| value)
            .collect())
    }
}

/// Everything that controls a load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Forced separator; skips detection
    pub separator: Option<char>,
    /// Lines starting with any of these are dropped
    pub skip_prefixes: Vec<String>,
    /// Leading lines dropped unconditionally
    pub skip_lines: usize,
    /// 1-based columns to keep
    pub show_columns: Vec<usize>,
    /// 1-based columns to drop
    pub hide_columns: Vec<usize>,
    /// Reject rows whose width differs from the first row
    pub strict: bool,
    /// Stop after this many stored rows
    pub max_rows: Option<usize>,
    /// Use the two-phase concurrent pipeline
    pub async_load: bool,
    /// Memory budget in MiB; 0 is unlimited
    pub memory_mb: u64,
    pub freeze: FreezeMode,
    /// Parser threads; 0 picks `min(cpus, 8)`
    pub workers: usize,
    /// Classify column types after loading
    pub infer_types: bool,
    /// Intern low-cardinality string columns after loading
    pub intern_strings: bool,
    /// Draw a progress bar during synchronous loads
    pub show_progress: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            separator: None,
            skip_prefixes: Vec::new(),
            skip_lines: 0,
            show_columns: Vec::new(),
            hide_columns: Vec::new(),
            strict: false,
            max_rows: None,
            async_load: true,
            memory_mb: 0,
            freeze: FreezeMode::default(),
            workers: 0,
            infer_types: true,
            intern_strings: false,
            show_progress: false,
        }
    }
}

impl LoadOptions {
    /// Defaults, overlaid with the config file and then the environment
    pub fn load() -> Self {
        let mut options = Self::load_from_file().unwrap_or_default();
        options.apply_env(|key| std::env::var(key).ok());
        options
    }

    fn load_from_file() -> Option<Self> {
        let path = config_path()?;
        if !path.exists() {
            return None;
        }

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read config file");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(options) => Some(options),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config file");
                None
            }
        }
    }

    /// Apply `FTV_*` overrides read through `lookup`; unparseable values are ignored
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mb) = lookup("FTV_MEMORY_MB").and_then(|v| v.trim().parse().ok()) {
            self.memory_mb = mb;
        }
        if let Some(n) = lookup("FTV_WORKERS").and_then(|v| v.trim().parse().ok()) {
            self.workers = n;
        }
        if let Some(flag) = lookup("FTV_ASYNC").and_then(|v| parse_bool(&v)) {
            self.async_load = flag;
        }
        if let Some(flag) = lookup("FTV_STRICT").and_then(|v| parse_bool(&v)) {
            self.strict = flag;
        }
    }

    /// Check option combinations that can be rejected before any I/O
    pub fn validate(&self) -> Result<()> {
        self.column_selector().map(|_| ())
    }

    pub fn column_selector(&self) -> Result<ColumnSelector> {
        ColumnSelector::new(&self.show_columns, &self.hide_columns)
    }

    /// Memory limit in bytes, 0 when unlimited
    pub fn memory_limit_bytes(&self) -> u64 {
        self.memory_mb.saturating_mul(1024 * 1024)
    }

    /// Parser worker count with `0` resolved, capped at [`MAX_WORKERS`]
    pub fn effective_workers(&self) -> usize {
        if self.workers == 0 {
            num_cpus().min(MAX_WORKERS)
        } else {
            self.workers.min(MAX_WORKERS)
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Location of the optional config file
pub fn config_path() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join(APP_NAME).join(CONFIG_FILE))
}
