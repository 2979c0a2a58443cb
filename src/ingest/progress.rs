//! Load progress: a shared snapshot for UIs and a throttled tracker that
//! feeds it (and, with the `progress` feature, a terminal bar).

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "progress")]
pub use indicatif::{ProgressBar, ProgressStyle};

#[cfg(not(feature = "progress"))]
pub use self::noop::*;

#[cfg(not(feature = "progress"))]
mod noop {
    use std::time::Duration;

    /// No-op progress bar when `progress` feature is disabled
    #[derive(Clone)]
    pub struct ProgressBar;

    impl ProgressBar {
        pub fn new(_len: u64) -> Self {
            ProgressBar
        }

        pub fn new_spinner() -> Self {
            ProgressBar
        }

        pub fn set_style(&self, _style: ProgressStyle) {}
        pub fn set_message(&self, _msg: impl Into<std::borrow::Cow<'static, str>>) {}
        pub fn enable_steady_tick(&self, _interval: Duration) {}
        pub fn set_position(&self, _pos: u64) {}
        pub fn finish_and_clear(&self) {}
    }

    /// No-op progress style
    pub struct ProgressStyle;

    impl ProgressStyle {
        pub fn default_spinner() -> Self {
            ProgressStyle
        }

        pub fn default_bar() -> Self {
            ProgressStyle
        }

        pub fn template(self, _template: &str) -> Result<Self, std::convert::Infallible> {
            Ok(self)
        }

        pub fn progress_chars(self, _chars: &str) -> Self {
            self
        }
    }
}

/// Emit at least this often, counted in lines
pub const UPDATE_EVERY_LINES: u64 = 5_000;

/// Emit at least this often, in time
pub const UPDATE_INTERVAL: Duration = Duration::from_millis(500);

/// Progress of a load, shared between the loader and its observers
#[derive(Debug, Default)]
pub struct LoadProgress {
    total_bytes: AtomicU64,
    loaded_bytes: AtomicU64,
    lines: AtomicU64,
    complete: AtomicBool,
}

/// Point-in-time copy of [`LoadProgress`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProgressSnapshot {
    /// 0 when the size is unknown
    pub total_bytes: u64,
    pub loaded_bytes: u64,
    pub lines: u64,
    pub is_complete: bool,
}

impl ProgressSnapshot {
    /// Percentage loaded, if the total is known
    pub fn percent(&self) -> Option<f64> {
        (self.total_bytes > 0)
            .then(|| (self.loaded_bytes as f64 * 100.0 / self.total_bytes as f64).min(100.0))
    }
}

impl LoadProgress {
    pub fn new(total_bytes: u64) -> Self {
        Self {
            total_bytes: AtomicU64::new(total_bytes),
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            loaded_bytes: self.loaded_bytes.load(Ordering::Relaxed),
            lines: self.lines.load(Ordering::Relaxed),
            is_complete: self.complete.load(Ordering::Acquire),
        }
    }

    fn publish(&self, loaded_bytes: u64, lines: u64) {
        self.loaded_bytes.store(loaded_bytes, Ordering::Relaxed);
        self.lines.store(lines, Ordering::Relaxed);
    }

    fn mark_complete(&self) {
        self.complete.store(true, Ordering::Release);
    }
}

/// Counts consumed lines and bytes, publishing at most every
/// [`UPDATE_EVERY_LINES`] lines or [`UPDATE_INTERVAL`]
pub struct ProgressTracker {
    shared: Arc<LoadProgress>,
    bar: Option<ProgressBar>,
    lines: u64,
    loaded: u64,
    started: Instant,
    last_update: Instant,
}

impl ProgressTracker {
    pub fn new(shared: Arc<LoadProgress>, show_bar: bool) -> Self {
        let total = shared.snapshot().total_bytes;
        let bar = show_bar.then(|| new_bar(total));
        let now = Instant::now();
        Self {
            shared,
            bar,
            lines: 0,
            loaded: 0,
            started: now,
            last_update: now,
        }
    }

    /// Record one stored line of `bytes` input bytes
    pub fn record(&mut self, bytes: u64) {
        self.lines += 1;
        self.loaded += bytes;

        if self.lines % UPDATE_EVERY_LINES == 0 || self.last_update.elapsed() >= UPDATE_INTERVAL {
            self.update();
        }
    }

    fn update(&mut self) {
        self.last_update = Instant::now();
        self.shared.publish(self.loaded, self.lines);

        let rate = self.lines_per_sec();
        if let Some(bar) = &self.bar {
            bar.set_position(self.loaded);
            bar.set_message(format!("{} lines | {:.0} lines/sec", self.lines, rate));
        }
        tracing::trace!(lines = self.lines, bytes = self.loaded, rate, "load progress");
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn loaded_bytes(&self) -> u64 {
        self.loaded
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn lines_per_sec(&self) -> f64 {
        let secs = self.started.elapsed().as_secs_f64().max(0.001);
        self.lines as f64 / secs
    }

    /// Publish final counts and mark the load complete
    pub fn finish(&mut self) {
        self.shared.publish(self.loaded, self.lines);
        self.shared.mark_complete();
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

fn new_bar(total: u64) -> ProgressBar {
    if total > 0 {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓▒░  "),
        );
        pb
    } else {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} Loading: {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        spinner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_is_throttled_by_lines() {
        let shared = Arc::new(LoadProgress::new(1_000_000));
        let mut tracker = ProgressTracker::new(Arc::clone(&shared), false);
        // make the time trigger unreachable for this test
        tracker.last_update = Instant::now() + Duration::from_secs(3600);

        for _ in 0..UPDATE_EVERY_LINES - 1 {
            tracker.record(10);
        }
        assert_eq!(shared.snapshot().lines, 0);

        tracker.record(10);
        let snap = shared.snapshot();
        assert_eq!(snap.lines, UPDATE_EVERY_LINES);
        assert_eq!(snap.loaded_bytes, UPDATE_EVERY_LINES * 10);
        assert!(!snap.is_complete);
    }

    #[test]
    fn test_finish_publishes_everything() {
        let shared = Arc::new(LoadProgress::new(0));
        let mut tracker = ProgressTracker::new(Arc::clone(&shared), false);
        tracker.record(7);
        tracker.record(3);
        tracker.finish();

        let snap = shared.snapshot();
        assert!(snap.is_complete);
        assert_eq!(snap.loaded_bytes, 10);
        assert_eq!(snap.lines, 2);
        assert_eq!(snap.percent(), None);
    }

    #[test]
    fn test_percent_is_clamped() {
        let snap = ProgressSnapshot {
            total_bytes: 100,
            loaded_bytes: 150,
            lines: 1,
            is_complete: false,
        };
        assert_eq!(snap.percent(), Some(100.0));
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_string(&LoadProgress::new(5).snapshot()).unwrap();
        assert!(json.contains("\"total_bytes\":5"));
        assert!(json.contains("\"is_complete\":false"));
    }
}
