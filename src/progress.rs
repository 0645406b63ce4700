//! Progress reporting for `warm` using indicatif.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Receives progress updates while assets are processed.
///
/// Callbacks arrive from worker threads, in completion order.
pub trait ProgressCallback: Send + Sync {
    /// Called once the number of candidate assets is known.
    fn on_start(&self, total: usize);

    /// Called after each asset.
    ///
    /// # Arguments
    ///
    /// * `current` - Assets done so far (1-based)
    /// * `path` - Asset just processed
    fn on_progress(&self, current: usize, path: &str);

    /// Called when all assets are done.
    fn on_finish(&self);
}

/// Terminal progress bar.
pub struct Progress {
    bar: ProgressBar,
}

impl Progress {
    /// Create a progress reporter; `quiet` hides it entirely.
    ///
    /// ```
    /// use webpcache::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(0);
            bar.set_style(bar_style());
            bar
        };
        Self { bar }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█>-")
}

impl ProgressCallback for Progress {
    fn on_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_message("Encoding");
        self.bar.enable_steady_tick(Duration::from_millis(100));
    }

    fn on_progress(&self, current: usize, path: &str) {
        self.bar.set_position(current as u64);
        self.bar.set_message(truncate_path(path, 30));
    }

    fn on_finish(&self) {
        self.bar.finish_with_message("Done");
    }
}

/// Shorten a path to its file name, then to its last `max_len` characters.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let chars = file_name.chars().count();
    if chars >= max_len {
        let tail: String = file_name.chars().skip(chars + 3 - max_len).collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
