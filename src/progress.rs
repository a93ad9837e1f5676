// src/progress.rs
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use std::fmt::Write as _;

const DEFAULT_LENGTH: usize = 50;
const DECIMALS: usize = 1;
const FILL: char = '█';
const EMPTY: char = '-';

/// Percentage bar advanced once per processed file.
///
/// The counter is tracked here and mirrored into an `indicatif` bar for the
/// terminal, so `line()` always matches what the user sees.
pub struct Progress {
    iteration: u64,
    total: u64,
    prefix: String,
    suffix: String,
    length: usize,
    bar: ProgressBar,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self::with_target(total, ProgressDrawTarget::stdout())
    }

    /// Same bookkeeping without drawing anything.
    pub fn hidden(total: usize) -> Self {
        Self::with_target(total, ProgressDrawTarget::hidden())
    }

    fn with_target(total: usize, target: ProgressDrawTarget) -> Self {
        let total = total as u64;
        let bar = ProgressBar::with_draw_target(Some(total), target);

        let progress = Self {
            iteration: 0,
            total,
            prefix: String::new(),
            suffix: String::new(),
            length: DEFAULT_LENGTH,
            bar,
        };
        progress.apply_style();
        progress
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self.bar.set_prefix(self.prefix.clone());
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self.bar.set_message(self.suffix.clone());
        self
    }

    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length.max(1);
        self.apply_style();
        self
    }

    fn apply_style(&self) {
        let template = format!(
            "{{prefix}} |{{bar:{}}}| {{percent_fixed}}% {{msg}}",
            self.length
        );

        let style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .with_key(
                "percent_fixed",
                move |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                    let total = state.len().unwrap_or(0);
                    let _ = w.write_str(&format_percent(state.pos(), total, DECIMALS));
                },
            )
            .progress_chars(&format!("{FILL}{EMPTY}"));

        self.bar.set_style(style);
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn is_complete(&self) -> bool {
        self.iteration >= self.total
    }

    pub fn increment(&mut self) {
        if self.iteration < self.total {
            self.iteration += 1;
        }
    }

    pub fn print(&self) {
        self.bar.set_position(self.iteration);
        if self.is_complete() && !self.bar.is_finished() {
            self.bar.finish();
        }
    }

    pub fn inc_and_print(&mut self) {
        self.increment();
        self.print();
    }

    pub fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish();
        }
    }

    /// Plain-text rendering, e.g. ` |█████-----| 50.0% `.
    pub fn line(&self) -> String {
        let filled = if self.total == 0 {
            self.length
        } else {
            (self.length as u64 * self.iteration / self.total) as usize
        };

        let mut bar = String::with_capacity(self.length * FILL.len_utf8());
        bar.extend(std::iter::repeat(FILL).take(filled));
        bar.extend(std::iter::repeat(EMPTY).take(self.length - filled));

        let mut out = String::new();
        let _ = write!(
            out,
            "{} |{}| {}% {}",
            self.prefix,
            bar,
            format_percent(self.iteration, self.total, DECIMALS),
            self.suffix
        );
        out
    }
}

/// `100 * iteration / total` with a fixed number of decimals.
/// An empty batch counts as complete.
pub fn format_percent(iteration: u64, total: u64, decimals: usize) -> String {
    let percent = if total == 0 {
        100.0
    } else {
        100.0 * (iteration as f64 / total as f64)
    };
    format!("{:.*}", decimals, percent)
}
