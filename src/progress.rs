//! Download progress display
//!
//! A single bar counting finished transfers out of the total. It moves when a
//! transfer completes, successful or not, never when one starts.

use crossterm::style::{Color, Stylize};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

pub struct TransferProgress {
    bar: ProgressBar,
    start_time: Instant,
}

impl TransferProgress {
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} Downloading [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Self {
            bar,
            start_time: Instant::now(),
        }
    }

    /// Same counting, nothing drawn
    pub fn hidden(total: usize) -> Self {
        let bar = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::hidden());
        Self {
            bar,
            start_time: Instant::now(),
        }
    }

    /// Record one finished transfer
    pub fn complete(&self, name: &str, ok: bool) {
        if !ok {
            self.bar
                .println(format!("  {} {}", "Failed".with(Color::Red).bold(), name));
        }
        self.bar.set_message(name.to_string());
        self.bar.inc(1);
    }

    pub fn completed(&self) -> u64 {
        self.bar.position()
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
