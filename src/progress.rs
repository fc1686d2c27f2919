//! Run progress for the terminal
//!
//! A spinner tracks the resource being evaluated; every executed step is
//! printed above it as it completes.

use colored::Colorize;
use declarative::{Outcome, ProgressCallback, RunSummary, Timing};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub struct RunProgress {
    bar: Option<ProgressBar>,
    /// Also print resources whose guard was already satisfied
    verbose: bool,
    position: u64,
    current: Option<String>,
}

impl RunProgress {
    pub fn new(quiet: bool, verbose: bool) -> Self {
        Self {
            bar: (!quiet).then(ProgressBar::new_spinner),
            verbose,
            position: 0,
            current: None,
        }
    }

    fn println(&self, line: &str) {
        if let Some(bar) = &self.bar {
            bar.println(line);
        }
    }

    /// Clear the spinner of a run that halted before completing
    pub fn abandon(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

impl ProgressCallback for RunProgress {
    fn on_run_start(&mut self, walk_len: usize) {
        if let Some(bar) = &self.bar {
            bar.set_length(walk_len as u64);
            if let Ok(style) = ProgressStyle::default_spinner()
                .template("{spinner:.green} [{pos}/{len}] {msg}")
            {
                bar.set_style(style);
            }
            bar.enable_steady_tick(Duration::from_millis(100));
        }
    }

    fn on_resource_start(&mut self, id: &str, description: &str) {
        // Notified resources start while a walked one is still current
        if self.current.is_none() {
            self.position += 1;
        }
        self.current = Some(id.to_string());
        if let Some(bar) = &self.bar {
            bar.set_position(self.position);
            bar.set_message(description.to_string());
        }
    }

    fn on_resource_complete(&mut self, id: &str, action: &str, outcome: &Outcome) {
        self.current = None;
        let line = match outcome {
            Outcome::Changed => format!("  {} {} {}", "✓".green(), id, action.dimmed()),
            Outcome::Failed { reason } => {
                format!("  {} {} {} {}", "✗".red(), id, action.dimmed(), reason.red())
            }
            Outcome::Unchanged if self.verbose => {
                format!("  {} {}", "○".dimmed(), id.dimmed())
            }
            Outcome::Unchanged => return,
        };
        self.println(&line);
    }

    fn on_notification(&mut self, source: &str, target: &str, action: &str, timing: Timing) {
        if self.verbose {
            let line = format!("    {source} notified {target} ({action}, {timing})");
            self.println(&line.dimmed().to_string());
        }
    }

    fn on_run_complete(&mut self, _summary: &RunSummary) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}
