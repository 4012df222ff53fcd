//! Console progress for provisioning runs

use colored::Colorize;
use declarative::{Outcome, Phase, PhaseSummary, ProgressCallback, Step};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::ui;

/// Width the error text of a failed step is cut to
const ERROR_WIDTH: usize = 72;

/// Create a spinner with a message
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("  {spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Prints phases and step outcomes as a run progresses
///
/// In quiet mode only failures are printed. A spinner is shown for the
/// in-flight step when stdout is a terminal.
pub struct ConsoleProgress {
    quiet: bool,
    interactive: bool,
    current: Option<ProgressBar>,
}

impl ConsoleProgress {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            interactive: !quiet && console::Term::stdout().is_term(),
            current: None,
        }
    }

    fn clear_spinner(&mut self) {
        if let Some(pb) = self.current.take() {
            pb.finish_and_clear();
        }
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_phase_start(&mut self, phase: Phase, steps: usize) {
        if !self.quiet {
            ui::section(&format!("{} ({})", phase.title(), ui::plural(steps, "step")));
        }
    }

    fn on_step_start(&mut self, step: &Step) {
        if self.interactive {
            self.current = Some(spinner(&step.description));
        }
    }

    fn on_step_complete(&mut self, step: &Step, outcome: &Outcome) {
        self.clear_spinner();
        if self.quiet && !outcome.is_failure() {
            return;
        }
        println!("{}", outcome_line(&step.id.resource, outcome));
    }

    fn on_phase_complete(&mut self, _phase: Phase, summary: &PhaseSummary) {
        if !self.quiet {
            ui::dim(&summary_line(summary));
        }
    }
}

impl Drop for ConsoleProgress {
    fn drop(&mut self) {
        self.clear_spinner();
    }
}

/// One console line for a finished step
pub fn outcome_line(resource: &str, outcome: &Outcome) -> String {
    match outcome {
        Outcome::Applied => format!("  {} {}", "✓".green(), resource),
        Outcome::SkippedExists { .. } => {
            format!("  {} {} {}", "○".dimmed(), resource, "(exists)".dimmed())
        }
        Outcome::Failed { error } => format!(
            "  {} {} {}",
            "✗".red(),
            resource,
            ui::truncate(&error.to_string(), ERROR_WIDTH).red()
        ),
        Outcome::Deferred { reason } => format!(
            "  {} {} {}",
            "⊘".yellow(),
            resource,
            format!("({})", ui::truncate(reason, ERROR_WIDTH)).dimmed()
        ),
    }
}

/// `3 applied, 1 skipped` style tally, zero counts left out
pub fn summary_line(summary: &PhaseSummary) -> String {
    let parts: Vec<String> = [
        (summary.applied, "applied"),
        (summary.skipped, "skipped"),
        (summary.failed, "failed"),
        (summary.deferred, "deferred"),
    ]
    .into_iter()
    .filter(|(count, _)| *count > 0)
    .map(|(count, label)| format!("{count} {label}"))
    .collect();

    if parts.is_empty() {
        "nothing to do".to_string()
    } else {
        parts.join(", ")
    }
}
