//! Plan, issue and report display

use colored::Colorize;
use declarative::{ExecutionPlan, Issue, Outcome, RunReport, Severity};

use crate::progress::summary_line;
use crate::ui;

/// Show every step of a plan, grouped by phase
pub fn display_plan(plan: &ExecutionPlan, payloads: bool) {
    if plan.is_empty() {
        println!();
        println!("  {} Nothing to apply", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Execution Plan".bold()
    );
    println!("│");

    for phase in plan.phases() {
        println!("│ {}", phase.title().bold());
        for step in plan.steps_in(phase) {
            println!(
                "│   {} {:<44} {}",
                "+".green(),
                step.description,
                step.action.endpoint().dimmed()
            );
            if payloads {
                let body = serde_json::to_string_pretty(step.action.payload())
                    .unwrap_or_else(|e| format!("<unprintable payload: {e}>"));
                for line in body.lines() {
                    println!("│       {}", line.dimmed());
                }
            }
        }
        println!("│");
    }

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} across {}",
        ui::plural(plan.len(), "step").bold(),
        ui::plural(plan.phases().len(), "phase")
    );
    println!("└─────────────────────────────────────────────────────┘");
}

/// Show validation findings, errors first
pub fn display_issues(issues: &[Issue]) {
    for issue in issues {
        match issue.severity {
            Severity::Error => println!("  {} {}", "✗".red(), issue),
            Severity::Warning => println!("  {} {}", "⚠".yellow(), issue),
        }
    }
}

/// Per-phase counts and the failed steps of a finished run
pub fn print_summary(report: &RunReport) {
    println!();
    if report.is_clean() {
        println!(
            "  {} Instance provisioned successfully!",
            "✓".green().bold()
        );
    } else {
        println!(
            "  {} Instance provisioned with errors",
            "⚠".yellow().bold()
        );
    }

    for (phase, summary) in report.summaries() {
        let tally = summary_line(&summary);
        if summary.is_success() {
            println!("    • {}: {}", phase.title(), tally);
        } else {
            println!("    • {}: {}", phase.title(), tally.red());
        }
    }

    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        println!();
        println!("  {}", "Failed steps:".red().bold());
        for record in failures {
            if let Outcome::Failed { error } = &record.outcome {
                println!("    {} {} - {}", "✗".red(), record.id, error.to_string().dimmed());
            }
        }
    }

    if let Some(duration) = report.duration() {
        let millis = duration.num_milliseconds();
        ui::dim(&format!("Finished in {}.{:03}s", millis / 1000, millis % 1000));
    }
}
