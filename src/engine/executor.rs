//! Execution engine - provisor executor with UI integration

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use declarative::{ExecutionPlan, RunReport, provision};
use directus::{Backend, Credentials, ErrorCategory};

use super::display::{display_plan, print_summary};
use crate::progress::ConsoleProgress;
use crate::ui;

/// Options for execution
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Don't contact the instance, just show the plan
    pub dry_run: bool,
    /// Skip the confirmation prompt
    pub yes: bool,
    /// Only print failures while running
    pub quiet: bool,
}

/// Show the plan, confirm, then provision the instance
///
/// Returns `None` when nothing was run (dry run, declined). An empty plan
/// still authenticates, so bad credentials fail every real run. Step
/// failures end up in the report; only a rejected or missing login is an
/// error.
pub fn execute(
    backend: &dyn Backend,
    credentials: Option<&Credentials>,
    target: &str,
    plan: &ExecutionPlan,
    opts: &ExecuteOptions,
) -> Result<Option<RunReport>> {
    // 1. Display what will be applied
    if !opts.quiet || opts.dry_run {
        display_plan(plan, false);
    }

    if opts.dry_run {
        if !plan.is_empty() {
            println!();
            println!("  {} Dry run - no changes made", "ℹ".blue());
        }
        return Ok(None);
    }

    // 2. Confirm (unless --yes); an empty plan still logs in
    if !plan.is_empty() && !opts.yes && !confirm_proceed(target)? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(None);
    }

    let Some(credentials) = credentials else {
        ui::error(ErrorCategory::Auth.description());
        ui::dim(ErrorCategory::Auth.advice());
        bail!("No credentials: set ADMIN_PASSWORD (or --password) or DIRECTUS_TOKEN (or --token)");
    };

    // 3. Run the phases
    let mut progress = ConsoleProgress::new(opts.quiet);
    let report = match provision(backend, credentials, target, plan, &mut progress) {
        Ok(report) => report,
        Err(e) => {
            let category = e.category();
            ui::error(&format!("{category} as {}", credentials.identity()));
            ui::dim(category.advice());
            return Err(e).with_context(|| format!("Could not log in to {target}"));
        }
    };
    drop(progress);

    // 4. Summary
    if !report.steps.is_empty() && (!opts.quiet || !report.is_clean()) {
        print_summary(&report);
    }

    Ok(Some(report))
}

/// Confirm with user
fn confirm_proceed(target: &str) -> Result<bool> {
    use dialoguer::Confirm;

    if !console::Term::stdout().is_term() {
        bail!("Refusing to apply without confirmation on a non-interactive terminal; pass --yes");
    }

    println!();
    let confirmed = Confirm::new()
        .with_prompt(format!("Apply to {target}?"))
        .default(true)
        .interact()
        .context("Failed to read confirmation")?;

    Ok(confirmed)
}
