//! `provisor apply` - provision an instance from a blueprint

use anyhow::{Context as AnyhowContext, Result};
use declarative::{ApplyOptions, ExecutionPlan, validate};
use directus::backend::http::HttpBackend;
use std::fs;

use crate::Context;
use crate::blueprint;
use crate::cli::ApplyArgs;
use crate::config::{self, ConfigFile, RemoteConfig};
use crate::engine::{self, ExecuteOptions, display};
use crate::ui;

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let file = ConfigFile::load()?;
    let remote = RemoteConfig::resolve(&args.remote, &file);

    let path = match args.source.blueprint {
        Some(path) => Some(path),
        None => file.blueprint_path()?,
    };
    let blueprint = blueprint::load(path.as_deref())?;

    if !ctx.quiet {
        ui::header("Applying Blueprint");
        ui::kv("Blueprint", &blueprint.origin);
        ui::kv("Instance", &remote.url);
    }

    // Findings never block a run; the remote has the final say
    let issues = validate(&blueprint.set);
    if !issues.is_empty() {
        ui::warn(&format!(
            "Blueprint has {} (run `provisor validate` for details)",
            ui::plural(issues.len(), "issue")
        ));
        if ctx.verbose > 0 {
            display::display_issues(&issues);
        }
    }

    let skip = config::merge_skips(&file, &args.skip);
    if !skip.is_empty() && !ctx.quiet {
        let names: Vec<&str> = skip.iter().map(|p| p.as_str()).collect();
        ui::kv("Skipping", &names.join(", "));
    }
    let plan = ExecutionPlan::build(&blueprint.set, &ApplyOptions::skipping(&skip));

    let backend = HttpBackend::with_timeout(&remote.url, remote.timeout);
    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        yes: args.yes,
        quiet: ctx.quiet,
    };

    let Some(report) = engine::execute(
        &backend,
        remote.credentials.as_ref(),
        &remote.url,
        &plan,
        &opts,
    )? else {
        return Ok(());
    };

    if let Some(path) = &args.report {
        let json = report.to_json().context("Failed to serialize run report")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        if !ctx.quiet {
            ui::success(&format!("Report written to {}", path.display()));
        }
    }

    Ok(())
}
