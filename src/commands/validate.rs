//! `provisor validate` - check a blueprint without contacting an instance

use anyhow::{Result, bail};
use declarative::{has_errors, validate};

use crate::Context;
use crate::blueprint;
use crate::cli::BlueprintArgs;
use crate::config::ConfigFile;
use crate::engine::display;
use crate::ui;

pub fn run(ctx: &Context, args: BlueprintArgs) -> Result<()> {
    let path = match args.blueprint {
        Some(path) => Some(path),
        None => ConfigFile::load()?.blueprint_path()?,
    };
    let blueprint = blueprint::load(path.as_deref())?;

    if !ctx.quiet {
        ui::header("Blueprint Check");
        ui::kv("Blueprint", &blueprint.origin);
        ui::kv("Collections", &blueprint.set.collections.len().to_string());
        ui::kv("Relationships", &blueprint.set.relationships.len().to_string());
        ui::kv("Seed batches", &blueprint.set.seeds.len().to_string());
        ui::kv("Panels", &blueprint.set.panels.len().to_string());
        println!();
    }

    let issues = validate(&blueprint.set);
    if issues.is_empty() {
        ui::success("No issues found");
        return Ok(());
    }

    display::display_issues(&issues);
    let errors = issues.iter().filter(|i| i.is_error()).count();
    if has_errors(&issues) {
        bail!(
            "Blueprint has {} and {}",
            ui::plural(errors, "error"),
            ui::plural(issues.len() - errors, "warning")
        );
    }

    ui::warn(&format!("{} found", ui::plural(issues.len(), "warning")));
    Ok(())
}
