//! `provisor plan` - show the steps a blueprint produces

use anyhow::Result;
use declarative::{ApplyOptions, ExecutionPlan};

use crate::Context;
use crate::blueprint;
use crate::cli::PlanArgs;
use crate::config::{self, ConfigFile};
use crate::engine::display;
use crate::ui;

pub fn run(ctx: &Context, args: PlanArgs) -> Result<()> {
    let file = ConfigFile::load()?;
    let path = match args.source.blueprint {
        Some(path) => Some(path),
        None => file.blueprint_path()?,
    };
    let blueprint = blueprint::load(path.as_deref())?;

    let skip = config::merge_skips(&file, &args.skip);
    let plan = ExecutionPlan::build(&blueprint.set, &ApplyOptions::skipping(&skip));

    if !ctx.quiet {
        ui::header("Provisioning Plan");
        ui::kv("Blueprint", &blueprint.origin);
    }
    display::display_plan(&plan, args.payloads);

    Ok(())
}
