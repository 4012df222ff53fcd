//! Blueprint loading
//!
//! The command center blueprint is compiled into the binary; a file given on
//! the command line or in the config replaces it entirely.

use anyhow::{Context, Result};
use declarative::DescriptorSet;
use std::path::Path;

/// Built-in blueprint source
pub const BUILTIN: &str = include_str!("../blueprints/command-center.toml");

/// Name shown for the built-in blueprint
pub const BUILTIN_NAME: &str = "built-in command center";

/// A parsed blueprint and where it came from
#[derive(Debug)]
pub struct Blueprint {
    pub origin: String,
    pub set: DescriptorSet,
}

/// Parse the built-in blueprint
pub fn builtin() -> Result<DescriptorSet> {
    DescriptorSet::from_toml_str(BUILTIN).context("Built-in blueprint is invalid")
}

/// Load `path` if given, otherwise the built-in blueprint
pub fn load(path: Option<&Path>) -> Result<Blueprint> {
    match path {
        Some(path) => {
            log::debug!("Loading blueprint from {}", path.display());
            let set = DescriptorSet::load(path)
                .with_context(|| format!("Failed to load blueprint {}", path.display()))?;
            Ok(Blueprint {
                origin: path.display().to_string(),
                set,
            })
        }
        None => Ok(Blueprint {
            origin: BUILTIN_NAME.to_string(),
            set: builtin()?,
        }),
    }
}
