//! `provisor export` - print the built-in blueprint as a starting point

use anyhow::{Context as AnyhowContext, Result};

use crate::blueprint;
use crate::cli::ExportFormat;

pub fn run(format: ExportFormat) -> Result<()> {
    let output = render(format)?;
    print!("{output}");
    Ok(())
}

fn render(format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Toml => Ok(blueprint::BUILTIN.to_string()),
        ExportFormat::Json => {
            let set = blueprint::builtin()?;
            let mut json =
                serde_json::to_string_pretty(&set).context("Failed to serialize blueprint")?;
            json.push('\n');
            Ok(json)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::DescriptorSet;

    #[test]
    fn test_json_export_reads_back() {
        let json = render(ExportFormat::Json).unwrap();
        let set = DescriptorSet::from_json_str(&json).unwrap();
        assert_eq!(set, blueprint::builtin().unwrap());
    }

    #[test]
    fn test_toml_export_is_the_source() {
        assert_eq!(render(ExportFormat::Toml).unwrap(), blueprint::BUILTIN);
    }
}
