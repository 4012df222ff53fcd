use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use declarative::Phase;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "provisor")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Provision a Directus instance from a declarative blueprint", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply a blueprint to a Directus instance
    Apply(ApplyArgs),

    /// Show the ordered steps a blueprint produces (no network)
    Plan(PlanArgs),

    /// Check a blueprint for mistakes
    Validate(BlueprintArgs),

    /// Print the built-in blueprint
    Export {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Toml)]
        format: ExportFormat,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct BlueprintArgs {
    /// Blueprint file (.toml or .json); defaults to the built-in command center
    #[arg(short, long, value_name = "FILE")]
    pub blueprint: Option<PathBuf>,
}

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub source: BlueprintArgs,

    /// Skip a phase (repeatable): settings, collections, relationships, seed, dashboard
    #[arg(long = "skip", value_name = "PHASE")]
    pub skip: Vec<Phase>,

    /// Also print each request body
    #[arg(long)]
    pub payloads: bool,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub source: BlueprintArgs,

    #[command(flatten)]
    pub remote: RemoteArgs,

    /// Show what would be applied without contacting the instance
    #[arg(long)]
    pub dry_run: bool,

    /// Don't ask for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Skip a phase (repeatable): settings, collections, relationships, seed, dashboard
    #[arg(long = "skip", value_name = "PHASE")]
    pub skip: Vec<Phase>,

    /// Write the run report as JSON
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

/// Connection settings; flags win over environment, environment over config file
#[derive(Args, Default)]
pub struct RemoteArgs {
    /// Instance URL
    #[arg(long, env = "DIRECTUS_URL")]
    pub url: Option<String>,

    /// Administrator email
    #[arg(long, env = "ADMIN_EMAIL")]
    pub email: Option<String>,

    /// Administrator password
    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Static access token; takes precedence over email/password
    #[arg(long, env = "DIRECTUS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ExportFormat {
    Toml,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_apply_args() {
        let cli = Cli::try_parse_from([
            "provisor",
            "-vv",
            "apply",
            "--blueprint",
            "site.toml",
            "--skip",
            "seed",
            "--skip",
            "dashboard",
            "--url",
            "https://cms.example.com",
            "-y",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(args.skip, vec![Phase::Seed, Phase::Dashboard]);
        assert_eq!(args.source.blueprint, Some(PathBuf::from("site.toml")));
        assert_eq!(args.remote.url.as_deref(), Some("https://cms.example.com"));
        assert!(args.yes);
        assert!(!args.dry_run);
    }

    #[test]
    fn test_unknown_phase_rejected() {
        assert!(Cli::try_parse_from(["provisor", "plan", "--skip", "schema"]).is_err());
    }
}
