//! Configuration file and connection settings
//!
//! Precedence, highest first: command-line flag, environment variable
//! (both handled by clap), `~/.config/provisor/config.toml`, built-in default.

use crate::cli::RemoteArgs;
use anyhow::{Context, Result};
use declarative::Phase;
use directus::Credentials;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_URL: &str = "http://localhost:8055";
pub const DEFAULT_EMAIL: &str = "admin@example.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("provisor"))
}

// ============================================================================
// Config file
// ============================================================================

#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub remote: RemoteSection,
    #[serde(default)]
    pub apply: ApplySection,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteSection {
    pub url: Option<String>,
    pub email: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApplySection {
    /// Phases skipped on every run
    #[serde(default)]
    pub skip: Vec<Phase>,
    /// Blueprint used when `--blueprint` is not given
    pub blueprint: Option<String>,
}

impl ConfigFile {
    /// Load the user config, or defaults if there is none
    pub fn load() -> Result<Self> {
        Self::load_from(&config_dir()?.join("config.toml"))
    }

    /// Load a config file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config file at {}", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Blueprint path from the config, with `~` and `$VARS` expanded
    pub fn blueprint_path(&self) -> Result<Option<PathBuf>> {
        self.apply
            .blueprint
            .as_deref()
            .map(|raw| {
                shellexpand::full(raw)
                    .map(|expanded| PathBuf::from(expanded.as_ref()))
                    .with_context(|| format!("Could not expand blueprint path '{raw}'"))
            })
            .transpose()
    }
}

// ============================================================================
// Resolved connection settings
// ============================================================================

/// Where to connect and how to log in
#[derive(Debug)]
pub struct RemoteConfig {
    pub url: String,
    /// `None` when neither a password nor a token was supplied
    pub credentials: Option<Credentials>,
    pub timeout: Duration,
}

impl RemoteConfig {
    /// Merge flags/environment over the config file over defaults
    pub fn resolve(args: &RemoteArgs, file: &ConfigFile) -> Self {
        let url = args
            .url
            .clone()
            .or_else(|| file.remote.url.clone())
            .unwrap_or_else(|| DEFAULT_URL.to_string());
        let email = args
            .email
            .clone()
            .or_else(|| file.remote.email.clone())
            .unwrap_or_else(|| DEFAULT_EMAIL.to_string());
        let timeout_secs = args
            .timeout
            .or(file.remote.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let credentials = match (&args.token, &args.password) {
            (Some(token), _) if !token.is_empty() => Some(Credentials::Token(token.clone())),
            (_, Some(password)) if !password.is_empty() => {
                Some(Credentials::password(email, password.clone()))
            }
            _ => None,
        };

        Self {
            url,
            credentials,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

/// Phases to skip: config file entries plus flags, without duplicates
pub fn merge_skips(file: &ConfigFile, flags: &[Phase]) -> Vec<Phase> {
    let mut skip: Vec<Phase> = file.apply.skip.iter().chain(flags).copied().collect();
    skip.sort();
    skip.dedup();
    skip
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_load_file() {
        let (_dir, path) = write_config(
            r#"
[remote]
url = "https://cms.example.com"
timeout_secs = 5

[apply]
skip = ["seed", "dashboard"]
"#,
        );
        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.remote.url.as_deref(), Some("https://cms.example.com"));
        assert_eq!(config.remote.timeout_secs, Some(5));
        assert_eq!(config.apply.skip, vec![Phase::Seed, Phase::Dashboard]);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let (_dir, path) = write_config("[remote]\nport = 8055\n");
        let err = ConfigFile::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config"));
    }

    #[test]
    fn test_defaults_without_credentials() {
        let remote = RemoteConfig::resolve(&RemoteArgs::default(), &ConfigFile::default());
        assert_eq!(remote.url, DEFAULT_URL);
        assert_eq!(remote.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(remote.credentials.is_none());
    }

    #[test]
    fn test_flags_override_file() {
        let file = ConfigFile {
            remote: RemoteSection {
                url: Some("https://from-file.example.com".into()),
                email: Some("ops@example.com".into()),
                timeout_secs: Some(5),
            },
            apply: ApplySection::default(),
        };
        let args = RemoteArgs {
            url: Some("https://from-flag.example.com".into()),
            password: Some("secret".into()),
            ..RemoteArgs::default()
        };

        let remote = RemoteConfig::resolve(&args, &file);
        assert_eq!(remote.url, "https://from-flag.example.com");
        assert_eq!(remote.timeout, Duration::from_secs(5));
        match remote.credentials {
            Some(Credentials::Password { email, password }) => {
                assert_eq!(email, "ops@example.com");
                assert_eq!(password, "secret");
            }
            other => panic!("unexpected credentials {other:?}"),
        }
    }

    #[test]
    fn test_token_wins_over_password() {
        let args = RemoteArgs {
            password: Some("secret".into()),
            token: Some("static-token".into()),
            ..RemoteArgs::default()
        };
        let remote = RemoteConfig::resolve(&args, &ConfigFile::default());
        assert!(matches!(remote.credentials, Some(Credentials::Token(t)) if t == "static-token"));
    }

    #[test]
    fn test_empty_password_counts_as_missing() {
        let args = RemoteArgs {
            password: Some(String::new()),
            ..RemoteArgs::default()
        };
        assert!(
            RemoteConfig::resolve(&args, &ConfigFile::default())
                .credentials
                .is_none()
        );
    }

    #[test]
    fn test_merge_skips() {
        let file = ConfigFile {
            apply: ApplySection {
                skip: vec![Phase::Dashboard, Phase::Seed],
                blueprint: None,
            },
            ..ConfigFile::default()
        };
        assert_eq!(
            merge_skips(&file, &[Phase::Seed, Phase::Settings]),
            vec![Phase::Settings, Phase::Seed, Phase::Dashboard]
        );
    }

    #[test]
    fn test_blueprint_path_expands_tilde() {
        let file = ConfigFile {
            apply: ApplySection {
                skip: Vec::new(),
                blueprint: Some("~/blueprints/site.toml".into()),
            },
            ..ConfigFile::default()
        };
        let path = file.blueprint_path().unwrap().unwrap();
        assert!(path.ends_with("blueprints/site.toml"));
        assert!(!path.starts_with("~"));
        assert!(ConfigFile::default().blueprint_path().unwrap().is_none());
    }
}
