//! Core types for phased provisioning

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Ordered stage of a provisioning run
///
/// Phases run strictly in declaration order; a phase never starts before the
/// previous one has attempted all of its steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Instance branding and metadata
    Settings,
    /// Collections and their fields
    Collections,
    /// Relational patches on existing fields
    Relationships,
    /// Bulk seed records
    Seed,
    /// Dashboard and panels
    Dashboard,
}

impl Phase {
    /// All phases in execution order
    pub const ALL: [Phase; 5] = [
        Phase::Settings,
        Phase::Collections,
        Phase::Relationships,
        Phase::Seed,
        Phase::Dashboard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Settings => "settings",
            Self::Collections => "collections",
            Self::Relationships => "relationships",
            Self::Seed => "seed",
            Self::Dashboard => "dashboard",
        }
    }

    /// Heading used in console output
    pub fn title(&self) -> &'static str {
        match self {
            Self::Settings => "Instance settings",
            Self::Collections => "Collections & fields",
            Self::Relationships => "Relationships",
            Self::Seed => "Seed data",
            Self::Dashboard => "Dashboard",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "settings" | "branding" => Ok(Self::Settings),
            "collections" | "fields" => Ok(Self::Collections),
            "relationships" | "relations" => Ok(Self::Relationships),
            "seed" | "seeds" | "data" => Ok(Self::Seed),
            "dashboard" | "dashboards" | "panels" => Ok(Self::Dashboard),
            other => Err(format!(
                "unknown phase '{other}' (expected one of: settings, collections, relationships, seed, dashboard)"
            )),
        }
    }
}

/// Identity of one step: phase plus resource name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StepId {
    pub phase: Phase,
    /// e.g. `agents`, `agents.status`, `Task Queue`
    pub resource: String,
}

impl StepId {
    pub fn new(phase: Phase, resource: impl Into<String>) -> Self {
        Self {
            phase,
            resource: resource.into(),
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.phase, self.resource)
    }
}

/// Why a step failed, carrying the remote's diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "kebab-case")]
pub enum StepError {
    #[error("settings update failed: {0}")]
    Settings(String),

    #[error("create failed: {0}")]
    ResourceCreate(String),

    #[error("relationship not applied: {0}")]
    RelationshipApply(String),

    #[error("seed batch rejected: {0}")]
    SeedBatch(String),

    #[error("dashboard not created: {0}")]
    DashboardCreate(String),

    #[error("panel not created: {0}")]
    PanelCreate(String),
}

/// Result of attempting one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Outcome {
    /// The remote accepted the change
    Applied,
    /// The resource already existed
    SkippedExists { detail: String },
    /// The step failed; the run continued
    Failed { error: StepError },
    /// Recorded but intentionally not materialized
    Deferred { reason: String },
}

impl Outcome {
    /// Check if the outcome is a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Short status label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::SkippedExists { .. } => "skipped-exists",
            Self::Failed { .. } => "failed",
            Self::Deferred { .. } => "deferred",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => f.write_str("applied"),
            Self::SkippedExists { detail } => write!(f, "skipped (exists): {detail}"),
            Self::Failed { error } => write!(f, "failed: {error}"),
            Self::Deferred { reason } => write!(f, "deferred: {reason}"),
        }
    }
}

/// Outcome counts of one phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub deferred: usize,
}

impl PhaseSummary {
    /// Total number of steps counted
    pub fn total(&self) -> usize {
        self.applied + self.skipped + self.failed + self.deferred
    }

    /// Check if no step failed
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Count an outcome
    pub fn add(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Applied => self.applied += 1,
            Outcome::SkippedExists { .. } => self.skipped += 1,
            Outcome::Failed { .. } => self.failed += 1,
            Outcome::Deferred { .. } => self.deferred += 1,
        }
    }
}

/// Options for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Phases to run; the others produce no steps
    pub phases: BTreeSet<Phase>,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            phases: Phase::ALL.into_iter().collect(),
        }
    }
}

impl ApplyOptions {
    /// Run every phase except the given ones
    pub fn skipping(skip: &[Phase]) -> Self {
        Self {
            phases: Phase::ALL
                .into_iter()
                .filter(|p| !skip.contains(p))
                .collect(),
        }
    }

    /// Whether a phase is enabled
    pub fn includes(&self, phase: Phase) -> bool {
        self.phases.contains(&phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        let mut shuffled = vec![
            Phase::Seed,
            Phase::Settings,
            Phase::Dashboard,
            Phase::Relationships,
            Phase::Collections,
        ];
        shuffled.sort();
        assert_eq!(shuffled, Phase::ALL.to_vec());
    }

    #[test]
    fn test_phase_from_str() {
        assert_eq!("Seed".parse::<Phase>().unwrap(), Phase::Seed);
        assert_eq!("panels".parse::<Phase>().unwrap(), Phase::Dashboard);
        assert_eq!(" relations ".parse::<Phase>().unwrap(), Phase::Relationships);
        assert!("schema".parse::<Phase>().is_err());
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = PhaseSummary::default();
        summary.add(&Outcome::Applied);
        summary.add(&Outcome::SkippedExists {
            detail: "exists".into(),
        });
        summary.add(&Outcome::Failed {
            error: StepError::ResourceCreate("boom".into()),
        });
        summary.add(&Outcome::Deferred {
            reason: "no panels".into(),
        });

        assert_eq!(summary.total(), 4);
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.failed, 1);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_outcome_display() {
        let failed = Outcome::Failed {
            error: StepError::RelationshipApply("Field \"owner\" doesn't exist".into()),
        };
        assert!(failed.to_string().starts_with("failed: relationship not applied"));
        assert_eq!(failed.label(), "failed");
        assert!(failed.is_failure());
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_value(Outcome::Failed {
            error: StepError::SeedBatch("duplicate".into()),
        })
        .unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"]["kind"], "seed-batch");
        assert_eq!(json["error"]["detail"], "duplicate");
    }

    #[test]
    fn test_apply_options_skipping() {
        let opts = ApplyOptions::skipping(&[Phase::Seed, Phase::Dashboard]);
        assert!(opts.includes(Phase::Collections));
        assert!(!opts.includes(Phase::Seed));
        assert_eq!(opts.phases.len(), 3);
        assert!(ApplyOptions::default().includes(Phase::Dashboard));
    }
}
