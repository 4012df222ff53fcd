//! Run report - the per-step record of one provisioning run

use crate::types::{Outcome, Phase, PhaseSummary, StepId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One attempted step and how it ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    #[serde(flatten)]
    pub id: StepId,
    pub outcome: Outcome,
}

/// Accumulated outcomes of a run, in the order the steps were attempted
///
/// The engine owns the report while the run is in progress and hands it back
/// by value; it is read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Instance the run was applied to
    pub target: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub steps: Vec<StepRecord>,
}

impl RunReport {
    /// Start an empty report
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            started_at: Utc::now(),
            finished_at: None,
            steps: Vec::new(),
        }
    }

    /// Append the outcome of a step
    pub fn record(&mut self, id: StepId, outcome: Outcome) {
        self.steps.push(StepRecord { id, outcome });
    }

    /// Mark the run as finished
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock duration, if finished
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }

    /// Outcome of the first step matching phase and resource
    pub fn outcome(&self, phase: Phase, resource: &str) -> Option<&Outcome> {
        self.steps
            .iter()
            .find(|s| s.id.phase == phase && s.id.resource == resource)
            .map(|s| &s.outcome)
    }

    /// Steps of one phase
    pub fn phase_steps(&self, phase: Phase) -> impl Iterator<Item = &StepRecord> {
        self.steps.iter().filter(move |s| s.id.phase == phase)
    }

    /// Outcome counts of one phase
    pub fn summary(&self, phase: Phase) -> PhaseSummary {
        let mut summary = PhaseSummary::default();
        for step in self.phase_steps(phase) {
            summary.add(&step.outcome);
        }
        summary
    }

    /// Per-phase counts for every phase that produced at least one step
    pub fn summaries(&self) -> Vec<(Phase, PhaseSummary)> {
        Phase::ALL
            .into_iter()
            .map(|phase| (phase, self.summary(phase)))
            .filter(|(_, summary)| summary.total() > 0)
            .collect()
    }

    /// Counts across all phases
    pub fn totals(&self) -> PhaseSummary {
        let mut totals = PhaseSummary::default();
        for step in &self.steps {
            totals.add(&step.outcome);
        }
        totals
    }

    /// Failed steps, in run order
    pub fn failures(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps.iter().filter(|s| s.outcome.is_failure())
    }

    /// Whether every attempted step succeeded, was skipped or deferred
    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Pretty-printed JSON form of the report
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
