//! Execution planner - orders descriptors into phased steps
//!
//! Planning is pure: it never contacts the remote. Every step carries the
//! fully built request body, so a dry run shows exactly what would be sent.

use crate::descriptor::{DashboardDefinition, DescriptorSet};
use crate::payload;
use crate::types::{ApplyOptions, Phase, StepId};
use serde_json::Value;

/// Dashboard panels attach to when the blueprint declares none
pub const DEFAULT_DASHBOARD: &str = "Overview";

/// What a step does against the remote
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    PatchSettings {
        payload: Value,
    },
    CreateCollection {
        payload: Value,
    },
    CreateField {
        collection: String,
        payload: Value,
    },
    /// Patch relational metadata onto an existing field
    PatchRelation {
        collection: String,
        field: String,
        payload: Value,
    },
    SeedItems {
        collection: String,
        only_if_empty: bool,
        payload: Value,
    },
    /// Reuse the dashboard with this name, or create it
    EnsureDashboard {
        name: String,
        payload: Value,
    },
    /// Payload lacks the dashboard id, which is resolved at run time
    CreatePanel {
        name: String,
        payload: Value,
    },
}

impl Action {
    /// Request body sent for this step
    pub fn payload(&self) -> &Value {
        match self {
            Self::PatchSettings { payload }
            | Self::CreateCollection { payload }
            | Self::CreateField { payload, .. }
            | Self::PatchRelation { payload, .. }
            | Self::SeedItems { payload, .. }
            | Self::EnsureDashboard { payload, .. }
            | Self::CreatePanel { payload, .. } => payload,
        }
    }

    /// HTTP-style verb and endpoint, for display
    pub fn endpoint(&self) -> String {
        match self {
            Self::PatchSettings { .. } => "PATCH /settings".to_string(),
            Self::CreateCollection { .. } => "POST /collections".to_string(),
            Self::CreateField { collection, .. } => format!("POST /fields/{collection}"),
            Self::PatchRelation {
                collection, field, ..
            } => format!("PATCH /fields/{collection}/{field}"),
            Self::SeedItems { collection, .. } => format!("POST /items/{collection}"),
            Self::EnsureDashboard { .. } => "POST /dashboards".to_string(),
            Self::CreatePanel { .. } => "POST /panels".to_string(),
        }
    }
}

/// One unit of work
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub id: StepId,
    /// Human-readable summary
    pub description: String,
    pub action: Action,
}

impl Step {
    fn new(phase: Phase, resource: impl Into<String>, description: String, action: Action) -> Self {
        Self {
            id: StepId::new(phase, resource),
            description,
            action,
        }
    }
}

/// Steps in execution order, grouped by phase
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionPlan {
    pub steps: Vec<Step>,
}

impl ExecutionPlan {
    /// Order a descriptor set into steps
    ///
    /// Phases come out in [`Phase::ALL`] order; phases not selected in
    /// `opts` produce no steps. Within a phase, steps follow the order of
    /// the descriptor lists.
    pub fn build(set: &DescriptorSet, opts: &ApplyOptions) -> Self {
        let mut steps = Vec::new();

        for phase in Phase::ALL {
            if !opts.includes(phase) {
                continue;
            }
            match phase {
                Phase::Settings => plan_settings(set, &mut steps),
                Phase::Collections => plan_collections(set, &mut steps),
                Phase::Relationships => plan_relationships(set, &mut steps),
                Phase::Seed => plan_seeds(set, &mut steps),
                Phase::Dashboard => plan_dashboard(set, &mut steps),
            }
        }

        Self { steps }
    }

    /// Steps of one phase, in order
    pub fn steps_in(&self, phase: Phase) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(move |s| s.id.phase == phase)
    }

    /// Phases that have at least one step, in order
    pub fn phases(&self) -> Vec<Phase> {
        let mut phases: Vec<Phase> = Vec::new();
        for step in &self.steps {
            if phases.last() != Some(&step.id.phase) {
                phases.push(step.id.phase);
            }
        }
        phases
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

fn plan_settings(set: &DescriptorSet, steps: &mut Vec<Step>) {
    if let Some(settings) = &set.settings {
        let label = settings
            .project_name
            .as_deref()
            .map_or_else(|| "Update instance settings".to_string(), |name| {
                format!("Brand instance as \"{name}\"")
            });
        steps.push(Step::new(
            Phase::Settings,
            "settings",
            label,
            Action::PatchSettings {
                payload: payload::settings(settings),
            },
        ));
    }
}

fn plan_collections(set: &DescriptorSet, steps: &mut Vec<Step>) {
    for collection in &set.collections {
        steps.push(Step::new(
            Phase::Collections,
            &collection.name,
            format!("Create collection {}", collection.name),
            Action::CreateCollection {
                payload: payload::collection(collection),
            },
        ));

        for field in collection.explicit_fields() {
            steps.push(Step::new(
                Phase::Collections,
                format!("{}.{}", collection.name, field.name),
                format!(
                    "Create field {}.{} ({})",
                    collection.name,
                    field.name,
                    field.field_type.as_str()
                ),
                Action::CreateField {
                    collection: collection.name.clone(),
                    payload: payload::field(field),
                },
            ));
        }
    }
}

fn plan_relationships(set: &DescriptorSet, steps: &mut Vec<Step>) {
    for rel in &set.relationships {
        steps.push(Step::new(
            Phase::Relationships,
            format!("{}.{}", rel.collection, rel.field),
            format!(
                "Link {}.{} -> {}",
                rel.collection, rel.field, rel.related_collection
            ),
            Action::PatchRelation {
                collection: rel.collection.clone(),
                field: rel.field.clone(),
                payload: payload::relation(rel),
            },
        ));
    }
}

fn plan_seeds(set: &DescriptorSet, steps: &mut Vec<Step>) {
    for batch in &set.seeds {
        let noun = if batch.records.len() == 1 { "record" } else { "records" };
        steps.push(Step::new(
            Phase::Seed,
            &batch.collection,
            format!(
                "Insert {} {noun} into {}{}",
                batch.records.len(),
                batch.collection,
                if batch.only_if_empty { " (if empty)" } else { "" }
            ),
            Action::SeedItems {
                collection: batch.collection.clone(),
                only_if_empty: batch.only_if_empty,
                payload: payload::seed(batch),
            },
        ));
    }
}

fn plan_dashboard(set: &DescriptorSet, steps: &mut Vec<Step>) {
    if set.dashboard.is_none() && set.panels.is_empty() {
        return;
    }

    let dashboard = set.dashboard.clone().unwrap_or_else(|| DashboardDefinition {
        name: DEFAULT_DASHBOARD.to_string(),
        icon: None,
        color: None,
        note: None,
    });
    steps.push(Step::new(
        Phase::Dashboard,
        &dashboard.name,
        format!("Ensure dashboard \"{}\"", dashboard.name),
        Action::EnsureDashboard {
            name: dashboard.name.clone(),
            payload: payload::dashboard(&dashboard),
        },
    ));

    for panel in &set.panels {
        steps.push(Step::new(
            Phase::Dashboard,
            &panel.name,
            format!(
                "Add {} panel \"{}\" over {}",
                panel.visualization.as_str(),
                panel.name,
                panel.visualization.collection()
            ),
            Action::CreatePanel {
                name: panel.name.clone(),
                payload: payload::panel(panel),
            },
        ));
    }
}
