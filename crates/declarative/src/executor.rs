//! Execution engine - applies a plan phase by phase
//!
//! Every step is fault-isolated: a failing remote call becomes a
//! [`Outcome::Failed`] entry in the report and the run moves on. The only
//! error that escapes [`provision`] is a failed login, which happens before
//! any resource call.

use crate::context::ProgressCallback;
use crate::payload;
use crate::planner::{Action, ExecutionPlan, Step};
use crate::report::RunReport;
use crate::types::{Outcome, PhaseSummary, StepError};
use directus::{Backend, CreateOutcome, Credentials, Query, ResourceKind, Session};
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::HashSet;

/// Authenticate, then execute the plan
///
/// # Errors
///
/// Returns the authentication error unchanged. No resource call is made in
/// that case.
pub fn provision<P: ProgressCallback>(
    backend: &dyn Backend,
    credentials: &Credentials,
    target: &str,
    plan: &ExecutionPlan,
    progress: &mut P,
) -> directus::Result<RunReport> {
    info!("Authenticating as {} against {target}", credentials.identity());
    let session = backend.authenticate(credentials)?;
    Ok(execute(backend, &session, target, plan, progress))
}

/// Execute a plan with an established session
///
/// Phases run in plan order and each step is attempted exactly once,
/// whatever happened to the steps before it.
pub fn execute<P: ProgressCallback>(
    backend: &dyn Backend,
    session: &Session,
    target: &str,
    plan: &ExecutionPlan,
    progress: &mut P,
) -> RunReport {
    let mut report = RunReport::new(target);
    let mut run = Run {
        backend,
        session,
        dashboard: DashboardState::Unresolved,
    };

    for phase in plan.phases() {
        let steps: Vec<&Step> = plan.steps_in(phase).collect();
        info!("{}: {} step(s)", phase.title(), steps.len());
        progress.on_phase_start(phase, steps.len());

        let mut summary = PhaseSummary::default();
        for step in steps {
            progress.on_step_start(step);
            let outcome = run.apply(step);
            match &outcome {
                Outcome::Failed { error } => warn!("{}: {error}", step.id),
                other => debug!("{}: {other}", step.id),
            }
            summary.add(&outcome);
            progress.on_step_complete(step, &outcome);
            report.record(step.id.clone(), outcome);
        }

        progress.on_phase_complete(phase, &summary);
    }

    report.finish();
    report
}

/// Where panels go, settled by the dashboard step
enum DashboardState {
    Unresolved,
    /// The instance has no panel endpoint
    Unsupported(String),
    /// The endpoint check, dashboard creation or panel listing failed
    Unavailable(String),
    Ready {
        id: String,
        /// Panel names already on the dashboard
        panels: HashSet<String>,
    },
}

struct Run<'a> {
    backend: &'a dyn Backend,
    session: &'a Session,
    dashboard: DashboardState,
}

impl Run<'_> {
    fn apply(&mut self, step: &Step) -> Outcome {
        match &step.action {
            Action::PatchSettings { payload } => {
                match self.backend.update_settings(self.session, payload) {
                    Ok(()) => Outcome::Applied,
                    Err(e) => failed(StepError::Settings(e.to_string())),
                }
            }
            Action::CreateCollection { payload } => {
                self.create(&ResourceKind::Collection, payload, StepError::ResourceCreate)
            }
            Action::CreateField {
                collection,
                payload,
            } => self.create(
                &ResourceKind::field(collection.as_str()),
                payload,
                StepError::ResourceCreate,
            ),
            Action::PatchRelation {
                collection,
                field,
                payload,
            } => {
                let kind = ResourceKind::relation(collection.as_str());
                match self.backend.update(self.session, &kind, field, payload) {
                    Ok(()) => Outcome::Applied,
                    Err(e) => failed(StepError::RelationshipApply(e.to_string())),
                }
            }
            Action::SeedItems {
                collection,
                only_if_empty,
                payload,
            } => self.seed(collection, *only_if_empty, payload),
            Action::EnsureDashboard { name, payload } => self.ensure_dashboard(name, payload),
            Action::CreatePanel { name, payload } => self.create_panel(name, payload),
        }
    }

    fn create(
        &self,
        kind: &ResourceKind,
        payload: &Value,
        on_error: fn(String) -> StepError,
    ) -> Outcome {
        match self.backend.create(self.session, kind, payload) {
            Ok(CreateOutcome::Created { .. }) => Outcome::Applied,
            Ok(CreateOutcome::Conflict { detail }) => Outcome::SkippedExists { detail },
            Err(e) => failed(on_error(e.to_string())),
        }
    }

    fn seed(&self, collection: &str, only_if_empty: bool, payload: &Value) -> Outcome {
        let kind = ResourceKind::items(collection);

        if only_if_empty {
            let first_row = Query::new().fields(&["id"]).limit(1);
            match self.backend.read(self.session, &kind, &first_row) {
                Ok(rows) if !rows.is_empty() => {
                    return Outcome::SkippedExists {
                        detail: format!("{collection} already has records"),
                    };
                }
                Ok(_) => {}
                Err(e) => return failed(StepError::SeedBatch(e.to_string())),
            }
        }

        self.create(&kind, payload, StepError::SeedBatch)
    }

    fn ensure_dashboard(&mut self, name: &str, payload: &Value) -> Outcome {
        match self.backend.supports(self.session, &ResourceKind::Panel) {
            Ok(true) => {}
            Ok(false) => {
                let reason = "instance does not expose dashboard panels".to_string();
                info!("Dashboard phase deferred: {reason}");
                self.dashboard = DashboardState::Unsupported(reason.clone());
                return Outcome::Deferred { reason };
            }
            Err(e) => {
                self.dashboard = DashboardState::Unavailable(e.to_string());
                return failed(StepError::DashboardCreate(e.to_string()));
            }
        }

        let (outcome, id) = match self.find_dashboard(name) {
            Ok(Some(id)) => (
                Outcome::SkippedExists {
                    detail: format!("dashboard \"{name}\" already exists"),
                },
                id,
            ),
            Ok(None) => match self.backend.create(self.session, &ResourceKind::Dashboard, payload) {
                Ok(CreateOutcome::Created { id: Some(id) }) => (Outcome::Applied, id),
                Ok(CreateOutcome::Created { id: None }) => {
                    return self.dashboard_failed("create response carried no id".to_string());
                }
                Ok(CreateOutcome::Conflict { detail }) => match self.find_dashboard(name) {
                    Ok(Some(id)) => (Outcome::SkippedExists { detail }, id),
                    Ok(None) => return self.dashboard_failed(detail),
                    Err(e) => return self.dashboard_failed(e.to_string()),
                },
                Err(e) => return self.dashboard_failed(e.to_string()),
            },
            Err(e) => return self.dashboard_failed(e.to_string()),
        };

        let query = Query::new()
            .filter_eq("dashboard", id.as_str())
            .fields(&["id", "name"]);
        // Without the existing names, panels cannot be deduplicated.
        self.dashboard = match self.backend.read(self.session, &ResourceKind::Panel, &query) {
            Ok(rows) => DashboardState::Ready {
                id,
                panels: rows
                    .iter()
                    .filter_map(|row| row["name"].as_str().map(str::to_string))
                    .collect::<HashSet<_>>(),
            },
            Err(e) => {
                warn!("Could not list panels of dashboard {id}: {e}");
                DashboardState::Unavailable(format!("could not list existing panels: {e}"))
            }
        };
        outcome
    }

    fn find_dashboard(&self, name: &str) -> directus::Result<Option<String>> {
        let query = Query::new().filter_eq("name", name).fields(&["id", "name"]).limit(1);
        let rows = self
            .backend
            .read(self.session, &ResourceKind::Dashboard, &query)?;
        Ok(rows
            .first()
            .and_then(|row| directus::types::id_to_string(&row["id"])))
    }

    fn dashboard_failed(&mut self, message: String) -> Outcome {
        self.dashboard = DashboardState::Unavailable(message.clone());
        failed(StepError::DashboardCreate(message))
    }

    fn create_panel(&mut self, name: &str, payload: &Value) -> Outcome {
        let (id, existing) = match &mut self.dashboard {
            DashboardState::Ready { id, panels } => (id.clone(), panels),
            DashboardState::Unsupported(reason) => {
                return Outcome::Deferred {
                    reason: reason.clone(),
                };
            }
            DashboardState::Unavailable(message) => {
                return failed(StepError::PanelCreate(format!(
                    "dashboard unavailable: {message}"
                )));
            }
            DashboardState::Unresolved => {
                return failed(StepError::PanelCreate(
                    "no dashboard was resolved".to_string(),
                ));
            }
        };

        if existing.contains(name) {
            return Outcome::SkippedExists {
                detail: format!("panel \"{name}\" already on dashboard"),
            };
        }

        let body = payload::attach_dashboard(payload, &id);
        match self.backend.create(self.session, &ResourceKind::Panel, &body) {
            Ok(CreateOutcome::Created { .. }) => {
                existing.insert(name.to_string());
                Outcome::Applied
            }
            Ok(CreateOutcome::Conflict { detail }) => Outcome::SkippedExists { detail },
            Err(e) => failed(StepError::PanelCreate(e.to_string())),
        }
    }
}

fn failed(error: StepError) -> Outcome {
    Outcome::Failed { error }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoProgress;
    use crate::descriptor::DescriptorSet;
    use crate::types::{ApplyOptions, Phase};
    use directus::backend::MockBackend;

    const TARGET: &str = "http://localhost:8055";

    const AGENTS: &str = r#"
[[collections]]
name = "agents"

[[collections.fields]]
name = "id"
type = "integer"
constraints = { primary_key = true, auto_increment = true }

[[collections.fields]]
name = "name"
type = "string"
constraints = { required = true }

[[collections.fields]]
name = "status"
type = "string"
constraints = { default_value = "inactive" }
"#;

    const PROJECTS: &str = r#"
[settings]
project_name = "Command Center"

[[collections]]
name = "projects"

[[collections.fields]]
name = "name"
type = "string"

[[collections]]
name = "tasks"

[[collections.fields]]
name = "title"
type = "string"

[[collections.fields]]
name = "project_id"
type = "integer"

[[relationships]]
collection = "tasks"
field = "owner_id"
related_collection = "projects"

[[relationships]]
collection = "tasks"
field = "project_id"
related_collection = "projects"

[[seeds]]
collection = "missing"
records = [{ name = "lost" }]

[[seeds]]
collection = "projects"
only_if_empty = true
records = [{ name = "Data Migration" }, { name = "Mobile App Launch" }]

[dashboard]
name = "Command Center"

[[panels]]
name = "Open Tasks"
layout = { x = 1, y = 1, width = 12, height = 8 }
visualization = { type = "list", collection = "tasks" }

[[panels]]
name = "Project Count"
layout = { x = 13, y = 1, width = 12, height = 8 }
visualization = { type = "metric", collection = "projects", field = "id" }
"#;

    fn mock() -> MockBackend {
        MockBackend::new().with_account("admin@example.com", "secret")
    }

    fn credentials() -> Credentials {
        Credentials::password("admin@example.com", "secret")
    }

    fn run(mock: &MockBackend, blueprint: &str) -> RunReport {
        let set = DescriptorSet::from_toml_str(blueprint).unwrap();
        let plan = ExecutionPlan::build(&set, &ApplyOptions::default());
        provision(mock, &credentials(), TARGET, &plan, &mut NoProgress).unwrap()
    }

    #[test]
    fn test_fresh_collection_applied() {
        let mock = mock();
        let report = run(&mock, AGENTS);

        assert_eq!(report.outcome(Phase::Collections, "agents"), Some(&Outcome::Applied));
        assert_eq!(report.outcome(Phase::Collections, "agents.name"), Some(&Outcome::Applied));
        assert_eq!(report.outcome(Phase::Collections, "agents.status"), Some(&Outcome::Applied));
        assert!(report.outcome(Phase::Collections, "agents.id").is_none());
        assert_eq!(report.steps.len(), 3);
        assert_eq!(report.summary(Phase::Relationships).total(), 0);
        assert_eq!(report.summary(Phase::Seed).total(), 0);
        assert!(report.finished_at.is_some());
        assert!(mock.has_collection("agents"));
        assert!(mock.has_field("agents", "status"));
    }

    #[test]
    fn test_settings_patch_applied() {
        let mock = mock();
        let report = run(&mock, PROJECTS);

        assert_eq!(report.outcome(Phase::Settings, "settings"), Some(&Outcome::Applied));
        let settings = mock.settings().unwrap();
        assert_eq!(settings["project_name"], "Command Center");
    }

    #[test]
    fn test_reapply_is_skipped_not_failed() {
        let mock = mock();
        run(&mock, AGENTS);
        let second = run(&mock, AGENTS);

        for resource in ["agents", "agents.name", "agents.status"] {
            assert!(
                matches!(
                    second.outcome(Phase::Collections, resource),
                    Some(Outcome::SkippedExists { .. })
                ),
                "{resource} should be skipped"
            );
        }
        assert_eq!(second.totals().failed, 0);
    }

    #[test]
    fn test_auth_failure_is_fatal_and_silent() {
        let mock = mock();
        let set = DescriptorSet::from_toml_str(PROJECTS).unwrap();
        let plan = ExecutionPlan::build(&set, &ApplyOptions::default());

        let err = provision(
            &mock,
            &Credentials::password("admin@example.com", "wrong"),
            TARGET,
            &plan,
            &mut NoProgress,
        )
        .unwrap_err();

        assert!(matches!(err, directus::Error::Auth { .. }));
        assert_eq!(mock.calls().len(), 1);
        assert_eq!(mock.calls()[0].path, "/auth/login");
    }

    #[test]
    fn test_static_token_session() {
        let mock = MockBackend::new().with_static_token("static");
        let set = DescriptorSet::from_toml_str(AGENTS).unwrap();
        let plan = ExecutionPlan::build(&set, &ApplyOptions::default());

        let report = provision(
            &mock,
            &Credentials::Token("static".into()),
            TARGET,
            &plan,
            &mut NoProgress,
        )
        .unwrap();
        assert_eq!(report.totals().applied, 3);
        assert_eq!(mock.calls()[0].path, "/users/me");
    }

    #[test]
    fn test_relationship_follows_owning_field() {
        let mock = mock();
        run(&mock, PROJECTS);

        let field = mock.position("POST", "/fields/tasks").unwrap();
        let patch = mock.position("PATCH", "/fields/tasks/project_id").unwrap();
        assert!(field < patch);
    }

    #[test]
    fn test_missing_owner_fails_only_that_relationship() {
        let mock = mock();
        let report = run(&mock, PROJECTS);

        // owner_id is declared first, so the later relationship runs after a failure
        match report.outcome(Phase::Relationships, "tasks.owner_id") {
            Some(Outcome::Failed {
                error: StepError::RelationshipApply(detail),
            }) => assert!(detail.contains("owner_id")),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(
            report.outcome(Phase::Relationships, "tasks.project_id"),
            Some(&Outcome::Applied)
        );
        assert!(mock.relation("tasks", "project_id").is_some());
        assert!(
            mock.position("PATCH", "/fields/tasks/owner_id").unwrap()
                < mock.position("PATCH", "/fields/tasks/project_id").unwrap()
        );
    }

    #[test]
    fn test_failed_field_does_not_stop_its_siblings() {
        let mock = mock().fail_field("tasks", "title", 500, "disk full");
        let report = run(&mock, PROJECTS);

        match report.outcome(Phase::Collections, "tasks.title") {
            Some(Outcome::Failed {
                error: StepError::ResourceCreate(detail),
            }) => assert!(detail.contains("disk full")),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(
            report.outcome(Phase::Collections, "tasks.project_id"),
            Some(&Outcome::Applied)
        );
        assert!(!mock.has_field("tasks", "title"));
        assert!(mock.has_field("tasks", "project_id"));
        assert_eq!(report.summary(Phase::Collections).failed, 1);
    }

    #[test]
    fn test_failures_do_not_stop_later_steps_or_phases() {
        let mock = mock()
            .fail("PATCH", "/settings", 500, "settings store offline")
            .fail("POST", "/collections", 503, "schema locked");
        let report = run(&mock, PROJECTS);

        assert!(matches!(
            report.outcome(Phase::Settings, "settings"),
            Some(Outcome::Failed {
                error: StepError::Settings(_)
            })
        ));
        // Collections fail, yet every field was still attempted.
        assert_eq!(report.summary(Phase::Collections).failed, 5);
        assert!(mock.position("POST", "/fields/tasks").is_some());
        assert_eq!(report.summary(Phase::Relationships).total(), 2);
        assert_eq!(report.summary(Phase::Seed).total(), 2);
        assert_eq!(report.summary(Phase::Dashboard).total(), 3);
    }

    #[test]
    fn test_seed_batches_are_isolated() {
        let mock = mock();
        let report = run(&mock, PROJECTS);

        assert!(matches!(
            report.outcome(Phase::Seed, "missing"),
            Some(Outcome::Failed {
                error: StepError::SeedBatch(_)
            })
        ));
        assert_eq!(report.outcome(Phase::Seed, "projects"), Some(&Outcome::Applied));
        assert_eq!(mock.items("projects").len(), 2);
    }

    #[test]
    fn test_only_if_empty_seeds_once() {
        let mock = mock();
        run(&mock, PROJECTS);
        let second = run(&mock, PROJECTS);

        assert!(matches!(
            second.outcome(Phase::Seed, "projects"),
            Some(Outcome::SkippedExists { .. })
        ));
        assert_eq!(mock.items("projects").len(), 2);
    }

    #[test]
    fn test_dashboard_and_panels_created_once() {
        let mock = mock();
        let first = run(&mock, PROJECTS);

        assert_eq!(first.outcome(Phase::Dashboard, "Command Center"), Some(&Outcome::Applied));
        assert_eq!(first.outcome(Phase::Dashboard, "Open Tasks"), Some(&Outcome::Applied));
        assert_eq!(mock.dashboards().len(), 1);
        let dashboard_id = mock.dashboards()[0]["id"].clone();
        assert!(mock.panels().iter().all(|p| p["dashboard"] == dashboard_id));

        let second = run(&mock, PROJECTS);
        assert_eq!(second.summary(Phase::Dashboard).skipped, 3);
        assert_eq!(mock.dashboards().len(), 1);
        assert_eq!(mock.panels().len(), 2);
    }

    #[test]
    fn test_dashboard_deferred_without_panel_endpoint() {
        let mock = mock().without(&ResourceKind::Panel);
        let report = run(&mock, PROJECTS);

        let summary = report.summary(Phase::Dashboard);
        assert_eq!(summary.deferred, 3);
        assert_eq!(summary.failed, 0);
        assert!(mock.position("POST", "/dashboards").is_none());
        assert!(mock.position("POST", "/panels").is_none());
    }

    #[test]
    fn test_failed_dashboard_fails_its_panels() {
        let mock = mock().fail("POST", "/dashboards", 500, "boom");
        let report = run(&mock, PROJECTS);

        assert!(matches!(
            report.outcome(Phase::Dashboard, "Command Center"),
            Some(Outcome::Failed {
                error: StepError::DashboardCreate(_)
            })
        ));
        match report.outcome(Phase::Dashboard, "Open Tasks") {
            Some(Outcome::Failed {
                error: StepError::PanelCreate(detail),
            }) => assert!(detail.starts_with("dashboard unavailable")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_unlisted_panels_are_not_duplicated() {
        let mock = mock();
        run(&mock, PROJECTS);
        assert_eq!(mock.panels().len(), 2);

        let mock = mock.fail("GET", "/panels", 503, "panels offline");
        let report = run(&mock, PROJECTS);

        assert!(matches!(
            report.outcome(Phase::Dashboard, "Command Center"),
            Some(Outcome::SkippedExists { .. })
        ));
        match report.outcome(Phase::Dashboard, "Project Count") {
            Some(Outcome::Failed {
                error: StepError::PanelCreate(detail),
            }) => assert!(detail.contains("could not list existing panels")),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(report.summary(Phase::Dashboard).failed, 2);
        assert_eq!(mock.panels().len(), 2);
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl ProgressCallback for Recorder {
        fn on_phase_start(&mut self, phase: Phase, steps: usize) {
            self.events.push(format!("start {phase} {steps}"));
        }
        fn on_step_start(&mut self, step: &Step) {
            self.events.push(format!("step {}", step.id));
        }
        fn on_step_complete(&mut self, step: &Step, outcome: &Outcome) {
            self.events.push(format!("done {} {}", step.id, outcome.label()));
        }
        fn on_phase_complete(&mut self, phase: Phase, summary: &PhaseSummary) {
            self.events.push(format!("end {phase} {}", summary.total()));
        }
    }

    #[test]
    fn test_progress_events_in_order() {
        let mock = mock();
        let set = DescriptorSet::from_toml_str(AGENTS).unwrap();
        let plan = ExecutionPlan::build(&set, &ApplyOptions::default());
        let mut recorder = Recorder::default();

        provision(&mock, &credentials(), TARGET, &plan, &mut recorder).unwrap();

        assert_eq!(
            recorder.events,
            vec![
                "start collections 3",
                "step collections/agents",
                "done collections/agents applied",
                "step collections/agents.name",
                "done collections/agents.name applied",
                "step collections/agents.status",
                "done collections/agents.status applied",
                "end collections 3",
            ]
        );
    }
}
