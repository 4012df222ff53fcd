//! Static checks on a descriptor set
//!
//! Validation never contacts the remote. References to collections that the
//! blueprint does not declare are only warnings, since they may already
//! exist on the instance. Anything that is certain to fail at run time is an
//! error.

use crate::descriptor::{
    CollectionDefinition, DescriptorSet, FieldDefinition, Interface, Visualization,
};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

/// Collection and field names
static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").unwrap());

/// `#RGB` or `#RRGGBB`
static HEX_COLOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#(?:[0-9A-Fa-f]{3}|[0-9A-Fa-f]{6})$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// One finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    /// e.g. `collections.agents.status`
    pub location: String,
    pub message: String,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

impl Issue {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[derive(Default)]
struct Findings {
    issues: Vec<Issue>,
}

impl Findings {
    fn error(&mut self, location: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Error, location.into(), message.into());
    }

    fn warn(&mut self, location: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Warning, location.into(), message.into());
    }

    fn push(&mut self, severity: Severity, location: String, message: String) {
        self.issues.push(Issue {
            severity,
            location,
            message,
        });
    }

    fn color(&mut self, location: &str, color: Option<&str>) {
        if let Some(color) = color
            && !HEX_COLOR_RE.is_match(color)
        {
            self.error(location, format!("'{color}' is not a hex color"));
        }
    }
}

/// Check a descriptor set, errors first
pub fn validate(set: &DescriptorSet) -> Vec<Issue> {
    let mut findings = Findings::default();

    if let Some(settings) = &set.settings {
        findings.color("settings.project_color", settings.project_color.as_deref());
    }

    let mut names = HashSet::new();
    for collection in &set.collections {
        if !names.insert(collection.name.as_str()) {
            findings.error(
                format!("collections.{}", collection.name),
                "collection declared more than once",
            );
        }
        check_collection(collection, &mut findings);
    }

    check_relationships(set, &mut findings);
    check_seeds(set, &mut findings);
    check_panels(set, &mut findings);

    let mut issues = findings.issues;
    issues.sort_by_key(|issue| issue.severity);
    issues
}

/// Whether any finding is an error
pub fn has_errors(issues: &[Issue]) -> bool {
    issues.iter().any(Issue::is_error)
}

fn check_collection(collection: &CollectionDefinition, findings: &mut Findings) {
    let location = format!("collections.{}", collection.name);
    if !IDENTIFIER_RE.is_match(&collection.name) {
        findings.error(
            &location,
            "name must be lowercase letters, digits and underscores, starting with a letter",
        );
    }
    findings.color(&format!("{location}.meta.color"), collection.meta.color.as_deref());

    let mut fields = HashSet::new();
    for field in &collection.fields {
        if !fields.insert(field.name.as_str()) {
            findings.error(
                format!("{location}.{}", field.name),
                "field declared more than once",
            );
        }
        check_field(&location, field, findings);
    }
}

fn check_field(collection: &str, field: &FieldDefinition, findings: &mut Findings) {
    let location = format!("{collection}.{}", field.name);
    let constraints = &field.constraints;

    if !IDENTIFIER_RE.is_match(&field.name) {
        findings.error(&location, "field name is not a valid identifier");
    }

    if constraints.primary_key && !field.is_implicit_primary_key() {
        findings.error(
            &location,
            "only the implicit `id` field can be the primary key",
        );
    }

    if let (Some(min), Some(max)) = (constraints.min, constraints.max)
        && min > max
    {
        findings.error(&location, format!("min ({min}) is greater than max ({max})"));
    }
    if (constraints.min.is_some() || constraints.max.is_some()) && !field.field_type.is_numeric() {
        findings.warn(
            &location,
            format!("bounds have no effect on a {} field", field.field_type.as_str()),
        );
    }

    if let Interface::SelectDropdown { choices } = &field.interface {
        if choices.is_empty() {
            findings.warn(&location, "select-dropdown without choices");
        }
        let mut values = HashSet::new();
        for choice in choices {
            if !values.insert(choice.value.to_string()) {
                findings.warn(&location, format!("duplicate choice value {}", choice.value));
            }
        }
    }
}

fn check_relationships(set: &DescriptorSet, findings: &mut Findings) {
    let mut owners = HashSet::new();
    for rel in &set.relationships {
        let location = format!("relationships.{}.{}", rel.collection, rel.field);

        if !owners.insert((rel.collection.as_str(), rel.field.as_str())) {
            findings.error(&location, "relationship declared more than once");
        }

        match set.collection(&rel.collection) {
            Some(owner) if !owner.has_field(&rel.field) => findings.error(
                &location,
                format!(
                    "owning field '{}' is not declared on '{}'",
                    rel.field, rel.collection
                ),
            ),
            Some(_) => {}
            None => findings.warn(
                &location,
                format!("collection '{}' is not declared here", rel.collection),
            ),
        }

        if set.collection(&rel.related_collection).is_none() {
            findings.warn(
                &location,
                format!(
                    "related collection '{}' is not declared here",
                    rel.related_collection
                ),
            );
        }
    }
}

fn check_seeds(set: &DescriptorSet, findings: &mut Findings) {
    let mut seen = HashSet::new();
    for batch in &set.seeds {
        let location = format!("seeds.{}", batch.collection);

        if !seen.insert(batch.collection.as_str()) {
            findings.warn(&location, "more than one batch for this collection");
        }
        if batch.records.is_empty() {
            findings.warn(&location, "batch has no records");
        }

        let Some(collection) = set.collection(&batch.collection) else {
            findings.warn(&location, "collection is not declared here");
            continue;
        };

        let mut unknown: Vec<&str> = batch
            .records
            .iter()
            .flat_map(|record| record.keys())
            .filter(|key| !collection.has_field(key))
            .map(String::as_str)
            .collect();
        unknown.sort_unstable();
        unknown.dedup();
        for key in unknown {
            findings.error(&location, format!("records use undeclared field '{key}'"));
        }
    }
}

fn check_panels(set: &DescriptorSet, findings: &mut Findings) {
    if let Some(dashboard) = &set.dashboard {
        findings.color("dashboard.color", dashboard.color.as_deref());
    }

    let mut names = HashSet::new();
    for panel in &set.panels {
        let location = format!("panels.{}", panel.name);

        if !names.insert(panel.name.as_str()) {
            findings.error(
                &location,
                "panel names must be unique; the second one would be skipped",
            );
        }
        if panel.layout.width == 0 || panel.layout.height == 0 {
            findings.error(&location, "panel has zero width or height");
        }
        findings.color(&format!("{location}.color"), panel.color.as_deref());

        let viz = &panel.visualization;
        let Some(collection) = set.collection(viz.collection()) else {
            findings.warn(
                &location,
                format!("collection '{}' is not declared here", viz.collection()),
            );
            continue;
        };
        for field in viz.fields() {
            if !collection.has_field(field) {
                findings.error(
                    &location,
                    format!("field '{field}' is not declared on '{}'", collection.name),
                );
            }
        }
        if let Visualization::List { sort, .. } = viz {
            for key in sort {
                let field = key.trim_start_matches('-');
                if !collection.has_field(field) {
                    findings.error(&location, format!("sort field '{field}' is not declared"));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issues(blueprint: &str) -> Vec<Issue> {
        validate(&DescriptorSet::from_toml_str(blueprint).unwrap())
    }

    fn messages(issues: &[Issue]) -> Vec<String> {
        issues.iter().map(ToString::to_string).collect()
    }

    const CLEAN: &str = r##"
[settings]
project_color = "#FF6B6B"

[[collections]]
name = "projects"
meta = { color = "#4ECDC4" }

[[collections.fields]]
name = "name"
type = "string"

[[collections.fields]]
name = "progress"
type = "integer"
interface = { kind = "slider" }
constraints = { min = 0, max = 100 }

[[collections]]
name = "tasks"

[[collections.fields]]
name = "project_id"
type = "integer"

[[relationships]]
collection = "tasks"
field = "project_id"
related_collection = "projects"

[[seeds]]
collection = "projects"
records = [{ name = "Data Migration", progress = 10 }]

[[panels]]
name = "Progress"
layout = { x = 1, y = 1, width = 12, height = 8 }
visualization = { type = "line-chart", collection = "projects", x_axis = "name", y_axis = "progress" }
"##;

    #[test]
    fn test_clean_blueprint() {
        assert!(issues(CLEAN).is_empty(), "{:?}", issues(CLEAN));
    }

    #[test]
    fn test_bad_identifiers_and_duplicates() {
        let found = issues(
            r#"
[[collections]]
name = "Agents"

[[collections.fields]]
name = "status"
type = "string"

[[collections.fields]]
name = "status"
type = "string"

[[collections]]
name = "Agents"
"#,
        );
        assert!(has_errors(&found));
        let messages = messages(&found);
        assert!(messages.iter().any(|m| m.contains("lowercase letters")));
        assert!(messages.iter().any(|m| m == "collections.Agents.status: field declared more than once"));
        assert!(messages.iter().any(|m| m == "collections.Agents: collection declared more than once"));
    }

    #[test]
    fn test_bounds() {
        let found = issues(
            r#"
[[collections]]
name = "agents"

[[collections.fields]]
name = "success_rate"
type = "float"
constraints = { min = 100, max = 0 }

[[collections.fields]]
name = "name"
type = "string"
constraints = { max = 10 }
"#,
        );
        assert_eq!(found[0].severity, Severity::Error);
        assert!(found[0].message.contains("min (100) is greater than max (0)"));
        assert_eq!(found[1].severity, Severity::Warning);
        assert_eq!(found[1].location, "collections.agents.name");
    }

    #[test]
    fn test_relationship_owner_must_be_declared() {
        let found = issues(
            r#"
[[collections]]
name = "tasks"

[[relationships]]
collection = "tasks"
field = "owner_id"
related_collection = "users"
"#,
        );
        assert_eq!(found.len(), 2);
        assert!(found[0].is_error());
        assert!(found[0].message.contains("owner_id"));
        assert_eq!(found[1].severity, Severity::Warning);
        assert!(found[1].message.contains("users"));
    }

    #[test]
    fn test_seed_unknown_field() {
        let found = issues(
            r#"
[[collections]]
name = "projects"

[[collections.fields]]
name = "name"
type = "string"

[[seeds]]
collection = "projects"
records = [{ id = 1, name = "a", budget = 10 }, { name = "b", budget = 5 }]
"#,
        );
        assert_eq!(
            messages(&found),
            vec!["seeds.projects: records use undeclared field 'budget'"]
        );
    }

    #[test]
    fn test_panel_checks() {
        let found = issues(
            r##"
[[collections]]
name = "agents"

[[panels]]
name = "Rates"
color = "teal"
layout = { x = 1, y = 1, width = 0, height = 8 }
visualization = { type = "metric", collection = "agents", field = "success_rate" }

[[panels]]
name = "Rates"
layout = { x = 1, y = 9, width = 12, height = 8 }
visualization = { type = "list", collection = "agent_tasks" }
"##,
        );
        let messages = messages(&found);
        assert!(messages.iter().any(|m| m.contains("zero width")));
        assert!(messages.iter().any(|m| m.contains("'teal' is not a hex color")));
        assert!(messages.iter().any(|m| m.contains("field 'success_rate'")));
        assert!(messages.iter().any(|m| m.contains("must be unique")));
        assert_eq!(found.last().unwrap().severity, Severity::Warning);
    }
}
