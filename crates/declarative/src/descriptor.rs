//! Resource descriptor set - the static declaration of what to provision
//!
//! A [`DescriptorSet`] is pure data. It is usually loaded from a TOML or
//! JSON blueprint and never mutated while a run is in progress.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the primary key every collection gets on creation.
pub const PRIMARY_KEY: &str = "id";

/// Errors raised while loading a blueprint
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    /// Blueprint file could not be read
    #[error("could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or shape error
    #[error("invalid TOML blueprint: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON syntax or shape error
    #[error("invalid JSON blueprint: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything a run should converge the remote instance to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DescriptorSet {
    /// Instance branding and metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<InstanceSettings>,

    #[serde(default)]
    pub collections: Vec<CollectionDefinition>,

    #[serde(default)]
    pub relationships: Vec<RelationshipDefinition>,

    #[serde(default)]
    pub seeds: Vec<SeedBatch>,

    /// Dashboard the panels are attached to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard: Option<DashboardDefinition>,

    #[serde(default)]
    pub panels: Vec<DashboardPanelDefinition>,
}

impl DescriptorSet {
    /// Parse a TOML blueprint
    pub fn from_toml_str(content: &str) -> Result<Self, DescriptorError> {
        Ok(toml::from_str(content)?)
    }

    /// Parse a JSON blueprint
    pub fn from_json_str(content: &str) -> Result<Self, DescriptorError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load a blueprint file, choosing the format by extension (`.json` or TOML)
    pub fn load(path: &Path) -> Result<Self, DescriptorError> {
        let content = std::fs::read_to_string(path).map_err(|source| DescriptorError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    /// Find a collection by name
    pub fn collection(&self, name: &str) -> Option<&CollectionDefinition> {
        self.collections.iter().find(|c| c.name == name)
    }

    /// Whether nothing at all is declared
    pub fn is_empty(&self) -> bool {
        self.settings.is_none()
            && self.collections.is_empty()
            && self.relationships.is_empty()
            && self.seeds.is_empty()
            && self.dashboard.is_none()
            && self.panels.is_empty()
    }
}

// ============================================================================
// Instance settings
// ============================================================================

/// Branding applied with a single settings patch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_css: Option<String>,
    /// Markdown shown on the public login page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_note: Option<String>,
    /// locale -> (translation key -> text)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub translations: BTreeMap<String, BTreeMap<String, String>>,
}

// ============================================================================
// Collections and fields
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionDefinition {
    pub name: String,

    #[serde(default)]
    pub meta: CollectionMeta,

    /// Fields in display order
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl CollectionDefinition {
    /// Find a field by name
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields the engine creates explicitly (everything but the primary key)
    pub fn explicit_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|f| !f.is_implicit_primary_key())
    }

    /// Whether the collection declares or implies a field with this name
    pub fn has_field(&self, name: &str) -> bool {
        name == PRIMARY_KEY || self.field(name).is_some()
    }
}

/// Display metadata of a collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// e.g. `{{name}} - {{status}}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_template: Option<String>,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDefinition {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default)]
    pub interface: Interface,

    #[serde(default)]
    pub display: FieldDisplay,

    #[serde(default)]
    pub constraints: FieldConstraints,
}

impl FieldDefinition {
    /// The `id` field exists as a side effect of collection creation
    pub fn is_implicit_primary_key(&self) -> bool {
        self.name == PRIMARY_KEY
    }
}

/// Primitive column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Integer,
    String,
    Text,
    Json,
    Timestamp,
    Date,
    Decimal,
    Float,
    Uuid,
}

impl FieldType {
    /// Type name as the remote API expects it
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::String => "string",
            Self::Text => "text",
            Self::Json => "json",
            Self::Timestamp => "timestamp",
            Self::Date => "date",
            Self::Decimal => "decimal",
            Self::Float => "float",
            Self::Uuid => "uuid",
        }
    }

    /// Whether the type holds numbers
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Decimal | Self::Float)
    }
}

/// Presentation hint, with the options that belong to each interface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Interface {
    Input {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        placeholder: Option<String>,
        /// Restrict input to URL-safe characters
        #[serde(default)]
        slug: bool,
    },
    InputMultiline,
    InputCode {
        #[serde(default = "default_code_language")]
        language: String,
    },
    InputRichTextHtml,
    SelectDropdown {
        #[serde(default)]
        choices: Vec<Choice>,
    },
    SelectDropdownM2o,
    Datetime,
    Tags,
    Slider,
}

fn default_code_language() -> String {
    "json".to_string()
}

impl Default for Interface {
    fn default() -> Self {
        Self::Input {
            placeholder: None,
            slug: false,
        }
    }
}

impl Interface {
    /// Interface identifier as the remote API expects it
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input { .. } => "input",
            Self::InputMultiline => "input-multiline",
            Self::InputCode { .. } => "input-code",
            Self::InputRichTextHtml => "input-rich-text-html",
            Self::SelectDropdown { .. } => "select-dropdown",
            Self::SelectDropdownM2o => "select-dropdown-m2o",
            Self::Datetime => "datetime",
            Self::Tags => "tags",
            Self::Slider => "slider",
        }
    }
}

/// One option of a dropdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Choice {
    pub text: String,
    /// String or number stored in the column
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Width {
    Half,
    Full,
    Fill,
}

impl Width {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Half => "half",
            Self::Full => "full",
            Self::Fill => "fill",
        }
    }
}

/// Form layout flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDisplay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<Width>,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Schema constraints of a field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldConstraints {
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub auto_increment: bool,
    /// Literal default, or a database expression such as `CURRENT_TIMESTAMP`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

// ============================================================================
// Relationships
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationshipDefinition {
    /// Owning collection
    pub collection: String,
    /// Owning field, created in the collections phase
    pub field: String,
    pub related_collection: String,

    #[serde(default)]
    pub kind: Cardinality,

    /// Defaults to the owning field and collection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKey>,

    #[serde(default = "default_relation_template")]
    pub display_template: String,
}

fn default_relation_template() -> String {
    "{{name}}".to_string()
}

impl RelationshipDefinition {
    /// Foreign-key naming sent with the relational patch
    pub fn foreign_key(&self) -> ForeignKey {
        self.foreign_key.clone().unwrap_or_else(|| ForeignKey {
            column: self.field.clone(),
            table: self.collection.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cardinality {
    #[default]
    ManyToOne,
}

impl Cardinality {
    /// Value of the field's `special` flag
    pub fn special(&self) -> &'static str {
        match self {
            Self::ManyToOne => "m2o",
        }
    }

    /// Interface used to edit the relation
    pub fn interface(&self) -> &'static str {
        match self {
            Self::ManyToOne => "select-dropdown-m2o",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForeignKey {
    pub column: String,
    pub table: String,
}

// ============================================================================
// Seed data
// ============================================================================

/// Records inserted into one collection with a single bulk call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedBatch {
    pub collection: String,

    /// Skip the batch when the collection already has rows
    #[serde(default)]
    pub only_if_empty: bool,

    #[serde(default)]
    pub records: Vec<Map<String, Value>>,
}

// ============================================================================
// Dashboards
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DashboardDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DashboardPanelDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub layout: PanelLayout,
    pub visualization: Visualization,
}

/// Grid position and size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PanelLayout {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Visualization {
    Metric {
        collection: String,
        field: String,
        #[serde(default)]
        function: Aggregate,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<Value>,
    },
    List {
        collection: String,
        #[serde(default = "default_list_limit")]
        limit: u32,
        #[serde(default)]
        sort: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<Value>,
    },
    #[serde(rename = "line-chart")]
    Chart {
        collection: String,
        x_axis: String,
        y_axis: String,
    },
}

fn default_list_limit() -> u32 {
    10
}

impl Visualization {
    /// Panel type identifier as the remote API expects it
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metric { .. } => "metric",
            Self::List { .. } => "list",
            Self::Chart { .. } => "line-chart",
        }
    }

    /// Collection the panel reads from
    pub fn collection(&self) -> &str {
        match self {
            Self::Metric { collection, .. }
            | Self::List { collection, .. }
            | Self::Chart { collection, .. } => collection,
        }
    }

    /// Fields the panel reads
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Self::Metric { field, .. } => vec![field.as_str()],
            Self::List { .. } => Vec::new(),
            Self::Chart { x_axis, y_axis, .. } => vec![x_axis.as_str(), y_axis.as_str()],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    #[default]
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const AGENTS: &str = r#"
[[collections]]
name = "agents"
meta = { icon = "smart_toy", sort = 1 }

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

[collections.fields.interface]
kind = "select-dropdown"
choices = [
  { text = "Active", value = "active", color = "green" },
  { text = "Inactive", value = "inactive" },
]
"#;

    #[test]
    fn test_parse_toml_collection() {
        let set = DescriptorSet::from_toml_str(AGENTS).unwrap();
        let agents = set.collection("agents").unwrap();

        assert_eq!(agents.meta.icon.as_deref(), Some("smart_toy"));
        assert_eq!(agents.fields.len(), 3);
        assert_eq!(agents.fields[1].interface, Interface::default());
        assert!(agents.fields[1].constraints.required);

        match &agents.fields[2].interface {
            Interface::SelectDropdown { choices } => {
                assert_eq!(choices.len(), 2);
                assert_eq!(choices[0].color.as_deref(), Some("green"));
            }
            other => panic!("unexpected interface {other:?}"),
        }
    }

    #[test]
    fn test_explicit_fields_skip_primary_key() {
        let set = DescriptorSet::from_toml_str(AGENTS).unwrap();
        let names: Vec<_> = set.collections[0]
            .explicit_fields()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["name", "status"]);
        assert!(set.collections[0].has_field("id"));
        assert!(!set.collections[0].has_field("owner"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = DescriptorSet::from_toml_str("[[collections]]\nname = \"a\"\ncolour = \"red\"\n")
            .unwrap_err();
        assert!(matches!(err, DescriptorError::Toml(_)));
    }

    #[test]
    fn test_parse_json_relationship_defaults() {
        let set = DescriptorSet::from_json_str(
            r#"{ "relationships": [
                { "collection": "tasks", "field": "project_id", "related_collection": "projects" }
            ] }"#,
        )
        .unwrap();
        let rel = &set.relationships[0];
        assert_eq!(rel.kind, Cardinality::ManyToOne);
        assert_eq!(rel.display_template, "{{name}}");
        assert_eq!(
            rel.foreign_key(),
            ForeignKey {
                column: "project_id".into(),
                table: "tasks".into()
            }
        );
    }

    #[test]
    fn test_parse_panels() {
        let set = DescriptorSet::from_toml_str(
            r#"
[[panels]]
name = "Task Queue"
layout = { x = 13, y = 1, width = 12, height = 8 }
visualization = { type = "list", collection = "agent_tasks", sort = ["-created_at"] }

[[panels]]
name = "Success Rates"
layout = { x = 1, y = 9, width = 24, height = 12 }
visualization = { type = "line-chart", collection = "agents", x_axis = "name", y_axis = "success_rate" }
"#,
        )
        .unwrap();

        match &set.panels[0].visualization {
            Visualization::List { limit, sort, .. } => {
                assert_eq!(*limit, 10);
                assert_eq!(sort, &vec!["-created_at".to_string()]);
            }
            other => panic!("unexpected visualization {other:?}"),
        }
        assert_eq!(set.panels[1].visualization.as_str(), "line-chart");
        assert_eq!(
            set.panels[1].visualization.fields(),
            vec!["name", "success_rate"]
        );
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("blueprint.toml");
        std::fs::write(&toml_path, AGENTS).unwrap();
        assert_eq!(DescriptorSet::load(&toml_path).unwrap().collections.len(), 1);

        let json_path = dir.path().join("blueprint.JSON");
        let mut file = std::fs::File::create(&json_path).unwrap();
        write!(file, r#"{{ "collections": [{{ "name": "docs" }}] }}"#).unwrap();
        assert_eq!(
            DescriptorSet::load(&json_path).unwrap().collections[0].name,
            "docs"
        );

        let missing = DescriptorSet::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, DescriptorError::Io { .. }));
    }

    #[test]
    fn test_empty_set() {
        assert!(DescriptorSet::default().is_empty());
        assert!(!DescriptorSet::from_toml_str(AGENTS).unwrap().is_empty());
    }
}
