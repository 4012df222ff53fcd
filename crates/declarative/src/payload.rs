//! Request bodies built from descriptors
//!
//! Descriptors are typed; the remote API takes loosely shaped JSON. All the
//! translation between the two happens here so the planner and executor
//! never touch raw field names.

use crate::descriptor::{
    Choice, CollectionDefinition, DashboardDefinition, DashboardPanelDefinition, FieldDefinition,
    InstanceSettings, Interface, RelationshipDefinition, SeedBatch, Visualization,
};
use serde_json::{Map, Value, json};

/// Settings patch for instance branding
pub fn settings(settings: &InstanceSettings) -> Value {
    let mut body = Map::new();
    insert_opt(&mut body, "project_name", settings.project_name.as_deref());
    insert_opt(&mut body, "project_url", settings.project_url.as_deref());
    insert_opt(&mut body, "project_color", settings.project_color.as_deref());
    insert_opt(&mut body, "custom_css", settings.custom_css.as_deref());
    insert_opt(&mut body, "public_note", settings.public_note.as_deref());
    if !settings.translations.is_empty() {
        body.insert("translation_strings".into(), json!(settings.translations));
    }
    Value::Object(body)
}

/// Collection create request
///
/// The empty `schema` object asks the remote for a real table, which brings
/// the implicit `id` primary key with it. A declared `id` field is sent along
/// so non-integer keys (e.g. `uuid`) take effect.
pub fn collection(def: &CollectionDefinition) -> Value {
    let meta = &def.meta;
    let mut body = Map::new();
    body.insert("collection".into(), json!(def.name));
    insert_opt(&mut body, "icon", meta.icon.as_deref());
    insert_opt(&mut body, "color", meta.color.as_deref());
    insert_opt(&mut body, "note", meta.note.as_deref());
    insert_opt(&mut body, "display_template", meta.display_template.as_deref());
    if let Some(sort) = meta.sort {
        body.insert("sort".into(), json!(sort));
    }
    if meta.hidden {
        body.insert("hidden".into(), json!(true));
    }

    let mut request = json!({
        "collection": def.name,
        "meta": body,
        "schema": {},
    });
    if let Some(pk) = def.fields.iter().find(|f| f.is_implicit_primary_key()) {
        request["fields"] = json!([field(pk)]);
    }
    request
}

/// Field create request, scoped to its collection by the endpoint
pub fn field(def: &FieldDefinition) -> Value {
    let mut meta = Map::new();
    meta.insert("interface".into(), json!(def.interface.as_str()));

    let options = field_options(def);
    if !options.is_empty() {
        meta.insert("options".into(), Value::Object(options));
    }
    if let Some(width) = def.display.width {
        meta.insert("width".into(), json!(width.as_str()));
    }
    insert_flag(&mut meta, "required", def.constraints.required);
    insert_flag(&mut meta, "readonly", def.display.readonly);
    insert_flag(&mut meta, "hidden", def.display.hidden);
    insert_opt(&mut meta, "note", def.display.note.as_deref());

    let mut schema = Map::new();
    if let Some(default) = &def.constraints.default_value {
        schema.insert("default_value".into(), default.clone());
    }
    insert_flag(&mut schema, "is_primary_key", def.constraints.primary_key);
    insert_flag(&mut schema, "has_auto_increment", def.constraints.auto_increment);
    if def.constraints.required {
        schema.insert("is_nullable".into(), json!(false));
    }

    let mut body = Map::new();
    body.insert("field".into(), json!(def.name));
    body.insert("type".into(), json!(def.field_type.as_str()));
    body.insert("meta".into(), Value::Object(meta));
    if !schema.is_empty() {
        body.insert("schema".into(), Value::Object(schema));
    }
    Value::Object(body)
}

fn field_options(def: &FieldDefinition) -> Map<String, Value> {
    let mut options = Map::new();
    match &def.interface {
        Interface::Input { placeholder, slug } => {
            insert_opt(&mut options, "placeholder", placeholder.as_deref());
            insert_flag(&mut options, "slug", *slug);
        }
        Interface::InputCode { language } => {
            options.insert("language".into(), json!(language));
        }
        Interface::SelectDropdown { choices } => {
            options.insert(
                "choices".into(),
                Value::Array(choices.iter().map(choice).collect()),
            );
        }
        Interface::InputMultiline
        | Interface::InputRichTextHtml
        | Interface::SelectDropdownM2o
        | Interface::Datetime
        | Interface::Tags
        | Interface::Slider => {}
    }
    if let Some(min) = def.constraints.min {
        options.insert("min".into(), number(min));
    }
    if let Some(max) = def.constraints.max {
        options.insert("max".into(), number(max));
    }
    options
}

fn choice(choice: &Choice) -> Value {
    let mut body = Map::new();
    body.insert("text".into(), json!(choice.text));
    body.insert("value".into(), choice.value.clone());
    insert_opt(&mut body, "color", choice.color.as_deref());
    Value::Object(body)
}

/// Relational patch on the owning field
pub fn relation(def: &RelationshipDefinition) -> Value {
    let fk = def.foreign_key();
    json!({
        "meta": {
            "interface": def.kind.interface(),
            "special": [def.kind.special()],
            "options": { "template": def.display_template },
        },
        "schema": {
            "foreign_key_column": fk.column,
            "foreign_key_table": fk.table,
        },
    })
}

/// Bulk insert body: the whole batch as one array
pub fn seed(batch: &SeedBatch) -> Value {
    Value::Array(
        batch
            .records
            .iter()
            .map(|record| Value::Object(record.clone()))
            .collect(),
    )
}

/// Dashboard create request
pub fn dashboard(def: &DashboardDefinition) -> Value {
    let mut body = Map::new();
    body.insert("name".into(), json!(def.name));
    insert_opt(&mut body, "icon", def.icon.as_deref());
    insert_opt(&mut body, "color", def.color.as_deref());
    insert_opt(&mut body, "note", def.note.as_deref());
    Value::Object(body)
}

/// Panel create request, without the owning dashboard
///
/// The dashboard id is only known at run time; see [`attach_dashboard`].
pub fn panel(def: &DashboardPanelDefinition) -> Value {
    let mut body = Map::new();
    body.insert("name".into(), json!(def.name));
    insert_opt(&mut body, "icon", def.icon.as_deref());
    insert_opt(&mut body, "color", def.color.as_deref());
    body.insert("type".into(), json!(def.visualization.as_str()));
    body.insert("show_header".into(), json!(true));
    body.insert("position_x".into(), json!(def.layout.x));
    body.insert("position_y".into(), json!(def.layout.y));
    body.insert("width".into(), json!(def.layout.width));
    body.insert("height".into(), json!(def.layout.height));
    body.insert("options".into(), visualization_options(&def.visualization));
    Value::Object(body)
}

/// Set the owning dashboard on a panel request
pub fn attach_dashboard(panel: &Value, dashboard_id: &str) -> Value {
    let mut panel = panel.clone();
    if let Value::Object(body) = &mut panel {
        body.insert("dashboard".into(), json!(dashboard_id));
    }
    panel
}

fn visualization_options(viz: &Visualization) -> Value {
    let mut options = Map::new();
    options.insert("collection".into(), json!(viz.collection()));
    match viz {
        Visualization::Metric {
            field,
            function,
            filter,
            ..
        } => {
            options.insert("field".into(), json!(field));
            options.insert("function".into(), json!(function.as_str()));
            if let Some(filter) = filter {
                options.insert("filter".into(), filter.clone());
            }
        }
        Visualization::List {
            limit,
            sort,
            filter,
            ..
        } => {
            options.insert("limit".into(), json!(limit));
            if !sort.is_empty() {
                options.insert("sort".into(), json!(sort));
            }
            if let Some(filter) = filter {
                options.insert("filter".into(), filter.clone());
            }
        }
        Visualization::Chart { x_axis, y_axis, .. } => {
            options.insert("x_axis".into(), json!(x_axis));
            options.insert("y_axis".into(), json!(y_axis));
        }
    }
    Value::Object(options)
}

fn insert_opt(map: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        map.insert(key.to_string(), json!(value));
    }
}

fn insert_flag(map: &mut Map<String, Value>, key: &str, flag: bool) {
    if flag {
        map.insert(key.to_string(), json!(true));
    }
}

/// Whole numbers are sent as integers so `min = 0` stays `0`, not `0.0`
#[allow(clippy::cast_possible_truncation)]
fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        json!(value as i64)
    } else {
        json!(value)
    }
}
