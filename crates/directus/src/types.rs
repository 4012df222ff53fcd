//! Core types shared by all backends.

use serde_json::Value;
use std::fmt;

/// Credentials used to open a [`Session`].
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Administrator email and password (`POST /auth/login`).
    Password { email: String, password: String },
    /// Pre-issued static token, verified against `/users/me`.
    Token(String),
}

impl Credentials {
    /// Create password credentials.
    pub fn password(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Password {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Identity shown in logs and messages (never the secret).
    #[must_use]
    pub fn identity(&self) -> &str {
        match self {
            Self::Password { email, .. } => email,
            Self::Token(_) => "static token",
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password { email, .. } => f
                .debug_struct("Password")
                .field("email", email)
                .field("password", &"<redacted>")
                .finish(),
            Self::Token(_) => f.debug_tuple("Token").field(&"<redacted>").finish(),
        }
    }
}

/// An authenticated session.
///
/// Every resource call takes a `&Session`, so no call can be issued
/// before authentication succeeded.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
}

impl Session {
    /// Wrap an access token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Value for the `Authorization` header.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// The raw access token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Remote resource endpoints the provisioning engine writes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// `/collections`
    Collection,
    /// `/fields/{collection}`
    Field { collection: String },
    /// Relational patch of an existing field, `/fields/{collection}/{field}`
    Relation { collection: String },
    /// `/items/{collection}`
    Items { collection: String },
    /// `/dashboards`
    Dashboard,
    /// `/panels`
    Panel,
}

impl ResourceKind {
    /// Field endpoint scoped to a collection.
    pub fn field(collection: impl Into<String>) -> Self {
        Self::Field {
            collection: collection.into(),
        }
    }

    /// Relation patch endpoint scoped to a collection.
    pub fn relation(collection: impl Into<String>) -> Self {
        Self::Relation {
            collection: collection.into(),
        }
    }

    /// Item endpoint of a collection.
    pub fn items(collection: impl Into<String>) -> Self {
        Self::Items {
            collection: collection.into(),
        }
    }

    /// Endpoint path relative to the instance URL.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Collection => "/collections".to_string(),
            Self::Field { collection } | Self::Relation { collection } => {
                format!("/fields/{collection}")
            }
            Self::Items { collection } => format!("/items/{collection}"),
            Self::Dashboard => "/dashboards".to_string(),
            Self::Panel => "/panels".to_string(),
        }
    }

    /// Path of a single resource under this endpoint.
    #[must_use]
    pub fn item_path(&self, id: &str) -> String {
        format!("{}/{}", self.path(), id)
    }

    /// Short name of the kind.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Collection => "collection",
            Self::Field { .. } => "field",
            Self::Relation { .. } => "relation",
            Self::Items { .. } => "items",
            Self::Dashboard => "dashboard",
            Self::Panel => "panel",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.path())
    }
}

/// Result of a create call that reached the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// Resource was created. `id` is the primary key reported back, if any.
    Created { id: Option<String> },
    /// Resource already existed.
    Conflict { detail: String },
}

impl CreateOutcome {
    /// Check if the resource was newly created.
    #[must_use]
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created { .. })
    }
}

/// Read query: equality filters, field selection and a row limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub filters: Vec<(String, String)>,
    pub fields: Vec<String>,
    pub limit: Option<u32>,
}

impl Query {
    /// Create an unrestricted query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an `_eq` filter.
    pub fn filter_eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Restrict returned fields.
    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| (*f).to_string()).collect();
        self
    }

    /// Limit the number of returned rows.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Encode as Directus query-string pairs.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .filters
            .iter()
            .map(|(field, value)| (format!("filter[{field}][_eq]"), value.clone()))
            .collect();
        if !self.fields.is_empty() {
            pairs.push(("fields".to_string(), self.fields.join(",")));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }

    /// Check whether a row satisfies every filter.
    #[must_use]
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|(field, expected)| match &row[field] {
            Value::String(s) => s == expected,
            Value::Null => false,
            other => other.to_string() == *expected,
        })
    }
}

/// Render a JSON primary key as a string id.
#[must_use]
pub fn id_to_string(id: &Value) -> Option<String> {
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_kind_paths() {
        assert_eq!(ResourceKind::Collection.path(), "/collections");
        assert_eq!(ResourceKind::field("agents").path(), "/fields/agents");
        assert_eq!(
            ResourceKind::relation("tasks").item_path("project_id"),
            "/fields/tasks/project_id"
        );
        assert_eq!(ResourceKind::items("projects").path(), "/items/projects");
        assert_eq!(ResourceKind::Panel.path(), "/panels");
    }

    #[test]
    fn test_query_pairs() {
        let query = Query::new()
            .filter_eq("name", "Command Center")
            .fields(&["id", "name"])
            .limit(1);
        assert_eq!(
            query.to_pairs(),
            vec![
                (
                    "filter[name][_eq]".to_string(),
                    "Command Center".to_string()
                ),
                ("fields".to_string(), "id,name".to_string()),
                ("limit".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_matches() {
        let query = Query::new().filter_eq("dashboard", "7");
        assert!(query.matches(&json!({ "dashboard": 7 })));
        assert!(query.matches(&json!({ "dashboard": "7" })));
        assert!(!query.matches(&json!({ "dashboard": null })));
        assert!(Query::new().matches(&json!({})));
    }

    #[test]
    fn test_secrets_are_redacted() {
        let creds = Credentials::password("admin@example.com", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("admin@example.com"));
        assert!(!debug.contains("hunter2"));

        let session = Session::new("secret-token");
        assert!(!format!("{session:?}").contains("secret-token"));
        assert_eq!(session.bearer(), "Bearer secret-token");
    }

    #[test]
    fn test_id_to_string() {
        assert_eq!(id_to_string(&json!(3)), Some("3".to_string()));
        assert_eq!(id_to_string(&json!("abc")), Some("abc".to_string()));
        assert_eq!(id_to_string(&json!(null)), None);
    }
}
