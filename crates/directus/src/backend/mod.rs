//! Backend trait and implementations for the Directus administrative API.
//!
//! [`http::HttpBackend`] talks to a live instance over HTTP. [`MockBackend`]
//! keeps an in-memory model of an instance for tests:
//!
//! ```
//! use directus::backend::{Backend, MockBackend};
//! use directus::{Credentials, ResourceKind};
//! use serde_json::json;
//!
//! let mock = MockBackend::new().with_account("admin@example.com", "secret");
//! let session = mock
//!     .authenticate(&Credentials::password("admin@example.com", "secret"))
//!     .unwrap();
//!
//! let payload = json!({ "collection": "agents", "meta": {} });
//! let first = mock.create(&session, &ResourceKind::Collection, &payload).unwrap();
//! let second = mock.create(&session, &ResourceKind::Collection, &payload).unwrap();
//! assert!(first.is_created());
//! assert!(!second.is_created());
//! ```

pub mod http;

use crate::error::{Error, Result};
use crate::types::{CreateOutcome, Credentials, Query, ResourceKind, Session};
use serde_json::{Value, json};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// Operations the provisioning engine needs from a Directus instance.
///
/// All resource operations take a [`Session`], which can only be obtained
/// from [`Backend::authenticate`].
pub trait Backend: Send + Sync {
    /// Exchange credentials for a session.
    ///
    /// # Errors
    ///
    /// Returns `Error::Auth` if the remote rejects the credentials, or a
    /// transport error if the instance cannot be reached.
    fn authenticate(&self, credentials: &Credentials) -> Result<Session>;

    /// Patch the instance settings singleton.
    fn update_settings(&self, session: &Session, payload: &Value) -> Result<()>;

    /// Create a resource.
    ///
    /// A resource that already exists is reported as
    /// [`CreateOutcome::Conflict`], not as an error.
    fn create(&self, session: &Session, kind: &ResourceKind, payload: &Value)
    -> Result<CreateOutcome>;

    /// Patch an existing resource identified by `id` under `kind`.
    fn update(&self, session: &Session, kind: &ResourceKind, id: &str, payload: &Value)
    -> Result<()>;

    /// Read rows from an endpoint.
    fn read(&self, session: &Session, kind: &ResourceKind, query: &Query) -> Result<Vec<Value>>;

    /// Whether the instance exposes the given endpoint.
    fn supports(&self, session: &Session, kind: &ResourceKind) -> Result<bool>;
}

/// A request observed by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub method: &'static str,
    pub path: String,
}

impl Call {
    fn new(method: &'static str, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    accounts: HashMap<String, String>,
    static_tokens: HashSet<String>,
    sessions: HashSet<String>,
    settings: Option<Value>,
    collections: BTreeSet<String>,
    fields: BTreeSet<(String, String)>,
    relations: HashMap<(String, String), Value>,
    items: HashMap<String, Vec<Value>>,
    dashboards: Vec<Value>,
    panels: Vec<Value>,
    failures: HashMap<(&'static str, String), (u16, String)>,
    field_failures: HashMap<(String, String), (u16, String)>,
    unsupported: HashSet<&'static str>,
    calls: Vec<Call>,
    next_id: u64,
}

impl MockState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn injected(&self, method: &'static str, path: &str) -> Result<()> {
        match self.failures.get(&(method, path.to_string())) {
            Some((status, message)) => Err(Error::Api {
                method,
                path: path.to_string(),
                status: *status,
                code: None,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn injected_field(
        &self,
        method: &'static str,
        path: &str,
        collection: &str,
        field: &str,
    ) -> Result<()> {
        match self
            .field_failures
            .get(&(collection.to_string(), field.to_string()))
        {
            Some((status, message)) => Err(api(method, path, *status, message)),
            None => Ok(()),
        }
    }

    fn require_session(&self, method: &'static str, path: &str, session: &Session) -> Result<()> {
        if self.sessions.contains(session.token()) {
            Ok(())
        } else {
            Err(api(method, path, 401, "Invalid user credentials."))
        }
    }

    fn require_collection(&self, method: &'static str, path: &str, collection: &str) -> Result<()> {
        if self.collections.contains(collection) {
            Ok(())
        } else {
            Err(api(
                method,
                path,
                403,
                &format!("Collection \"{collection}\" doesn't exist"),
            ))
        }
    }
}

fn api(method: &'static str, path: &str, status: u16, message: &str) -> Error {
    Error::Api {
        method,
        path: path.to_string(),
        status,
        code: None,
        message: message.to_string(),
    }
}

fn payload_name<'a>(payload: &'a Value, key: &str) -> Result<&'a str> {
    payload[key]
        .as_str()
        .ok_or_else(|| Error::InvalidResponse(format!("payload is missing `{key}`")))
}

/// In-memory backend for testing without network access.
///
/// Collections, fields, items, dashboards and panels are tracked so repeated
/// creates report conflicts, and every request is recorded in order,
/// including requests that fail.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Create an empty mock instance with no accounts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register an administrator account.
    pub fn with_account(self, email: &str, password: &str) -> Self {
        self.lock()
            .accounts
            .insert(email.to_string(), password.to_string());
        self
    }

    /// Register a valid static token.
    pub fn with_static_token(self, token: &str) -> Self {
        self.lock().static_tokens.insert(token.to_string());
        self
    }

    /// Pre-provision a collection with the given fields.
    pub fn with_collection(self, name: &str, fields: &[&str]) -> Self {
        {
            let mut state = self.lock();
            state.collections.insert(name.to_string());
            state.fields.insert((name.to_string(), "id".to_string()));
            for field in fields {
                state.fields.insert((name.to_string(), (*field).to_string()));
            }
        }
        self
    }

    /// Make `method path` fail with the given status and message.
    pub fn fail(self, method: &'static str, path: &str, status: u16, message: &str) -> Self {
        self.lock()
            .failures
            .insert((method, path.to_string()), (status, message.to_string()));
        self
    }

    /// Make every create or patch of one field fail, leaving its siblings alone.
    pub fn fail_field(self, collection: &str, field: &str, status: u16, message: &str) -> Self {
        self.lock().field_failures.insert(
            (collection.to_string(), field.to_string()),
            (status, message.to_string()),
        );
        self
    }

    /// Pretend the endpoint for `kind` does not exist on this instance.
    pub fn without(self, kind: &ResourceKind) -> Self {
        self.lock().unsupported.insert(kind.label());
        self
    }

    /// All requests received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Position of the first request matching `method path`.
    #[must_use]
    pub fn position(&self, method: &str, path: &str) -> Option<usize> {
        self.lock()
            .calls
            .iter()
            .position(|c| c.method == method && c.path == path)
    }

    /// Last settings payload received.
    #[must_use]
    pub fn settings(&self) -> Option<Value> {
        self.lock().settings.clone()
    }

    /// Whether a collection exists.
    #[must_use]
    pub fn has_collection(&self, name: &str) -> bool {
        self.lock().collections.contains(name)
    }

    /// Whether a field exists.
    #[must_use]
    pub fn has_field(&self, collection: &str, field: &str) -> bool {
        self.lock()
            .fields
            .contains(&(collection.to_string(), field.to_string()))
    }

    /// Relational patch applied to a field, if any.
    #[must_use]
    pub fn relation(&self, collection: &str, field: &str) -> Option<Value> {
        self.lock()
            .relations
            .get(&(collection.to_string(), field.to_string()))
            .cloned()
    }

    /// Rows stored in a collection.
    #[must_use]
    pub fn items(&self, collection: &str) -> Vec<Value> {
        self.lock().items.get(collection).cloned().unwrap_or_default()
    }

    /// Stored dashboards.
    #[must_use]
    pub fn dashboards(&self) -> Vec<Value> {
        self.lock().dashboards.clone()
    }

    /// Stored panels.
    #[must_use]
    pub fn panels(&self) -> Vec<Value> {
        self.lock().panels.clone()
    }
}

impl Backend for MockBackend {
    fn authenticate(&self, credentials: &Credentials) -> Result<Session> {
        let mut state = self.lock();
        match credentials {
            Credentials::Password { email, password } => {
                state.calls.push(Call::new("POST", "/auth/login"));
                state.injected("POST", "/auth/login")?;
                if state.accounts.get(email) != Some(password) {
                    return Err(Error::auth("Invalid user credentials.", Some(401)));
                }
                let token = format!("mock-token-{}", state.next_id());
                state.sessions.insert(token.clone());
                Ok(Session::new(token))
            }
            Credentials::Token(token) => {
                state.calls.push(Call::new("GET", "/users/me"));
                state.injected("GET", "/users/me")?;
                if !state.static_tokens.contains(token) {
                    return Err(Error::auth("Invalid user credentials.", Some(401)));
                }
                state.sessions.insert(token.clone());
                Ok(Session::new(token.clone()))
            }
        }
    }

    fn update_settings(&self, session: &Session, payload: &Value) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::new("PATCH", "/settings"));
        state.require_session("PATCH", "/settings", session)?;
        state.injected("PATCH", "/settings")?;
        state.settings = Some(payload.clone());
        Ok(())
    }

    fn create(
        &self,
        session: &Session,
        kind: &ResourceKind,
        payload: &Value,
    ) -> Result<CreateOutcome> {
        let path = kind.path();
        let mut state = self.lock();
        state.calls.push(Call::new("POST", path.clone()));
        state.require_session("POST", &path, session)?;
        state.injected("POST", &path)?;
        if state.unsupported.contains(kind.label()) {
            return Err(api("POST", &path, 404, &format!("Route {path} doesn't exist.")));
        }

        match kind {
            ResourceKind::Collection => {
                let name = payload_name(payload, "collection")?.to_string();
                if state.collections.contains(&name) {
                    return Ok(CreateOutcome::Conflict {
                        detail: format!("Collection \"{name}\" already exists"),
                    });
                }
                state.collections.insert(name.clone());
                state.fields.insert((name.clone(), "id".to_string()));
                Ok(CreateOutcome::Created { id: Some(name) })
            }
            ResourceKind::Field { collection } | ResourceKind::Relation { collection } => {
                state.require_collection("POST", &path, collection)?;
                let field = payload_name(payload, "field")?.to_string();
                state.injected_field("POST", &path, collection, &field)?;
                let key = (collection.clone(), field.clone());
                if state.fields.contains(&key) {
                    return Ok(CreateOutcome::Conflict {
                        detail: format!(
                            "Field \"{field}\" already exists in collection \"{collection}\""
                        ),
                    });
                }
                state.fields.insert(key);
                Ok(CreateOutcome::Created { id: Some(field) })
            }
            ResourceKind::Items { collection } => {
                state.require_collection("POST", &path, collection)?;
                let records = match payload {
                    Value::Array(records) => records.clone(),
                    record => vec![record.clone()],
                };
                let mut stored = Vec::with_capacity(records.len());
                for mut record in records {
                    let id = state.next_id();
                    record["id"] = json!(id);
                    stored.push(record);
                }
                let id = match (payload, stored.first()) {
                    (Value::Object(_), Some(row)) => Some(row["id"].to_string()),
                    _ => None,
                };
                state.items.entry(collection.clone()).or_default().extend(stored);
                Ok(CreateOutcome::Created { id })
            }
            ResourceKind::Dashboard | ResourceKind::Panel => {
                let id = format!("{}-{}", kind.label(), state.next_id());
                let mut row = payload.clone();
                row["id"] = json!(id);
                if matches!(kind, ResourceKind::Dashboard) {
                    state.dashboards.push(row);
                } else {
                    state.panels.push(row);
                }
                Ok(CreateOutcome::Created { id: Some(id) })
            }
        }
    }

    fn update(
        &self,
        session: &Session,
        kind: &ResourceKind,
        id: &str,
        payload: &Value,
    ) -> Result<()> {
        let path = kind.item_path(id);
        let mut state = self.lock();
        state.calls.push(Call::new("PATCH", path.clone()));
        state.require_session("PATCH", &path, session)?;
        state.injected("PATCH", &path)?;

        match kind {
            ResourceKind::Field { collection } | ResourceKind::Relation { collection } => {
                state.injected_field("PATCH", &path, collection, id)?;
                let key = (collection.clone(), id.to_string());
                if !state.fields.contains(&key) {
                    return Err(api(
                        "PATCH",
                        &path,
                        403,
                        &format!("Field \"{id}\" doesn't exist in collection \"{collection}\""),
                    ));
                }
                state.relations.insert(key, payload.clone());
                Ok(())
            }
            _ => Err(Error::Unsupported(format!("mock update of {kind}"))),
        }
    }

    fn read(&self, session: &Session, kind: &ResourceKind, query: &Query) -> Result<Vec<Value>> {
        let path = kind.path();
        let mut state = self.lock();
        state.calls.push(Call::new("GET", path.clone()));
        state.require_session("GET", &path, session)?;
        state.injected("GET", &path)?;
        if state.unsupported.contains(kind.label()) {
            return Err(api("GET", &path, 404, &format!("Route {path} doesn't exist.")));
        }

        let rows: Vec<Value> = match kind {
            ResourceKind::Collection => state
                .collections
                .iter()
                .map(|c| json!({ "collection": c }))
                .collect(),
            ResourceKind::Field { collection } | ResourceKind::Relation { collection } => state
                .fields
                .iter()
                .filter(|(c, _)| c == collection)
                .map(|(c, f)| json!({ "collection": c, "field": f }))
                .collect(),
            ResourceKind::Items { collection } => {
                state.require_collection("GET", &path, collection)?;
                state.items.get(collection).cloned().unwrap_or_default()
            }
            ResourceKind::Dashboard => state.dashboards.clone(),
            ResourceKind::Panel => state.panels.clone(),
        };

        let limit = query.limit.map_or(usize::MAX, |l| l as usize);
        Ok(rows
            .into_iter()
            .filter(|row| query.matches(row))
            .take(limit)
            .collect())
    }

    fn supports(&self, session: &Session, kind: &ResourceKind) -> Result<bool> {
        let path = kind.path();
        let mut state = self.lock();
        state.calls.push(Call::new("GET", path.clone()));
        state.require_session("GET", &path, session)?;
        Ok(!state.unsupported.contains(kind.label()))
    }
}
