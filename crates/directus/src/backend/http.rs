//! HTTP backend for a live Directus instance.
//!
//! Responses use the Directus envelope: `{ "data": ... }` on success and
//! `{ "errors": [{ "message": ..., "extensions": { "code": ... } }] }` on
//! failure. Non-2xx statuses are decoded from the envelope rather than
//! surfaced as bare transport errors, so the remote's diagnostic reaches
//! the caller.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{CreateOutcome, Credentials, Query, ResourceKind, Session, id_to_string};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

/// Default global timeout for a single request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

type Response = ureq::http::Response<ureq::Body>;

/// Blocking HTTP backend.
///
/// # Example
///
/// ```no_run
/// use directus::backend::Backend;
/// use directus::backend::http::HttpBackend;
/// use directus::Credentials;
///
/// let backend = HttpBackend::new("http://localhost:8055");
/// let session = backend
///     .authenticate(&Credentials::password("admin@example.com", "secret"))
///     .unwrap();
/// ```
pub struct HttpBackend {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// Instance URL without trailing slash.
    base_url: String,
}

impl HttpBackend {
    /// Create a backend with the default timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a backend with a custom global request timeout.
    #[must_use]
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Get the instance URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, session: &Session, path: &str, query: &Query) -> Result<Value> {
        log::debug!("GET {path}");
        let mut request = self
            .agent
            .get(self.url(path))
            .header("Authorization", session.bearer());
        for (key, value) in query.to_pairs() {
            request = request.query(key, value);
        }
        decode("GET", path, request.call()?)
    }

    fn post(&self, session: Option<&Session>, path: &str, payload: &Value) -> Result<Value> {
        log::debug!("POST {path}");
        let mut request = self.agent.post(self.url(path));
        if let Some(session) = session {
            request = request.header("Authorization", session.bearer());
        }
        decode("POST", path, request.send_json(payload)?)
    }

    fn patch(&self, session: &Session, path: &str, payload: &Value) -> Result<Value> {
        log::debug!("PATCH {path}");
        let response = self
            .agent
            .patch(self.url(path))
            .header("Authorization", session.bearer())
            .send_json(payload)?;
        decode("PATCH", path, response)
    }
}

impl Backend for HttpBackend {
    fn authenticate(&self, credentials: &Credentials) -> Result<Session> {
        match credentials {
            Credentials::Password { email, password } => {
                let payload = json!({ "email": email, "password": password });
                let data = self.post(None, "/auth/login", &payload).map_err(into_auth)?;
                let token = data["access_token"].as_str().ok_or_else(|| {
                    Error::InvalidResponse("login response has no access_token".to_string())
                })?;
                Ok(Session::new(token))
            }
            Credentials::Token(token) => {
                let session = Session::new(token.clone());
                self.get(&session, "/users/me", &Query::new().fields(&["id"]))
                    .map_err(into_auth)?;
                Ok(session)
            }
        }
    }

    fn update_settings(&self, session: &Session, payload: &Value) -> Result<()> {
        self.patch(session, "/settings", payload).map(|_| ())
    }

    fn create(
        &self,
        session: &Session,
        kind: &ResourceKind,
        payload: &Value,
    ) -> Result<CreateOutcome> {
        match self.post(Some(session), &kind.path(), payload) {
            Ok(data) => Ok(CreateOutcome::Created {
                id: created_id(&data),
            }),
            Err(err) if err.is_conflict() => Ok(CreateOutcome::Conflict {
                detail: conflict_detail(err),
            }),
            Err(err) => Err(err),
        }
    }

    fn update(
        &self,
        session: &Session,
        kind: &ResourceKind,
        id: &str,
        payload: &Value,
    ) -> Result<()> {
        self.patch(session, &kind.item_path(id), payload).map(|_| ())
    }

    fn read(&self, session: &Session, kind: &ResourceKind, query: &Query) -> Result<Vec<Value>> {
        match self.get(session, &kind.path(), query)? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            row => Ok(vec![row]),
        }
    }

    fn supports(&self, session: &Session, kind: &ResourceKind) -> Result<bool> {
        match self.get(session, &kind.path(), &Query::new().limit(0)) {
            Ok(_) => Ok(true),
            Err(Error::Api {
                status: 403 | 404, ..
            }) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    #[serde(default)]
    extensions: Option<ApiErrorExtensions>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorExtensions {
    code: Option<String>,
}

fn decode(method: &'static str, path: &str, mut response: Response) -> Result<Value> {
    let status = response.status().as_u16();
    let body = response.body_mut().read_to_string()?;

    if !(200..300).contains(&status) {
        return Err(api_error(method, path, status, &body));
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    let envelope: Value = serde_json::from_str(&body)?;
    Ok(envelope.get("data").cloned().unwrap_or(Value::Null))
}

fn api_error(method: &'static str, path: &str, status: u16, body: &str) -> Error {
    let first = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.errors.into_iter().next());

    let (message, code) = match first {
        Some(err) => (err.message, err.extensions.and_then(|ext| ext.code)),
        None if body.trim().is_empty() => (format!("HTTP {status}"), None),
        None => (body.trim().to_string(), None),
    };

    Error::Api {
        method,
        path: path.to_string(),
        status,
        code,
        message,
    }
}

fn into_auth(err: Error) -> Error {
    match err {
        Error::Api {
            status, message, ..
        } => Error::auth(message, Some(status)),
        other => other,
    }
}

fn conflict_detail(err: Error) -> String {
    match err {
        Error::Api { message, .. } => message,
        other => other.to_string(),
    }
}

/// Primary key of a created resource.
///
/// Collections answer with their name, fields with their field name and
/// items/dashboards/panels with `id`. Bulk creates return an array and have
/// no single id.
fn created_id(data: &Value) -> Option<String> {
    ["id", "collection", "field"]
        .iter()
        .find_map(|key| data.get(key).and_then(id_to_string))
}
