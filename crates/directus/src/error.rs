//! Error types for Directus API operations.
//!
//! Errors are categorized so callers can tell a rejected login from a
//! transport failure, and a duplicate resource from a genuine rejection.

use std::fmt;

/// Result type alias for Directus operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network-related errors (connection refused, DNS, 5xx).
    Network,
    /// Credentials rejected or token invalid.
    Auth,
    /// Resource already exists.
    Conflict,
    /// Endpoint or resource not found.
    NotFound,
    /// Authenticated but not allowed.
    Permission,
    /// Payload rejected by the remote schema.
    Validation,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::Auth => "Authentication failed",
            Self::Conflict => "Already exists",
            Self::NotFound => "Not found",
            Self::Permission => "Permission denied",
            Self::Validation => "Rejected by remote schema",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check the instance URL and that the server is reachable",
            Self::Auth => "Verify ADMIN_EMAIL / ADMIN_PASSWORD or the static token",
            Self::Conflict => "No action needed - resource is already provisioned",
            Self::NotFound => "Make sure the collection or field was created first",
            Self::Permission => "Use an account with the administrator role",
            Self::Validation => "Check the blueprint definition against the remote schema",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to a Directus instance.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Login or token verification failed.
    #[error("authentication failed: {message}")]
    Auth {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// HTTP transport failed before a response was received.
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// The API answered with an error envelope.
    #[error("{method} {path} returned {status}: {message}")]
    Api {
        /// HTTP method of the failed request.
        method: &'static str,
        /// Request path, relative to the instance URL.
        path: String,
        /// HTTP status code.
        status: u16,
        /// Directus error code (`extensions.code`), if present.
        code: Option<String>,
        /// Error message reported by the remote.
        message: String,
    },

    /// Response body could not be decoded.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// The backend does not expose this capability.
    #[error("{0} is not supported by this backend")]
    Unsupported(String),
}

impl Error {
    /// Create an authentication error.
    pub fn auth(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Auth {
            message: message.into(),
            status,
        }
    }

    /// HTTP status code attached to this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Auth { status, .. } | Error::Http { status, .. } => *status,
            Error::Api { status, .. } => Some(*status),
            Error::InvalidResponse(_) | Error::Unsupported(_) => None,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Auth { .. } => ErrorCategory::Auth,
            Error::Http { .. } => ErrorCategory::Network,
            Error::Api {
                status,
                code,
                message,
                ..
            } => {
                if code.as_deref() == Some("RECORD_NOT_UNIQUE")
                    || message.contains("already exists")
                {
                    return ErrorCategory::Conflict;
                }
                match status {
                    401 => ErrorCategory::Auth,
                    403 => ErrorCategory::Permission,
                    404 => ErrorCategory::NotFound,
                    409 => ErrorCategory::Conflict,
                    400 | 422 => ErrorCategory::Validation,
                    500..=599 => ErrorCategory::Network,
                    _ => ErrorCategory::Other,
                }
            }
            Error::InvalidResponse(_) => ErrorCategory::Other,
            Error::Unsupported(_) => ErrorCategory::NotFound,
        }
    }

    /// Whether the remote reported that the resource already exists.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.category() == ErrorCategory::Conflict
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {code}"),
                status: Some(code),
            },
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
