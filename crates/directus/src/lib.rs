//! # directus
//!
//! Blocking client for the administrative API of a Directus instance.
//!
//! The crate exposes the operations a provisioning tool needs: login,
//! settings patches, and create/update/read against collections, fields,
//! items, dashboards and panels.
//!
//! ## Example
//!
//! ```no_run
//! use directus::backend::{Backend, http::HttpBackend};
//! use directus::{CreateOutcome, Credentials, ResourceKind};
//! use serde_json::json;
//!
//! let backend = HttpBackend::new("http://localhost:8055");
//! let session = backend
//!     .authenticate(&Credentials::password("admin@example.com", "secret"))
//!     .expect("login failed");
//!
//! let payload = json!({ "collection": "agents", "meta": { "icon": "smart_toy" } });
//! match backend.create(&session, &ResourceKind::Collection, &payload) {
//!     Ok(CreateOutcome::Created { .. }) => println!("created"),
//!     Ok(CreateOutcome::Conflict { detail }) => println!("exists: {detail}"),
//!     Err(e) => eprintln!("failed: {e}"),
//! }
//! ```
//!
//! Use [`backend::MockBackend`] to exercise callers without a network.

#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod types;

pub use backend::Backend;
pub use error::{Error, ErrorCategory, Result};
pub use types::{CreateOutcome, Credentials, Query, ResourceKind, Session};
