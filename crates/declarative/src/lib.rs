//! # Declarative
//!
//! Phased, fault-isolated provisioning of a Directus instance from a static
//! descriptor set.
//!
//! ## Core Concepts
//!
//! - **DescriptorSet**: everything the instance should contain (settings,
//!   collections and fields, relationships, seed batches, dashboard panels)
//! - **ExecutionPlan**: the descriptor set ordered into steps, phase by phase
//! - **Executor**: walks the plan against a [`directus::Backend`], turning
//!   every remote failure into a report entry instead of an abort
//! - **RunReport**: per-step outcomes and per-phase counts
//!
//! ## Example
//!
//! ```
//! use declarative::{ApplyOptions, DescriptorSet, ExecutionPlan, NoProgress, Phase, provision};
//! use directus::Credentials;
//! use directus::backend::MockBackend;
//!
//! let set = DescriptorSet::from_toml_str(r#"
//!     [[collections]]
//!     name = "agents"
//!
//!     [[collections.fields]]
//!     name = "name"
//!     type = "string"
//! "#).unwrap();
//!
//! let plan = ExecutionPlan::build(&set, &ApplyOptions::default());
//! let backend = MockBackend::new().with_account("admin@example.com", "secret");
//! let report = provision(
//!     &backend,
//!     &Credentials::password("admin@example.com", "secret"),
//!     "http://localhost:8055",
//!     &plan,
//!     &mut NoProgress,
//! ).unwrap();
//!
//! assert_eq!(report.summary(Phase::Collections).applied, 2);
//! ```
//!
//! Only authentication can make [`provision`] return an error.

pub mod context;
pub mod descriptor;
pub mod executor;
pub mod payload;
pub mod planner;
pub mod report;
pub mod types;
pub mod validate;

// Re-export main types at crate root
pub use context::{NoProgress, ProgressCallback};
pub use descriptor::{DescriptorError, DescriptorSet};
pub use executor::{execute, provision};
pub use planner::{Action, ExecutionPlan, Step};
pub use report::{RunReport, StepRecord};
pub use types::{ApplyOptions, Outcome, Phase, PhaseSummary, StepError, StepId};
pub use validate::{Issue, Severity, has_errors, validate};
