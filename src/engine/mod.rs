//! Execution engine for provisor
//!
//! The engine wraps the declarative executor with console output:
//! 1. Displaying - Show the plan, phase by phase
//! 2. Confirming - Ask before touching the instance
//! 3. Executing - Run the phases and summarize the report

pub mod display;
pub mod executor;

pub use executor::{ExecuteOptions, execute};
