//! Progress reporting hooks
//!
//! The engine never prints. Callers that want console output implement
//! [`ProgressCallback`]; tests and library users pass [`NoProgress`].

use crate::planner::Step;
use crate::types::{Outcome, Phase, PhaseSummary};

/// Progress callback for a provisioning run
///
/// Calls arrive strictly in order: a phase start, then a start/complete pair
/// per step, then the phase completion with its counts.
pub trait ProgressCallback: Send {
    /// Called before the first step of a phase
    fn on_phase_start(&mut self, phase: Phase, steps: usize);

    /// Called before a step's remote call
    fn on_step_start(&mut self, step: &Step);

    /// Called once the step's outcome is known
    fn on_step_complete(&mut self, step: &Step, outcome: &Outcome);

    /// Called after the last step of a phase
    fn on_phase_complete(&mut self, phase: Phase, summary: &PhaseSummary);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_phase_start(&mut self, _phase: Phase, _steps: usize) {}
    fn on_step_start(&mut self, _step: &Step) {}
    fn on_step_complete(&mut self, _step: &Step, _outcome: &Outcome) {}
    fn on_phase_complete(&mut self, _phase: Phase, _summary: &PhaseSummary) {}
}
