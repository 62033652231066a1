//! Explicit state machine for the function-call loop.
//!
//! `AwaitingModel → ExecutingTool → AwaitingModel → … → Done | Aborted`

use std::time::Duration;

/// Terminal text returned when the iteration cap is hit.
pub const ITERATION_LIMIT_TEXT: &str =
    "I was unable to complete the task within the allowed number of steps.";

/// Bounds applied to a single agent turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopLimits {
    /// Maximum number of model calls per turn.
    pub max_iterations: usize,
    /// Per model call. `None` waits indefinitely.
    pub model_timeout: Option<Duration>,
    /// Per tool call. `None` waits indefinitely.
    pub tool_timeout: Option<Duration>,
}

impl Default for LoopLimits {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            model_timeout: Some(Duration::from_secs(120)),
            tool_timeout: Some(Duration::from_secs(60)),
        }
    }
}

/// Where a turn currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopPhase {
    AwaitingModel,
    ExecutingTool { name: String },
    Done,
    Aborted { reason: AbortReason },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    IterationLimit,
    ModelFailure,
}

/// Tracks the phase and the number of model calls of one turn.
#[derive(Debug)]
pub(crate) struct LoopState {
    phase: LoopPhase,
    iterations: usize,
    max_iterations: usize,
}

impl LoopState {
    pub fn new(limits: &LoopLimits) -> Self {
        Self {
            phase: LoopPhase::AwaitingModel,
            iterations: 0,
            max_iterations: limits.max_iterations.max(1),
        }
    }

    pub fn phase(&self) -> &LoopPhase {
        &self.phase
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Account for the next model call. Moves to `Aborted` and returns
    /// `false` once the cap is reached.
    pub fn begin_model_call(&mut self) -> bool {
        debug_assert!(!self.is_terminal(), "model call after terminal phase");
        if self.iterations >= self.max_iterations {
            self.phase = LoopPhase::Aborted {
                reason: AbortReason::IterationLimit,
            };
            return false;
        }
        self.iterations += 1;
        self.phase = LoopPhase::AwaitingModel;
        true
    }

    pub fn begin_tool(&mut self, name: &str) {
        self.phase = LoopPhase::ExecutingTool {
            name: name.to_string(),
        };
    }

    pub fn finish(&mut self) {
        self.phase = LoopPhase::Done;
    }

    pub fn model_failed(&mut self) {
        self.phase = LoopPhase::Aborted {
            reason: AbortReason::ModelFailure,
        };
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, LoopPhase::Done | LoopPhase::Aborted { .. })
    }
}
