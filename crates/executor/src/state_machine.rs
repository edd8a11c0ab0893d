use opflow_core::Phase;

use crate::error::{ExecutionError, Result};

/// Where one operation is in its lifecycle: a pseudo-state before the first
/// phase, one of the nine phases, or the terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Init,
    Phase(Phase),
    Done,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Phase(phase) => phase.as_str(),
            Self::Done => "done",
        }
    }

    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Phase(phase) => Some(*phase),
            _ => None,
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct LifecycleStateMachine;

impl LifecycleStateMachine {
    /// Transitions are strictly linear: registry order, one phase at a time,
    /// no skipping, no going back.
    pub fn validate_transition(from: &LifecycleState, to: &LifecycleState) -> Result<()> {
        if Self::next_state(from) == Some(*to) {
            Ok(())
        } else {
            Err(ExecutionError::InvalidTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }

    pub fn can_transition(from: &LifecycleState, to: &LifecycleState) -> bool {
        Self::validate_transition(from, to).is_ok()
    }

    pub fn next_state(current: &LifecycleState) -> Option<LifecycleState> {
        match current {
            LifecycleState::Init => Some(LifecycleState::Phase(Phase::PreTxBegin)),
            LifecycleState::Phase(phase) => Some(
                phase
                    .next()
                    .map(LifecycleState::Phase)
                    .unwrap_or(LifecycleState::Done),
            ),
            LifecycleState::Done => None,
        }
    }
}
