use thiserror::Error;

use crate::domain::Phase;

/// A step attempted a session write forbidden by the active phase policy.
///
/// Always a programming error in a step; surfaced immediately and aborts the
/// phase.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GuardViolation {
    #[error("flush is not permitted during {phase}")]
    FlushNotPermitted { phase: Phase },

    #[error("commit is not permitted during {phase}")]
    CommitNotPermitted { phase: Phase },

    #[error("commit during {phase} requires transaction ownership")]
    CommitRequiresOwnership { phase: Phase },
}

impl GuardViolation {
    pub fn phase(&self) -> Phase {
        match self {
            Self::FlushNotPermitted { phase }
            | Self::CommitNotPermitted { phase }
            | Self::CommitRequiresOwnership { phase } => *phase,
        }
    }
}

/// Failure reported by the session backend itself.
#[derive(Debug, Error)]
#[error("session backend error: {0}")]
pub struct SessionError(String);

impl SessionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Domain-level failure from a step action.
///
/// Any variant aborts the remaining steps of the phase and terminates the
/// operation after rollback/error-chain handling.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("guard violation: {0}")]
    Guard(#[from] GuardViolation),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("step '{step}' failed: {reason}")]
    Step { step: String, reason: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl OperationError {
    pub fn step(step: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Step {
            step: step.into(),
            reason: reason.into(),
        }
    }
}

/// Failure while rolling back an owned transaction.
///
/// Reported alongside the primary error; never suppresses it.
#[derive(Debug, Error)]
#[error("rollback failed: {0}")]
pub struct RollbackError(#[from] pub SessionError);
