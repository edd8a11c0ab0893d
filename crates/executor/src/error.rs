use thiserror::Error;

use opflow_core::{OperationError, Phase, RollbackError};

/// Invalid step/phase wiring, detected while building an operation's chains.
///
/// Raised at registration time only; a registered operation can never see one
/// of these during execution.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("system step '{step}' may not be anchored to {phase}")]
    SystemStepAnchor { step: String, phase: Phase },

    #[error("operation '{0}' is already registered")]
    DuplicateOperation(String),
}

/// Terminal failure of one executor run.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("invalid lifecycle transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("operation '{operation}' failed during {phase}: {source}")]
    PhaseFailed {
        operation: String,
        /// Phase in which the failing step ran.
        phase: Phase,
        #[source]
        source: OperationError,
        /// Secondary failure from rolling back the owned transaction, if any.
        rollback: Option<RollbackError>,
    },
}

impl ExecutionError {
    /// Phase the operation died in, for terminal step failures.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::PhaseFailed { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExecutionError>;
