pub mod domain;
pub mod error;
pub mod session;

pub use domain::{Phase, PhasePolicy, StepKind, PHASE_COUNT};
pub use error::{GuardViolation, OperationError, RollbackError, SessionError};
pub use session::Session;
