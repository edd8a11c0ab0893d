//! Phased operation executor.
//!
//! One operation, nine ordered lifecycle phases, each with an enforced
//! policy on which session side effects (flush vs. commit) are legal.
//! Operations are registered once (their step chains are built and cached),
//! then executed any number of times against a guarded session handle.

pub mod chain;
pub mod context;
pub mod error;
pub mod executor;
pub mod operation;
pub mod resources;
pub mod state_machine;
pub mod step;
pub mod system;

#[cfg(test)]
mod testing;

pub use chain::{Chain, ChainRegistry};
pub use context::ExecutionContext;
pub use error::{ConfigurationError, ExecutionError, Result};
pub use executor::{ExecutionOutput, ExecutorConfig, OperationExecutor};
pub use operation::OperationSpec;
pub use resources::{PhaseGuard, SessionHandle};
pub use state_machine::{LifecycleState, LifecycleStateMachine};
pub use step::{Step, StepAction};
