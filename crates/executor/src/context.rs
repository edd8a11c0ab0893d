//! Per-invocation execution context.
//!
//! Everything the original design kept as ambient state lives here as
//! explicit fields: the current lifecycle state, transaction ownership, the
//! guarded session handle, and the error being handled. One context per
//! in-flight operation, never shared across operations.

use serde_json::{Map, Value};
use uuid::Uuid;

use opflow_core::{OperationError, Phase};

use crate::error::Result;
use crate::resources::SessionHandle;
use crate::state_machine::{LifecycleState, LifecycleStateMachine};

pub struct ExecutionContext {
    operation_id: Uuid,
    operation: String,
    state: LifecycleState,
    owns_transaction: bool,
    rollback_attempted: bool,
    session: SessionHandle,
    error: Option<OperationError>,
    values: Map<String, Value>,
    result: Option<Value>,
}

impl ExecutionContext {
    pub fn new(operation: impl Into<String>, session: SessionHandle) -> Self {
        Self {
            operation_id: Uuid::new_v4(),
            operation: operation.into(),
            state: LifecycleState::Init,
            owns_transaction: false,
            rollback_attempted: false,
            session,
            error: None,
            values: Map::new(),
            result: None,
        }
    }

    /// Unique id of this invocation.
    pub fn operation_id(&self) -> Uuid {
        self.operation_id
    }

    /// Name of the operation definition being executed.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// The phase currently executing, if any.
    pub fn current_phase(&self) -> Option<Phase> {
        self.state.phase()
    }

    /// Whether this operation opened the transaction (and therefore commits
    /// or rolls it back). False until determined at `start_tx`.
    pub fn owns_transaction(&self) -> bool {
        self.owns_transaction
    }

    /// The guarded session handle; the only route to flush/commit.
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// The error that aborted the current phase, readable by error-chain
    /// steps.
    pub fn error(&self) -> Option<&OperationError> {
        self.error.as_ref()
    }

    /// Scratch values shared between steps of this invocation.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set_value(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// The operation's result, as set by handler steps.
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn set_result(&mut self, result: Value) {
        self.result = Some(result);
    }

    pub(crate) fn take_result(&mut self) -> Option<Value> {
        self.result.take()
    }

    pub(crate) fn advance_to(&mut self, next: LifecycleState) -> Result<()> {
        LifecycleStateMachine::validate_transition(&self.state, &next)?;
        self.state = next;
        Ok(())
    }

    pub(crate) fn set_owns_transaction(&mut self, owns: bool) {
        self.owns_transaction = owns;
    }

    pub(crate) fn record_error(&mut self, error: OperationError) {
        self.error = Some(error);
    }

    pub(crate) fn take_error(&mut self) -> Option<OperationError> {
        self.error.take()
    }

    /// Latch the one permitted rollback attempt; true only the first time.
    pub(crate) fn mark_rollback_attempted(&mut self) -> bool {
        if self.rollback_attempted {
            return false;
        }
        self.rollback_attempted = true;
        true
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("operation_id", &self.operation_id)
            .field("operation", &self.operation)
            .field("state", &self.state)
            .field("owns_transaction", &self.owns_transaction)
            .field("has_error", &self.error.is_some())
            .finish()
    }
}
