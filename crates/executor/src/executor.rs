//! The operation executor: walks the nine lifecycle phases in registry
//! order, installing the phase guard around each chain and driving
//! rollback/error-chain handling on failure.

use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use events::{Event, EventBus};
use opflow_core::{OperationError, Phase, RollbackError};

use crate::chain::{Chain, ChainRegistry};
use crate::context::ExecutionContext;
use crate::error::{ConfigurationError, ExecutionError, Result};
use crate::operation::OperationSpec;
use crate::resources::{PhaseGuard, SessionHandle};
use crate::state_machine::LifecycleState;
use crate::step::Step;

/// Executor behavior knobs.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Whether a guard violation runs the failing phase's error chain like
    /// any other step failure, or bypasses it (rollback still happens).
    pub guard_violations_use_error_chains: bool,
}

impl ExecutorConfig {
    pub fn new() -> Self {
        Self {
            guard_violations_use_error_chains: true,
        }
    }

    pub fn with_guard_violation_error_chains(mut self, enabled: bool) -> Self {
        self.guard_violations_use_error_chains = enabled;
        self
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a clean run: the context reached `done`.
#[derive(Debug, Clone)]
pub struct ExecutionOutput {
    /// Per-invocation id, matching the emitted events.
    pub operation_id: Uuid,
    /// Whatever the handler steps set as the operation result.
    pub result: Option<serde_json::Value>,
}

/// Drives registered operations through the phase lifecycle.
///
/// Registration builds and caches each operation's chain; execution is the
/// sequential walk of the nine lifecycle phases. One executor serves any number
/// of concurrent operations, each with its own context and session handle.
pub struct OperationExecutor {
    config: ExecutorConfig,
    chains: ChainRegistry,
    event_bus: Option<EventBus>,
}

impl OperationExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            chains: ChainRegistry::new(),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Register an operation definition, building its chain.
    ///
    /// All step/phase wiring problems surface here; a registered operation
    /// cannot fail configuration at execution time.
    pub fn register(&self, spec: OperationSpec) -> std::result::Result<(), ConfigurationError> {
        self.chains.register(&spec)?;
        info!(operation = spec.name(), "Operation registered");
        Ok(())
    }

    /// Execute one operation against `session`, to completion or first error.
    pub async fn execute(
        &self,
        operation: &str,
        session: SessionHandle,
    ) -> Result<ExecutionOutput> {
        self.run(operation, session, None).await
    }

    /// Like `execute`, but a `true` observed on `cancel` fails the currently
    /// running step with `OperationError::Cancelled`. The guard is still
    /// released and rollback/error-chain handling still runs.
    pub async fn execute_cancellable(
        &self,
        operation: &str,
        session: SessionHandle,
        cancel: watch::Receiver<bool>,
    ) -> Result<ExecutionOutput> {
        self.run(operation, session, Some(cancel)).await
    }

    async fn run(
        &self,
        operation: &str,
        session: SessionHandle,
        mut cancel: Option<watch::Receiver<bool>>,
    ) -> Result<ExecutionOutput> {
        let chain = self
            .chains
            .get(operation)
            .ok_or_else(|| ExecutionError::UnknownOperation(operation.to_string()))?;

        let mut ctx = ExecutionContext::new(operation, session);
        info!(
            operation_id = %ctx.operation_id(),
            operation,
            "Operation execution started"
        );
        self.emit(Event::OperationStarted {
            operation_id: ctx.operation_id(),
            operation: operation.to_string(),
        });

        for phase in Phase::ALL {
            ctx.advance_to(LifecycleState::Phase(phase))?;

            if phase == Phase::StartTx {
                let owns = !ctx.session().has_open_transaction().await;
                ctx.set_owns_transaction(owns);
                debug!(
                    operation_id = %ctx.operation_id(),
                    owns_transaction = owns,
                    "Transaction ownership recorded"
                );
            }

            self.emit(Event::PhaseStarted {
                operation_id: ctx.operation_id(),
                phase: phase.as_str().to_string(),
            });

            let mut guard =
                PhaseGuard::install(ctx.session(), phase, phase.policy(), ctx.owns_transaction());
            let outcome = self
                .run_chain(&mut ctx, chain.steps(phase), phase, &mut cancel)
                .await;
            guard.release();

            match outcome {
                Ok(()) => {
                    self.emit(Event::PhaseCompleted {
                        operation_id: ctx.operation_id(),
                        phase: phase.as_str().to_string(),
                    });
                }
                Err(err) => {
                    return Err(self.fail(ctx, &chain, phase, err).await);
                }
            }
        }

        ctx.advance_to(LifecycleState::Done)?;
        info!(
            operation_id = %ctx.operation_id(),
            operation,
            "Operation completed"
        );
        self.emit(Event::OperationCompleted {
            operation_id: ctx.operation_id(),
            success: true,
        });

        Ok(ExecutionOutput {
            operation_id: ctx.operation_id(),
            result: ctx.take_result(),
        })
    }

    /// Run one phase's steps in order; the first error aborts the rest.
    async fn run_chain(
        &self,
        ctx: &mut ExecutionContext,
        steps: &[Step],
        phase: Phase,
        cancel: &mut Option<watch::Receiver<bool>>,
    ) -> std::result::Result<(), OperationError> {
        for step in steps {
            debug!(
                operation_id = %ctx.operation_id(),
                phase = %phase,
                step = step.name(),
                "Running step"
            );

            let result = self.run_step(ctx, step, cancel.as_mut()).await;

            if let Err(err) = result {
                warn!(
                    operation_id = %ctx.operation_id(),
                    phase = %phase,
                    step = step.name(),
                    error = %err,
                    "Step failed, aborting phase"
                );
                self.emit(Event::StepFailed {
                    operation_id: ctx.operation_id(),
                    phase: phase.as_str().to_string(),
                    step: step.name().to_string(),
                    error: err.to_string(),
                });
                return Err(err);
            }
        }
        Ok(())
    }

    async fn run_step(
        &self,
        ctx: &mut ExecutionContext,
        step: &Step,
        cancel: Option<&mut watch::Receiver<bool>>,
    ) -> std::result::Result<(), OperationError> {
        match cancel {
            None => step.run(ctx).await,
            Some(rx) => {
                if *rx.borrow() {
                    return Err(OperationError::Cancelled);
                }
                tokio::select! {
                    biased;
                    _ = wait_cancelled(rx) => Err(OperationError::Cancelled),
                    result = step.run(ctx) => result,
                }
            }
        }
    }

    /// Failure path: rollback if owned (at most once), run the phase's error
    /// chain best-effort, then build the terminal error.
    async fn fail(
        &self,
        mut ctx: ExecutionContext,
        chain: &Chain,
        phase: Phase,
        err: OperationError,
    ) -> ExecutionError {
        let guard_violation = matches!(err, OperationError::Guard(_));
        ctx.record_error(err);

        let rollback = self.rollback_if_owned(&mut ctx, phase).await;

        if !guard_violation || self.config.guard_violations_use_error_chains {
            self.run_error_chain(&mut ctx, chain.error_steps(phase), phase)
                .await;
        }

        let source = ctx
            .take_error()
            .unwrap_or_else(|| OperationError::Other("phase failed".to_string()));

        error!(
            operation_id = %ctx.operation_id(),
            operation = ctx.operation(),
            phase = %phase,
            error = %source,
            "Operation failed"
        );
        self.emit(Event::OperationCompleted {
            operation_id: ctx.operation_id(),
            success: false,
        });

        ExecutionError::PhaseFailed {
            operation: ctx.operation().to_string(),
            phase,
            source,
            rollback,
        }
    }

    async fn rollback_if_owned(
        &self,
        ctx: &mut ExecutionContext,
        phase: Phase,
    ) -> Option<RollbackError> {
        if !ctx.owns_transaction() || !ctx.mark_rollback_attempted() {
            return None;
        }

        match ctx.session().rollback().await {
            Ok(()) => {
                info!(
                    operation_id = %ctx.operation_id(),
                    phase = %phase,
                    "Owned transaction rolled back"
                );
                self.emit(Event::RollbackIssued {
                    operation_id: ctx.operation_id(),
                    phase: phase.as_str().to_string(),
                    success: true,
                });
                None
            }
            Err(rollback_err) => {
                warn!(
                    operation_id = %ctx.operation_id(),
                    phase = %phase,
                    error = %rollback_err,
                    "Rollback failed"
                );
                self.emit(Event::RollbackIssued {
                    operation_id: ctx.operation_id(),
                    phase: phase.as_str().to_string(),
                    success: false,
                });
                Some(rollback_err)
            }
        }
    }

    /// Error-chain steps are best-effort: their failures are logged, never
    /// re-raised, so the original error cannot be masked.
    async fn run_error_chain(
        &self,
        ctx: &mut ExecutionContext,
        steps: &[Step],
        phase: Phase,
    ) {
        for step in steps {
            debug!(
                operation_id = %ctx.operation_id(),
                phase = %phase,
                step = step.name(),
                "Running error-chain step"
            );
            if let Err(chain_err) = step.run(ctx).await {
                warn!(
                    operation_id = %ctx.operation_id(),
                    phase = %phase,
                    step = step.name(),
                    error = %chain_err,
                    "Error-chain step failed (ignored)"
                );
            }
        }
    }

    fn emit(&self, event: Event) {
        if let Some(bus) = &self.event_bus {
            bus.emit(event);
        }
    }
}

async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender dropped without cancelling; nothing to wait for anymore.
            std::future::pending::<()>().await;
        }
    }
}
