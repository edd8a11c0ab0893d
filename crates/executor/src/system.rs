//! Built-in system steps for the transactional phases.
//!
//! Operations that persist anything register `commit_if_owned`; the
//! executor itself never commits. Transaction begin has no counterpart
//! here: backends open a transaction implicitly on first write, and
//! ownership is recorded by the executor at `start_tx`.

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;

use opflow_core::{OperationError, Phase, StepKind};

use crate::context::ExecutionContext;
use crate::step::Step;

// High priority so user-declared system steps in the same phase run first.
const SYSTEM_STEP_PRIORITY: u32 = 100;

/// Commit the transaction at `end_tx`, but only when this operation owns it.
///
/// A joined transaction is left for the outer owner to commit; the step
/// no-ops so the rest of the `end_tx` chain still runs.
pub fn commit_if_owned() -> Step {
    Step::from_fn(
        "commit_if_owned",
        StepKind::System,
        Phase::EndTx,
        SYSTEM_STEP_PRIORITY,
        commit_action,
    )
}

fn commit_action(ctx: &mut ExecutionContext) -> BoxFuture<'_, Result<(), OperationError>> {
    let session = ctx.session().clone();
    let owns = ctx.owns_transaction();
    let operation_id = ctx.operation_id();

    async move {
        if owns {
            session.commit().await
        } else {
            debug!(
                operation_id = %operation_id,
                "Joined transaction, deferring commit to the owner"
            );
            Ok(())
        }
    }
    .boxed()
}

/// Flush buffered writes during `handler`, making them visible to later
/// steps in the same transaction without committing anything.
pub fn flush_working_set() -> Step {
    Step::from_fn(
        "flush_working_set",
        StepKind::System,
        Phase::Handler,
        SYSTEM_STEP_PRIORITY,
        flush_action,
    )
}

fn flush_action(ctx: &mut ExecutionContext) -> BoxFuture<'_, Result<(), OperationError>> {
    let session = ctx.session().clone();
    async move { session.flush().await }.boxed()
}
