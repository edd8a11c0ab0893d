//! Steps: the unit of work a chain executes.
//!
//! A step couples an async action to its anchor phase, kind, and priority.
//! Steps are immutable once declared for an operation; the chain builder
//! owns their ordering.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use opflow_core::{OperationError, Phase, StepKind};

use crate::context::ExecutionContext;

/// Async action invoked with the operation's mutable context.
///
/// Implementations come from upstream operation-definition tooling; the
/// executor only cares that they report success or an `OperationError`.
#[async_trait]
pub trait StepAction: Send + Sync {
    async fn run(&self, ctx: &mut ExecutionContext) -> Result<(), OperationError>;
}

struct FnAction<F>(F);

#[async_trait]
impl<F> StepAction for FnAction<F>
where
    F: for<'a> Fn(&'a mut ExecutionContext) -> BoxFuture<'a, Result<(), OperationError>>
        + Send
        + Sync,
{
    async fn run(&self, ctx: &mut ExecutionContext) -> Result<(), OperationError> {
        (self.0)(ctx).await
    }
}

/// One unit of work anchored to a phase.
///
/// Ordering key within a phase is `(kind precedence, priority)`; declaration
/// order breaks ties.
#[derive(Clone)]
pub struct Step {
    name: String,
    kind: StepKind,
    phase: Phase,
    priority: u32,
    action: Arc<dyn StepAction>,
}

impl Step {
    pub fn new(
        name: impl Into<String>,
        kind: StepKind,
        phase: Phase,
        priority: u32,
        action: Arc<dyn StepAction>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            phase,
            priority,
            action,
        }
    }

    /// Build a step from a boxed-future closure.
    ///
    /// Plain `fn` items with a `BoxFuture<'_, _>` return type satisfy the
    /// bound directly; closures that only capture owned state can return a
    /// `'static` future via `FutureExt::boxed`.
    pub fn from_fn<F>(
        name: impl Into<String>,
        kind: StepKind,
        phase: Phase,
        priority: u32,
        f: F,
    ) -> Self
    where
        F: for<'a> Fn(&'a mut ExecutionContext) -> BoxFuture<'a, Result<(), OperationError>>
            + Send
            + Sync
            + 'static,
    {
        Self::new(name, kind, phase, priority, Arc::new(FnAction(f)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub(crate) async fn run(&self, ctx: &mut ExecutionContext) -> Result<(), OperationError> {
        self.action.run(ctx).await
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("phase", &self.phase)
            .field("priority", &self.priority)
            .finish()
    }
}
