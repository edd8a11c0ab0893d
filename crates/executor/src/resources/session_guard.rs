//! Guarded session handle and the per-phase write guard.
//!
//! Steps never see the raw session. They reach it through `SessionHandle`,
//! whose flush/commit entry points consult the guard installed for the
//! active phase. `PhaseGuard` is the scoped capability: installing one
//! activates a policy, releasing it restores exactly what was active before.
//! Release runs on every exit path via `Drop` and is idempotent.

use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use opflow_core::{GuardViolation, OperationError, Phase, PhasePolicy, RollbackError, Session};

/// One installed policy frame.
#[derive(Debug, Clone, Copy)]
struct GuardFrame {
    token: u64,
    phase: Phase,
    policy: PhasePolicy,
    owns_transaction: bool,
}

/// Stack of installed guards for one session instance.
///
/// Nested installs (shared-session contexts) push frames; releasing a frame
/// restores the frame below it, never the pre-stack original. The top frame
/// is the active policy; an empty stack means the session behaves as it did
/// before any guard was installed.
#[derive(Debug, Default)]
struct GuardStack {
    frames: Vec<GuardFrame>,
    next_token: u64,
}

impl GuardStack {
    fn install(&mut self, phase: Phase, policy: PhasePolicy, owns_transaction: bool) -> u64 {
        let token = self.next_token;
        self.next_token += 1;
        self.frames.push(GuardFrame {
            token,
            phase,
            policy,
            owns_transaction,
        });
        token
    }

    /// Remove the frame with `token` and anything installed above it.
    fn release(&mut self, token: u64) -> bool {
        let before = self.frames.len();
        self.frames.retain(|frame| frame.token < token);
        self.frames.len() != before
    }

    fn active(&self) -> Option<GuardFrame> {
        self.frames.last().copied()
    }
}

/// Handle through which all session access flows during an operation.
///
/// Clones share the underlying session and guard stack, so two contexts
/// joined on one session compose their guards instead of clobbering them.
/// Distinct handles (the normal case) are fully isolated.
#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<AsyncMutex<Box<dyn Session>>>,
    guards: Arc<Mutex<GuardStack>>,
}

impl SessionHandle {
    pub fn new(session: Box<dyn Session>) -> Self {
        Self {
            session: Arc::new(AsyncMutex::new(session)),
            guards: Arc::new(Mutex::new(GuardStack::default())),
        }
    }

    /// Push buffered writes, subject to the active phase policy.
    pub async fn flush(&self) -> Result<(), OperationError> {
        self.permit_flush()?;
        let mut session = self.session.lock().await;
        session.flush().await.map_err(OperationError::from)
    }

    /// Commit the transaction, subject to the active phase policy.
    pub async fn commit(&self) -> Result<(), OperationError> {
        self.permit_commit()?;
        let mut session = self.session.lock().await;
        session.commit().await.map_err(OperationError::from)
    }

    /// Roll back the transaction. Not policy-gated; only the executor calls
    /// this, and only on failure paths.
    pub async fn rollback(&self) -> Result<(), RollbackError> {
        let mut session = self.session.lock().await;
        session.rollback().await.map_err(RollbackError::from)
    }

    pub async fn has_open_transaction(&self) -> bool {
        self.session.lock().await.has_open_transaction()
    }

    fn permit_flush(&self) -> Result<(), GuardViolation> {
        match self.guards.lock().unwrap().active() {
            Some(frame) if !frame.policy.allow_flush => Err(GuardViolation::FlushNotPermitted {
                phase: frame.phase,
            }),
            _ => Ok(()),
        }
    }

    fn permit_commit(&self) -> Result<(), GuardViolation> {
        match self.guards.lock().unwrap().active() {
            Some(frame) if !frame.policy.allow_commit => {
                Err(GuardViolation::CommitNotPermitted { phase: frame.phase })
            }
            Some(frame)
                if frame.policy.require_owned_tx_for_commit && !frame.owns_transaction =>
            {
                Err(GuardViolation::CommitRequiresOwnership { phase: frame.phase })
            }
            _ => Ok(()),
        }
    }

    fn guards(&self) -> Arc<Mutex<GuardStack>> {
        Arc::clone(&self.guards)
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guards = self.guards.lock().unwrap();
        f.debug_struct("SessionHandle")
            .field("installed_guards", &guards.frames.len())
            .finish()
    }
}

/// Scoped write-policy capability for one phase of one operation.
///
/// Created by the executor when a phase starts; released when it ends.
/// `release` is idempotent and also runs from `Drop`, so the policy frame
/// cannot outlive the phase even if the executor future is dropped mid-await.
pub struct PhaseGuard {
    guards: Arc<Mutex<GuardStack>>,
    phase: Phase,
    token: u64,
    released: bool,
}

impl PhaseGuard {
    /// Activate `policy` on the session for the duration of `phase`.
    pub fn install(
        handle: &SessionHandle,
        phase: Phase,
        policy: PhasePolicy,
        owns_transaction: bool,
    ) -> Self {
        let guards = handle.guards();
        let token = guards
            .lock()
            .unwrap()
            .install(phase, policy, owns_transaction);

        debug!(
            phase = %phase,
            allow_flush = policy.allow_flush,
            allow_commit = policy.allow_commit,
            "Phase guard installed"
        );

        Self {
            guards,
            phase,
            token,
            released: false,
        }
    }

    /// Restore the previously active guard state. A second call is a no-op.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.guards.lock().unwrap().release(self.token);
        debug!(phase = %self.phase, "Phase guard released");
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }
}

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                phase = %self.phase,
                "Phase guard dropped without release - restoring session state"
            );
            self.release();
        }
    }
}
