//! Shared test doubles for the executor crate.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use opflow_core::{Session, SessionError};

/// Shared counters recording what a `MockSession` was asked to do.
#[derive(Clone, Default)]
pub(crate) struct MockCalls {
    flushes: Arc<AtomicUsize>,
    commits: Arc<AtomicUsize>,
    rollbacks: Arc<AtomicUsize>,
}

impl MockCalls {
    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }
}

/// In-memory session double with observable call counts.
///
/// `has_open_transaction` reports true once a flush has happened (autobegin)
/// and false again after commit/rollback, unless the session was created
/// with `with_open_transaction` to simulate joining an outer transaction.
pub(crate) struct MockSession {
    calls: MockCalls,
    tx_open: Arc<AtomicBool>,
    joined_outer_tx: bool,
    fail_flush: Option<String>,
    fail_rollback: Option<String>,
}

impl MockSession {
    pub fn new() -> Self {
        Self {
            calls: MockCalls::default(),
            tx_open: Arc::new(AtomicBool::new(false)),
            joined_outer_tx: false,
            fail_flush: None,
            fail_rollback: None,
        }
    }

    /// Simulate a session that already has an outer transaction open.
    pub fn with_open_transaction() -> Self {
        let session = Self::new();
        session.tx_open.store(true, Ordering::SeqCst);
        Self {
            joined_outer_tx: true,
            ..session
        }
    }

    pub fn failing_flush(mut self, message: &str) -> Self {
        self.fail_flush = Some(message.to_string());
        self
    }

    pub fn failing_rollback(mut self, message: &str) -> Self {
        self.fail_rollback = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> MockCalls {
        self.calls.clone()
    }
}

#[async_trait]
impl Session for MockSession {
    async fn flush(&mut self) -> Result<(), SessionError> {
        if let Some(message) = &self.fail_flush {
            return Err(SessionError::new(message.clone()));
        }
        self.calls.flushes.fetch_add(1, Ordering::SeqCst);
        self.tx_open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), SessionError> {
        self.calls.commits.fetch_add(1, Ordering::SeqCst);
        self.tx_open.store(self.joined_outer_tx, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), SessionError> {
        self.calls.rollbacks.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.fail_rollback {
            return Err(SessionError::new(message.clone()));
        }
        self.tx_open.store(self.joined_outer_tx, Ordering::SeqCst);
        Ok(())
    }

    fn has_open_transaction(&self) -> bool {
        self.tx_open.load(Ordering::SeqCst)
    }
}
