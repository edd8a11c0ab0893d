//! The narrow interface the executor requires from a backing resource.
//!
//! A session is any durable store handle that buffers writes (`flush`),
//! makes them permanent (`commit`), and can undo them (`rollback`). The
//! executor never calls these directly during a phase; steps reach them
//! through the guarded handle installed for the active phase.

use async_trait::async_trait;

use crate::error::SessionError;

/// A resource the executor drives one operation against.
///
/// Transaction begin is deliberately absent: backends are expected to open a
/// transaction implicitly on first write (autobegin), and
/// `has_open_transaction` reports whether one is live.
#[async_trait]
pub trait Session: Send + Sync {
    /// Push buffered writes to the store without making them durable.
    async fn flush(&mut self) -> Result<(), SessionError>;

    /// Make all writes of the current transaction durable.
    async fn commit(&mut self) -> Result<(), SessionError>;

    /// Discard all writes of the current transaction.
    async fn rollback(&mut self) -> Result<(), SessionError>;

    /// Whether a transaction is currently open on this session.
    fn has_open_transaction(&self) -> bool;
}
