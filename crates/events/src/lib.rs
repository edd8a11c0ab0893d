//! Lifecycle event system for opflow
//!
//! This crate provides the event bus and event types observers use to follow
//! operations through their phases.

mod bus;
mod types;

pub use bus::EventBus;
pub use types::*;
