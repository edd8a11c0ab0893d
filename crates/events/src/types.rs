//! Event types for the opflow lifecycle event system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An event plus the metadata every observer needs: a unique id and the
/// moment it was emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: Event,
}

impl EventEnvelope {
    /// Stamp `event` with a fresh id and the current time.
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }

    /// The invocation this envelope belongs to.
    pub fn operation_id(&self) -> Uuid {
        self.event.operation_id()
    }
}

/// All lifecycle events emitted by the executor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// An operation entered the lifecycle
    #[serde(rename = "operation.started")]
    OperationStarted {
        operation_id: Uuid,
        operation: String,
    },

    /// A phase began executing its chain
    #[serde(rename = "phase.started")]
    PhaseStarted { operation_id: Uuid, phase: String },

    /// A phase ran its chain to completion and released its guard
    #[serde(rename = "phase.completed")]
    PhaseCompleted { operation_id: Uuid, phase: String },

    /// A step returned an error, aborting its phase
    #[serde(rename = "step.failed")]
    StepFailed {
        operation_id: Uuid,
        phase: String,
        step: String,
        error: String,
    },

    /// The executor rolled back an owned transaction
    #[serde(rename = "rollback.issued")]
    RollbackIssued {
        operation_id: Uuid,
        phase: String,
        success: bool,
    },

    /// The operation left the lifecycle
    #[serde(rename = "operation.completed")]
    OperationCompleted { operation_id: Uuid, success: bool },
}

impl Event {
    /// Get the operation ID associated with this event
    pub fn operation_id(&self) -> Uuid {
        match self {
            Event::OperationStarted { operation_id, .. } => *operation_id,
            Event::PhaseStarted { operation_id, .. } => *operation_id,
            Event::PhaseCompleted { operation_id, .. } => *operation_id,
            Event::StepFailed { operation_id, .. } => *operation_id,
            Event::RollbackIssued { operation_id, .. } => *operation_id,
            Event::OperationCompleted { operation_id, .. } => *operation_id,
        }
    }

    /// Get the phase name carried by this event, if any
    pub fn phase(&self) -> Option<&str> {
        match self {
            Event::PhaseStarted { phase, .. }
            | Event::PhaseCompleted { phase, .. }
            | Event::StepFailed { phase, .. }
            | Event::RollbackIssued { phase, .. } => Some(phase.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_stamps_id_and_operation() {
        let operation_id = Uuid::new_v4();
        let envelope = EventEnvelope::new(Event::OperationStarted {
            operation_id,
            operation: "users.create".to_string(),
        });

        assert!(!envelope.id.is_nil());
        assert_eq!(envelope.operation_id(), operation_id);
        assert!(envelope.timestamp <= Utc::now());
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::PhaseStarted {
            operation_id: Uuid::new_v4(),
            phase: "handler".to_string(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("phase.started"));
        assert!(json.contains("handler"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"operation.completed","operation_id":"550e8400-e29b-41d4-a716-446655440000","success":true}"#;
        let event: Event = serde_json::from_str(json).unwrap();

        match event {
            Event::OperationCompleted {
                operation_id,
                success,
            } => {
                assert!(success);
                assert!(!operation_id.is_nil());
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_event_operation_id() {
        let operation_id = Uuid::new_v4();

        let event = Event::RollbackIssued {
            operation_id,
            phase: "handler".to_string(),
            success: true,
        };
        assert_eq!(event.operation_id(), operation_id);
        assert_eq!(event.phase(), Some("handler"));
    }

    #[test]
    fn test_event_phase_absent() {
        let event = Event::OperationStarted {
            operation_id: Uuid::new_v4(),
            operation: "users.create".to_string(),
        };
        assert_eq!(event.phase(), None);
    }
}
