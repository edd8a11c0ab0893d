pub mod phase;
pub mod step;

pub use phase::{Phase, PhasePolicy, PHASE_COUNT};
pub use step::StepKind;
