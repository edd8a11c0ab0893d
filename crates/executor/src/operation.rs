//! Operation definitions as registered by upstream tooling.

use crate::step::Step;

use opflow_core::Phase;

/// The declared step set for one operation type.
///
/// Declaration order is preserved and serves as the tie-breaker when the
/// chain builder sorts steps within a phase. Error steps join the error
/// chain of the phase they are anchored to, i.e. they run only when that
/// phase fails.
#[derive(Debug, Default)]
pub struct OperationSpec {
    name: String,
    steps: Vec<Step>,
    error_steps: Vec<Step>,
}

impl OperationSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            error_steps: Vec::new(),
        }
    }

    /// Declare a step for the main chain of its anchor phase.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Declare a step for the error chain of its anchor phase.
    pub fn on_error(mut self, step: Step) -> Self {
        self.error_steps.push(step);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn error_steps(&self) -> &[Step] {
        &self.error_steps
    }

    /// Phases for which at least one main-chain step is declared.
    pub fn anchored_phases(&self) -> Vec<Phase> {
        Phase::ALL
            .into_iter()
            .filter(|phase| self.steps.iter().any(|s| s.phase() == *phase))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use opflow_core::StepKind;

    fn noop(name: &str, phase: Phase) -> Step {
        Step::from_fn(name, StepKind::Atom, phase, 0, |_ctx| async { Ok(()) }.boxed())
    }

    #[test]
    fn test_spec_preserves_declaration_order() {
        let spec = OperationSpec::new("op.test")
            .step(noop("b", Phase::Handler))
            .step(noop("a", Phase::Handler));

        let names: Vec<&str> = spec.steps().iter().map(|s| s.name()).collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[test]
    fn test_anchored_phases() {
        let spec = OperationSpec::new("op.test")
            .step(noop("h", Phase::Handler))
            .step(noop("p", Phase::PostResponse))
            .on_error(noop("e", Phase::Handler));

        assert_eq!(
            spec.anchored_phases(),
            vec![Phase::Handler, Phase::PostResponse]
        );
        assert_eq!(spec.error_steps().len(), 1);
    }
}
