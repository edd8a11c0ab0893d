//! Partitions an operation's declared steps by phase and orders each bucket.

use opflow_core::PHASE_COUNT;

use crate::error::ConfigurationError;
use crate::step::Step;

/// Steps bucketed by phase index, ordered for execution.
pub(crate) type PhaseBuckets = [Vec<Step>; PHASE_COUNT];

/// Classify `steps` into per-phase buckets sorted by
/// `(kind precedence, priority)`.
///
/// The sort is stable, so ties fall back to declaration order; the same
/// input always produces the same output. A `System` step anchored outside
/// `start_tx`/`handler`/`end_tx` is rejected here, before any chain exists.
pub(crate) fn classify(steps: &[Step]) -> Result<PhaseBuckets, ConfigurationError> {
    let mut buckets: PhaseBuckets = Default::default();

    for step in steps {
        if !step.kind().may_anchor_to(step.phase()) {
            return Err(ConfigurationError::SystemStepAnchor {
                step: step.name().to_string(),
                phase: step.phase(),
            });
        }
        buckets[step.phase().index()].push(step.clone());
    }

    for bucket in &mut buckets {
        bucket.sort_by_key(|step| (step.kind().precedence(), step.priority()));
    }

    Ok(buckets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use opflow_core::{Phase, StepKind};

    fn step(name: &str, kind: StepKind, phase: Phase, priority: u32) -> Step {
        Step::from_fn(name, kind, phase, priority, |_ctx| async { Ok(()) }.boxed())
    }

    fn names(bucket: &[Step]) -> Vec<&str> {
        bucket.iter().map(|s| s.name()).collect()
    }

    #[test]
    fn test_kind_precedence_within_phase() {
        // One step of every kind, all anchored to HANDLER, declared shuffled.
        let steps = vec![
            step("hook", StepKind::Hook, Phase::Handler, 0),
            step("atom", StepKind::Atom, Phase::Handler, 0),
            step("dep", StepKind::Dependency, Phase::Handler, 0),
            step("secdep", StepKind::SecurityDependency, Phase::Handler, 0),
            step("sys", StepKind::System, Phase::Handler, 0),
        ];

        let buckets = classify(&steps).unwrap();
        assert_eq!(
            names(&buckets[Phase::Handler.index()]),
            ["secdep", "dep", "sys", "atom", "hook"]
        );
    }

    #[test]
    fn test_priority_within_kind() {
        let steps = vec![
            step("third", StepKind::Atom, Phase::PreHandler, 20),
            step("first", StepKind::Atom, Phase::PreHandler, 1),
            step("second", StepKind::Atom, Phase::PreHandler, 10),
        ];

        let buckets = classify(&steps).unwrap();
        assert_eq!(
            names(&buckets[Phase::PreHandler.index()]),
            ["first", "second", "third"]
        );
    }

    #[test]
    fn test_ties_fall_back_to_declaration_order() {
        let steps = vec![
            step("declared_first", StepKind::Hook, Phase::PostResponse, 5),
            step("declared_second", StepKind::Hook, Phase::PostResponse, 5),
        ];

        let buckets = classify(&steps).unwrap();
        assert_eq!(
            names(&buckets[Phase::PostResponse.index()]),
            ["declared_first", "declared_second"]
        );
    }

    #[test]
    fn test_steps_partitioned_by_phase() {
        let steps = vec![
            step("h", StepKind::Atom, Phase::Handler, 0),
            step("p", StepKind::Hook, Phase::PostCommit, 0),
        ];

        let buckets = classify(&steps).unwrap();
        assert_eq!(buckets[Phase::Handler.index()].len(), 1);
        assert_eq!(buckets[Phase::PostCommit.index()].len(), 1);
        assert!(buckets[Phase::PreTxBegin.index()].is_empty());
    }

    #[test]
    fn test_system_step_rejected_outside_tx_phases() {
        let steps = vec![step("rogue", StepKind::System, Phase::PreHandler, 0)];

        let err = classify(&steps).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::SystemStepAnchor {
                phase: Phase::PreHandler,
                ..
            }
        ));
    }

    #[test]
    fn test_system_step_allowed_in_tx_phases() {
        for phase in [Phase::StartTx, Phase::Handler, Phase::EndTx] {
            let steps = vec![step("sys", StepKind::System, phase, 0)];
            assert!(classify(&steps).is_ok(), "system step should anchor to {phase}");
        }
    }
}
