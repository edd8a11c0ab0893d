//! Chains: the per-phase execution plan for one operation, and the registry
//! that caches them.
//!
//! A chain is built once per operation definition and is read-only
//! afterwards; every invocation of that operation reuses it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use opflow_core::Phase;

use crate::chain::classifier::classify;
use crate::error::ConfigurationError;
use crate::operation::OperationSpec;
use crate::step::Step;

/// Ordered steps per phase, plus the typed error chains.
///
/// Error chains replace name-based `ON_<PHASE>_ERROR` lookup: each phase maps
/// directly to the steps that run when it fails.
#[derive(Debug)]
pub struct Chain {
    phases: Vec<Arc<[Step]>>,
    error_chains: Vec<Arc<[Step]>>,
}

impl Chain {
    /// Deterministic pure function of the spec's step set.
    pub fn build(spec: &OperationSpec) -> Result<Self, ConfigurationError> {
        let phases = classify(spec.steps())?
            .into_iter()
            .map(Arc::from)
            .collect();
        let error_chains = classify(spec.error_steps())?
            .into_iter()
            .map(Arc::from)
            .collect();

        Ok(Self {
            phases,
            error_chains,
        })
    }

    /// Steps to run while `phase` executes.
    pub fn steps(&self, phase: Phase) -> &[Step] {
        &self.phases[phase.index()]
    }

    /// Steps to run when `phase` fails.
    pub fn error_steps(&self, phase: Phase) -> &[Step] {
        &self.error_chains[phase.index()]
    }

    /// Total number of main-chain steps.
    pub fn len(&self) -> usize {
        self.phases.iter().map(|bucket| bucket.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache of built chains, keyed by operation name.
///
/// Registration is the only place a `ConfigurationError` can surface; a
/// chain handed out by `get` is guaranteed valid.
#[derive(Debug, Default)]
pub struct ChainRegistry {
    chains: RwLock<HashMap<String, Arc<Chain>>>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and cache the chain for `spec`.
    pub fn register(&self, spec: &OperationSpec) -> Result<Arc<Chain>, ConfigurationError> {
        let mut chains = self.chains.write().unwrap();
        if chains.contains_key(spec.name()) {
            return Err(ConfigurationError::DuplicateOperation(
                spec.name().to_string(),
            ));
        }

        let chain = Arc::new(Chain::build(spec)?);
        debug!(
            operation = spec.name(),
            steps = chain.len(),
            "Operation chain built"
        );
        chains.insert(spec.name().to_string(), Arc::clone(&chain));
        Ok(chain)
    }

    pub fn get(&self, operation: &str) -> Option<Arc<Chain>> {
        self.chains.read().unwrap().get(operation).cloned()
    }

    pub fn contains(&self, operation: &str) -> bool {
        self.chains.read().unwrap().contains_key(operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use opflow_core::StepKind;

    fn step(name: &str, kind: StepKind, phase: Phase, priority: u32) -> Step {
        Step::from_fn(name, kind, phase, priority, |_ctx| async { Ok(()) }.boxed())
    }

    fn sample_spec(name: &str) -> OperationSpec {
        OperationSpec::new(name)
            .step(step("load", StepKind::Dependency, Phase::PreHandler, 0))
            .step(step("authz", StepKind::SecurityDependency, Phase::PreHandler, 0))
            .step(step("persist", StepKind::Atom, Phase::Handler, 0))
            .step(step("audit", StepKind::Hook, Phase::Handler, 0))
            .on_error(step("cleanup", StepKind::Hook, Phase::Handler, 0))
    }

    fn names(steps: &[Step]) -> Vec<&str> {
        steps.iter().map(|s| s.name()).collect()
    }

    #[test]
    fn test_build_orders_each_phase() {
        let chain = Chain::build(&sample_spec("op.test")).unwrap();

        assert_eq!(names(chain.steps(Phase::PreHandler)), ["authz", "load"]);
        assert_eq!(names(chain.steps(Phase::Handler)), ["persist", "audit"]);
        assert!(chain.steps(Phase::EndTx).is_empty());
        assert_eq!(names(chain.error_steps(Phase::Handler)), ["cleanup"]);
        assert_eq!(chain.len(), 4);
    }

    #[test]
    fn test_build_is_deterministic() {
        let first = Chain::build(&sample_spec("op.test")).unwrap();
        let second = Chain::build(&sample_spec("op.test")).unwrap();

        for phase in Phase::ALL {
            assert_eq!(
                names(first.steps(phase)),
                names(second.steps(phase)),
                "ordering diverged in {phase}"
            );
            assert_eq!(
                names(first.error_steps(phase)),
                names(second.error_steps(phase))
            );
        }
    }

    #[test]
    fn test_build_propagates_classifier_error() {
        let spec = OperationSpec::new("op.bad")
            .step(step("rogue", StepKind::System, Phase::PostCommit, 0));

        assert!(matches!(
            Chain::build(&spec),
            Err(ConfigurationError::SystemStepAnchor { .. })
        ));
    }

    #[test]
    fn test_error_steps_validated_at_build_time() {
        let spec = OperationSpec::new("op.bad")
            .on_error(step("rogue", StepKind::System, Phase::PreHandler, 0));

        assert!(Chain::build(&spec).is_err());
    }

    #[test]
    fn test_registry_caches_by_name() {
        let registry = ChainRegistry::new();
        let chain = registry.register(&sample_spec("op.test")).unwrap();

        let cached = registry.get("op.test").unwrap();
        assert!(Arc::ptr_eq(&chain, &cached));
        assert!(registry.contains("op.test"));
        assert!(registry.get("op.other").is_none());
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let registry = ChainRegistry::new();
        registry.register(&sample_spec("op.test")).unwrap();

        assert!(matches!(
            registry.register(&sample_spec("op.test")),
            Err(ConfigurationError::DuplicateOperation(_))
        ));
    }
}
