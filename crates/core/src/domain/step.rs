use serde::{Deserialize, Serialize};

use super::phase::Phase;

/// Category of a step, determining its precedence within a phase.
///
/// Within one phase, steps run grouped by kind: security dependencies first,
/// then dependencies, system steps, atoms, and hooks last. `System` steps are
/// the transactional machinery and may only anchor to `start_tx`, `handler`,
/// or `end_tx`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    SecurityDependency,
    Dependency,
    System,
    Atom,
    Hook,
}

impl StepKind {
    /// Sort rank within a phase; lower runs first.
    pub fn precedence(&self) -> u8 {
        match self {
            Self::SecurityDependency => 0,
            Self::Dependency => 1,
            Self::System => 2,
            Self::Atom => 3,
            Self::Hook => 4,
        }
    }

    /// Whether a step of this kind may be anchored to `phase`.
    pub fn may_anchor_to(&self, phase: Phase) -> bool {
        match self {
            Self::System => matches!(phase, Phase::StartTx | Phase::Handler | Phase::EndTx),
            _ => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SecurityDependency => "security_dependency",
            Self::Dependency => "dependency",
            Self::System => "system",
            Self::Atom => "atom",
            Self::Hook => "hook",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "security_dependency" => Some(Self::SecurityDependency),
            "dependency" => Some(Self::Dependency),
            "system" => Some(Self::System),
            "atom" => Some(Self::Atom),
            "hook" => Some(Self::Hook),
            _ => None,
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
