use serde::{Deserialize, Serialize};

/// Number of lifecycle phases.
pub const PHASE_COUNT: usize = 9;

/// One stage in the fixed nine-stage operation lifecycle.
///
/// Declaration order is execution order. The registry (`Phase::ALL`) is
/// exhaustive and duplicate-free by construction; adding a variant without
/// extending `ALL` or `policy` is a compile error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    PreTxBegin,
    StartTx,
    PreHandler,
    Handler,
    PostHandler,
    PreCommit,
    EndTx,
    PostCommit,
    PostResponse,
}

/// Side-effect policy attached 1:1 to each phase.
///
/// `require_owned_tx_for_commit` is only meaningful when `allow_commit` is
/// true; the constructors keep it false otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhasePolicy {
    pub allow_flush: bool,
    pub allow_commit: bool,
    pub require_owned_tx_for_commit: bool,
}

impl PhasePolicy {
    /// No writes of any kind.
    pub const fn sealed() -> Self {
        Self {
            allow_flush: false,
            allow_commit: false,
            require_owned_tx_for_commit: false,
        }
    }

    /// Buffered writes may be flushed; commit stays forbidden.
    pub const fn flush_only() -> Self {
        Self {
            allow_flush: true,
            allow_commit: false,
            require_owned_tx_for_commit: false,
        }
    }

    /// Flush and commit allowed, commit gated on transaction ownership.
    pub const fn commit_when_owned() -> Self {
        Self {
            allow_flush: true,
            allow_commit: true,
            require_owned_tx_for_commit: true,
        }
    }
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Phase; PHASE_COUNT] = [
        Phase::PreTxBegin,
        Phase::StartTx,
        Phase::PreHandler,
        Phase::Handler,
        Phase::PostHandler,
        Phase::PreCommit,
        Phase::EndTx,
        Phase::PostCommit,
        Phase::PostResponse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreTxBegin => "pre_tx_begin",
            Self::StartTx => "start_tx",
            Self::PreHandler => "pre_handler",
            Self::Handler => "handler",
            Self::PostHandler => "post_handler",
            Self::PreCommit => "pre_commit",
            Self::EndTx => "end_tx",
            Self::PostCommit => "post_commit",
            Self::PostResponse => "post_response",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pre_tx_begin" => Some(Self::PreTxBegin),
            "start_tx" => Some(Self::StartTx),
            "pre_handler" => Some(Self::PreHandler),
            "handler" => Some(Self::Handler),
            "post_handler" => Some(Self::PostHandler),
            "pre_commit" => Some(Self::PreCommit),
            "end_tx" => Some(Self::EndTx),
            "post_commit" => Some(Self::PostCommit),
            "post_response" => Some(Self::PostResponse),
            _ => None,
        }
    }

    /// Ordinal rank in the registry.
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn next(&self) -> Option<Phase> {
        match self {
            Self::PreTxBegin => Some(Self::StartTx),
            Self::StartTx => Some(Self::PreHandler),
            Self::PreHandler => Some(Self::Handler),
            Self::Handler => Some(Self::PostHandler),
            Self::PostHandler => Some(Self::PreCommit),
            Self::PreCommit => Some(Self::EndTx),
            Self::EndTx => Some(Self::PostCommit),
            Self::PostCommit => Some(Self::PostResponse),
            Self::PostResponse => None,
        }
    }

    pub fn previous(&self) -> Option<Phase> {
        match self {
            Self::PreTxBegin => None,
            Self::StartTx => Some(Self::PreTxBegin),
            Self::PreHandler => Some(Self::StartTx),
            Self::Handler => Some(Self::PreHandler),
            Self::PostHandler => Some(Self::Handler),
            Self::PreCommit => Some(Self::PostHandler),
            Self::EndTx => Some(Self::PreCommit),
            Self::PostCommit => Some(Self::EndTx),
            Self::PostResponse => Some(Self::PostCommit),
        }
    }

    /// The write policy enforced while this phase runs.
    ///
    /// | phase | flush | commit |
    /// |---|---|---|
    /// | pre_tx_begin, start_tx, pre_commit, post_response | no | no |
    /// | pre_handler, handler, post_handler, post_commit | yes | no |
    /// | end_tx | yes | owned only |
    pub fn policy(&self) -> PhasePolicy {
        match self {
            Self::PreTxBegin => PhasePolicy::sealed(),
            Self::StartTx => PhasePolicy::sealed(),
            Self::PreHandler => PhasePolicy::flush_only(),
            Self::Handler => PhasePolicy::flush_only(),
            Self::PostHandler => PhasePolicy::flush_only(),
            Self::PreCommit => PhasePolicy::sealed(),
            Self::EndTx => PhasePolicy::commit_when_owned(),
            Self::PostCommit => PhasePolicy::flush_only(),
            Self::PostResponse => PhasePolicy::sealed(),
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
