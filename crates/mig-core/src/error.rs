// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error taxonomy for the bridge.
use thiserror::Error;

/// A breach of the handoff protocol by either side.
///
/// At the raw boundary all of these are undefined behaviour; the safe layer
/// detects them and reports them instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Violation {
    /// The reference was issued by a different numbering space.
    #[error("reference {raw} belongs to a different numbering space")]
    ForeignReference {
        /// Raw boundary value of the offending reference.
        raw: u64,
    },
    /// The reference was never issued, or was retired by an earlier rewrite.
    #[error("reference {raw} is not live in this numbering space")]
    StaleReference {
        /// Raw boundary value of the offending reference.
        raw: u64,
    },
    /// `mark_roots` was invoked a second time within one rewrite.
    #[error("mark_roots called more than once")]
    RootsMarkedTwice,
    /// `mark_roots` received a different number of roots than `rewrite` did.
    #[error("expected {expected} roots, mark_roots received {actual}")]
    RootCountMismatch {
        /// Number of roots passed to `rewrite`.
        expected: usize,
        /// Number of roots passed to `mark_roots`.
        actual: usize,
    },
    /// The engine returned from `rewrite` without calling `mark_roots`.
    #[error("rewrite finished without mark_roots")]
    RootsNotMarked,
    /// An add-operation arrived after `mark_roots`.
    #[error("node added after mark_roots")]
    AddAfterMarkRoots,
    /// The callback was invoked after its release.
    #[error("callback used after release")]
    UseAfterRelease,
    /// The callback's release operation did not run exactly once.
    #[error("callback released {count} times, expected exactly once")]
    ReleaseCount {
        /// Observed number of release invocations.
        count: u32,
    },
    /// A null roots pointer was paired with a non-zero length.
    #[error("null roots pointer with length {len}")]
    NullRoots {
        /// Length that accompanied the null pointer.
        len: usize,
    },
    /// The foreign engine reported a violation without further detail.
    #[error("engine reported a protocol violation")]
    ReportedByEngine,
}

/// Errors surfaced by session, callback and FFI operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// Protocol misuse detected at the boundary.
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] Violation),
    /// The session cannot continue (exhausted storage, failed engine, caught panic).
    #[error("engine failure: {0}")]
    EngineFailure(String),
}

impl BridgeError {
    /// Shorthand for an [`BridgeError::EngineFailure`] with a message.
    pub fn engine(reason: impl Into<String>) -> Self {
        Self::EngineFailure(reason.into())
    }

    /// Returns the violation, if this is a protocol error.
    pub const fn violation(&self) -> Option<Violation> {
        match self {
            Self::ProtocolViolation(v) => Some(*v),
            Self::EngineFailure(_) => None,
        }
    }
}

/// Error type for loading a [`crate::BridgeConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error while reading the config file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed JSON or unknown field.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
