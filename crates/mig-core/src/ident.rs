// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scoped node references.
//!
//! The raw boundary carries node identity as a bare `u64`. Inside Rust every
//! reference also remembers the numbering space (scope) that issued it, so a
//! reference minted by one session can never be presented to another without
//! the mismatch being caught.
use std::sync::atomic::{AtomicU64, Ordering};

/// Sentinel returned across the raw boundary when an add-operation fails.
///
/// No numbering space ever issues this value.
pub const INVALID_REF: u64 = u64::MAX;

static NEXT_SCOPE: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a numbering space.
///
/// Every session arena, every host-side view of a foreign engine, and every
/// reconstruction callback frame owns exactly one live scope at a time. Scopes
/// are never reused within a process.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ScopeId(u64);

impl ScopeId {
    /// Mints a scope that has never been handed out before.
    #[must_use]
    pub fn fresh() -> Self {
        Self(NEXT_SCOPE.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying counter value (diagnostics only).
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

/// Reference to a node, valid only within the scope that issued it.
///
/// # Invariants
/// - `raw` is never [`INVALID_REF`].
/// - Within one scope, `raw` values are issued in strictly increasing order, so
///   a node's inputs always carry smaller raw values than the node itself.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeRef {
    scope: ScopeId,
    raw: u64,
}

impl NodeRef {
    pub(crate) const fn new(scope: ScopeId, raw: u64) -> Self {
        Self { scope, raw }
    }

    /// Builds a reference from a raw boundary value.
    ///
    /// Intended for adapters that translate between a numbering space and the
    /// C ABI; the result is only meaningful to the owner of `scope`.
    #[must_use]
    pub const fn from_raw(scope: ScopeId, raw: u64) -> Self {
        Self { scope, raw }
    }

    /// The scope that issued this reference.
    #[must_use]
    pub const fn scope(self) -> ScopeId {
        self.scope
    }

    /// The value carried across the raw boundary.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.raw
    }
}

impl core::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.scope, self.raw)
    }
}
