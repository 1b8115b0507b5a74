// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The reconstruction callback: how an engine writes its result back into the
//! host's node space.
use std::fmt::Debug;
use std::hash::Hash;

use tracing::warn;

use crate::error::{BridgeError, Violation};
use crate::node::Node;

/// Receiver of a rewritten graph fragment.
///
/// An engine calls the add-operations zero or more times, each operand being a
/// reference this receiver returned earlier, and then calls
/// [`Reconstruct::mark_roots`] exactly once. Position `i` of the marked roots
/// is the rewritten equivalent of position `i` of the roots passed to the
/// rewrite.
pub trait Reconstruct {
    /// Reference type of the receiver's node space.
    type Ref: Copy + Eq + Hash + Debug;

    /// Materializes `node` and returns its reference.
    fn add_node(&mut self, node: Node<Self::Ref>) -> Result<Self::Ref, BridgeError>;

    /// Declares the rewritten roots. Final call of a rewrite.
    fn mark_roots(&mut self, roots: &[Self::Ref]) -> Result<(), BridgeError>;

    /// Adds an input node tagged with `name`.
    fn add_symbol(&mut self, name: u64) -> Result<Self::Ref, BridgeError> {
        self.add_node(Node::Symbol(name))
    }

    /// Adds constant true.
    fn add_true(&mut self) -> Result<Self::Ref, BridgeError> {
        self.add_node(Node::True)
    }

    /// Adds constant false.
    fn add_false(&mut self) -> Result<Self::Ref, BridgeError> {
        self.add_node(Node::False)
    }

    /// Adds the complement of `a`.
    fn add_not(&mut self, a: Self::Ref) -> Result<Self::Ref, BridgeError> {
        self.add_node(Node::Not(a))
    }

    /// Adds `MAJ(a, b, c)`.
    fn add_maj(&mut self, a: Self::Ref, b: Self::Ref, c: Self::Ref) -> Result<Self::Ref, BridgeError> {
        self.add_node(Node::Maj([a, b, c]))
    }
}

impl<T: Reconstruct + ?Sized> Reconstruct for &mut T {
    type Ref = T::Ref;

    fn add_node(&mut self, node: Node<Self::Ref>) -> Result<Self::Ref, BridgeError> {
        (**self).add_node(node)
    }

    fn mark_roots(&mut self, roots: &[Self::Ref]) -> Result<(), BridgeError> {
        (**self).mark_roots(roots)
    }
}

/// Call-ordering rules of one reconstruction callback.
///
/// Tracks a single rewrite invocation: adds are legal until `mark_roots`,
/// `mark_roots` is legal once and must carry `expected_roots` entries, and
/// nothing is legal after release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackProtocol {
    expected_roots: usize,
    marked: bool,
    released: bool,
}

impl CallbackProtocol {
    /// Protocol for a rewrite over `expected_roots` roots.
    pub const fn new(expected_roots: usize) -> Self {
        Self {
            expected_roots,
            marked: false,
            released: false,
        }
    }

    /// Number of roots `mark_roots` must receive.
    pub const fn expected_roots(&self) -> usize {
        self.expected_roots
    }

    /// Whether `mark_roots` has been accepted.
    pub const fn is_marked(&self) -> bool {
        self.marked
    }

    /// Whether the callback has been released.
    pub const fn is_released(&self) -> bool {
        self.released
    }

    /// Gate for an add-operation.
    pub fn before_add(&self) -> Result<(), Violation> {
        if self.released {
            return Err(Violation::UseAfterRelease);
        }
        if self.marked {
            return Err(Violation::AddAfterMarkRoots);
        }
        Ok(())
    }

    /// Gate for `mark_roots` with `len` roots. The first call consumes the
    /// single permitted mark even when its length is wrong.
    pub fn before_mark(&mut self, len: usize) -> Result<(), Violation> {
        if self.released {
            return Err(Violation::UseAfterRelease);
        }
        if self.marked {
            return Err(Violation::RootsMarkedTwice);
        }
        self.marked = true;
        if len != self.expected_roots {
            return Err(Violation::RootCountMismatch {
                expected: self.expected_roots,
                actual: len,
            });
        }
        Ok(())
    }

    /// Records the release of the callback.
    pub fn release(&mut self) -> Result<(), Violation> {
        if self.released {
            return Err(Violation::ReleaseCount { count: 2 });
        }
        self.released = true;
        Ok(())
    }

    /// Checks the terminal state after the engine returned.
    pub fn finish(&self) -> Result<(), Violation> {
        if self.marked {
            Ok(())
        } else {
            Err(Violation::RootsNotMarked)
        }
    }
}

/// Logs and converts a violation.
pub(crate) fn reject(violation: Violation) -> BridgeError {
    warn!(%violation, "protocol violation");
    violation.into()
}

/// Wraps a [`Reconstruct`] target with the [`CallbackProtocol`] rules.
pub struct ReconstructGuard<'a, T: Reconstruct + ?Sized> {
    target: &'a mut T,
    protocol: CallbackProtocol,
}

impl<'a, T: Reconstruct + ?Sized> ReconstructGuard<'a, T> {
    /// Guards `target` for a rewrite over `expected_roots` roots.
    pub fn new(target: &'a mut T, expected_roots: usize) -> Self {
        Self {
            target,
            protocol: CallbackProtocol::new(expected_roots),
        }
    }

    /// Current protocol state.
    pub const fn protocol(&self) -> &CallbackProtocol {
        &self.protocol
    }

    /// Ends the rewrite; fails if `mark_roots` never happened.
    pub fn finish(self) -> Result<(), BridgeError> {
        self.protocol.finish().map_err(reject)
    }
}

impl<T: Reconstruct + ?Sized> Reconstruct for ReconstructGuard<'_, T> {
    type Ref = T::Ref;

    fn add_node(&mut self, node: Node<Self::Ref>) -> Result<Self::Ref, BridgeError> {
        self.protocol.before_add().map_err(reject)?;
        self.target.add_node(node)
    }

    fn mark_roots(&mut self, roots: &[Self::Ref]) -> Result<(), BridgeError> {
        self.protocol.before_mark(roots.len()).map_err(reject)?;
        self.target.mark_roots(roots)
    }
}
