// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Primitive node shapes of a majority-inverter graph.

/// Discriminant of a [`Node`], without its operands.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum NodeKind {
    /// Primary input tagged with an opaque name token.
    Symbol,
    /// Constant true.
    True,
    /// Constant false.
    False,
    /// Logical complement.
    Not,
    /// Three-input majority.
    Maj,
}

impl NodeKind {
    /// Every kind, in ABI table order.
    pub const ALL: [Self; 5] = [Self::Symbol, Self::True, Self::False, Self::Not, Self::Maj];

    /// snake_case name used for the ABI entry points (`add_<name>`).
    pub const fn name(self) -> &'static str {
        match self {
            Self::Symbol => "symbol",
            Self::True => "true",
            Self::False => "false",
            Self::Not => "not",
            Self::Maj => "maj",
        }
    }

    /// Number of node operands.
    pub const fn fanin(self) -> usize {
        match self {
            Self::Symbol | Self::True | Self::False => 0,
            Self::Not => 1,
            Self::Maj => 3,
        }
    }
}

/// A MIG node whose operands are references of type `R`.
///
/// AND and OR are not primitives: `AND(a, b) = MAJ(a, b, false)` and
/// `OR(a, b) = MAJ(a, b, true)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Node<R> {
    /// Input node; the name is opaque to the protocol.
    Symbol(u64),
    /// Constant true.
    True,
    /// Constant false.
    False,
    /// Complement of the operand.
    Not(R),
    /// Majority of three operands.
    Maj([R; 3]),
}

impl<R> Node<R> {
    /// Shape of this node.
    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::Symbol(_) => NodeKind::Symbol,
            Self::True => NodeKind::True,
            Self::False => NodeKind::False,
            Self::Not(_) => NodeKind::Not,
            Self::Maj(_) => NodeKind::Maj,
        }
    }

    /// Operands in positional order; empty for leaves.
    pub fn inputs(&self) -> &[R] {
        match self {
            Self::Symbol(_) | Self::True | Self::False => &[],
            Self::Not(a) => core::slice::from_ref(a),
            Self::Maj(ops) => ops,
        }
    }

    /// True for symbols and constants.
    pub fn is_leaf(&self) -> bool {
        self.inputs().is_empty()
    }

    /// Constant node for `value`.
    pub const fn constant(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }
}

impl<R: Copy> Node<R> {
    /// Same node with every operand translated by `f`.
    pub fn map<S>(&self, mut f: impl FnMut(R) -> S) -> Node<S> {
        match *self {
            Self::Symbol(name) => Node::Symbol(name),
            Self::True => Node::True,
            Self::False => Node::False,
            Self::Not(a) => Node::Not(f(a)),
            Self::Maj([a, b, c]) => Node::Maj([f(a), f(b), f(c)]),
        }
    }

    /// Fallible [`Node::map`]; stops at the first operand that fails.
    pub fn try_map<S, E>(&self, mut f: impl FnMut(R) -> Result<S, E>) -> Result<Node<S>, E> {
        Ok(match *self {
            Self::Symbol(name) => Node::Symbol(name),
            Self::True => Node::True,
            Self::False => Node::False,
            Self::Not(a) => Node::Not(f(a)?),
            Self::Maj([a, b, c]) => Node::Maj([f(a)?, f(b)?, f(c)?]),
        })
    }
}
