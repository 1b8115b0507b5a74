// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Append-only node arena for one numbering space.
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::config::{BridgeConfig, DedupPolicy};
use crate::error::{BridgeError, Violation};
use crate::ident::{NodeRef, ScopeId, INVALID_REF};
use crate::node::Node;

/// Arena of MIG nodes issued within a single scope.
///
/// Raw references are `base + index`. Every operand of a node was issued by a
/// strictly earlier `add`, so iteration order is a topological order and the
/// arena is acyclic by construction.
///
/// [`Graph::reset`] empties the arena but keeps the scope and moves `base`
/// past everything issued so far: references from before the reset are then
/// reported as [`Violation::StaleReference`] instead of silently aliasing
/// newer nodes.
#[derive(Debug, Clone)]
pub struct Graph {
    scope: ScopeId,
    base: u64,
    nodes: Vec<Node<NodeRef>>,
    hashed: FxHashMap<Node<NodeRef>, NodeRef>,
    config: BridgeConfig,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Empty arena with the default config.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    /// Empty arena in a fresh scope.
    #[must_use]
    pub fn with_config(config: BridgeConfig) -> Self {
        Self {
            scope: ScopeId::fresh(),
            base: 0,
            nodes: Vec::new(),
            hashed: FxHashMap::default(),
            config,
        }
    }

    /// Scope that issues this arena's references.
    pub const fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Active config.
    pub const fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when no node is live.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Maps a raw boundary value back to a live reference.
    pub fn resolve(&self, raw: u64) -> Result<NodeRef, BridgeError> {
        self.index_of(raw)?;
        Ok(NodeRef::new(self.scope, raw))
    }

    /// Verifies that `r` is live in this arena.
    pub fn check(&self, r: NodeRef) -> Result<(), BridgeError> {
        if r.scope() != self.scope {
            return Err(Violation::ForeignReference { raw: r.raw() }.into());
        }
        self.index_of(r.raw()).map(|_| ())
    }

    /// Looks up the node behind `r`.
    pub fn node(&self, r: NodeRef) -> Result<&Node<NodeRef>, BridgeError> {
        if r.scope() != self.scope {
            return Err(Violation::ForeignReference { raw: r.raw() }.into());
        }
        let index = self.index_of(r.raw())?;
        Ok(&self.nodes[index])
    }

    /// Live nodes in issue (topological) order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeRef, &Node<NodeRef>)> + '_ {
        let scope = self.scope;
        let base = self.base;
        self.nodes
            .iter()
            .zip(base..)
            .map(move |(node, raw)| (NodeRef::new(scope, raw), node))
    }

    /// Inserts `node`, honouring the dedup policy and capacity limit.
    ///
    /// # Errors
    /// [`Violation::ForeignReference`] / [`Violation::StaleReference`] for bad
    /// operands; [`BridgeError::EngineFailure`] when the arena is full.
    pub fn add(&mut self, node: Node<NodeRef>) -> Result<NodeRef, BridgeError> {
        for input in node.inputs() {
            self.check(*input)?;
        }
        if self.config.cancel_double_negation {
            if let Node::Not(operand) = node {
                if let Node::Not(inner) = *self.node(operand)? {
                    return Ok(inner);
                }
            }
        }
        let key = structural_key(node);
        if self.config.dedup == DedupPolicy::Structural {
            if let Some(existing) = self.hashed.get(&key) {
                return Ok(*existing);
            }
        }
        if let Some(max) = self.config.max_nodes {
            if self.nodes.len() >= max {
                return Err(BridgeError::engine(format!(
                    "node capacity of {max} exhausted in {}",
                    self.scope
                )));
            }
        }
        let raw = self.next_raw()?;
        let r = NodeRef::new(self.scope, raw);
        self.nodes.push(node);
        if self.config.dedup == DedupPolicy::Structural {
            self.hashed.insert(key, r);
        }
        trace!(node = %r, kind = node.kind().name(), "node added");
        Ok(r)
    }

    /// Adds an input node.
    pub fn add_symbol(&mut self, name: u64) -> Result<NodeRef, BridgeError> {
        self.add(Node::Symbol(name))
    }

    /// Adds constant true.
    pub fn add_true(&mut self) -> Result<NodeRef, BridgeError> {
        self.add(Node::True)
    }

    /// Adds constant false.
    pub fn add_false(&mut self) -> Result<NodeRef, BridgeError> {
        self.add(Node::False)
    }

    /// Adds the complement of `a`.
    pub fn add_not(&mut self, a: NodeRef) -> Result<NodeRef, BridgeError> {
        self.add(Node::Not(a))
    }

    /// Adds `MAJ(a, b, c)`.
    pub fn add_maj(&mut self, a: NodeRef, b: NodeRef, c: NodeRef) -> Result<NodeRef, BridgeError> {
        self.add(Node::Maj([a, b, c]))
    }

    /// Every node reachable from `roots`, roots included.
    pub fn cone(&self, roots: &[NodeRef]) -> Result<FxHashSet<NodeRef>, BridgeError> {
        let mut seen = FxHashSet::default();
        let mut stack = Vec::with_capacity(roots.len());
        for root in roots {
            self.check(*root)?;
            stack.push(*root);
        }
        while let Some(r) = stack.pop() {
            if !seen.insert(r) {
                continue;
            }
            stack.extend_from_slice(self.node(r)?.inputs());
        }
        Ok(seen)
    }

    /// Retires every live reference and empties the arena.
    pub fn reset(&mut self) {
        self.base += self.nodes.len() as u64;
        self.nodes.clear();
        self.hashed.clear();
    }

    fn index_of(&self, raw: u64) -> Result<usize, BridgeError> {
        raw.checked_sub(self.base)
            .and_then(|offset| usize::try_from(offset).ok())
            .filter(|index| *index < self.nodes.len())
            .ok_or(BridgeError::ProtocolViolation(Violation::StaleReference {
                raw,
            }))
    }

    fn next_raw(&self) -> Result<u64, BridgeError> {
        self.base
            .checked_add(self.nodes.len() as u64)
            .filter(|raw| *raw != INVALID_REF)
            .ok_or_else(|| BridgeError::engine(format!("reference space of {} exhausted", self.scope)))
    }
}

fn structural_key(node: Node<NodeRef>) -> Node<NodeRef> {
    match node {
        Node::Maj(mut ops) => {
            ops.sort_unstable();
            Node::Maj(ops)
        }
        other => other,
    }
}
