// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Minimal host-side logic network.
//!
//! Stands in for the host's network library: enough storage to build a MIG,
//! mirror part of it into a rewrite session, and receive the rewritten
//! fragment back. No fanout tracking and no simulation.
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, instrument};

use crate::engine::RewriteSession;
use crate::error::{BridgeError, Violation};
use crate::ident::NodeRef;
use crate::node::Node;
use crate::reconstruct::Reconstruct;

/// Index of a node in a [`MigNetwork`].
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(u32);

impl NodeId {
    /// Position in the network's node table.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Host MIG storage.
///
/// Inputs are symbols with unique names. `create_pi` draws names from a
/// counter that skips names already taken, so a symbol coming back from an
/// engine resolves to the host input it was mirrored from. A name the host
/// has never seen becomes a new primary input.
#[derive(Debug, Clone, Default)]
pub struct MigNetwork {
    nodes: Vec<Node<NodeId>>,
    constants: [Option<NodeId>; 2],
    symbols: FxHashMap<u64, NodeId>,
    pis: Vec<NodeId>,
    next_pi_name: u64,
    outputs: Vec<NodeId>,
    marked: Option<Vec<NodeId>>,
}

impl MigNetwork {
    /// Empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    /// Primary inputs in creation order.
    pub fn pis(&self) -> &[NodeId] {
        &self.pis
    }

    /// Primary outputs in creation order.
    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    /// Node behind `id`.
    pub fn node(&self, id: NodeId) -> Option<&Node<NodeId>> {
        self.nodes.get(id.index())
    }

    /// All nodes in creation (topological) order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node<NodeId>)> + '_ {
        self.nodes.iter().zip(0u32..).map(|(node, i)| (NodeId(i), node))
    }

    /// Creates a primary input.
    pub fn create_pi(&mut self) -> Result<NodeId, BridgeError> {
        while self.symbols.contains_key(&self.next_pi_name) {
            self.next_pi_name += 1;
        }
        let name = self.next_pi_name;
        self.next_pi_name += 1;
        self.symbol(name)
    }

    /// The constant node for `value`, created on first use.
    pub fn get_constant(&mut self, value: bool) -> Result<NodeId, BridgeError> {
        let slot = usize::from(value);
        if let Some(id) = self.constants[slot] {
            return Ok(id);
        }
        let id = self.push(Node::constant(value))?;
        self.constants[slot] = Some(id);
        Ok(id)
    }

    /// Complement of `a`.
    pub fn create_not(&mut self, a: NodeId) -> Result<NodeId, BridgeError> {
        self.check(a)?;
        self.push(Node::Not(a))
    }

    /// `MAJ(a, b, c)`.
    pub fn create_maj(&mut self, a: NodeId, b: NodeId, c: NodeId) -> Result<NodeId, BridgeError> {
        for id in [a, b, c] {
            self.check(id)?;
        }
        self.push(Node::Maj([a, b, c]))
    }

    /// `a AND b`, i.e. `MAJ(a, b, false)`.
    pub fn create_and(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, BridgeError> {
        let zero = self.get_constant(false)?;
        self.create_maj(a, b, zero)
    }

    /// `a OR b`, i.e. `MAJ(a, b, true)`.
    pub fn create_or(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, BridgeError> {
        let one = self.get_constant(true)?;
        self.create_maj(a, b, one)
    }

    /// Registers `a` as a primary output; returns the output index.
    pub fn create_po(&mut self, a: NodeId) -> Result<usize, BridgeError> {
        self.check(a)?;
        self.outputs.push(a);
        Ok(self.outputs.len() - 1)
    }

    /// Roots reported by the last reconstruction, if any.
    pub fn take_marked_roots(&mut self) -> Option<Vec<NodeId>> {
        self.marked.take()
    }

    /// Mirrors the cone of `roots` into `session`, each node exactly once and
    /// operands first. Returns the session references of `roots`, in order.
    #[instrument(skip_all, fields(roots = roots.len()))]
    pub fn send<S: RewriteSession + ?Sized>(
        &self,
        roots: &[NodeId],
        session: &mut S,
    ) -> Result<Vec<NodeRef>, BridgeError> {
        let mut cone = FxHashSet::default();
        let mut stack = roots.to_vec();
        while let Some(id) = stack.pop() {
            if !cone.insert(id) {
                continue;
            }
            stack.extend_from_slice(self.checked(id)?.inputs());
        }
        let mut order: Vec<NodeId> = cone.into_iter().collect();
        order.sort_unstable();

        let mut mirrored: FxHashMap<NodeId, NodeRef> = FxHashMap::default();
        for id in order {
            let node = self.checked(id)?.try_map(|i| mirrored_ref(&mirrored, i))?;
            mirrored.insert(id, session.add_node(node)?);
        }
        debug!(mirrored = mirrored.len(), "cone mirrored");
        roots.iter().map(|r| mirrored_ref(&mirrored, *r)).collect()
    }

    /// Mirrors `roots` into `session`, rewrites them, and reconstructs the
    /// result here. Returns the rewritten roots, positionally matching `roots`.
    pub fn rewrite_with<S: RewriteSession + ?Sized>(
        &mut self,
        roots: &[NodeId],
        session: &mut S,
    ) -> Result<Vec<NodeId>, BridgeError> {
        let refs = self.send(roots, session)?;
        self.marked = None;
        session.rewrite(&refs, self)?;
        self.marked
            .take()
            .ok_or(BridgeError::ProtocolViolation(Violation::RootsNotMarked))
    }

    fn symbol(&mut self, name: u64) -> Result<NodeId, BridgeError> {
        if let Some(id) = self.symbols.get(&name) {
            return Ok(*id);
        }
        let id = self.push(Node::Symbol(name))?;
        self.symbols.insert(name, id);
        self.pis.push(id);
        Ok(id)
    }

    fn push(&mut self, node: Node<NodeId>) -> Result<NodeId, BridgeError> {
        let index = u32::try_from(self.nodes.len())
            .map_err(|_| BridgeError::engine("host network is full"))?;
        self.nodes.push(node);
        Ok(NodeId(index))
    }

    fn check(&self, id: NodeId) -> Result<(), BridgeError> {
        self.checked(id).map(|_| ())
    }

    fn checked(&self, id: NodeId) -> Result<&Node<NodeId>, BridgeError> {
        self.nodes
            .get(id.index())
            .ok_or(BridgeError::ProtocolViolation(Violation::StaleReference {
                raw: u64::from(id.0),
            }))
    }
}

impl Reconstruct for MigNetwork {
    type Ref = NodeId;

    fn add_node(&mut self, node: Node<NodeId>) -> Result<NodeId, BridgeError> {
        match node {
            Node::Symbol(name) => self.symbol(name),
            Node::True => self.get_constant(true),
            Node::False => self.get_constant(false),
            Node::Not(a) => self.create_not(a),
            Node::Maj([a, b, c]) => self.create_maj(a, b, c),
        }
    }

    fn mark_roots(&mut self, roots: &[NodeId]) -> Result<(), BridgeError> {
        for root in roots {
            self.check(*root)?;
        }
        self.marked = Some(roots.to_vec());
        Ok(())
    }
}

fn mirrored_ref(mirrored: &FxHashMap<NodeId, NodeRef>, id: NodeId) -> Result<NodeRef, BridgeError> {
    mirrored
        .get(&id)
        .copied()
        .ok_or(BridgeError::ProtocolViolation(Violation::StaleReference {
            raw: u64::from(id.0),
        }))
}
