// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Engine handle semantics: feeding nodes to a rewriting engine and replaying
//! its result through a reconstruction callback.
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, instrument};

use crate::config::{BridgeConfig, DedupPolicy};
use crate::error::{BridgeError, Violation};
use crate::graph::Graph;
use crate::ident::{NodeRef, ScopeId};
use crate::node::Node;
use crate::reconstruct::{reject, Reconstruct, ReconstructGuard};

/// Output of a [`Rewriter`]: a fresh DAG plus one root per input root.
#[derive(Debug, Clone)]
pub struct Rewritten {
    /// Graph the output roots live in.
    pub graph: Graph,
    /// `roots[i]` is the rewritten equivalent of input root `i`.
    pub roots: Vec<NodeRef>,
}

/// The rule search behind a rewrite. Treated as a black box by the bridge.
pub trait Rewriter {
    /// Produces a semantically equivalent replacement for the cone of `roots`.
    fn rewrite(&mut self, input: &Graph, roots: &[NodeRef]) -> Result<Rewritten, BridgeError>;
}

impl<F> Rewriter for F
where
    F: FnMut(&Graph, &[NodeRef]) -> Result<Rewritten, BridgeError>,
{
    fn rewrite(&mut self, input: &Graph, roots: &[NodeRef]) -> Result<Rewritten, BridgeError> {
        self(input, roots)
    }
}

/// Applies no rules: the output is a node-for-node copy of the roots' cone.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughRewriter;

impl Rewriter for PassthroughRewriter {
    fn rewrite(&mut self, input: &Graph, roots: &[NodeRef]) -> Result<Rewritten, BridgeError> {
        let cone = input.cone(roots)?;
        let mut graph = Graph::with_config(BridgeConfig {
            dedup: DedupPolicy::None,
            cancel_double_negation: false,
            max_nodes: None,
        });
        let mut copied = FxHashMap::default();
        for (r, node) in input.iter() {
            if !cone.contains(&r) {
                continue;
            }
            let node = node.try_map(|i| lookup(&copied, i))?;
            copied.insert(r, graph.add(node)?);
        }
        let roots = roots
            .iter()
            .map(|r| lookup(&copied, *r))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Rewritten { graph, roots })
    }
}

/// Host-facing interface of an engine handle.
///
/// Implemented in-process by [`Session`] and across the C ABI by the FFI
/// crate's foreign-engine owner, so host code can drive either the same way.
pub trait RewriteSession {
    /// Numbering space of the references this handle currently issues.
    fn scope(&self) -> ScopeId;

    /// Registers `node`; every operand must come from an earlier add.
    fn add_node(&mut self, node: Node<NodeRef>) -> Result<NodeRef, BridgeError>;

    /// Rewrites the cone of `roots`, reconstructing the result into `target`.
    ///
    /// Synchronous: every callback invocation happens before this returns.
    /// The nodes fed so far are consumed; afterwards their references are stale.
    fn rewrite<T: Reconstruct + ?Sized>(
        &mut self,
        roots: &[NodeRef],
        target: &mut T,
    ) -> Result<(), BridgeError>;

    /// Adds an input node.
    fn add_symbol(&mut self, name: u64) -> Result<NodeRef, BridgeError> {
        self.add_node(Node::Symbol(name))
    }

    /// Adds constant true.
    fn add_true(&mut self) -> Result<NodeRef, BridgeError> {
        self.add_node(Node::True)
    }

    /// Adds constant false.
    fn add_false(&mut self) -> Result<NodeRef, BridgeError> {
        self.add_node(Node::False)
    }

    /// Adds the complement of `a`.
    fn add_not(&mut self, a: NodeRef) -> Result<NodeRef, BridgeError> {
        self.add_node(Node::Not(a))
    }

    /// Adds `MAJ(a, b, c)`.
    fn add_maj(&mut self, a: NodeRef, b: NodeRef, c: NodeRef) -> Result<NodeRef, BridgeError> {
        self.add_node(Node::Maj([a, b, c]))
    }
}

/// A live rewriting session: the engine's input arena plus its rewriter.
pub struct Session<R> {
    graph: Graph,
    rewriter: R,
    rewrites: u64,
}

impl<R: Rewriter> Session<R> {
    /// Session with the default config.
    pub fn new(rewriter: R) -> Self {
        Self::with_config(rewriter, BridgeConfig::default())
    }

    /// Session whose input arena follows `config`.
    #[instrument(skip(rewriter))]
    pub fn with_config(rewriter: R, config: BridgeConfig) -> Self {
        let graph = Graph::with_config(config);
        debug!(scope = %graph.scope(), "session created");
        Self {
            graph,
            rewriter,
            rewrites: 0,
        }
    }

    /// The nodes fed since the last rewrite.
    pub const fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Number of completed rewrite invocations (successful or not).
    pub const fn rewrites(&self) -> u64 {
        self.rewrites
    }

    /// Maps a raw boundary value to a live reference of this session.
    pub fn resolve(&self, raw: u64) -> Result<NodeRef, BridgeError> {
        self.graph.resolve(raw)
    }

    /// Consumes the fed nodes without rewriting them, as a failed rewrite would.
    pub fn discard(&mut self) {
        self.graph.reset();
        self.rewrites += 1;
        debug!(scope = %self.graph.scope(), "fed nodes discarded");
    }

    /// Ends the session. Dropping has the same effect.
    pub fn release(self) {}

    fn run<T: Reconstruct + ?Sized>(
        &mut self,
        roots: &[NodeRef],
        target: &mut T,
    ) -> Result<(), BridgeError> {
        for root in roots {
            self.graph.check(*root).map_err(|e| match e.violation() {
                Some(v) => reject(v),
                None => e,
            })?;
        }
        let rewritten = self.rewriter.rewrite(&self.graph, roots)?;
        if rewritten.roots.len() != roots.len() {
            return Err(reject(Violation::RootCountMismatch {
                expected: roots.len(),
                actual: rewritten.roots.len(),
            }));
        }
        let cone = rewritten.graph.cone(&rewritten.roots).map_err(|e| {
            BridgeError::engine(format!("rewriter returned roots outside its output: {e}"))
        })?;
        let mut guard = ReconstructGuard::new(target, roots.len());
        replay(&rewritten, &cone, &mut guard)?;
        guard.finish()
    }
}

impl<R: Rewriter> RewriteSession for Session<R> {
    fn scope(&self) -> ScopeId {
        self.graph.scope()
    }

    fn add_node(&mut self, node: Node<NodeRef>) -> Result<NodeRef, BridgeError> {
        self.graph.add(node)
    }

    #[instrument(skip_all, fields(scope = %self.graph.scope(), roots = roots.len(), nodes = self.graph.len()))]
    fn rewrite<T: Reconstruct + ?Sized>(
        &mut self,
        roots: &[NodeRef],
        target: &mut T,
    ) -> Result<(), BridgeError> {
        let result = self.run(roots, target);
        self.graph.reset();
        self.rewrites += 1;
        debug!(ok = result.is_ok(), "rewrite finished");
        result
    }
}

impl<R> Drop for Session<R> {
    fn drop(&mut self) {
        debug!(scope = %self.graph.scope(), rewrites = self.rewrites, "session released");
    }
}

/// Sends `cone` into `guard` in topological order and marks the mapped roots.
fn replay<T: Reconstruct + ?Sized>(
    rewritten: &Rewritten,
    cone: &FxHashSet<NodeRef>,
    guard: &mut ReconstructGuard<'_, T>,
) -> Result<(), BridgeError> {
    let graph = &rewritten.graph;
    let mut placed: FxHashMap<NodeRef, T::Ref> = FxHashMap::default();
    for (r, node) in graph.iter() {
        if !cone.contains(&r) {
            continue;
        }
        let node = node.try_map(|i| lookup(&placed, i))?;
        placed.insert(r, guard.add_node(node)?);
    }
    let roots = rewritten
        .roots
        .iter()
        .map(|r| lookup(&placed, *r))
        .collect::<Result<Vec<_>, _>>()?;
    guard.mark_roots(&roots)
}

/// Placed image of `r`; a miss means the rewritten graph is inconsistent.
fn lookup<V: Copy>(map: &FxHashMap<NodeRef, V>, r: NodeRef) -> Result<V, BridgeError> {
    map.get(&r)
        .copied()
        .ok_or_else(|| BridgeError::engine(format!("rewritten graph lost node {r}")))
}
