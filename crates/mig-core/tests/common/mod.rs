// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code)]

use mig_core::{BridgeError, MigNetwork, Node, NodeId, Reconstruct};

/// Installs a test-writer subscriber once per process (ignored if one exists).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Truth table of every node over the network's primary inputs.
///
/// Supports up to six inputs (one `u64` per node). Every symbol in a
/// `MigNetwork` is a primary input.
pub fn truth_tables(ntk: &MigNetwork) -> Vec<u64> {
    let vars = ntk.pis().len();
    assert!(vars <= 6, "truth tables limited to six inputs");
    let rows = 1u32 << vars;
    let mask = if rows == 64 {
        u64::MAX
    } else {
        (1u64 << rows) - 1
    };
    let mut tables: Vec<u64> = Vec::with_capacity(ntk.size());
    for (id, node) in ntk.iter() {
        let value = match *node {
            Node::Symbol(_) => {
                let var = ntk.pis().iter().position(|pi| *pi == id).unwrap();
                projection(var, rows)
            }
            Node::True => mask,
            Node::False => 0,
            Node::Not(a) => !tables[a.index()] & mask,
            Node::Maj([a, b, c]) => {
                let (a, b, c) = (tables[a.index()], tables[b.index()], tables[c.index()]);
                (a & b) | (a & c) | (b & c)
            }
        };
        tables.push(value);
    }
    tables
}

/// Truth table of a single node.
pub fn truth_table(ntk: &MigNetwork, id: NodeId) -> u64 {
    truth_tables(ntk)[id.index()]
}

fn projection(var: usize, rows: u32) -> u64 {
    (0..rows)
        .filter(|row| (row >> var) & 1 == 1)
        .fold(0u64, |acc, row| acc | (1u64 << row))
}

/// One observed callback invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Add(Node<usize>),
    MarkRoots(Vec<usize>),
}

/// Reconstruction target that records every call in order.
#[derive(Debug, Default)]
pub struct CallLog {
    pub calls: Vec<Call>,
    added: usize,
}

impl CallLog {
    pub fn mark_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::MarkRoots(_)))
            .count()
    }

    pub fn marked(&self) -> Option<&[usize]> {
        self.calls.iter().find_map(|c| match c {
            Call::MarkRoots(roots) => Some(roots.as_slice()),
            Call::Add(_) => None,
        })
    }
}

impl Reconstruct for CallLog {
    type Ref = usize;

    fn add_node(&mut self, node: Node<usize>) -> Result<usize, BridgeError> {
        self.calls.push(Call::Add(node));
        self.added += 1;
        Ok(self.added - 1)
    }

    fn mark_roots(&mut self, roots: &[usize]) -> Result<(), BridgeError> {
        self.calls.push(Call::MarkRoots(roots.to_vec()));
        Ok(())
    }
}
