// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
use mig_core::{
    BridgeConfig, BridgeError, Graph, MigNetwork, Node, NodeRef, PassthroughRewriter,
    RewriteSession, Rewritten, Session, Violation,
};
mod common;
use common::{init_tracing, truth_table, Call, CallLog};

#[test]
fn or_then_and_scenario_reconstructs_two_levels() {
    init_tracing();
    let mut ntk = MigNetwork::new();
    let pi0 = ntk.create_pi().unwrap();
    let pi1 = ntk.create_pi().unwrap();
    let pi2 = ntk.create_pi().unwrap();
    let s1 = ntk.create_or(pi0, pi1).unwrap();
    let ns1 = ntk.create_not(s1).unwrap();
    let s2 = ntk.create_and(ns1, pi2).unwrap();

    let mut session = Session::new(PassthroughRewriter);
    let refs = ntk.send(&[s2], &mut session).unwrap();
    let mut log = CallLog::default();
    session.rewrite(&refs, &mut log).unwrap();

    assert_eq!(log.mark_count(), 1);
    assert!(matches!(log.calls.last(), Some(Call::MarkRoots(_))));
    let top = log.marked().unwrap();
    assert_eq!(top.len(), 1);
    let maj_count = log
        .calls
        .iter()
        .filter(|c| matches!(c, Call::Add(Node::Maj(_))))
        .count();
    assert_eq!(maj_count, 2);
    // The marked root is the last node added.
    let adds = log.calls.len() - 1;
    assert_eq!(top[0], adds - 1);
    assert!(matches!(log.calls[adds - 1], Call::Add(Node::Maj(_))));
}

#[test]
fn or_then_and_scenario_preserves_truth_table() {
    let mut ntk = MigNetwork::new();
    let pi0 = ntk.create_pi().unwrap();
    let pi1 = ntk.create_pi().unwrap();
    let pi2 = ntk.create_pi().unwrap();
    let s1 = ntk.create_or(pi0, pi1).unwrap();
    let ns1 = ntk.create_not(s1).unwrap();
    let s2 = ntk.create_and(ns1, pi2).unwrap();
    let before = ntk.size();

    let mut session = Session::new(PassthroughRewriter);
    let out = ntk.rewrite_with(&[s2], &mut session).unwrap();

    assert_eq!(out.len(), 1);
    assert_ne!(out[0], s2);
    assert!(ntk.size() > before);
    assert_eq!(truth_table(&ntk, out[0]), truth_table(&ntk, s2));
    // !(a | b) & c over three inputs
    assert_eq!(truth_table(&ntk, s2), 0b0001_0000);
}

#[test]
fn empty_roots_mark_empty_sequence() {
    let mut session = Session::new(PassthroughRewriter);
    session.add_symbol(0).unwrap();
    let mut log = CallLog::default();
    session.rewrite(&[], &mut log).unwrap();
    assert_eq!(log.calls, vec![Call::MarkRoots(Vec::new())]);
}

#[test]
fn root_order_is_preserved() {
    let mut ntk = MigNetwork::new();
    let a = ntk.create_pi().unwrap();
    let b = ntk.create_pi().unwrap();
    let x = ntk.create_and(a, b).unwrap();
    let y = ntk.create_or(a, b).unwrap();
    let mut session = Session::new(PassthroughRewriter);
    let out = ntk.rewrite_with(&[y, x, y], &mut session).unwrap();
    assert_eq!(out.len(), 3);
    assert_eq!(out[0], out[2]);
    assert_eq!(truth_table(&ntk, out[0]), truth_table(&ntk, y));
    assert_eq!(truth_table(&ntk, out[1]), truth_table(&ntk, x));
}

#[test]
fn refs_from_another_session_are_foreign() {
    let mut first = Session::new(PassthroughRewriter);
    let mut second = Session::new(PassthroughRewriter);
    let a = first.add_symbol(0).unwrap();
    let err = second.add_not(a).unwrap_err();
    assert_eq!(err.violation(), Some(Violation::ForeignReference { raw: a.raw() }));
    let err = second.rewrite(&[a], &mut CallLog::default()).unwrap_err();
    assert_eq!(err.violation(), Some(Violation::ForeignReference { raw: a.raw() }));
}

#[test]
fn engine_returning_foreign_roots_is_an_engine_failure() {
    let mut session = Session::new(|_: &Graph, roots: &[NodeRef]| -> Result<Rewritten, BridgeError> {
        let graph = Graph::new();
        let mut other = Graph::new();
        let stray = other.add_true()?;
        Ok(Rewritten {
            graph,
            roots: roots.iter().map(|_| stray).collect(),
        })
    });
    let a = session.add_symbol(0).unwrap();
    let mut log = CallLog::default();
    let err = session.rewrite(&[a], &mut log).unwrap_err();
    assert!(matches!(err, BridgeError::EngineFailure(_)));
    assert!(log.calls.is_empty());
}

#[test]
fn engine_returning_roots_from_an_earlier_epoch_is_an_engine_failure() {
    let mut session = Session::new(|_: &Graph, roots: &[NodeRef]| -> Result<Rewritten, BridgeError> {
        let mut graph = Graph::new();
        let old = graph.add_true()?;
        graph.reset();
        Ok(Rewritten {
            graph,
            roots: vec![old; roots.len()],
        })
    });
    let a = session.add_symbol(0).unwrap();
    let mut log = CallLog::default();
    let err = session.rewrite(&[a], &mut log).unwrap_err();
    assert!(matches!(err, BridgeError::EngineFailure(_)));
    assert_eq!(err.violation(), None);
    assert_eq!(log.mark_count(), 0);
}

#[test]
fn constant_rewriter_replaces_cone() {
    let mut session = Session::new(|_: &Graph, roots: &[NodeRef]| -> Result<Rewritten, BridgeError> {
        let mut graph = Graph::new();
        let t = graph.add_true()?;
        let f = graph.add_not(t)?;
        Ok(Rewritten {
            graph,
            roots: vec![f; roots.len()],
        })
    });
    let mut ntk = MigNetwork::new();
    let a = ntk.create_pi().unwrap();
    let na = ntk.create_not(a).unwrap();
    let x = ntk.create_and(a, na).unwrap();
    let out = ntk.rewrite_with(&[x], &mut session).unwrap();
    assert_eq!(truth_table(&ntk, out[0]), 0);
    assert_eq!(truth_table(&ntk, out[0]), truth_table(&ntk, x));
}

#[test]
fn exhausted_session_reports_engine_failure() {
    let mut session = Session::with_config(
        PassthroughRewriter,
        BridgeConfig {
            max_nodes: Some(2),
            ..BridgeConfig::default()
        },
    );
    let mut ntk = MigNetwork::new();
    let a = ntk.create_pi().unwrap();
    let b = ntk.create_pi().unwrap();
    let x = ntk.create_and(a, b).unwrap();
    let err = ntk.rewrite_with(&[x], &mut session).unwrap_err();
    assert!(matches!(err, BridgeError::EngineFailure(_)));
}

#[test]
fn sessions_run_on_separate_threads() {
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|seed| {
                scope.spawn(move || {
                    let mut ntk = MigNetwork::new();
                    let a = ntk.create_pi().unwrap();
                    let b = ntk.create_pi().unwrap();
                    let mut root = ntk.create_and(a, b).unwrap();
                    for _ in 0..seed {
                        root = ntk.create_or(root, a).unwrap();
                    }
                    let mut session = Session::new(PassthroughRewriter);
                    let out = ntk.rewrite_with(&[root], &mut session).unwrap();
                    truth_table(&ntk, out[0]) == truth_table(&ntk, root)
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    });
}
