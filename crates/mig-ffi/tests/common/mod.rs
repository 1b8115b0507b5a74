// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code, unsafe_code)]

use std::ffi::c_void;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use mig_core::{BridgeError, MigNetwork, Node, NodeId, Reconstruct};
use mig_ffi::{mig_engine, mig_rewrite_callback, mig_status};

/// Installs a test-writer subscriber once per process (ignored if one exists).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Truth table of every node over the network's primary inputs (up to six).
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
            Node::Symbol(_) => ntk.pis().iter().position(|pi| *pi == id).map_or(0, |var| {
                (0..rows)
                    .filter(|row| (row >> var) & 1 == 1)
                    .fold(0u64, |acc, row| acc | (1u64 << row))
            }),
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

pub fn truth_table(ntk: &MigNetwork, id: NodeId) -> u64 {
    truth_tables(ntk)[id.index()]
}

/// Reconstruction target that records every call in order.
#[derive(Debug, Default)]
pub struct Recorder {
    pub nodes: Vec<Node<usize>>,
    pub marks: Vec<Vec<usize>>,
}

impl Reconstruct for Recorder {
    type Ref = usize;

    fn add_node(&mut self, node: Node<usize>) -> Result<usize, BridgeError> {
        self.nodes.push(node);
        Ok(self.nodes.len() - 1)
    }

    fn mark_roots(&mut self, roots: &[usize]) -> Result<(), BridgeError> {
        self.marks.push(roots.to_vec());
        Ok(())
    }
}

/// What a scripted raw engine does with the callback during `rewrite`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Adds one constant, marks it for every root, releases.
    WellBehaved,
    SkipMark,
    MarkTwice,
    MarkWrongLength,
    AddAfterMark,
    SkipRelease,
    ReleaseTwice,
    AddAfterRelease,
    BogusOperand,
    NullRootsWithLength,
    FailAfterRelease,
}

struct ScriptState {
    script: Script,
    next: u64,
    released: Arc<AtomicU32>,
}

/// A hand-written raw engine that follows `script` on every rewrite and
/// bumps `released` when its own handle is released.
pub fn scripted_engine(script: Script, released: Arc<AtomicU32>) -> mig_engine {
    let state = Box::new(ScriptState {
        script,
        next: 0,
        released,
    });
    mig_engine {
        data: Box::into_raw(state).cast::<c_void>(),
        add_symbol: s_add_symbol,
        add_true: s_add_true,
        add_false: s_add_false,
        add_not: s_add_not,
        add_maj: s_add_maj,
        rewrite: s_rewrite,
        release: s_release,
    }
}

unsafe fn script_state<'a>(data: *mut c_void) -> &'a mut ScriptState {
    unsafe { &mut *data.cast::<ScriptState>() }
}

unsafe fn fresh(data: *mut c_void) -> u64 {
    let state = unsafe { script_state(data) };
    state.next += 1;
    state.next - 1
}

unsafe extern "C" fn s_add_symbol(data: *mut c_void, _name: u64) -> u64 {
    unsafe { fresh(data) }
}
unsafe extern "C" fn s_add_true(data: *mut c_void) -> u64 {
    unsafe { fresh(data) }
}
unsafe extern "C" fn s_add_false(data: *mut c_void) -> u64 {
    unsafe { fresh(data) }
}
unsafe extern "C" fn s_add_not(data: *mut c_void, _a: u64) -> u64 {
    unsafe { fresh(data) }
}
unsafe extern "C" fn s_add_maj(data: *mut c_void, _a: u64, _b: u64, _c: u64) -> u64 {
    unsafe { fresh(data) }
}

unsafe extern "C" fn s_rewrite(
    data: *mut c_void,
    roots_size: usize,
    _roots: *const u64,
    cb: mig_rewrite_callback,
) -> mig_status {
    let script = unsafe { script_state(data) }.script;
    unsafe {
        let t = (cb.add_true)(cb.data);
        let out = vec![t; roots_size];
        let mark = || (cb.mark_roots)(cb.data, out.len(), out.as_ptr());
        match script {
            Script::WellBehaved => {
                mark();
                (cb.release)(cb.data);
            }
            Script::SkipMark => (cb.release)(cb.data),
            Script::MarkTwice => {
                mark();
                mark();
                (cb.release)(cb.data);
            }
            Script::MarkWrongLength => {
                let long = vec![t; roots_size + 1];
                (cb.mark_roots)(cb.data, long.len(), long.as_ptr());
                (cb.release)(cb.data);
            }
            Script::AddAfterMark => {
                mark();
                (cb.add_false)(cb.data);
                (cb.release)(cb.data);
            }
            Script::SkipRelease => mark(),
            Script::ReleaseTwice => {
                mark();
                (cb.release)(cb.data);
                (cb.release)(cb.data);
            }
            Script::AddAfterRelease => {
                mark();
                (cb.release)(cb.data);
                (cb.add_false)(cb.data);
            }
            Script::BogusOperand => {
                (cb.add_not)(cb.data, 99);
                mark();
                (cb.release)(cb.data);
            }
            Script::NullRootsWithLength => {
                (cb.mark_roots)(cb.data, 2, std::ptr::null());
                (cb.release)(cb.data);
            }
            Script::FailAfterRelease => {
                (cb.release)(cb.data);
                return mig_status::ENGINE_FAILURE;
            }
        }
    }
    mig_status::OK
}

unsafe extern "C" fn s_release(data: *mut c_void) {
    let state = unsafe { Box::from_raw(data.cast::<ScriptState>()) };
    state.released.fetch_add(1, Ordering::SeqCst);
}
