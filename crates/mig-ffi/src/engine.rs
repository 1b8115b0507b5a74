// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Engine side of the ABI: exposes any [`Rewriter`] as a [`mig_engine`] and
//! drives the host's [`mig_rewrite_callback`].
use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};

use mig_core::{
    BridgeConfig, BridgeError, Node, PassthroughRewriter, Reconstruct, RewriteSession, Rewriter,
    Session, INVALID_REF,
};
use tracing::{debug, warn};

use crate::abi::{mig_engine, mig_rewrite_callback, mig_status, raw_slice};

/// Owned view of a reconstruction callback received by an engine.
///
/// Releases the callback exactly once: explicitly via
/// [`ForeignCallback::release`], or on drop along any other exit path.
pub struct ForeignCallback {
    raw: mig_rewrite_callback,
    released: bool,
}

impl ForeignCallback {
    /// Takes ownership of `raw`.
    ///
    /// # Safety
    /// `raw` must be a callback passed into the current rewrite and not yet
    /// released; its function pointers must accept `raw.data`.
    pub unsafe fn from_raw(raw: mig_rewrite_callback) -> Self {
        Self {
            raw,
            released: false,
        }
    }

    /// Releases the callback now.
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            // SAFETY: the host supplied `release` for `data`; guarded to run once.
            unsafe { (self.raw.release)(self.raw.data) };
        }
    }
}

impl Drop for ForeignCallback {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl Reconstruct for ForeignCallback {
    type Ref = u64;

    fn add_node(&mut self, node: Node<u64>) -> Result<u64, BridgeError> {
        let cb = &self.raw;
        // SAFETY: the callback is live (not yet released) while `self` exists.
        let raw = unsafe {
            match node {
                Node::Symbol(name) => (cb.add_symbol)(cb.data, name),
                Node::True => (cb.add_true)(cb.data),
                Node::False => (cb.add_false)(cb.data),
                Node::Not(a) => (cb.add_not)(cb.data, a),
                Node::Maj([a, b, c]) => (cb.add_maj)(cb.data, a, b, c),
            }
        };
        if raw == INVALID_REF {
            return Err(BridgeError::engine(format!(
                "host rejected add_{}",
                node.kind().name()
            )));
        }
        Ok(raw)
    }

    fn mark_roots(&mut self, roots: &[u64]) -> Result<(), BridgeError> {
        // SAFETY: `roots` outlives the call; the callback is live.
        unsafe { (self.raw.mark_roots)(self.raw.data, roots.len(), roots.as_ptr()) };
        Ok(())
    }
}

/// Engine-side context behind [`mig_engine::data`].
struct EngineState<R> {
    session: Session<R>,
    poisoned: Option<BridgeError>,
}

impl<R: Rewriter> EngineState<R> {
    fn add(&mut self, node: Node<u64>) -> u64 {
        let session = &mut self.session;
        let added = node
            .try_map(|raw| session.resolve(raw))
            .and_then(|node| session.add_node(node));
        match added {
            Ok(r) => r.raw(),
            Err(err) => {
                warn!(%err, "add rejected; session poisoned until next rewrite");
                self.poisoned.get_or_insert(err);
                INVALID_REF
            }
        }
    }

    fn rewrite(&mut self, roots: &[u64], callback: &mut ForeignCallback) -> Result<(), BridgeError> {
        if let Some(err) = self.poisoned.take() {
            self.session.discard();
            return Err(err);
        }
        let refs = match roots
            .iter()
            .map(|raw| self.session.resolve(*raw))
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(refs) => refs,
            Err(err) => {
                self.session.discard();
                return Err(err);
            }
        };
        self.session.rewrite(&refs, callback)
    }
}

impl mig_engine {
    /// Wraps `rewriter` in a fresh engine handle with the default config.
    pub fn new<R: Rewriter + 'static>(rewriter: R) -> Self {
        Self::with_config(rewriter, BridgeConfig::default())
    }

    /// Wraps `rewriter` in a fresh engine handle whose input arena follows `config`.
    pub fn with_config<R: Rewriter + 'static>(rewriter: R, config: BridgeConfig) -> Self {
        let state = Box::new(EngineState {
            session: Session::with_config(rewriter, config),
            poisoned: None,
        });
        Self {
            data: Box::into_raw(state).cast::<c_void>(),
            add_symbol: engine_add_symbol::<R>,
            add_true: engine_add_true::<R>,
            add_false: engine_add_false::<R>,
            add_not: engine_add_not::<R>,
            add_maj: engine_add_maj::<R>,
            rewrite: engine_rewrite::<R>,
            release: engine_release::<R>,
        }
    }
}

/// Creates an engine handle that applies no rules.
///
/// The caller owns the handle and must invoke its `release` exactly once.
#[no_mangle]
pub extern "C" fn mig_identity_engine_new() -> mig_engine {
    mig_engine::new(PassthroughRewriter)
}

/// # Safety
/// `data` must be the live context of an engine built for `R`.
unsafe fn state<'a, R>(data: *mut c_void) -> &'a mut EngineState<R> {
    unsafe { &mut *data.cast::<EngineState<R>>() }
}

unsafe extern "C" fn engine_add_symbol<R: Rewriter>(data: *mut c_void, name: u64) -> u64 {
    unsafe { state::<R>(data) }.add(Node::Symbol(name))
}

unsafe extern "C" fn engine_add_true<R: Rewriter>(data: *mut c_void) -> u64 {
    unsafe { state::<R>(data) }.add(Node::True)
}

unsafe extern "C" fn engine_add_false<R: Rewriter>(data: *mut c_void) -> u64 {
    unsafe { state::<R>(data) }.add(Node::False)
}

unsafe extern "C" fn engine_add_not<R: Rewriter>(data: *mut c_void, id1: u64) -> u64 {
    unsafe { state::<R>(data) }.add(Node::Not(id1))
}

unsafe extern "C" fn engine_add_maj<R: Rewriter>(
    data: *mut c_void,
    id1: u64,
    id2: u64,
    id3: u64,
) -> u64 {
    unsafe { state::<R>(data) }.add(Node::Maj([id1, id2, id3]))
}

unsafe extern "C" fn engine_rewrite<R: Rewriter>(
    data: *mut c_void,
    roots_size: usize,
    roots: *const u64,
    callback: mig_rewrite_callback,
) -> mig_status {
    // Owned from here on: every return below releases the callback.
    let mut callback = unsafe { ForeignCallback::from_raw(callback) };
    let state = unsafe { state::<R>(data) };
    let roots = match unsafe { raw_slice(roots, roots_size) } {
        Ok(roots) => roots,
        Err(violation) => {
            warn!(%violation, "rewrite rejected");
            state.session.discard();
            return mig_status::PROTOCOL_VIOLATION;
        }
    };
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| state.rewrite(roots, &mut callback)));
    let result = outcome.unwrap_or_else(|_| {
        state.session.discard();
        Err(BridgeError::engine("engine panicked during rewrite"))
    });
    callback.release();
    debug!(ok = result.is_ok(), "foreign rewrite finished");
    mig_status::from_result(&result)
}

unsafe extern "C" fn engine_release<R: Rewriter>(data: *mut c_void) {
    if data.is_null() {
        return;
    }
    drop(unsafe { Box::from_raw(data.cast::<EngineState<R>>()) });
}
