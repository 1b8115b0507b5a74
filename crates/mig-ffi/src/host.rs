// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Host side of the ABI: drives a [`mig_engine`] through the safe
//! [`RewriteSession`] interface and serves its reconstruction callback.
use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};

use mig_core::{
    BridgeError, CallbackProtocol, Node, NodeRef, Reconstruct, RewriteSession, ScopeId,
    Violation, INVALID_REF,
};
use tracing::{debug, instrument, warn};

use crate::abi::{mig_engine, mig_rewrite_callback, mig_status, raw_slice};

/// Owner of a foreign engine handle.
///
/// References it hands out carry one scope for the life of the handle and a
/// host-side raw value `base + index`, where `index` points into the engine
/// refs issued since the last rewrite. Each `rewrite` moves `base` past
/// everything issued, so older references report
/// [`Violation::StaleReference`]. The handle is released exactly once, by
/// [`ForeignEngine::release`] or on drop.
///
/// Not `Send`: the raw context pointer belongs to the thread that built it.
pub struct ForeignEngine {
    raw: mig_engine,
    scope: ScopeId,
    base: u64,
    issued: Vec<u64>,
}

impl ForeignEngine {
    /// Takes ownership of `raw`.
    ///
    /// # Safety
    /// `raw` must be a live, unreleased engine handle whose function pointers
    /// accept `raw.data`. Nothing else may release it afterwards.
    pub unsafe fn from_raw(raw: mig_engine) -> Self {
        let scope = ScopeId::fresh();
        debug!(%scope, "foreign engine adopted");
        Self {
            raw,
            scope,
            base: 0,
            issued: Vec::new(),
        }
    }

    /// Releases the engine handle now.
    pub fn release(self) {}

    /// Engine refs issued since the last rewrite.
    pub fn live(&self) -> usize {
        self.issued.len()
    }

    fn to_raw(&self, r: NodeRef) -> Result<u64, BridgeError> {
        let engine_raw = if r.scope() == self.scope {
            r.raw()
                .checked_sub(self.base)
                .and_then(|offset| usize::try_from(offset).ok())
                .and_then(|index| self.issued.get(index).copied())
        } else {
            None
        };
        engine_raw.ok_or_else(|| {
            let violation = if r.scope() == self.scope {
                Violation::StaleReference { raw: r.raw() }
            } else {
                Violation::ForeignReference { raw: r.raw() }
            };
            warn!(%violation, "reference rejected");
            violation.into()
        })
    }

    fn issue(&mut self, engine_raw: u64) -> Result<NodeRef, BridgeError> {
        let raw = self
            .base
            .checked_add(self.issued.len() as u64)
            .filter(|raw| *raw != INVALID_REF)
            .ok_or_else(|| {
                BridgeError::engine(format!("reference space of {} exhausted", self.scope))
            })?;
        self.issued.push(engine_raw);
        Ok(NodeRef::from_raw(self.scope, raw))
    }

    fn retire(&mut self) {
        self.base = self.base.saturating_add(self.issued.len() as u64);
        self.issued.clear();
    }

    fn call_rewrite<T: Reconstruct + ?Sized>(
        &mut self,
        roots: &[u64],
        target: &mut T,
    ) -> Result<(), BridgeError> {
        let mut frame = CallbackFrame::new(target, roots.len());
        let callback = frame.callback();
        // SAFETY: the handle is live; `frame` outlives the synchronous call and
        // is not touched again until it returns.
        let status =
            unsafe { (self.raw.rewrite)(self.raw.data, roots.len(), roots.as_ptr(), callback) };
        self.retire();
        frame.finish(status)
    }
}

impl Drop for ForeignEngine {
    fn drop(&mut self) {
        // SAFETY: ownership of the handle was transferred in `from_raw`.
        unsafe { (self.raw.release)(self.raw.data) };
        debug!(scope = %self.scope, "foreign engine released");
    }
}

impl RewriteSession for ForeignEngine {
    fn scope(&self) -> ScopeId {
        self.scope
    }

    fn add_node(&mut self, node: Node<NodeRef>) -> Result<NodeRef, BridgeError> {
        let node = node.try_map(|r| self.to_raw(r))?;
        let e = &self.raw;
        // SAFETY: the handle is live and operands came from this scope.
        let raw = unsafe {
            match node {
                Node::Symbol(name) => (e.add_symbol)(e.data, name),
                Node::True => (e.add_true)(e.data),
                Node::False => (e.add_false)(e.data),
                Node::Not(a) => (e.add_not)(e.data, a),
                Node::Maj([a, b, c]) => (e.add_maj)(e.data, a, b, c),
            }
        };
        if raw == INVALID_REF {
            return Err(BridgeError::engine(format!(
                "engine rejected add_{}",
                node.kind().name()
            )));
        }
        self.issue(raw)
    }

    #[instrument(skip_all, fields(scope = %self.scope, roots = roots.len()))]
    fn rewrite<T: Reconstruct + ?Sized>(
        &mut self,
        roots: &[NodeRef],
        target: &mut T,
    ) -> Result<(), BridgeError> {
        let raw_roots = roots
            .iter()
            .map(|r| self.to_raw(*r))
            .collect::<Result<Vec<_>, _>>();
        match raw_roots {
            Ok(raw_roots) => self.call_rewrite(&raw_roots, target),
            Err(err) => {
                // The fed nodes are consumed regardless; flush them into a sink.
                if let Err(flush) = self.call_rewrite(&[], &mut Discard) {
                    warn!(%flush, "flushing fed nodes failed");
                }
                Err(err)
            }
        }
    }
}

/// Reconstruction target that drops everything it receives.
struct Discard;

impl Reconstruct for Discard {
    type Ref = ();

    fn add_node(&mut self, _node: Node<()>) -> Result<(), BridgeError> {
        Ok(())
    }

    fn mark_roots(&mut self, _roots: &[()]) -> Result<(), BridgeError> {
        Ok(())
    }
}

/// Host-side state behind [`mig_rewrite_callback::data`] for one rewrite.
///
/// Issues dense callback-space references (indices into `issued`), checks
/// every incoming reference and call against [`CallbackProtocol`], and keeps
/// the first failure for [`CallbackFrame::finish`].
struct CallbackFrame<'a, T: Reconstruct + ?Sized> {
    target: &'a mut T,
    protocol: CallbackProtocol,
    issued: Vec<T::Ref>,
    releases: u32,
    failure: Option<BridgeError>,
}

impl<'a, T: Reconstruct + ?Sized> CallbackFrame<'a, T> {
    fn new(target: &'a mut T, expected_roots: usize) -> Self {
        Self {
            target,
            protocol: CallbackProtocol::new(expected_roots),
            issued: Vec::new(),
            releases: 0,
            failure: None,
        }
    }

    fn callback(&mut self) -> mig_rewrite_callback {
        mig_rewrite_callback {
            data: std::ptr::from_mut(self).cast::<c_void>(),
            add_symbol: cb_add_symbol::<T>,
            add_true: cb_add_true::<T>,
            add_false: cb_add_false::<T>,
            add_not: cb_add_not::<T>,
            add_maj: cb_add_maj::<T>,
            mark_roots: cb_mark_roots::<T>,
            release: cb_release::<T>,
        }
    }

    fn fail(&mut self, err: BridgeError) {
        if let Some(violation) = err.violation() {
            warn!(%violation, "callback protocol violation");
        }
        self.failure.get_or_insert(err);
    }

    fn lookup(&self, raw: u64) -> Result<T::Ref, BridgeError> {
        usize::try_from(raw)
            .ok()
            .and_then(|i| self.issued.get(i).copied())
            .ok_or(BridgeError::ProtocolViolation(Violation::ForeignReference {
                raw,
            }))
    }

    fn add(&mut self, node: Node<u64>) -> u64 {
        let added = self
            .protocol
            .before_add()
            .map_err(BridgeError::from)
            .and_then(|()| node.try_map(|raw| self.lookup(raw)))
            .and_then(|node| self.target.add_node(node));
        match added {
            Ok(r) => {
                self.issued.push(r);
                self.issued.len() as u64 - 1
            }
            Err(err) => {
                self.fail(err);
                INVALID_REF
            }
        }
    }

    fn mark(&mut self, roots: &[u64]) -> Result<(), BridgeError> {
        self.protocol.before_mark(roots.len())?;
        let roots = roots
            .iter()
            .map(|raw| self.lookup(*raw))
            .collect::<Result<Vec<_>, _>>()?;
        self.target.mark_roots(&roots)
    }

    fn release(&mut self) {
        self.releases = self.releases.saturating_add(1);
        if let Err(violation) = self.protocol.release() {
            self.fail(violation.into());
        }
    }

    /// Verdict on the finished rewrite, most specific failure first.
    fn finish(self, status: mig_status) -> Result<(), BridgeError> {
        if let Some(err) = self.failure {
            return Err(err);
        }
        if self.releases != 1 {
            let violation = Violation::ReleaseCount {
                count: self.releases,
            };
            warn!(%violation, "callback release count");
            return Err(violation.into());
        }
        status.into_result()?;
        self.protocol.finish().map_err(|violation| {
            warn!(%violation, "engine returned without marking roots");
            violation.into()
        })
    }

    /// Runs `f`, recording a panic in the host target as an engine failure.
    fn guarded<V>(&mut self, fallback: V, f: impl FnOnce(&mut Self) -> V) -> V {
        match panic::catch_unwind(AssertUnwindSafe(|| f(&mut *self))) {
            Ok(value) => value,
            Err(_) => {
                self.fail(BridgeError::engine("reconstruction target panicked"));
                fallback
            }
        }
    }
}

/// # Safety
/// `data` must point at the live frame built for `T` by the current rewrite.
unsafe fn frame<'f, 'a, T: Reconstruct + ?Sized>(data: *mut c_void) -> &'f mut CallbackFrame<'a, T> {
    unsafe { &mut *data.cast::<CallbackFrame<'a, T>>() }
}

unsafe extern "C" fn cb_add_symbol<T: Reconstruct + ?Sized>(data: *mut c_void, name: u64) -> u64 {
    unsafe { frame::<T>(data) }.guarded(INVALID_REF, |f| f.add(Node::Symbol(name)))
}

unsafe extern "C" fn cb_add_true<T: Reconstruct + ?Sized>(data: *mut c_void) -> u64 {
    unsafe { frame::<T>(data) }.guarded(INVALID_REF, |f| f.add(Node::True))
}

unsafe extern "C" fn cb_add_false<T: Reconstruct + ?Sized>(data: *mut c_void) -> u64 {
    unsafe { frame::<T>(data) }.guarded(INVALID_REF, |f| f.add(Node::False))
}

unsafe extern "C" fn cb_add_not<T: Reconstruct + ?Sized>(data: *mut c_void, id1: u64) -> u64 {
    unsafe { frame::<T>(data) }.guarded(INVALID_REF, |f| f.add(Node::Not(id1)))
}

unsafe extern "C" fn cb_add_maj<T: Reconstruct + ?Sized>(
    data: *mut c_void,
    id1: u64,
    id2: u64,
    id3: u64,
) -> u64 {
    unsafe { frame::<T>(data) }.guarded(INVALID_REF, |f| f.add(Node::Maj([id1, id2, id3])))
}

unsafe extern "C" fn cb_mark_roots<T: Reconstruct + ?Sized>(
    data: *mut c_void,
    roots_size: usize,
    roots: *const u64,
) {
    let frame = unsafe { frame::<T>(data) };
    let roots = match unsafe { raw_slice(roots, roots_size) } {
        Ok(roots) => roots,
        Err(violation) => return frame.fail(violation.into()),
    };
    frame.guarded((), |f| {
        if let Err(err) = f.mark(roots) {
            f.fail(err);
        }
    });
}

unsafe extern "C" fn cb_release<T: Reconstruct + ?Sized>(data: *mut c_void) {
    unsafe { frame::<T>(data) }.release();
}
