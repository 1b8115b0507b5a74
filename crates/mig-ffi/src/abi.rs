// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Raw boundary structures.
//!
//! Each resource is a plain struct: an opaque context pointer plus a fixed
//! table of function pointers bound to it. The consumer of a resource, not
//! its creator, invokes `release` exactly once.
#![allow(non_camel_case_types)]

use std::ffi::c_void;

use mig_core::{BridgeError, Violation};

/// Result code of [`mig_engine::rewrite`].
///
/// Carried as a bare `u32` so an out-of-range value from a foreign engine is
/// still a valid Rust value; unknown codes read as engine failures.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct mig_status(pub u32);

impl mig_status {
    /// Rewrite completed and `mark_roots` was issued.
    pub const OK: Self = Self(0);
    /// The call sequence broke the protocol.
    pub const PROTOCOL_VIOLATION: Self = Self(1);
    /// The engine could not complete the session.
    pub const ENGINE_FAILURE: Self = Self(2);

    /// Status reporting `result`.
    pub fn from_result(result: &Result<(), BridgeError>) -> Self {
        match result {
            Ok(()) => Self::OK,
            Err(BridgeError::ProtocolViolation(_)) => Self::PROTOCOL_VIOLATION,
            Err(BridgeError::EngineFailure(_)) => Self::ENGINE_FAILURE,
        }
    }

    /// Converts a status received from an engine back into a result.
    pub fn into_result(self) -> Result<(), BridgeError> {
        match self {
            Self::OK => Ok(()),
            Self::PROTOCOL_VIOLATION => Err(Violation::ReportedByEngine.into()),
            Self(code) => Err(BridgeError::engine(format!(
                "engine reported failure (status {code})"
            ))),
        }
    }
}

/// Reconstruction callback handed to an engine by value.
///
/// Built by the host immediately before a rewrite; the engine owns it from
/// then on and must call `release` exactly once when done with it, even if
/// the rewrite fails. `mark_roots` is the final call of a rewrite.
#[repr(C)]
pub struct mig_rewrite_callback {
    /// Host-side context.
    pub data: *mut c_void,
    /// Adds an input node tagged with an opaque name.
    pub add_symbol: unsafe extern "C" fn(data: *mut c_void, name: u64) -> u64,
    /// Adds constant true.
    pub add_true: unsafe extern "C" fn(data: *mut c_void) -> u64,
    /// Adds constant false.
    pub add_false: unsafe extern "C" fn(data: *mut c_void) -> u64,
    /// Adds the complement of `id1`.
    pub add_not: unsafe extern "C" fn(data: *mut c_void, id1: u64) -> u64,
    /// Adds `MAJ(id1, id2, id3)`.
    pub add_maj: unsafe extern "C" fn(data: *mut c_void, id1: u64, id2: u64, id3: u64) -> u64,
    /// Declares the rewritten roots, positionally matching the rewrite's input.
    pub mark_roots: unsafe extern "C" fn(data: *mut c_void, roots_size: usize, roots: *const u64),
    /// Releases `data`.
    pub release: unsafe extern "C" fn(data: *mut c_void),
}

/// Engine handle: a live rewriting session.
///
/// The host releases it with `release` after its last rewrite.
#[repr(C)]
pub struct mig_engine {
    /// Engine-side context.
    pub data: *mut c_void,
    /// Adds an input node tagged with an opaque name.
    pub add_symbol: unsafe extern "C" fn(data: *mut c_void, name: u64) -> u64,
    /// Adds constant true.
    pub add_true: unsafe extern "C" fn(data: *mut c_void) -> u64,
    /// Adds constant false.
    pub add_false: unsafe extern "C" fn(data: *mut c_void) -> u64,
    /// Adds the complement of `id1`.
    pub add_not: unsafe extern "C" fn(data: *mut c_void, id1: u64) -> u64,
    /// Adds `MAJ(id1, id2, id3)`.
    pub add_maj: unsafe extern "C" fn(data: *mut c_void, id1: u64, id2: u64, id3: u64) -> u64,
    /// Rewrites the cone of `roots`, consuming `callback`.
    pub rewrite: unsafe extern "C" fn(
        data: *mut c_void,
        roots_size: usize,
        roots: *const u64,
        callback: mig_rewrite_callback,
    ) -> mig_status,
    /// Releases `data`.
    pub release: unsafe extern "C" fn(data: *mut c_void),
}

/// Views a raw `(len, ptr)` pair as a slice; a null pointer is only accepted
/// with a zero length.
///
/// # Safety
/// When non-null, `ptr` must point to `len` initialized values that outlive `'a`.
pub(crate) unsafe fn raw_slice<'a>(ptr: *const u64, len: usize) -> Result<&'a [u64], Violation> {
    if ptr.is_null() {
        return if len == 0 {
            Ok(&[])
        } else {
            Err(Violation::NullRoots { len })
        };
    }
    Ok(unsafe { std::slice::from_raw_parts(ptr, len) })
}
