// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! C-compatible boundary for the MIG rewriting bridge.
//!
//! Exposes the engine handle and the reconstruction callback as plain
//! `#[repr(C)]` function tables so an engine and a host built against
//! different toolchains can drive each other. Both directions are covered:
//! [`mig_engine::new`] publishes any [`mig_core::Rewriter`] as a handle, and
//! [`ForeignEngine`] adopts a handle from elsewhere behind the safe
//! [`mig_core::RewriteSession`] interface.
#![allow(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod abi;
mod engine;
mod header;
mod host;

/// Raw function tables and status codes.
pub use abi::{mig_engine, mig_rewrite_callback, mig_status};
/// Engine-side export path.
pub use engine::{mig_identity_engine_new, ForeignCallback};
/// C declarations of the ABI.
pub use header::c_header;
/// Host-side owner of a foreign engine.
pub use host::ForeignEngine;
